// handlers/public/mod.rs - Public handlers (anonymous access allowed)
//
// Security Level: None (rate limited like every other route)

pub mod debug;
pub mod fallback;
pub mod health;
pub mod pictures;

pub use debug::debug_vars;
pub use fallback::{method_not_allowed, not_found};
pub use health::health;
pub use pictures::picture_get;
