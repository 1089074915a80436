// handlers/protected/mod.rs - Protected handlers (bearer token required)
//
// Handlers extract `CurrentUser`, which rejects anonymous requests with 401.
// Updates additionally require the caller to own the target resource.

pub mod addresses;
pub mod profiles;
pub mod utils;
