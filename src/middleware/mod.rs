pub mod auth;
pub mod rate_limit;
pub mod response;
pub mod telemetry;

pub use auth::{authenticate_middleware, CurrentUser};
pub use rate_limit::{client_key, rate_limit_middleware};
pub use response::{ApiResponse, ApiResult};
pub use telemetry::metrics_middleware;
