pub mod auth;
pub mod response;

pub use auth::bearer_auth_middleware;
pub use response::{ApiResponse, ApiResult, X_TOTAL_COUNT};
