pub mod auth_service;
pub mod guard;
pub mod retry;
pub mod session_service;

pub use auth_service::AuthService;
pub use guard::AuthenticatedClient;
pub use retry::RetryPolicy;
pub use session_service::{Bootstrap, SessionBootstrapper};
