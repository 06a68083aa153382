pub mod auth;
pub mod route;
pub mod session;
pub mod user;
