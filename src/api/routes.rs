//! Backend endpoints used by the account operations.

pub const LOGIN: &str = "/accounts/login/";
pub const REGISTER: &str = "/accounts/register/";
pub const LOGOUT: &str = "/accounts/logout/";
pub const ME: &str = "/accounts/me/";
pub const TOKEN_REFRESH: &str = "/accounts/token/refresh/";
