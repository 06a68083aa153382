use crate::domain::auth::{LoginForm, SignupForm};
use crate::domain::session::Credentials;
use crate::domain::user::UserProfile;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Serialize)]
pub struct Login<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

impl<'a> From<&'a LoginForm> for Login<'a> {
    fn from(form: &'a LoginForm) -> Self {
        Self { email: form.email.trim(), password: &form.password }
    }
}

#[derive(Serialize)]
pub struct Registration<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub user_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<&'a str>,
}

impl fmt::Debug for Login<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Login").field("email", &self.email).finish_non_exhaustive()
    }
}

impl<'a> From<&'a SignupForm> for Registration<'a> {
    fn from(form: &'a SignupForm) -> Self {
        Self {
            email: form.email.trim(),
            password: &form.password,
            first_name: form.first_name.trim(),
            last_name: form.last_name.trim(),
            user_type: form.user_type.trim(),
            organization_name: form.organization_name.as_deref().map(str::trim),
        }
    }
}

impl fmt::Debug for Registration<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration").field("email", &self.email).field("user_type", &self.user_type).finish_non_exhaustive()
    }
}

#[derive(Serialize)]
pub struct Refresh<'a> {
    pub refresh: &'a str,
}

impl fmt::Debug for Refresh<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Refresh").finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

impl From<TokenPair> for Credentials {
    fn from(tokens: TokenPair) -> Self {
        Self::new(tokens.access, tokens.refresh)
    }
}

#[derive(Debug, Deserialize)]
pub struct AuthSession {
    pub user: UserProfile,
    pub tokens: TokenPair,
}

/// Sign-up either signs the user in straight away or only creates the account.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Registered {
    Session {
        user: UserProfile,
        #[serde(default)]
        tokens: Option<TokenPair>,
    },
    Profile(UserProfile),
}

#[derive(Debug, Deserialize)]
pub struct RefreshedTokens {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}
