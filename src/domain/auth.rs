use crate::error::{ClientError, FieldErrors, Result};
use std::fmt;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Clone)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self { email: email.into(), password: password.into() }
    }

    /// Pre-submission checks, reported per field.
    ///
    /// # Errors
    /// Returns a validation error naming every offending field.
    pub fn validate(&self) -> Result<()> {
        let mut fields = FieldErrors::new();
        check_email(&self.email, &mut fields);
        check_password(&self.password, &mut fields);
        finish(fields)
    }
}

impl fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginForm").field("email", &self.email).field("password", &"<redacted>").finish()
    }
}

#[derive(Clone, Default)]
pub struct SignupForm {
    pub email: String,
    pub password: String,
    pub password_confirm: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub user_type: String,
    pub organization_name: Option<String>,
}

impl SignupForm {
    /// # Errors
    /// Returns a validation error naming every offending field.
    pub fn validate(&self) -> Result<()> {
        let mut fields = FieldErrors::new();
        check_email(&self.email, &mut fields);
        check_password(&self.password, &mut fields);

        if let Some(confirm) = &self.password_confirm
            && confirm != &self.password
        {
            push(&mut fields, "password_confirm", "Passwords do not match");
        }
        if self.first_name.trim().is_empty() {
            push(&mut fields, "first_name", "First name is required");
        }
        if self.last_name.trim().is_empty() {
            push(&mut fields, "last_name", "Last name is required");
        }
        if self.user_type.trim().eq_ignore_ascii_case("organization")
            && self.organization_name.as_deref().is_none_or(|name| name.trim().is_empty())
        {
            push(&mut fields, "organization_name", "Organization name is required");
        }

        finish(fields)
    }

    #[must_use]
    pub fn login_form(&self) -> LoginForm {
        LoginForm::new(self.email.clone(), self.password.clone())
    }
}

impl fmt::Debug for SignupForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignupForm")
            .field("email", &self.email)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("user_type", &self.user_type)
            .field("organization_name", &self.organization_name)
            .finish_non_exhaustive()
    }
}

/// Loose shape check: one `@`, a non-empty local part, and a dotted domain.
#[must_use]
pub fn is_plausible_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.split('.').count() >= 2
        && domain.split('.').all(|label| !label.is_empty())
}

fn check_email(email: &str, fields: &mut FieldErrors) {
    if email.trim().is_empty() {
        push(fields, "email", "Email is required");
    } else if !is_plausible_email(email) {
        push(fields, "email", "Enter a valid email address");
    }
}

fn check_password(password: &str, fields: &mut FieldErrors) {
    if password.is_empty() {
        push(fields, "password", "Password is required");
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        push(fields, "password", &format!("Password must be at least {MIN_PASSWORD_LEN} characters"));
    }
}

fn push(fields: &mut FieldErrors, field: &str, message: &str) {
    fields.entry(field.to_string()).or_default().push(message.to_string());
}

fn finish(fields: FieldErrors) -> Result<()> {
    if fields.is_empty() { Ok(()) } else { Err(ClientError::validation(fields)) }
}
