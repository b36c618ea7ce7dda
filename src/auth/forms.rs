use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use super::password::validate_password_strength;
use crate::forms::{clean_email, FormErrors, REQUIRED};

pub const USERNAME_MAX_LENGTH: usize = 150;
pub const USERNAME_TAKEN: &str = "A user with that username already exists.";
pub const INVALID_LOGIN: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";
pub const INACTIVE_LOGIN: &str = "This account is inactive.";

/// Submitted registration form.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password1: String,
    pub password2: String,
}

/// Registration input that passed every check not needing the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanRegistration {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterForm {
    /// Validates the form. The caller still has to check that the username
    /// is free when `errors.has("username")` is false.
    pub fn clean(&self) -> Result<CleanRegistration, FormErrors> {
        let mut errors = FormErrors::new();

        let username = clean_username(&self.username, &mut errors);
        let email = clean_email(&self.email, "email", &mut errors);

        if self.password1.is_empty() {
            errors.add("password1", REQUIRED);
        }
        if self.password2.is_empty() {
            errors.add("password2", REQUIRED);
        }
        if !self.password1.is_empty() && !self.password2.is_empty() {
            if self.password1 != self.password2 {
                errors.add("password2", "The two password fields didn't match.");
            } else {
                let attributes = [
                    ("username", self.username.trim()),
                    ("email", self.email.trim()),
                ];
                for problem in validate_password_strength(&self.password2, &attributes) {
                    errors.add("password2", problem);
                }
            }
        }

        match (username, email) {
            (Some(username), Some(email)) if errors.is_empty() => Ok(CleanRegistration {
                username,
                email,
                password: self.password1.clone(),
            }),
            _ => Err(errors),
        }
    }
}

fn clean_username(raw: &str, errors: &mut FormErrors) -> Option<String> {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[\w.@+-]+$").unwrap();
    }
    let username = raw.trim();
    if username.is_empty() {
        errors.add("username", REQUIRED);
        return None;
    }
    if username.chars().count() > USERNAME_MAX_LENGTH {
        errors.add(
            "username",
            format!("Ensure this value has at most {USERNAME_MAX_LENGTH} characters."),
        );
        return None;
    }
    if !USERNAME_RE.is_match(username) {
        errors.add(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
        return None;
    }
    Some(username.to_string())
}

/// Submitted login form.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub next: Option<String>,
}

impl LoginForm {
    /// Only checks presence; credentials are checked against the store.
    pub fn clean(&self) -> Result<(String, String), FormErrors> {
        let mut errors = FormErrors::new();
        let username = self.username.trim();
        if username.is_empty() {
            errors.add("username", REQUIRED);
        }
        if self.password.is_empty() {
            errors.add("password", REQUIRED);
        }
        if errors.is_empty() {
            Ok((username.to_string(), self.password.clone()))
        } else {
            Err(errors)
        }
    }
}

/// `?next=` query on the login page.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// Accepts only same-site absolute paths as a post-login redirect.
pub fn safe_next(next: Option<&str>) -> Option<String> {
    let next = next?.trim();
    if !next.starts_with('/') || next.starts_with("//") || next.starts_with("/\\") {
        return None;
    }
    if next.chars().any(|c| c.is_control()) {
        return None;
    }
    Some(next.to_string())
}
