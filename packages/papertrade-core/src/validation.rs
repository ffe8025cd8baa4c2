//! Client-side form validation.
//!
//! Nothing in here performs I/O. Failures are reported as field-level errors so
//! the presentation layer can attach them to inputs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum password length for new accounts.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// A single validation failure tied to a form field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Collected field errors for one form submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// First error recorded for `field`, if any.
    pub fn for_field(&self, field: &str) -> Option<&FieldError> {
        self.errors.iter().find(|e| e.field == field)
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.for_field(field).is_some()
    }

    /// Ok when nothing was recorded.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        f.write_str(&messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

// ============================================================================
// Passwords
// ============================================================================

/// Password strength category, in the order they are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordIssue {
    TooShort,
    MissingUppercase,
    MissingDigit,
    MissingSpecial,
}

impl PasswordIssue {
    pub fn message(&self) -> &'static str {
        match self {
            PasswordIssue::TooShort => "Password must be at least 8 characters long",
            PasswordIssue::MissingUppercase => {
                "Password must contain at least one uppercase letter"
            }
            PasswordIssue::MissingDigit => "Password must contain at least one number",
            PasswordIssue::MissingSpecial => {
                "Password must contain at least one special character"
            }
        }
    }
}

/// Per-category breakdown of a password.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordStrength {
    pub long_enough: bool,
    pub has_upper: bool,
    pub has_digit: bool,
    pub has_special: bool,
}

impl PasswordStrength {
    pub fn evaluate(password: &str) -> Self {
        Self {
            long_enough: password.chars().count() >= MIN_PASSWORD_LENGTH,
            has_upper: password.chars().any(|c| c.is_uppercase()),
            has_digit: password.chars().any(|c| c.is_ascii_digit()),
            has_special: password
                .chars()
                .any(|c| !c.is_alphanumeric() && !c.is_whitespace()),
        }
    }

    pub fn is_strong(&self) -> bool {
        self.long_enough && self.has_upper && self.has_digit && self.has_special
    }

    /// Every failing category, in check order.
    pub fn issues(&self) -> Vec<PasswordIssue> {
        let mut issues = Vec::new();
        if !self.long_enough {
            issues.push(PasswordIssue::TooShort);
        }
        if !self.has_upper {
            issues.push(PasswordIssue::MissingUppercase);
        }
        if !self.has_digit {
            issues.push(PasswordIssue::MissingDigit);
        }
        if !self.has_special {
            issues.push(PasswordIssue::MissingSpecial);
        }
        issues
    }

    /// The issue a form shows: the first failing category.
    pub fn first_issue(&self) -> Option<PasswordIssue> {
        self.issues().into_iter().next()
    }
}

pub fn is_strong_password(password: &str) -> bool {
    PasswordStrength::evaluate(password).is_strong()
}

// ============================================================================
// Email
// ============================================================================

/// Loose structural check: `local@domain.tld`, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

// ============================================================================
// Forms
// ============================================================================

/// Registration form input.
#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub email: String,
    pub username: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegistrationForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !is_valid_email(self.email.trim()) {
            errors.push("email", "Please enter a valid email address");
        }
        if self.username.trim().is_empty() {
            errors.push("username", "Username is required");
        }
        if let Some(issue) = PasswordStrength::evaluate(&self.password).first_issue() {
            errors.push("password", issue.message());
        }
        // Checked independently of strength.
        if self.password != self.confirm_password {
            errors.push("confirm_password", "Passwords do not match");
        }

        errors.into_result()
    }
}

/// Login form input.
#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.email.trim().is_empty() {
            errors.push("email", "Email is required");
        }
        if self.password.is_empty() {
            errors.push("password", "Password is required");
        }
        errors.into_result()
    }
}
