use lazy_static::lazy_static;
use regex::Regex;

use crate::error::AppError;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const PASSWORD_SPECIAL_CHARS: &[char] = &['#', '!', '&', '?'];

lazy_static! {
    static ref EMAIL: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Checks a registration request and reports every broken rule at once.
/// Expects an already normalized email.
pub fn validate_registration(email: &str, password: &str) -> Result<(), AppError> {
    let mut errors = Vec::new();

    if !EMAIL.is_match(email) {
        errors.push("Invalid email".to_string());
    }

    let password = password.trim();
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(format!(
            "Password must have at least {MIN_PASSWORD_LEN} characters"
        ));
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        errors.push("Password must have capital letters".to_string());
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        errors.push("Password must have lower case letters".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push("Password must have numbers".to_string());
    }
    if !password.contains(PASSWORD_SPECIAL_CHARS) {
        errors.push("Password must have special characters".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

/// A trimmed, non-blank document name. Only [`document_name`] builds one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentName(String);

impl DocumentName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Rejects absent or blank document names.
pub fn document_name(name: Option<&str>) -> Result<DocumentName, AppError> {
    match name.map(str::trim) {
        Some(name) if !name.is_empty() => Ok(DocumentName(name.to_string())),
        _ => Err(AppError::InvalidArgument("Name is required".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn errors_for(email: &str, password: &str) -> Vec<String> {
        match validate_registration(email, password) {
            Ok(()) => Vec::new(),
            Err(AppError::Validation(errors)) => errors,
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn accepts_a_strong_password() {
        assert!(errors_for("a@x.com", "Passw0rd!").is_empty());
        assert!(errors_for("a@x.com", "  Passw0rd#  ").is_empty());
    }

    #[test]
    fn reports_each_broken_rule() {
        let errors = errors_for("not-an-email", "short");
        assert_eq!(
            errors,
            vec![
                "Invalid email",
                "Password must have at least 8 characters",
                "Password must have capital letters",
                "Password must have numbers",
                "Password must have special characters",
            ]
        );
    }

    #[test]
    fn special_characters_come_from_the_fixed_set() {
        assert_eq!(
            errors_for("a@x.com", "Passw0rd$"),
            vec!["Password must have special characters"]
        );
        assert!(errors_for("a@x.com", "Passw0rd?").is_empty());
    }

    #[test]
    fn email_pattern_needs_a_dotted_domain() {
        assert!(EMAIL.is_match("a@x.com"));
        assert!(!EMAIL.is_match("a@x"));
        assert!(!EMAIL.is_match("a b@x.com"));
    }

    #[test]
    fn email_is_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  A@X.Com "), "a@x.com");
    }

    #[test]
    fn blank_names_are_rejected() {
        assert!(document_name(None).is_err());
        assert!(document_name(Some("   ")).is_err());
        assert_eq!(document_name(Some(" Notes ")).unwrap().as_str(), "Notes");
    }
}
