use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// A single form-level error, rendered next to the originating form.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FormError {
    pub msg: String,
}

impl FormError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Vec<FormError> {
        let mut errors = Vec::new();
        if !is_valid_email(self.email.trim()) {
            errors.push(FormError::new("El email es obligatorio"));
        }
        if self.password.is_empty() {
            errors.push(FormError::new("El password es obligatorio"));
        }
        errors
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub nombre: String,
    pub email: String,
    pub password: String,
    pub repetir_password: String,
}

impl RegisterForm {
    pub fn validate(&self) -> Vec<FormError> {
        let mut errors = Vec::new();
        if self.nombre.trim().is_empty() {
            errors.push(FormError::new("El nombre no puede ir vacío"));
        }
        if !is_valid_email(self.email.trim()) {
            errors.push(FormError::new("El email es obligatorio"));
        }
        if self.password.len() < 6 {
            errors.push(FormError::new(
                "El password debe de ser mínimo de 6 caracteres",
            ));
        }
        if self.repetir_password != self.password {
            errors.push(FormError::new("Los passwords no son iguales"));
        }
        errors
    }
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordForm {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct NewPasswordForm {
    pub password: String,
}

/// View model for a form page: title plus any errors to display.
#[derive(Debug, Serialize)]
pub struct FormView {
    pub pagina: String,
    pub errores: Vec<FormError>,
}

impl FormView {
    pub fn new(pagina: impl Into<String>) -> Self {
        Self {
            pagina: pagina.into(),
            errores: Vec::new(),
        }
    }

    pub fn with_errors(pagina: impl Into<String>, errores: Vec<FormError>) -> Self {
        Self {
            pagina: pagina.into(),
            errores,
        }
    }
}

/// Registration form view carries the submitted name/email back for re-render.
#[derive(Debug, Serialize)]
pub struct RegisterView {
    pub pagina: String,
    pub errores: Vec<FormError>,
    pub usuario: Option<RegisterPrefill>,
}

#[derive(Debug, Serialize)]
pub struct RegisterPrefill {
    pub nombre: String,
    pub email: String,
}

/// Plain informational page (account created, reset instructions sent...).
#[derive(Debug, Serialize)]
pub struct MessageView {
    pub pagina: String,
    pub mensaje: String,
}

/// Outcome page for token-driven flows; `error` marks the invalid-token case.
#[derive(Debug, Serialize)]
pub struct TokenOutcomeView {
    pub pagina: String,
    pub mensaje: String,
    pub error: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_regex_accepts_and_rejects() {
        assert!(is_valid_email("ana@example.com"));
        assert!(!is_valid_email("ana@example"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn register_form_valid_input_passes() {
        let form = RegisterForm {
            nombre: "Ana".into(),
            email: "ana@example.com".into(),
            password: "secret1".into(),
            repetir_password: "secret1".into(),
        };
        assert!(form.validate().is_empty());
    }

    #[test]
    fn register_form_collects_every_failure() {
        let form = RegisterForm {
            nombre: "  ".into(),
            email: "nope".into(),
            password: "abc".into(),
            repetir_password: "xyz".into(),
        };
        let errors = form.validate();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn register_form_rejects_short_password() {
        let form = RegisterForm {
            nombre: "Ana".into(),
            email: "ana@example.com".into(),
            password: "12345".into(),
            repetir_password: "12345".into(),
        };
        let errors = form.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].msg.contains("6 caracteres"));
    }

    #[test]
    fn register_form_rejects_mismatched_confirmation() {
        let form = RegisterForm {
            nombre: "Ana".into(),
            email: "ana@example.com".into(),
            password: "secret1".into(),
            repetir_password: "secret2".into(),
        };
        let errors = form.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].msg.contains("iguales"));
    }

    #[test]
    fn login_form_requires_both_fields() {
        let form = LoginForm {
            email: "".into(),
            password: "".into(),
        };
        assert_eq!(form.validate().len(), 2);
    }
}
