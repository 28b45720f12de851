//! One validator per entity, parameterised by the operation being validated.
//!
//! `Mode::Create` requires the entity's mandatory fields; `Mode::PartialUpdate`
//! only checks the fields that are present and rejects an empty update.

use crate::models::{BookRequest, CreateCourseRequest, RegisterRequest, UpdateUserRequest};
use crate::utils::AppError;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Create,
    PartialUpdate,
}

pub trait Validate {
    fn validate(&self, mode: Mode) -> Result<(), AppError>;
}

struct Checker {
    mode: Mode,
    errors: Vec<String>,
    present: usize,
}

impl Checker {
    fn new(mode: Mode) -> Self {
        Checker { mode, errors: Vec::new(), present: 0 }
    }

    /// Returns the value when present; records "is required" in create mode.
    fn field<'a, T>(&mut self, name: &str, value: &'a Option<T>, required: bool) -> Option<&'a T> {
        match value {
            Some(v) => {
                self.present += 1;
                Some(v)
            }
            None => {
                if required && self.mode == Mode::Create {
                    self.errors.push(format!("\"{}\" is required", name));
                }
                None
            }
        }
    }

    fn text(&mut self, name: &str, value: &Option<String>, required: bool, min_len: usize) {
        if let Some(v) = self.field(name, value, required) {
            if v.trim().chars().count() < min_len.max(1) {
                self.errors.push(if min_len <= 1 {
                    format!("\"{}\" is not allowed to be empty", name)
                } else {
                    format!("\"{}\" length must be at least {} characters long", name, min_len)
                });
            }
        }
    }

    fn email(&mut self, name: &str, value: &Option<String>, required: bool) {
        if let Some(v) = self.field(name, value, required) {
            if !is_valid_email(v) {
                self.errors.push(format!("\"{}\" must be a valid email", name));
            }
        }
    }

    fn positive_f64(&mut self, name: &str, value: &Option<f64>, required: bool) {
        if let Some(v) = self.field(name, value, required) {
            if !v.is_finite() || *v <= 0.0 {
                self.errors.push(format!("\"{}\" must be a positive number", name));
            }
        }
    }

    fn positive_i64(&mut self, name: &str, value: &Option<i64>, required: bool) {
        if let Some(v) = self.field(name, value, required) {
            if *v <= 0 {
                self.errors.push(format!("\"{}\" must be a positive number", name));
            }
        }
    }

    fn uri(&mut self, name: &str, value: &Option<String>) {
        if let Some(v) = self.field(name, value, false) {
            if !is_valid_uri(v) {
                self.errors.push(format!("\"{}\" must be a valid uri", name));
            }
        }
    }

    fn optional<'a, T>(&mut self, name: &str, value: &'a Option<T>) -> Option<&'a T> {
        self.field(name, value, false)
    }

    fn finish(self) -> Result<(), AppError> {
        if self.mode == Mode::PartialUpdate && self.present == 0 && self.errors.is_empty() {
            return Err(AppError::validation("No fields to update"));
        }
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self.errors))
        }
    }
}

pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

fn is_valid_uri(uri: &str) -> bool {
    ["http://", "https://"]
        .iter()
        .any(|scheme| uri.len() > scheme.len() && uri.starts_with(scheme))
        && !uri.chars().any(char::is_whitespace)
}

/// Parses an admin state coming from a request body.
pub fn parse_user_state(value: Option<&str>) -> Result<crate::models::UserState, AppError> {
    match value {
        Some("active") => Ok(crate::models::UserState::Active),
        Some("inactive") => Ok(crate::models::UserState::Inactive),
        _ => Err(AppError::validation(
            "Invalid state. Allowed values are 'active' or 'inactive'.",
        )),
    }
}

impl Validate for RegisterRequest {
    fn validate(&self, mode: Mode) -> Result<(), AppError> {
        let mut check = Checker::new(mode);
        check.text("user_name", &self.user_name, true, 1);
        check.email("user_email", &self.user_email, true);
        check.text("user_password", &self.user_password, true, MIN_PASSWORD_LEN);
        check.finish()
    }
}

impl Validate for UpdateUserRequest {
    fn validate(&self, mode: Mode) -> Result<(), AppError> {
        let mut check = Checker::new(mode);
        check.text("user_name", &self.user_name, false, 1);
        check.email("user_email", &self.user_email, false);
        check.text("user_password", &self.user_password, false, MIN_PASSWORD_LEN);
        check.finish()
    }
}

impl Validate for CreateCourseRequest {
    fn validate(&self, mode: Mode) -> Result<(), AppError> {
        let mut check = Checker::new(mode);
        check.text("course_name", &self.course_name, true, 1);
        check.text("course_description", &self.course_description, true, 1);
        check.positive_f64("course_price", &self.course_price, true);

        if let Some(instructors) = check.optional("course_instructor", &self.course_instructor) {
            let ids = instructors.clone().into_vec();
            if ids.is_empty() || ids.iter().any(|id| id.trim().is_empty()) {
                check
                    .errors
                    .push("\"course_instructor\" must contain at least one non-empty ID".to_string());
            }
        }
        check.optional("course_image", &self.course_image);
        check.optional("course_videos", &self.course_videos);
        check.optional("course_published", &self.course_published);

        if let Some(lessons) = check.optional("course_lessons", &self.course_lessons) {
            for (i, lesson) in lessons.iter().enumerate() {
                if lesson.subject.trim().is_empty() {
                    check
                        .errors
                        .push(format!("\"course_lessons[{}].subject\" is not allowed to be empty", i));
                }
            }
        }
        if let Some(files) = check.optional("course_files", &self.course_files) {
            for (i, file) in files.iter().enumerate() {
                if file.file_name.trim().is_empty() || file.file_reference.trim().is_empty() {
                    check.errors.push(format!(
                        "\"course_files[{}]\" needs both file_name and file_reference",
                        i
                    ));
                }
            }
        }
        check.finish()
    }
}

impl Validate for BookRequest {
    fn validate(&self, mode: Mode) -> Result<(), AppError> {
        let mut check = Checker::new(mode);
        check.text("book_name", &self.book_name, true, 1);
        check.optional("book_description", &self.book_description);
        check.positive_i64("book_price", &self.book_price, false);
        check.optional("book_cover", &self.book_cover);
        check.uri("book_link", &self.book_link);
        check.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OneOrMany;

    fn messages(result: Result<(), AppError>) -> Vec<String> {
        match result {
            Err(AppError::Validation(messages)) => messages,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_register_collects_every_field_error() {
        let req = RegisterRequest {
            user_name: None,
            user_email: Some("not-an-email".into()),
            user_password: Some("short".into()),
        };
        let errors = messages(req.validate(Mode::Create));
        assert_eq!(errors.len(), 3);
        assert!(errors[0].contains("user_name"));
        assert!(errors[1].contains("valid email"));
        assert!(errors[2].contains("at least 8"));
    }

    #[test]
    fn test_register_accepts_valid_input() {
        let req = RegisterRequest {
            user_name: Some("Alice".into()),
            user_email: Some("alice@example.com".into()),
            user_password: Some("password123".into()),
        };
        assert!(req.validate(Mode::Create).is_ok());
    }

    #[test]
    fn test_partial_update_only_checks_present_fields() {
        let req = UpdateUserRequest {
            user_name: Some("New name".into()),
            ..Default::default()
        };
        assert!(req.validate(Mode::PartialUpdate).is_ok());

        let empty = UpdateUserRequest::default();
        let errors = messages(empty.validate(Mode::PartialUpdate));
        assert_eq!(errors, vec!["No fields to update".to_string()]);
    }

    #[test]
    fn test_course_create_requires_core_fields() {
        let req = CreateCourseRequest {
            course_price: Some(-3.0),
            ..Default::default()
        };
        let errors = messages(req.validate(Mode::Create));
        assert!(errors.iter().any(|e| e.contains("course_name")));
        assert!(errors.iter().any(|e| e.contains("course_description")));
        assert!(errors.iter().any(|e| e.contains("positive")));
    }

    #[test]
    fn test_course_update_rejects_empty_instructor_list() {
        let req = CreateCourseRequest {
            course_instructor: Some(OneOrMany::Many(vec![])),
            ..Default::default()
        };
        let errors = messages(req.validate(Mode::PartialUpdate));
        assert!(errors[0].contains("course_instructor"));
    }

    #[test]
    fn test_book_link_must_be_uri() {
        let req = BookRequest {
            book_name: Some("Rust".into()),
            book_link: Some("ftp:/nope".into()),
            ..Default::default()
        };
        assert_eq!(messages(req.validate(Mode::Create)).len(), 1);

        let ok = BookRequest {
            book_name: Some("Rust".into()),
            book_link: Some("https://example.com/rust.pdf".into()),
            book_price: Some(20),
            ..Default::default()
        };
        assert!(ok.validate(Mode::Create).is_ok());
    }

    #[test]
    fn test_email_shapes() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("@b.co"));
        assert!(!is_valid_email("a b@c.co"));
    }

    #[test]
    fn test_parse_user_state() {
        assert!(parse_user_state(Some("active")).is_ok());
        assert!(parse_user_state(Some("banned")).is_err());
        assert!(parse_user_state(None).is_err());
    }
}
