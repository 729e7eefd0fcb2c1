//! Validated text value objects.

use serde::Serialize;

use crate::domain::error::DomainError;

/// Maximum chat title length in characters.
pub const MAX_TITLE_LENGTH: usize = 255;

/// Maximum message body length in characters.
pub const MAX_TEXT_LENGTH: usize = 4000;

/// Preview length used in "too long" error messages.
const PREVIEW_LENGTH: usize = 255;

fn validate(value: &str, max: usize) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::EmptyText);
    }
    if value.chars().count() > max {
        let preview: String = value.chars().take(PREVIEW_LENGTH).collect();
        return Err(DomainError::TextTooLong(preview));
    }
    Ok(())
}

/// Chat title: non-empty, at most [`MAX_TITLE_LENGTH`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Title(String);

impl Title {
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        validate(&value, MAX_TITLE_LENGTH)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Title {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Message body: non-empty, at most [`MAX_TEXT_LENGTH`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Text(String);

impl Text {
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        validate(&value, MAX_TEXT_LENGTH)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Text {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("title" ; "short")]
    #[test_case(&"a".repeat(255) ; "at limit")]
    fn title_accepts(value: &str) {
        assert_eq!(Title::new(value).unwrap().as_str(), value);
    }

    #[test_case("" ; "empty")]
    #[test_case("   " ; "blank")]
    fn title_rejects_empty(value: &str) {
        assert_eq!(Title::new(value), Err(DomainError::EmptyText));
    }

    #[test]
    fn title_rejects_too_long() {
        let err = Title::new("a".repeat(1000)).unwrap_err();
        match err {
            DomainError::TextTooLong(preview) => assert_eq!(preview.len(), 255),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn text_accepts_long_body() {
        let body = "a".repeat(1000);
        assert_eq!(Text::new(body.clone()).unwrap().as_str(), body);
    }

    #[test]
    fn text_rejects_over_limit() {
        assert!(matches!(
            Text::new("a".repeat(MAX_TEXT_LENGTH + 1)),
            Err(DomainError::TextTooLong(_))
        ));
    }
}
