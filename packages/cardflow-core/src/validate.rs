/// Field validation run before any optimistic mutation is dispatched.
use regex::Regex;
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;

use crate::config::ValidationConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Title must not be empty")]
    EmptyTitle,

    #[error("{field} exceeds {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("Invalid color: {0}")]
    InvalidColor(String),
}

fn color_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^bg-[a-z]+-[0-9]{2,3}$").expect("valid color regex"))
}

/// Trim and NFC-normalize, so visually equal titles compare equal.
pub fn normalize_text(value: &str) -> String {
    value.trim().nfc().collect()
}

/// Normalized title, or why it was rejected.
pub fn title(value: &str, config: &ValidationConfig) -> Result<String, ValidationError> {
    let title = normalize_text(value);
    if title.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    if title.chars().count() > config.max_title_chars {
        return Err(ValidationError::TooLong {
            field: "title",
            max: config.max_title_chars,
        });
    }
    Ok(title)
}

/// Normalized description. Blank descriptions become `None`.
pub fn description(
    value: Option<&str>,
    config: &ValidationConfig,
) -> Result<Option<String>, ValidationError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let description = normalize_text(value);
    if description.is_empty() {
        return Ok(None);
    }
    if description.chars().count() > config.max_description_chars {
        return Err(ValidationError::TooLong {
            field: "description",
            max: config.max_description_chars,
        });
    }
    Ok(Some(description))
}

pub fn color(value: &str) -> Result<String, ValidationError> {
    let color = value.trim();
    if color_regex().is_match(color) {
        Ok(color.to_string())
    } else {
        Err(ValidationError::InvalidColor(value.to_string()))
    }
}
