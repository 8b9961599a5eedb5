//! Form field validation helpers.
//!
//! Every validator is a pure function over the submitted text. Page handlers
//! combine them and collect failures into an [`ErrorSummary`], which the
//! templates render both as the summary box at the top of the page and as
//! inline messages next to each field.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

// ============================================================================
// Patterns
// ============================================================================

/// UK postcode, optional single space before the inward code. Includes GIR 0AA.
static POSTCODE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^(?i)(GIR ?0AA|[A-PR-UWYZ]([0-9]{1,2}|[A-HK-Y][0-9]{1,2}|[0-9][A-HJKPS-UW]|[A-HK-Y][0-9][ABEHMNPRV-Y]) ?[0-9][ABD-HJLNP-UW-Z]{2})$")
    .expect("postcode pattern is valid")
});

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

// ============================================================================
// Result types
// ============================================================================

/// A single failed field, anchored to the input it belongs to
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
  pub field: String,
  pub message: String,
}

/// Ordered list of field errors for one form submission
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorSummary {
  errors: Vec<FieldError>,
}

impl ErrorSummary {
  pub fn new() -> Self {
    Self::default()
  }

  /// Summary holding one error
  pub fn single(field: &str, message: &str) -> Self {
    let mut summary = Self::new();
    summary.push(field, message);
    summary
  }

  pub fn push(&mut self, field: &str, message: &str) {
    self.errors.push(FieldError {
      field: field.to_string(),
      message: message.to_string(),
    });
  }

  pub fn is_empty(&self) -> bool {
    self.errors.is_empty()
  }

  pub fn len(&self) -> usize {
    self.errors.len()
  }

  pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
    self.errors.iter()
  }

  /// First message for a field, for inline display
  pub fn for_field(&self, field: &str) -> Option<&str> {
    self
      .errors
      .iter()
      .find(|e| e.field == field)
      .map(|e| e.message.as_str())
  }
}

// ============================================================================
// Validators
// ============================================================================

/// True for a missing value or one made only of whitespace
pub fn is_empty(value: Option<&str>) -> bool {
  value.map(|v| v.trim().is_empty()).unwrap_or(true)
}

/// True if the value is longer than `max` characters (not bytes)
pub fn exceeds_max_length(value: Option<&str>, max: usize) -> bool {
  value.map(|v| v.trim().chars().count() > max).unwrap_or(false)
}

pub fn is_valid_postcode(value: &str) -> bool {
  POSTCODE.is_match(value.trim())
}

pub fn is_valid_email(value: &str) -> bool {
  EMAIL.is_match(value.trim())
}

/// Upper-case a postcode and put exactly one space before the inward code
pub fn format_postcode(value: &str) -> String {
  let compact: String = value
    .chars()
    .filter(|c| !c.is_whitespace())
    .collect::<String>()
    .to_uppercase();
  if compact.is_ascii() && compact.len() > 3 {
    let (outward, inward) = compact.split_at(compact.len() - 3);
    format!("{} {}", outward, inward)
  } else {
    compact
  }
}

/// Required text field with a length ceiling
pub fn check_required_text(
  errors: &mut ErrorSummary,
  field: &str,
  value: Option<&str>,
  max: usize,
  required_message: &str,
  length_message: &str,
) {
  if is_empty(value) {
    errors.push(field, required_message);
  } else if exceeds_max_length(value, max) {
    errors.push(field, length_message);
  }
}

/// Optional text field with a length ceiling
pub fn check_optional_text(
  errors: &mut ErrorSummary,
  field: &str,
  value: Option<&str>,
  max: usize,
  length_message: &str,
) {
  if exceeds_max_length(value, max) {
    errors.push(field, length_message);
  }
}

/// Required UK postcode
pub fn check_postcode(errors: &mut ErrorSummary, field: &str, value: Option<&str>) {
  match value.map(str::trim) {
    None | Some("") => errors.push(field, "Enter the postcode"),
    Some(v) if !is_valid_postcode(v) => errors.push(field, "Enter a real postcode"),
    Some(_) => {}
  }
}

/// Trimmed, owned copy of an optional field; empty becomes None
pub fn clean(value: Option<&str>) -> Option<String> {
  value
    .map(str::trim)
    .filter(|v| !v.is_empty())
    .map(str::to_string)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_is_empty() {
    assert!(is_empty(None));
    assert!(is_empty(Some("")));
    assert!(is_empty(Some("   \n")));
    assert!(!is_empty(Some("a")));
  }

  #[test]
  fn test_exceeds_max_length_counts_characters() {
    assert!(!exceeds_max_length(None, 3));
    assert!(!exceeds_max_length(Some("abc"), 3));
    assert!(exceeds_max_length(Some("abcd"), 3));
    // Multi-byte characters count once
    assert!(!exceeds_max_length(Some("äöü"), 3));
    // Surrounding whitespace is not counted
    assert!(!exceeds_max_length(Some("  abc  "), 3));
  }

  #[test]
  fn test_valid_postcodes() {
    assert!(is_valid_postcode("SW1A 1AA"));
    assert!(is_valid_postcode("sw1a1aa"));
    assert!(is_valid_postcode("M1 1AE"));
    assert!(is_valid_postcode("B33 8TH"));
    assert!(is_valid_postcode("CR2 6XH"));
    assert!(is_valid_postcode("DN55 1PT"));
    assert!(is_valid_postcode("EC1A 1BB"));
    assert!(is_valid_postcode("GIR 0AA"));
    assert!(is_valid_postcode("  BS1 5AH "));
  }

  #[test]
  fn test_invalid_postcodes() {
    assert!(!is_valid_postcode(""));
    assert!(!is_valid_postcode("INVALID"));
    assert!(!is_valid_postcode("12345"));
    assert!(!is_valid_postcode("SW1A 1A"));
    assert!(!is_valid_postcode("SW1A  1AA")); // two spaces
    assert!(!is_valid_postcode("QW1 1AA")); // Q can't start a postcode
  }

  #[test]
  fn test_check_postcode_messages() {
    let mut errors = ErrorSummary::new();
    check_postcode(&mut errors, "postcode", Some(""));
    assert_eq!(errors.for_field("postcode"), Some("Enter the postcode"));

    let mut errors = ErrorSummary::new();
    check_postcode(&mut errors, "postcode", None);
    assert_eq!(errors.for_field("postcode"), Some("Enter the postcode"));

    let mut errors = ErrorSummary::new();
    check_postcode(&mut errors, "postcode", Some("NOT A POSTCODE"));
    assert_eq!(errors.for_field("postcode"), Some("Enter a real postcode"));

    let mut errors = ErrorSummary::new();
    check_postcode(&mut errors, "postcode", Some("BS1 5AH"));
    assert!(errors.is_empty());
  }

  #[test]
  fn test_format_postcode() {
    assert_eq!(format_postcode("sw1a1aa"), "SW1A 1AA");
    assert_eq!(format_postcode(" bs1   5ah "), "BS1 5AH");
    assert_eq!(format_postcode("ab"), "AB");
  }

  #[test]
  fn test_emails() {
    assert!(is_valid_email("name@example.com"));
    assert!(is_valid_email("first.last+tag@sub.example.co.uk"));
    assert!(!is_valid_email("name@example"));
    assert!(!is_valid_email("name example@test.com"));
    assert!(!is_valid_email("@example.com"));
    assert!(!is_valid_email(""));
  }

  #[test]
  fn test_required_text_reports_one_error_per_field() {
    let mut errors = ErrorSummary::new();
    check_required_text(&mut errors, "a", Some(" "), 5, "required", "too long");
    check_required_text(&mut errors, "b", Some("abcdef"), 5, "required", "too long");
    check_required_text(&mut errors, "c", Some("abc"), 5, "required", "too long");
    assert_eq!(errors.len(), 2);
    assert_eq!(errors.for_field("a"), Some("required"));
    assert_eq!(errors.for_field("b"), Some("too long"));
    assert_eq!(errors.for_field("c"), None);
  }

  #[test]
  fn test_summary_preserves_order() {
    let mut errors = ErrorSummary::new();
    errors.push("second", "2");
    errors.push("first", "1");
    let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
    assert_eq!(fields, vec!["second", "first"]);
  }

  #[test]
  fn test_clean() {
    assert_eq!(clean(Some("  hi ")), Some("hi".to_string()));
    assert_eq!(clean(Some("   ")), None);
    assert_eq!(clean(None), None);
  }
}
