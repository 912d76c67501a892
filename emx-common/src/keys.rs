//! Question key construction, parsing and validation
//!
//! A canonical question key is `{stepId}_{stepType}` or
//! `{stepId}_{stepType}_q{index}`. The step id never contains the separator,
//! so the first `_` always ends it. A step type may be a compound of several
//! segments (`smartvoc_nps`, `cognitive_short_text`), but it can never end in
//! a `q{digits}` segment, which is reserved for the question index.

use crate::{Error, Result};

/// Reserved separator between key components
pub const KEY_SEPARATOR: char = '_';

const INDEX_PREFIX: char = 'q';

/// Decomposed canonical question key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyParts {
    pub step_id: String,
    pub step_type: String,
    pub question_index: Option<u32>,
}

/// Build a canonical question key
///
/// # Errors
/// `InvalidKeyComponent` when the step id is empty or contains the separator,
/// or when the step type is empty, has an empty segment, or ends in an
/// index-like `q{digits}` segment.
///
/// # Examples
/// ```
/// use emx_common::keys::build_key;
///
/// assert_eq!(build_key("s1", "smartvoc_nps", None).unwrap(), "s1_smartvoc_nps");
/// assert_eq!(build_key("s1", "cognitive", Some(2)).unwrap(), "s1_cognitive_q2");
/// assert!(build_key("s_1", "welcome", None).is_err());
/// ```
pub fn build_key(step_id: &str, step_type: &str, question_index: Option<u32>) -> Result<String> {
    check_step_id(step_id)?;
    check_step_type(step_type)?;

    let mut key = String::with_capacity(step_id.len() + step_type.len() + 8);
    key.push_str(step_id);
    key.push(KEY_SEPARATOR);
    key.push_str(step_type);
    if let Some(index) = question_index {
        key.push(KEY_SEPARATOR);
        key.push(INDEX_PREFIX);
        key.push_str(&index.to_string());
    }
    Ok(key)
}

/// Check that `question_key` belongs to the expected step
///
/// True iff the key equals `build_key(step_id, step_type, None)` or
/// `build_key(step_id, step_type, Some(n))` for some `n`. Never errors; a key
/// without a separator is simply not a match.
pub fn validate_key(question_key: &str, expected_step_id: &str, expected_step_type: &str) -> bool {
    let Some((step_id, rest)) = question_key.split_once(KEY_SEPARATOR) else {
        return false;
    };
    if step_id != expected_step_id || expected_step_type.is_empty() {
        return false;
    }
    match rest.strip_prefix(expected_step_type) {
        Some("") => true,
        Some(tail) => tail
            .strip_prefix(KEY_SEPARATOR)
            .and_then(parse_index_segment)
            .is_some(),
        None => false,
    }
}

/// Decompose a key into step id, step type and optional question index
///
/// Returns `None` for keys that do not have the canonical structure (no
/// separator, empty components). Legacy aliases such as `demographics-form`
/// therefore parse to `None`.
pub fn parse_key(question_key: &str) -> Option<KeyParts> {
    let (step_id, rest) = question_key.split_once(KEY_SEPARATOR)?;
    if step_id.is_empty() || rest.is_empty() {
        return None;
    }

    let (step_type, question_index) = match rest.rsplit_once(KEY_SEPARATOR) {
        Some((head, last)) => match parse_index_segment(last) {
            Some(index) => (head, Some(index)),
            None => (rest, None),
        },
        None => (rest, None),
    };

    if step_type.split(KEY_SEPARATOR).any(str::is_empty) {
        return None;
    }

    Some(KeyParts {
        step_id: step_id.to_string(),
        step_type: step_type.to_string(),
        question_index,
    })
}

/// Parse a `q{digits}` segment
fn parse_index_segment(segment: &str) -> Option<u32> {
    let digits = segment.strip_prefix(INDEX_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn check_step_id(step_id: &str) -> Result<()> {
    if step_id.is_empty() {
        return Err(invalid("stepId", step_id, "must not be empty"));
    }
    if step_id.contains(KEY_SEPARATOR) {
        return Err(invalid("stepId", step_id, "must not contain the key separator"));
    }
    Ok(())
}

fn check_step_type(step_type: &str) -> Result<()> {
    if step_type.is_empty() {
        return Err(invalid("stepType", step_type, "must not be empty"));
    }
    let segments: Vec<&str> = step_type.split(KEY_SEPARATOR).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(invalid("stepType", step_type, "must not contain empty segments"));
    }
    if segments.len() > 1 && segments.last().and_then(|s| parse_index_segment(s)).is_some() {
        return Err(invalid("stepType", step_type, "must not end in a question index segment"));
    }
    Ok(())
}

fn invalid(component: &'static str, value: &str, reason: &'static str) -> Error {
    Error::InvalidKeyComponent {
        component,
        value: value.to_string(),
        reason,
    }
}
