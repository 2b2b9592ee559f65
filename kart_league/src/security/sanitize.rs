//! Input sanitization for names and free text.

use super::errors::InputError;

/// Longest tournament name
pub const MAX_NAME_LEN: usize = 100;
/// Longest player nickname
pub const MAX_NICKNAME_LEN: usize = 32;
/// Longest course or arena label
pub const MAX_LABEL_LEN: usize = 64;

/// Trim, drop control characters and collapse runs of whitespace
pub fn clean(input: &str) -> String {
    input
        .split_whitespace()
        .map(|word| word.chars().filter(|c| !c.is_control()).collect::<String>())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Escape characters that are significant in HTML
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Clean and escape a required field, enforcing a character limit
pub fn sanitize_field(field: &'static str, input: &str, max: usize) -> Result<String, InputError> {
    let cleaned = clean(input);
    if cleaned.is_empty() {
        return Err(InputError::Empty { field });
    }
    if cleaned.chars().count() > max {
        return Err(InputError::TooLong { field, max });
    }
    Ok(escape_html(&cleaned))
}

/// Like [`sanitize_field`] but empty input yields `None`
pub fn sanitize_optional(
    field: &'static str,
    input: Option<&str>,
    max: usize,
) -> Result<Option<String>, InputError> {
    match input.map(clean) {
        Some(cleaned) if !cleaned.is_empty() => sanitize_field(field, &cleaned, max).map(Some),
        _ => Ok(None),
    }
}
