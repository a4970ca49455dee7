//! Input normalization: phone validation, name validation and
//! capitalization
//!
//! Pure functions, no I/O. Invalid input is reported by returning
//! `false`, never by panicking.

/// Check that a candidate phone number is exactly 10 decimal digits.
///
/// No leading sign, no separators; anything else is rejected.
pub fn validate_phone(s: &str) -> bool {
    s.len() == 10 && s.bytes().all(|b| b.is_ascii_digit())
}

/// Check that a candidate contact name is non-empty after trimming.
pub fn validate_name(s: &str) -> bool {
    !s.trim().is_empty()
}

/// Capitalize the first letter of each word in a person's name.
///
/// Words are split on runs of whitespace, rejoined with single spaces,
/// and the result carries a trailing space after the last word. The
/// trailing space is preserved legacy display behavior and is locked by
/// test; do not "fix" it here.
pub fn capitalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 1);

    for word in name.split_whitespace() {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            for c in chars {
                out.extend(c.to_lowercase());
            }
            out.push(' ');
        }
    }

    out
}

/// Check whether a candidate label is a bare number rather than a
/// resolved contact name.
///
/// Accepts an optional leading `-` followed by one or more decimal
/// digits. This is intentionally looser than [`validate_phone`]: it
/// only decides "is this label still an unresolved number?", not
/// whether the number is dialable.
pub fn is_numeric_label(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}
