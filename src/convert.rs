// ABOUTME: Per-cell value conversion driven by a column's declared type
// ABOUTME: Total and lenient: unknown types and malformed input pass through unchanged

use base64::Engine;

/// Convert a raw text cell according to the declared target type
///
/// Dispatch uses the base type name (text before the first `(`, trimmed,
/// case-insensitive):
/// - `BASE64`: standard base64 encoding of the raw bytes
/// - `VARCHAR`: if the value contains `(<integer>)`, the value's prefix
///   before `(` is returned; otherwise the value is unchanged. The declared
///   length is never applied, so a value without `(` is never modified.
/// - `BIGINT`: strips one leading and one trailing backslash when the value
///   is wrapped in them
/// - anything else: unchanged
///
/// # Examples
///
/// ```
/// # use pg_table_migrator::convert::convert_value;
/// assert_eq!(convert_value("\\123\\", "BIGINT"), "123");
/// assert_eq!(convert_value("123", "BIGINT"), "123");
/// assert_eq!(convert_value("hello", "BASE64"), "aGVsbG8=");
/// assert_eq!(convert_value("a long string", "VARCHAR(5)"), "a long string");
/// assert_eq!(convert_value("as-is", ""), "as-is");
/// ```
pub fn convert_value(raw: &str, declared_type: &str) -> String {
    match base_type(declared_type).as_str() {
        "BASE64" => base64::engine::general_purpose::STANDARD.encode(raw.as_bytes()),
        "VARCHAR" => strip_parenthesized_suffix(raw).to_string(),
        "BIGINT" => strip_backslash_wrapping(raw).to_string(),
        _ => raw.to_string(),
    }
}

fn base_type(declared_type: &str) -> String {
    declared_type
        .split('(')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_uppercase()
}

fn strip_parenthesized_suffix(value: &str) -> &str {
    let Some(open) = value.find('(') else {
        return value;
    };
    let Some(close) = value[open..].find(')').map(|offset| open + offset) else {
        return value;
    };
    match value[open + 1..close].trim().parse::<i64>() {
        Ok(_) => &value[..open],
        Err(_) => value,
    }
}

fn strip_backslash_wrapping(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('\\') && value.ends_with('\\') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}
