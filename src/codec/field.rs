// Typed parsers for address fields

use super::table::Coded;

/// Declared type of an address key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Closed enumeration decoded through its code table
    Enum,
    /// Required column position
    Integer,
    /// Column position that may be absent
    OptionalInteger,
    /// Row source location
    Url,
}

/// Known address keys and their declared types
pub const FIELDS: &[(&str, FieldKind)] = &[
    ("u", FieldKind::Url),
    ("m", FieldKind::Enum),
    ("x", FieldKind::Integer),
    ("xt", FieldKind::Enum),
    ("y", FieldKind::Integer),
    ("yt", FieldKind::Enum),
    ("c", FieldKind::OptionalInteger),
    ("ct", FieldKind::Enum),
    ("s", FieldKind::OptionalInteger),
];

/// Alternative spellings accepted when decoding
const ALIASES: &[(&str, &str)] = &[("url", "u")];

/// Canonical key and declared type for a decoded key, if it is recognised
pub fn lookup(key: &str) -> Option<(&'static str, FieldKind)> {
    let key = ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(key);
    FIELDS.iter().find(|(k, _)| *k == key).copied()
}

/// Unknown codes become the enum's default instead of an error
pub fn parse_enum<T: Coded>(value: &str) -> T {
    T::from_code_or_default(value)
}

/// Plain ASCII digits only; signs, blanks and overflow are rejected
pub fn parse_integer(value: &str) -> Option<usize> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// Empty means "absent"; anything else must be an integer
pub fn parse_optional_integer(value: &str) -> Option<Option<usize>> {
    if value.is_empty() {
        return Some(None);
    }
    parse_integer(value).map(Some)
}

/// Non-empty, no whitespace or control characters, and absolute URLs must be well-formed
pub fn parse_url(value: &str) -> Option<String> {
    if value.is_empty() || value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return None;
    }
    if value.contains("://") && url::Url::parse(value).is_err() {
        return None;
    }
    Some(value.to_string())
}
