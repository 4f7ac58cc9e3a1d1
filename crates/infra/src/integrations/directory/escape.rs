//! Escaping for LDAP filter and DN string fragments.

/// Escapes a value for embedding in a search filter (RFC 4515).
pub fn escape_filter_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\5c"),
            '*' => escaped.push_str("\\2a"),
            '(' => escaped.push_str("\\28"),
            ')' => escaped.push_str("\\29"),
            '\0' => escaped.push_str("\\00"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Escapes an attribute value for embedding in a distinguished name
/// (RFC 4514). Leading/trailing spaces and a leading `#` need escaping in
/// addition to the special character set.
pub fn escape_dn_value(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let last = chars.len().saturating_sub(1);
    let mut escaped = String::with_capacity(value.len());
    for (i, ch) in chars.iter().copied().enumerate() {
        match ch {
            '"' | '+' | ',' | ';' | '<' | '>' | '\\' | '=' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            '\0' => escaped.push_str("\\00"),
            ' ' if i == 0 || i == last => escaped.push_str("\\20"),
            '#' if i == 0 => escaped.push_str("\\23"),
            other => escaped.push(other),
        }
    }
    escaped
}
