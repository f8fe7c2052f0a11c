/// Escapes text for use inside an AppleScript string literal.
///
/// Backslashes are doubled before quotes are escaped; the other order would
/// double the backslashes that escape the quotes.
pub fn escape_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Escapes `value` and wraps it in double quotes.
pub fn quote_literal(value: &str) -> String {
    format!("\"{}\"", escape_literal(value))
}

/// AppleScript list literal of quoted strings, e.g. `{"a", "b"}`.
pub fn quote_list(values: &[String]) -> String {
    let items = values
        .iter()
        .map(|value| quote_literal(value))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{}}}", items)
}
