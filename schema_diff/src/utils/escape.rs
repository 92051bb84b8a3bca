//! Identifier escaping
//!
//! MySQL quotes identifiers with backticks; a backtick inside the identifier
//! is doubled.

/// Escape an identifier for embedding in SQL
pub fn escape_id(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len() + 2);
    escaped.push('`');
    for c in name.chars() {
        if c == '`' {
            escaped.push('`');
        }
        escaped.push(c);
    }
    escaped.push('`');
    escaped
}

/// Escape an identifier, prefixed with its qualifier when present
pub fn escape_qualified(qualifier: Option<&str>, name: &str) -> String {
    match qualifier {
        Some(qualifier) => format!("{}.{}", escape_id(qualifier), escape_id(name)),
        None => escape_id(name),
    }
}

/// Escape a list of identifiers and join them with `, `
pub fn escape_list(names: &[String]) -> String {
    names
        .iter()
        .map(|name| escape_id(name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Quote a string literal
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}
