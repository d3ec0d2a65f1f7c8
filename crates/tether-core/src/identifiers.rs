//! Identifier types and quoting helpers.

/// Integer primary key assigned by the backing store's autoincrement
/// mechanism. Positive once persisted; the cache uses negative values
/// internally as transient keys for records that have no identifier yet.
pub type Id = i64;

/// Quote an identifier for safe interpolation into statement text.
///
/// Wraps the name in double quotes and doubles any embedded quote, the
/// portable SQL form. Table and primary-key names supplied by persisted
/// types pass through here before the cache builds its lookup statements.
#[must_use]
pub fn quote_ident(name: &str) -> String {
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push('"');
    for ch in name.chars() {
        if ch == '"' {
            quoted.push('"');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}
