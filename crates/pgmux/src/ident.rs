//! SQL identifier handling for manifest names.
//!
//! Table and column names come from the manifest and are spliced into generated SQL,
//! so they are validated once at load and always rendered double-quoted.
//!
//! - Names must match `[A-Za-z_][A-Za-z0-9_$]*`
//! - Rendering escapes `"` as `""`

use crate::error::{MuxError, MuxResult};

/// Validate a single (undotted) identifier.
pub fn validate(name: &str) -> MuxResult<()> {
    let mut chars = name.chars();
    match chars.next() {
        None => return Err(MuxError::schema("Identifier cannot be empty")),
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        Some(c) => {
            return Err(MuxError::schema(format!(
                "Invalid identifier start character '{c}' in `{name}`"
            )));
        }
    }
    for c in chars {
        if !(c == '_' || c == '$' || c.is_ascii_alphanumeric()) {
            return Err(MuxError::schema(format!(
                "Invalid character '{c}' in identifier `{name}`"
            )));
        }
    }
    Ok(())
}

/// Render one identifier part as a quoted SQL identifier.
pub fn quote(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    write_quoted(name, &mut out);
    out
}

/// Render `"table"."column"`.
pub fn qualified(table: &str, column: &str) -> String {
    let mut out = String::with_capacity(table.len() + column.len() + 5);
    write_quoted(table, &mut out);
    out.push('.');
    write_quoted(column, &mut out);
    out
}

fn write_quoted(name: &str, out: &mut String) {
    out.push('"');
    for ch in name.chars() {
        if ch == '"' {
            out.push('"');
            out.push('"');
        } else {
            out.push(ch);
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ident_simple() {
        assert!(validate("users").is_ok());
        assert_eq!(quote("users"), r#""users""#);
    }

    #[test]
    fn ident_qualified() {
        assert_eq!(qualified("users", "name"), r#""users"."name""#);
    }

    #[test]
    fn ident_with_dollar() {
        assert!(validate("my_var$1").is_ok());
    }

    #[test]
    fn ident_quote_escapes() {
        assert_eq!(quote(r#"has"quote"#), r#""has""quote""#);
    }

    #[test]
    fn ident_rejects_empty() {
        assert!(validate("").is_err());
    }

    #[test]
    fn ident_rejects_start_digit() {
        assert!(validate("1table").is_err());
    }

    #[test]
    fn ident_rejects_space_and_dot() {
        assert!(validate("my table").is_err());
        assert!(validate("public.users").is_err());
    }
}
