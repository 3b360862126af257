//! Identifier validation, bracket quoting and dotted-name handling.
//!
//! SQL identifiers cannot be bound as statement parameters, so every table,
//! column, schema and routine name that reaches generated SQL goes through
//! [`quote_ident`] (or one of the qualifying helpers built on it).
//!
//! Names accepted from callers may already carry SQL Server quoting
//! (`[dbo].[Users]`) or ANSI quoting (`"dbo"."Users"`); [`split_name`]
//! understands both and never splits on a dot that sits inside quotes.

use crate::error::{Result, SchemaError};

/// SQL Server `sysname` limit.
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier for security issues.
///
/// Rejects empty identifiers, identifiers containing null bytes and
/// identifiers longer than 128 characters.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(SchemaError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(SchemaError::Config(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    if name.chars().count() > MAX_IDENTIFIER_LENGTH {
        return Err(SchemaError::Config(format!(
            "SECURITY: Identifier exceeds maximum length of {} characters: {:?}",
            MAX_IDENTIFIER_LENGTH, name
        )));
    }

    Ok(())
}

/// Quote a SQL Server identifier using brackets.
///
/// Closing brackets are escaped by doubling them. An identifier that is
/// already bracket-quoted is returned unchanged only when every `]` inside
/// it is part of an escaped `]]` pair; anything else is quoted as raw text.
///
/// ```ignore
/// assert_eq!(quote_ident("users")?, "[users]");
/// assert_eq!(quote_ident("table]name")?, "[table]]name]");
/// assert_eq!(quote_ident("[x]; --]")?, "[[x]]; --]]]");
/// ```
pub fn quote_ident(name: &str) -> Result<String> {
    if is_bracket_quoted(name) && is_escaped_body(&name[1..name.len() - 1]) {
        validate_identifier(&name[1..name.len() - 1].replace("]]", "]"))?;
        return Ok(name.to_string());
    }
    validate_identifier(name)?;
    Ok(format!("[{}]", name.replace(']', "]]")))
}

/// Whether `]` occurs only as the doubled `]]` escape.
fn is_escaped_body(body: &str) -> bool {
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c == ']' && chars.next() != Some(']') {
            return false;
        }
    }
    true
}

/// Quote each dot-separated part of a possibly qualified name.
///
/// `dbo.users` becomes `[dbo].[users]`; `[my db].dbo.t` becomes
/// `[my db].[dbo].[t]`.
pub fn quote_qualified(name: &str) -> Result<String> {
    let parts = split_name(name);
    if parts.is_empty() {
        return Err(SchemaError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }
    let quoted = parts
        .iter()
        .map(|p| quote_ident(p))
        .collect::<Result<Vec<_>>>()?;
    Ok(quoted.join("."))
}

/// Qualify a table name with its schema: `[schema].[table]`.
pub fn qualify(schema: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_ident(schema)?, quote_ident(table)?))
}

/// Quote a string as an N-prefixed Unicode literal.
pub fn quote_string_literal(value: &str) -> String {
    format!("N'{}'", value.replace('\'', "''"))
}

fn is_bracket_quoted(name: &str) -> bool {
    name.len() >= 2 && name.starts_with('[') && name.ends_with(']')
}

/// Remove one level of bracket or double-quote quoting from a name part.
pub fn unquote(part: &str) -> String {
    let trimmed = part.trim();
    if is_bracket_quoted(trimmed) {
        trimmed[1..trimmed.len() - 1].replace("]]", "]")
    } else if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].replace("\"\"", "\"")
    } else {
        trimmed.to_string()
    }
}

/// Split a dotted name into unquoted parts, honouring `[..]` and `".."`.
///
/// Empty parts (as in `db..table`) are preserved as empty strings so callers
/// can apply defaults positionally.
pub fn split_name(name: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = name.trim().chars().peekable();
    let mut in_bracket = false;
    let mut in_quote = false;

    while let Some(c) = chars.next() {
        match c {
            '[' if !in_quote && !in_bracket => {
                in_bracket = true;
                current.push(c);
            }
            ']' if in_bracket => {
                current.push(c);
                if chars.peek() == Some(&']') {
                    current.push(']');
                    chars.next();
                } else {
                    in_bracket = false;
                }
            }
            '"' if !in_bracket => {
                in_quote = !in_quote;
                current.push(c);
            }
            '.' if !in_bracket && !in_quote => {
                parts.push(unquote(&current));
                current.clear();
            }
            _ => current.push(c),
        }
    }

    if !current.is_empty() || !parts.is_empty() {
        parts.push(unquote(&current));
    }
    parts
}

/// Case-insensitive, quote-insensitive table-name equality.
///
/// `[dbo].[Foo]` equals `dbo.foo`; `[Foo]` differs from `[Bar]`.
pub fn compare_table_names(a: &str, b: &str) -> bool {
    normalize_table_name(a) == normalize_table_name(b)
}

fn normalize_table_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '[' | ']' | '"'))
        .flat_map(char::to_lowercase)
        .collect()
}
