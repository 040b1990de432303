//! Helpers for composing SQL text.
//!
//! Values always travel as bound parameters. Only structural names (schemas,
//! tables, columns, indexes, roles) are spliced into statement text, and only
//! after passing `validate_identifier`.

use crate::config::MAX_IDENTIFIER_LEN;
use crate::error::{DbError, DbResult};

/// Check a structural name against the allow-list `[A-Za-z_][A-Za-z0-9_]*`.
///
/// `what` names the argument in the error message (e.g. "table_name").
pub fn validate_identifier<'a>(what: &str, name: &'a str) -> DbResult<&'a str> {
    if name.is_empty() {
        return Err(DbError::validation(format!("{what} must not be empty")));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(DbError::validation(format!(
            "{what} '{name}' exceeds {MAX_IDENTIFIER_LEN} characters"
        )));
    }

    let mut chars = name.chars();
    let first_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !first_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(DbError::validation(format!(
            "{what} '{name}' is not a valid identifier (letters, digits and underscores only, not starting with a digit)"
        )));
    }
    Ok(name)
}

/// Validate and join `schema.name`.
pub fn qualified(schema: &str, name: &str, what: &str) -> DbResult<String> {
    let schema = validate_identifier("schema", schema)?;
    let name = validate_identifier(what, name)?;
    Ok(format!("{schema}.{name}"))
}

/// Validate every name and join them with `", "`.
pub fn identifier_list<S: AsRef<str>>(what: &str, names: &[S]) -> DbResult<String> {
    if names.is_empty() {
        return Err(DbError::validation(format!("{what} must not be empty")));
    }
    names
        .iter()
        .map(|n| validate_identifier(what, n.as_ref()))
        .collect::<DbResult<Vec<_>>>()
        .map(|names| names.join(", "))
}

/// Check a keyword list such as `SELECT, INSERT` or `ALL TABLES IN SCHEMA`.
pub fn validate_keywords<'a>(what: &str, text: &'a str) -> DbResult<&'a str> {
    let trimmed = text.trim();
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, ' ' | ',' | '_' | '(' | ')');
    if trimmed.is_empty() || !trimmed.chars().all(allowed) {
        return Err(DbError::validation(format!(
            "{what} '{text}' may only contain keywords, commas and parenthesized column names"
        )));
    }
    Ok(trimmed)
}

/// Render a string as a SQL literal, doubling embedded quotes.
///
/// Only used where the server does not accept a bound parameter (role passwords).
pub fn quote_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        if c == '\'' {
            out.push('\'');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

/// Rewrite psycopg-style `%s` markers to `$n`, numbering from `first`.
///
/// `%%` becomes a literal `%`. Returns the rewritten text and the number of
/// markers found. Text without `%s` (for example native `$1` placeholders) is
/// returned unchanged apart from `%%` collapsing.
pub fn translate_placeholders(sql: &str, first: usize) -> (String, usize) {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut count = 0;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('s') => {
                chars.next();
                out.push('$');
                out.push_str(&(first + count).to_string());
                count += 1;
            }
            Some('%') => {
                chars.next();
                out.push('%');
            }
            _ => out.push('%'),
        }
    }
    (out, count)
}

/// Prepare caller-supplied SQL for binding `supplied` parameters starting at `$first`.
///
/// Without parameters the text is used as is, so a literal `LIKE 'a%'` keeps working.
/// Native `$n` placeholders count from the caller's first parameter and are
/// shifted to start at `$first`.
pub fn bind_caller_sql(sql: &str, first: usize, supplied: usize) -> DbResult<String> {
    if supplied == 0 {
        return Ok(sql.to_string());
    }
    let (rewritten, markers) = translate_placeholders(sql, first);
    if markers > 0 {
        if markers != supplied {
            return Err(DbError::validation(format!(
                "Statement has {markers} %s placeholder(s) but {supplied} parameter(s) were supplied"
            )));
        }
        return Ok(rewritten);
    }

    if let Some(n) = native_placeholders(&rewritten)
        .into_iter()
        .find(|n| *n == 0 || *n > supplied)
    {
        return Err(DbError::validation(format!(
            "Statement references ${n} but {supplied} parameter(s) were supplied"
        )));
    }
    let offset = first.saturating_sub(1);
    Ok(rewrite_placeholders(&rewritten, |n| format!("${}", n + offset)))
}

/// Rewrite every native `$n` placeholder outside quoted text with `f(n)`.
///
/// Single-quoted literals and double-quoted identifiers are copied verbatim.
pub fn rewrite_placeholders(sql: &str, mut f: impl FnMut(usize) -> String) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut chars = sql.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => {
                quote = Some(c);
                out.push(c);
            }
            '$' if chars.peek().is_some_and(char::is_ascii_digit) => {
                let mut digits = String::new();
                while let Some(d) = chars.next_if(char::is_ascii_digit) {
                    digits.push(d);
                }
                match digits.parse::<usize>() {
                    Ok(n) => out.push_str(&f(n)),
                    Err(_) => {
                        out.push('$');
                        out.push_str(&digits);
                    }
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Native `$n` placeholder numbers in order of appearance.
pub fn native_placeholders(sql: &str) -> Vec<usize> {
    let mut found = Vec::new();
    rewrite_placeholders(sql, |n| {
        found.push(n);
        String::new()
    });
    found
}

/// `$first, $first+1, ...` for `n` values.
pub fn numbered_placeholders(first: usize, n: usize) -> Vec<String> {
    (first..first + n).map(|i| format!("${i}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        for name in ["users", "_private", "Order_Items2", "t1", "a"] {
            assert!(validate_identifier("table_name", name).is_ok(), "{name}");
        }
    }

    #[test]
    fn test_invalid_identifiers() {
        for name in [
            "",
            "1table",
            "users; DROP TABLE x",
            "public.users",
            "user name",
            "naïve",
            "quote\"d",
            "dash-ed",
        ] {
            let err = validate_identifier("table_name", name).unwrap_err();
            assert!(matches!(err, DbError::Validation { .. }), "{name}");
        }
    }

    #[test]
    fn test_identifier_length_limit() {
        let ok = "a".repeat(63);
        let too_long = "a".repeat(64);
        assert!(validate_identifier("table_name", &ok).is_ok());
        assert!(validate_identifier("table_name", &too_long).is_err());
    }

    #[test]
    fn test_error_names_argument() {
        let err = validate_identifier("index_name", "bad name").unwrap_err();
        assert!(err.to_string().contains("index_name"));
    }

    #[test]
    fn test_qualified() {
        assert_eq!(qualified("public", "t1", "table_name").unwrap(), "public.t1");
        assert!(qualified("pub lic", "t1", "table_name").is_err());
        assert!(qualified("public", "t1;", "table_name").is_err());
    }

    #[test]
    fn test_identifier_list() {
        assert_eq!(identifier_list("columns", &["a", "b_2"]).unwrap(), "a, b_2");
        assert!(identifier_list::<&str>("columns", &[]).is_err());
        assert!(identifier_list("columns", &["a", "b)"]).is_err());
    }

    #[test]
    fn test_validate_keywords() {
        assert_eq!(validate_keywords("privileges", " SELECT, INSERT ").unwrap(), "SELECT, INSERT");
        assert!(validate_keywords("object_type", "ALL TABLES IN SCHEMA").is_ok());
        assert!(validate_keywords("privileges", "SELECT (id, name)").is_ok());
        assert!(validate_keywords("privileges", "SELECT; DROP").is_err());
        assert!(validate_keywords("privileges", "SELECT 'x'").is_err());
        assert!(validate_keywords("privileges", "  ").is_err());
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal("secret"), "'secret'");
        assert_eq!(quote_literal("it's"), "'it''s'");
        assert_eq!(quote_literal("'; DROP ROLE x; --"), "'''; DROP ROLE x; --'");
    }

    #[test]
    fn test_translate_placeholders() {
        let (sql, n) = translate_placeholders("id = %s AND name = %s", 1);
        assert_eq!(sql, "id = $1 AND name = $2");
        assert_eq!(n, 2);

        let (sql, n) = translate_placeholders("id = %s", 3);
        assert_eq!(sql, "id = $3");
        assert_eq!(n, 1);
    }

    #[test]
    fn test_translate_escaped_percent() {
        let (sql, n) = translate_placeholders("name LIKE 'a%%' AND id = %s", 1);
        assert_eq!(sql, "name LIKE 'a%' AND id = $1");
        assert_eq!(n, 1);
    }

    #[test]
    fn test_translate_leaves_native_placeholders() {
        let (sql, n) = translate_placeholders("id = $1 AND pct > 5%", 1);
        assert_eq!(sql, "id = $1 AND pct > 5%");
        assert_eq!(n, 0);
    }

    #[test]
    fn test_bind_caller_sql() {
        assert_eq!(bind_caller_sql("x LIKE 'a%%'", 1, 0).unwrap(), "x LIKE 'a%%'");
        assert_eq!(bind_caller_sql("id = %s", 2, 1).unwrap(), "id = $2");
        assert_eq!(bind_caller_sql("id = $1", 1, 1).unwrap(), "id = $1");

        let err = bind_caller_sql("a = %s AND b = %s", 1, 1).unwrap_err();
        assert!(err.to_string().contains("2 %s placeholder"));
    }

    #[test]
    fn test_bind_caller_sql_shifts_native_placeholders() {
        // A WHERE clause following three SET values.
        assert_eq!(
            bind_caller_sql("id = $1 OR parent = $2 OR id = $1", 4, 2).unwrap(),
            "id = $4 OR parent = $5 OR id = $4"
        );
        assert_eq!(
            bind_caller_sql("note = '$1' AND id = $1", 2, 1).unwrap(),
            "note = '$1' AND id = $2"
        );
    }

    #[test]
    fn test_bind_caller_sql_rejects_out_of_range_native_placeholder() {
        let err = bind_caller_sql("id = $2", 3, 1).unwrap_err();
        assert!(matches!(err, DbError::Validation { .. }));
        assert!(err.to_string().contains("references $2"));
        assert!(bind_caller_sql("id = $0", 1, 1).is_err());
    }

    #[test]
    fn test_rewrite_placeholders_skips_quoted_text() {
        let sql = r#"SELECT "$1", '$1 it''s', $1, $12 FROM t WHERE a = $2"#;
        let out = rewrite_placeholders(sql, |n| format!("${n}::date"));
        assert_eq!(
            out,
            r#"SELECT "$1", '$1 it''s', $1::date, $12::date FROM t WHERE a = $2::date"#
        );
        assert_eq!(native_placeholders(sql), vec![1, 12, 2]);
        assert_eq!(rewrite_placeholders("cost > $ 5", |_| String::new()), "cost > $ 5");
    }

    #[test]
    fn test_numbered_placeholders() {
        assert_eq!(numbered_placeholders(1, 3), vec!["$1", "$2", "$3"]);
        assert_eq!(numbered_placeholders(4, 1), vec!["$4"]);
        assert!(numbered_placeholders(1, 0).is_empty());
    }
}
