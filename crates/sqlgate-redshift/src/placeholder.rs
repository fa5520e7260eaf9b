//! Translation of DB-API `format` placeholders to server positional ones.
//!
//! Callers write `%s` for each parameter (and `%%` for a literal percent
//! sign); the server expects `$1`, `$2`, ... Text inside single-quoted
//! literals and double-quoted identifiers is copied untouched.

use sqlgate_core::Error;
use sqlgate_core::error::{QueryError, QueryErrorKind};

/// Rewrite `%s` placeholders in `sql` for binding `param_count` parameters.
///
/// Statements without any `%s` are returned unchanged so native `$n`
/// placeholders keep working. A statement whose `%s` count differs from
/// `param_count` is rejected.
#[allow(clippy::result_large_err)]
pub fn translate(sql: &str, param_count: usize) -> Result<String, Error> {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut chars = sql.chars().peekable();
    let mut quote: Option<char> = None;
    let mut placeholders = 0usize;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == q {
                // A doubled quote is an escaped quote, not the end of the literal.
                if chars.peek() == Some(&q) {
                    out.push(q);
                    chars.next();
                } else {
                    quote = None;
                }
            }
            continue;
        }

        match c {
            '\'' | '"' => {
                quote = Some(c);
                out.push(c);
            }
            '%' => match chars.peek() {
                Some('s') => {
                    chars.next();
                    placeholders += 1;
                    out.push('$');
                    out.push_str(&placeholders.to_string());
                }
                Some('%') => {
                    chars.next();
                    out.push('%');
                }
                _ => out.push('%'),
            },
            _ => out.push(c),
        }
    }

    if placeholders == 0 {
        return Ok(sql.to_string());
    }
    if placeholders != param_count {
        return Err(Error::Query(QueryError {
            kind: QueryErrorKind::Syntax,
            sql: Some(sql.to_string()),
            sqlstate: None,
            message: format!(
                "statement has {placeholders} placeholders but {param_count} parameters were supplied"
            ),
            detail: None,
            hint: None,
            position: None,
        }));
    }
    Ok(out)
}
