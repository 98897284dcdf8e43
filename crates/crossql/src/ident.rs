//! SQL identifier validation and dialect quoting.
//!
//! [`Ident`] represents a (possibly dotted) identifier such as `users`,
//! `dbo.users` or `u.email`. Parsing validates every part; rendering quotes
//! each part with the target dialect's quote pair.
//!
//! - Unquoted parts are validated against: `[A-Za-z_][A-Za-z0-9_$]*`
//! - Already-quoted parts (`"x"`, `` `x` ``, `[x]`) allow any characters except NUL
//! - A trailing `*` part (`t.*`) is kept bare
//!
//! # Example
//! ```ignore
//! use crossql::{Dialect, Ident};
//!
//! let ident = Ident::parse("dbo.users")?;
//! assert_eq!(ident.quoted(Dialect::MsSql), "[dbo].[users]");
//! # Ok::<(), crossql::QbError>(())
//! ```

use crate::dialect::Dialect;
use crate::error::{QbError, QbResult};

/// A part of a SQL identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentPart {
    /// A plain or previously quoted name.
    Name(String),
    /// The `*` wildcard (only valid as the last part).
    Wildcard,
}

/// A SQL identifier (column, table, or schema name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub parts: Vec<IdentPart>,
}

fn closing_quote(open: char) -> Option<char> {
    match open {
        '"' => Some('"'),
        '`' => Some('`'),
        '[' => Some(']'),
        _ => None,
    }
}

impl Ident {
    /// Parse an identifier string, supporting dotted and quoted forms.
    pub fn parse(s: &str) -> QbResult<Self> {
        if s.is_empty() {
            return Err(QbError::validation("Identifier cannot be empty"));
        }
        if s.contains('\0') {
            return Err(QbError::validation(
                "Identifier cannot contain NUL character",
            ));
        }

        let mut parts = Vec::new();
        let mut chars = s.chars().peekable();

        while chars.peek().is_some() {
            if !parts.is_empty() {
                match chars.next() {
                    Some('.') => {
                        if chars.peek().is_none() {
                            return Err(QbError::validation("Trailing '.' in identifier"));
                        }
                    }
                    Some(c) => {
                        return Err(QbError::validation(format!(
                            "Expected '.' between identifier parts, got '{c}'"
                        )));
                    }
                    None => break,
                }
            }

            if matches!(parts.last(), Some(IdentPart::Wildcard)) {
                return Err(QbError::validation("'*' must be the last identifier part"));
            }

            if chars.peek() == Some(&'*') {
                chars.next();
                parts.push(IdentPart::Wildcard);
                continue;
            }

            // Quoted part in any of the supported styles.
            if let Some(close) = chars.peek().copied().and_then(closing_quote) {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some(c) if c == close => {
                            if chars.peek() == Some(&close) {
                                chars.next();
                                name.push(close);
                            } else {
                                break;
                            }
                        }
                        Some(c) => name.push(c),
                        None => return Err(QbError::validation("Unclosed quoted identifier")),
                    }
                }
                if name.is_empty() {
                    return Err(QbError::validation("Empty quoted identifier"));
                }
                parts.push(IdentPart::Name(name));
                continue;
            }

            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                if c == '.' {
                    break;
                }
                let valid = if name.is_empty() {
                    c == '_' || c.is_ascii_alphabetic()
                } else {
                    c == '_' || c == '$' || c.is_ascii_alphanumeric()
                };
                if !valid {
                    return Err(QbError::validation(format!(
                        "Invalid character in identifier '{s}': '{c}'"
                    )));
                }
                name.push(c);
                chars.next();
            }
            if name.is_empty() {
                return Err(QbError::validation("Empty identifier segment"));
            }
            parts.push(IdentPart::Name(name));
        }

        if parts.is_empty() {
            return Err(QbError::validation("Empty identifier"));
        }

        Ok(Self { parts })
    }

    /// Render the identifier quoted for `dialect`.
    pub fn quoted(&self, dialect: Dialect) -> String {
        let mut out = String::new();
        self.write_quoted(dialect, &mut out);
        out
    }

    pub(crate) fn write_quoted(&self, dialect: Dialect, out: &mut String) {
        let (open, close) = dialect.quote_pair();
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            match part {
                IdentPart::Wildcard => out.push('*'),
                IdentPart::Name(s) => {
                    out.push(open);
                    for ch in s.chars() {
                        if ch == close {
                            out.push(close);
                        }
                        out.push(ch);
                    }
                    out.push(close);
                }
            }
        }
    }
}

/// Quote `expr` if it is a plain identifier; otherwise emit it verbatim.
///
/// Lets column arguments carry expressions such as `COUNT(*)` or
/// `LOWER(email)` while plain names are always quoted.
pub(crate) fn quote_expr(expr: &str, dialect: Dialect) -> String {
    let trimmed = expr.trim();
    match Ident::parse(trimmed) {
        Ok(ident) => ident.quoted(dialect),
        Err(_) => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_expr_passes_expressions_through() {
        assert_eq!(quote_expr("email", Dialect::MySql), "`email`");
        assert_eq!(quote_expr("COUNT(*)", Dialect::MySql), "COUNT(*)");
        assert_eq!(quote_expr("*", Dialect::MsSql), "*");
    }

    #[test]
    fn ident_simple() {
        let ident = Ident::parse("users").unwrap();
        assert_eq!(ident.quoted(Dialect::MySql), "`users`");
        assert_eq!(ident.quoted(Dialect::MsSql), "[users]");
        assert_eq!(ident.quoted(Dialect::Sqlite), "\"users\"");
    }

    #[test]
    fn ident_dotted() {
        let ident = Ident::parse("dbo.users").unwrap();
        assert_eq!(ident.quoted(Dialect::MsSql), "[dbo].[users]");
    }

    #[test]
    fn ident_wildcard() {
        let ident = Ident::parse("u.*").unwrap();
        assert_eq!(ident.quoted(Dialect::MySql), "`u`.*");
    }

    #[test]
    fn ident_requoted_from_other_style() {
        let ident = Ident::parse("[Order Details]").unwrap();
        assert_eq!(ident.quoted(Dialect::MySql), "`Order Details`");
    }

    #[test]
    fn ident_escapes_closing_quote() {
        let ident = Ident::parse(r#""odd]name""#).unwrap();
        assert_eq!(ident.quoted(Dialect::MsSql), "[odd]]name]");
    }

    #[test]
    fn ident_with_dollar() {
        let ident = Ident::parse("my_var$1").unwrap();
        assert_eq!(ident.quoted(Dialect::Sqlite), "\"my_var$1\"");
    }

    #[test]
    fn ident_rejects_empty() {
        assert!(Ident::parse("").is_err());
    }

    #[test]
    fn ident_rejects_start_digit() {
        assert!(Ident::parse("1table").is_err());
    }

    #[test]
    fn ident_rejects_space() {
        assert!(Ident::parse("my table").is_err());
    }

    #[test]
    fn ident_rejects_double_dot() {
        assert!(Ident::parse("schema..table").is_err());
    }

    #[test]
    fn ident_rejects_trailing_dot() {
        assert!(Ident::parse("schema.").is_err());
    }

    #[test]
    fn ident_rejects_part_after_wildcard() {
        assert!(Ident::parse("t.*.x").is_err());
    }

    #[test]
    fn ident_rejects_unclosed_quote() {
        assert!(Ident::parse("`unclosed").is_err());
    }
}
