//! Ordered parameter binding.

use crate::dialect::Dialect;
use crate::error::{QbError, QbResult};
use crate::value::{Cell, Value};

/// The ordered sequence of values bound during one render pass.
///
/// Every [`bind`](ParamList::bind) appends a value and returns the dialect's
/// placeholder token, so the list order always matches the textual order of
/// placeholders in the SQL being written.
#[derive(Clone, Debug)]
pub struct ParamList {
    dialect: Dialect,
    params: Vec<Value>,
}

impl ParamList {
    /// Create a new empty parameter list for `dialect`.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            params: Vec::new(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Add a value and return the placeholder token to emit.
    pub fn bind(&mut self, value: Value) -> &'static str {
        self.params.push(value);
        self.dialect.placeholder(self.params.len())
    }

    /// Append the placeholder for a value cell, or the raw fragment verbatim.
    pub fn write_cell(&mut self, cell: &Cell, out: &mut String) {
        match cell {
            Cell::Value(v) => out.push_str(self.bind(v.clone())),
            Cell::Raw(raw) => out.push_str(raw.as_str()),
        }
    }

    /// Expand `?` markers in a template, binding one value per marker.
    ///
    /// Markers inside `'...'` literals are left alone. The marker count must
    /// equal `values.len()`.
    pub fn write_template(&mut self, sql: &str, values: &[Value], out: &mut String) -> QbResult<()> {
        check_template(sql, values)?;
        for (i, segment) in split_template(sql).into_iter().enumerate() {
            if i > 0 {
                out.push_str(self.bind(values[i - 1].clone()));
            }
            out.push_str(segment);
        }
        Ok(())
    }

    /// Get the current parameter count.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.params
    }

    pub fn into_vec(self) -> Vec<Value> {
        self.params
    }
}

/// Split `sql` around marker tokens, skipping text between any of `quotes`.
///
/// MySQL markers are `%s` (`%%` is an escaped percent); all others are `?`.
fn split_markers<'a>(sql: &'a str, quotes: &[(char, char)], percent_markers: bool) -> Vec<&'a str> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut chars = sql.char_indices().peekable();

    while let Some((i, ch)) = chars.next() {
        if let Some(&(_, end)) = quotes.iter().find(|(open, _)| *open == ch) {
            for (_, c) in chars.by_ref() {
                if c == end {
                    break;
                }
            }
            continue;
        }
        if percent_markers {
            if ch == '%' {
                match chars.peek() {
                    Some((_, 's')) => {
                        chars.next();
                        segments.push(&sql[start..i]);
                        start = i + 2;
                    }
                    Some((_, '%')) => {
                        chars.next();
                    }
                    _ => {}
                }
            }
        } else if ch == '?' {
            segments.push(&sql[start..i]);
            start = i + 1;
        }
    }

    segments.push(&sql[start..]);
    segments
}

/// Split rendered SQL around its placeholder tokens.
///
/// Returns `n + 1` segments for `n` placeholders. String literals and quoted
/// identifiers are skipped.
pub fn split_placeholders(sql: &str, dialect: Dialect) -> Vec<&str> {
    let quotes = [('\'', '\''), dialect.quote_pair()];
    split_markers(sql, &quotes, dialect == Dialect::MySql)
}

/// Split a raw template around its `?` markers, skipping `'...'` literals.
pub(crate) fn split_template(sql: &str) -> Vec<&str> {
    split_markers(sql, &[('\'', '\'')], false)
}

/// Check that a raw template has exactly one `?` marker per value.
pub(crate) fn check_template(sql: &str, values: &[Value]) -> QbResult<()> {
    let markers = split_template(sql).len() - 1;
    if markers != values.len() {
        return Err(QbError::invalid_predicate(format!(
            "raw fragment has {markers} ? marker(s) but {} value(s): {sql}",
            values.len()
        )));
    }
    Ok(())
}

/// Count placeholder tokens in rendered SQL.
///
/// String literals and quoted identifiers are skipped.
pub fn count_placeholders(sql: &str, dialect: Dialect) -> usize {
    split_placeholders(sql, dialect).len() - 1
}
