//! Defined names
//!
//! A defined name gives a cell or a rectangular block of cells a label that formulas and
//! bindings can refer to instead of an address.
//!
//! # Example
//!
//! ```text
//! // "Rate" refers to B1 on the first sheet
//! book.define_name("Rate", "Sheet1!$B$1")?;
//!
//! // Formulas may then use it
//! =Price * Rate
//! ```

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Scope of a defined name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameScope {
    /// Visible from every sheet
    Workbook,
    /// Visible only from formulas on the given sheet
    Sheet(usize),
}

/// A defined name
///
/// `refers_to` is reference text such as `Sheet1!$A$1` or `$A$1:$D$10`; a reference without a
/// sheet prefix means the scope's sheet (or the first sheet for workbook scope).
#[derive(Debug, Clone, PartialEq)]
pub struct NamedRange {
    /// The name as written; lookups are case-insensitive
    pub name: String,
    pub scope: NameScope,
    pub refers_to: String,
    /// Optional comment/description for documentation
    pub comment: Option<String>,
}

impl NamedRange {
    /// Create a new named range
    pub fn new(name: impl Into<String>, refers_to: impl Into<String>, scope: NameScope) -> Self {
        Self {
            name: name.into(),
            scope,
            refers_to: refers_to.into(),
            comment: None,
        }
    }

    /// Create a workbook-scoped named range
    pub fn workbook_scope(name: impl Into<String>, refers_to: impl Into<String>) -> Self {
        Self::new(name, refers_to, NameScope::Workbook)
    }

    /// Create a sheet-scoped named range
    pub fn sheet_scope(
        name: impl Into<String>,
        refers_to: impl Into<String>,
        sheet_index: usize,
    ) -> Self {
        Self::new(name, refers_to, NameScope::Sheet(sheet_index))
    }

    /// Set a comment for this named range
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Reference text without a leading `=`
    pub fn expression(&self) -> &str {
        self.refers_to.strip_prefix('=').unwrap_or(&self.refers_to)
    }

    /// Check whether `name` is usable as a defined name
    ///
    /// Names start with a letter or underscore, continue with letters, digits, `_` or `.`,
    /// and must not look like a cell reference.
    pub fn is_valid_name(name: &str) -> bool {
        let mut chars = name.chars();
        let first_ok = matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_');
        let rest_ok = chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.');
        first_ok && rest_ok && crate::CellAddress::parse(name).is_err()
    }
}

/// Collection of defined names with case-insensitive lookup
#[derive(Debug, Default, Clone)]
pub struct NamedRangeCollection {
    ranges: HashMap<(String, NameScope), NamedRange>,
}

impl NamedRangeCollection {
    /// Create a new empty collection
    pub fn new() -> Self {
        Self::default()
    }

    fn key(name: &str, scope: NameScope) -> (String, NameScope) {
        (name.to_lowercase(), scope)
    }

    /// Define a new named range
    ///
    /// Returns an error if the name is malformed or already defined in the same scope.
    pub fn define(&mut self, range: NamedRange) -> Result<()> {
        if !NamedRange::is_valid_name(&range.name) {
            return Err(Error::InvalidName(format!(
                "'{}' is not a valid name",
                range.name
            )));
        }

        let key = Self::key(&range.name, range.scope);
        if self.ranges.contains_key(&key) {
            return Err(Error::InvalidName(format!(
                "Named range '{}' already exists in this scope",
                range.name
            )));
        }

        self.ranges.insert(key, range);
        Ok(())
    }

    /// Look up a name from formulas on `current_sheet`
    ///
    /// A sheet-scoped definition shadows a workbook-scoped one.
    pub fn get(&self, name: &str, current_sheet: usize) -> Option<&NamedRange> {
        self.ranges
            .get(&Self::key(name, NameScope::Sheet(current_sheet)))
            .or_else(|| self.ranges.get(&Self::key(name, NameScope::Workbook)))
    }

    /// Get a named range by exact scope
    pub fn get_exact(&self, name: &str, scope: NameScope) -> Option<&NamedRange> {
        self.ranges.get(&Self::key(name, scope))
    }

    /// Remove a named range
    pub fn remove(&mut self, name: &str, scope: NameScope) -> Option<NamedRange> {
        self.ranges.remove(&Self::key(name, scope))
    }

    /// Iterate over all named ranges
    pub fn iter(&self) -> impl Iterator<Item = &NamedRange> {
        self.ranges.values()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}
