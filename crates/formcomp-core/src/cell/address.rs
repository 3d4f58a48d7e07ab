//! Cell address and range types

use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};
use std::fmt;
use std::str::FromStr;

/// Notation used by formula text to refer to cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReferenceStyle {
    /// Column letters and row numbers (`B3`, `$B$3`)
    #[default]
    A1,
    /// Row and column numbers, optionally relative to the formula cell (`R3C2`, `R[1]C[-1]`)
    R1C1,
}

/// A cell address (e.g., "A1", "$B$2", "R[1]C2")
///
/// Cell addresses in Excel use a combination of column letters (A-XFD) and row numbers (1-1048576).
/// The optional `$` prefix makes a reference absolute (doesn't change when copied).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellAddress {
    /// Row index (0-based internally, 1-based in display)
    pub row: u32,
    /// Column index (0-based, A=0, B=1, ..., XFD=16383)
    pub col: u16,
    /// Whether the row reference is absolute ($)
    pub row_absolute: bool,
    /// Whether the column reference is absolute ($)
    pub col_absolute: bool,
}

impl CellAddress {
    /// Create a new cell address with relative references
    pub fn new(row: u32, col: u16) -> Self {
        Self {
            row,
            col,
            row_absolute: false,
            col_absolute: false,
        }
    }

    /// Create a new cell address with specified absolute/relative flags
    pub fn with_absolute(row: u32, col: u16, row_absolute: bool, col_absolute: bool) -> Self {
        Self {
            row,
            col,
            row_absolute,
            col_absolute,
        }
    }

    /// Create an absolute cell address ($A$1 style)
    pub fn absolute(row: u32, col: u16) -> Self {
        Self::with_absolute(row, col, true, true)
    }

    /// Parse an address in the given notation.
    ///
    /// `origin` is the cell holding the formula; R1C1 relative offsets are taken from it and
    /// it is ignored for A1 text.
    pub fn parse_with_style(s: &str, style: ReferenceStyle, origin: CellAddress) -> Result<Self> {
        match style {
            ReferenceStyle::A1 => Self::parse(s),
            ReferenceStyle::R1C1 => Self::parse_r1c1(s, origin),
        }
    }

    /// Parse a cell address from A1-style notation
    ///
    /// # Examples
    /// ```
    /// use formcomp_core::CellAddress;
    ///
    /// let addr = CellAddress::parse("A1").unwrap();
    /// assert_eq!(addr.row, 0);
    /// assert_eq!(addr.col, 0);
    ///
    /// let addr = CellAddress::parse("$B$2").unwrap();
    /// assert_eq!(addr.row, 1);
    /// assert_eq!(addr.col, 1);
    /// assert!(addr.row_absolute);
    /// assert!(addr.col_absolute);
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidAddress("empty address".into()));
        }

        let bytes = s.as_bytes();
        let mut pos = 0;

        let col_absolute = if bytes.get(pos) == Some(&b'$') {
            pos += 1;
            true
        } else {
            false
        };

        let col_start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_alphabetic() {
            pos += 1;
        }

        if pos == col_start {
            return Err(Error::InvalidAddress(format!(
                "no column letters in '{}'",
                s
            )));
        }

        let col = Self::letters_to_column(&s[col_start..pos])?;

        let row_absolute = if bytes.get(pos) == Some(&b'$') {
            pos += 1;
            true
        } else {
            false
        };

        let row_str = &s[pos..];
        if row_str.is_empty() {
            return Err(Error::InvalidAddress(format!("no row number in '{}'", s)));
        }

        let row: u32 = row_str
            .parse()
            .map_err(|_| Error::InvalidAddress(format!("invalid row number in '{}'", s)))?;

        // Rows are 1-based in text, 0-based internally
        if row == 0 {
            return Err(Error::InvalidAddress(format!(
                "row number must be >= 1 in '{}'",
                s
            )));
        }

        Self::checked(i64::from(row) - 1, i64::from(col), row_absolute, col_absolute)
    }

    /// Parse a cell address from R1C1 notation relative to `origin`
    ///
    /// `R3C2` is absolute, `R[1]C[-1]` is an offset from `origin`, and a bare `R` or `C`
    /// means the origin's own row or column.
    ///
    /// # Examples
    /// ```
    /// use formcomp_core::CellAddress;
    ///
    /// let origin = CellAddress::new(4, 2); // C5
    /// let addr = CellAddress::parse_r1c1("R[-1]C", origin).unwrap();
    /// assert_eq!(addr.to_a1_string(), "C4");
    ///
    /// let addr = CellAddress::parse_r1c1("R1C1", origin).unwrap();
    /// assert_eq!(addr.to_a1_string(), "$A$1");
    /// ```
    pub fn parse_r1c1(s: &str, origin: CellAddress) -> Result<Self> {
        let s = s.trim();
        let upper = s.to_ascii_uppercase();
        let bytes = upper.as_bytes();

        if bytes.first() != Some(&b'R') {
            return Err(Error::InvalidAddress(format!("expected 'R' in '{}'", s)));
        }
        let (row, row_absolute, pos) = Self::r1c1_part(&upper, 1, origin.row as i64, s)?;

        if bytes.get(pos) != Some(&b'C') {
            return Err(Error::InvalidAddress(format!("expected 'C' in '{}'", s)));
        }
        let (col, col_absolute, end) = Self::r1c1_part(&upper, pos + 1, origin.col as i64, s)?;

        if end != bytes.len() {
            return Err(Error::InvalidAddress(format!(
                "unexpected trailing text in '{}'",
                s
            )));
        }
        if row < 0 {
            return Err(Error::InvalidAddress(format!(
                "row reference before first row in '{}'",
                s
            )));
        }

        Self::checked(row, col, row_absolute, col_absolute)
    }

    /// Parse one `R..`/`C..` component starting after its letter. Returns the 0-based index,
    /// whether it is absolute, and the position after it.
    fn r1c1_part(text: &str, start: usize, base: i64, original: &str) -> Result<(i64, bool, usize)> {
        let bytes = text.as_bytes();
        let invalid = || Error::InvalidAddress(format!("invalid R1C1 reference '{}'", original));

        match bytes.get(start) {
            Some(b'[') => {
                let close = text[start..].find(']').ok_or_else(invalid)? + start;
                let offset: i64 = text[start + 1..close].parse().map_err(|_| invalid())?;
                let index = base.checked_add(offset).ok_or_else(invalid)?;
                Ok((index, false, close + 1))
            }
            Some(b) if b.is_ascii_digit() => {
                let mut end = start;
                while end < bytes.len() && bytes[end].is_ascii_digit() {
                    end += 1;
                }
                let n: i64 = text[start..end].parse().map_err(|_| invalid())?;
                if n == 0 {
                    return Err(invalid());
                }
                Ok((n - 1, true, end))
            }
            _ => Ok((base, false, start)),
        }
    }

    fn checked(row: i64, col: i64, row_absolute: bool, col_absolute: bool) -> Result<Self> {
        let row = match u32::try_from(row) {
            Ok(row) if row < MAX_ROWS => row,
            _ => {
                return Err(Error::RowOutOfBounds(
                    row.clamp(0, u32::MAX as i64) as u32,
                    MAX_ROWS - 1,
                ))
            }
        };
        if col < 0 || col >= MAX_COLS as i64 {
            return Err(Error::ColumnOutOfBounds(
                col.clamp(0, u16::MAX as i64) as u16,
                MAX_COLS - 1,
            ));
        }

        Ok(Self {
            row,
            col: col as u16,
            row_absolute,
            col_absolute,
        })
    }

    /// Convert column index to letters (0 = A, 25 = Z, 26 = AA, etc.)
    pub fn column_to_letters(col: u16) -> String {
        let mut result = String::new();
        let mut n = col as u32 + 1;

        while n > 0 {
            n -= 1;
            let c = ((n % 26) as u8 + b'A') as char;
            result.insert(0, c);
            n /= 26;
        }

        result
    }

    /// Convert column letters to index (A = 0, Z = 25, AA = 26, etc.)
    pub fn letters_to_column(letters: &str) -> Result<u16> {
        if letters.is_empty() {
            return Err(Error::InvalidAddress("empty column letters".into()));
        }

        let mut col: u32 = 0;
        for c in letters.chars() {
            if !c.is_ascii_alphabetic() {
                return Err(Error::InvalidAddress(format!(
                    "invalid column letter '{}'",
                    c
                )));
            }
            col = col * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
            if col > MAX_COLS as u32 {
                return Err(Error::ColumnOutOfBounds(u16::MAX, MAX_COLS - 1));
            }
        }

        Ok((col - 1) as u16)
    }

    /// Format as A1-style string
    pub fn to_a1_string(&self) -> String {
        let mut result = String::new();

        if self.col_absolute {
            result.push('$');
        }
        result.push_str(&Self::column_to_letters(self.col));

        if self.row_absolute {
            result.push('$');
        }
        result.push_str(&(self.row + 1).to_string());

        result
    }

    /// Format as R1C1-style string relative to `origin`
    pub fn to_r1c1_string(&self, origin: CellAddress) -> String {
        fn part(letter: char, index: i64, absolute: bool, base: i64) -> String {
            if absolute {
                format!("{}{}", letter, index + 1)
            } else if index == base {
                letter.to_string()
            } else {
                format!("{}[{}]", letter, index - base)
            }
        }

        format!(
            "{}{}",
            part('R', self.row as i64, self.row_absolute, origin.row as i64),
            part('C', self.col as i64, self.col_absolute, origin.col as i64)
        )
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1_string())
    }
}

impl FromStr for CellAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A range of cells (e.g., "A1:B10")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    /// Start address (top-left)
    pub start: CellAddress,
    /// End address (bottom-right)
    pub end: CellAddress,
}

impl CellRange {
    /// Create a new cell range
    pub fn new(start: CellAddress, end: CellAddress) -> Self {
        // Normalize so start is top-left and end is bottom-right
        let (start_row, end_row) = if start.row <= end.row {
            (start.row, end.row)
        } else {
            (end.row, start.row)
        };

        let (start_col, end_col) = if start.col <= end.col {
            (start.col, end.col)
        } else {
            (end.col, start.col)
        };

        Self {
            start: CellAddress::with_absolute(
                start_row,
                start_col,
                start.row_absolute,
                start.col_absolute,
            ),
            end: CellAddress::with_absolute(end_row, end_col, end.row_absolute, end.col_absolute),
        }
    }

    /// Create a range from row/column indices
    pub fn from_indices(start_row: u32, start_col: u16, end_row: u32, end_col: u16) -> Self {
        Self::new(
            CellAddress::new(start_row, start_col),
            CellAddress::new(end_row, end_col),
        )
    }

    /// Create a single-cell range
    pub fn single(addr: CellAddress) -> Self {
        Self {
            start: addr,
            end: addr,
        }
    }

    /// Parse a range from A1:B10 notation
    pub fn parse(s: &str) -> Result<Self> {
        Self::parse_with_style(s, ReferenceStyle::A1, CellAddress::new(0, 0))
    }

    /// Parse a range in the given notation (`A1:B10` or `R1C1:R[2]C`)
    pub fn parse_with_style(s: &str, style: ReferenceStyle, origin: CellAddress) -> Result<Self> {
        let s = s.trim();

        if let Some(colon_pos) = s.find(':') {
            let start = CellAddress::parse_with_style(&s[..colon_pos], style, origin)?;
            let end = CellAddress::parse_with_style(&s[colon_pos + 1..], style, origin)?;
            Ok(Self::new(start, end))
        } else {
            let addr = CellAddress::parse_with_style(s, style, origin)?;
            Ok(Self::single(addr))
        }
    }

    /// Check if a cell is within this range
    pub fn contains(&self, addr: &CellAddress) -> bool {
        addr.row >= self.start.row
            && addr.row <= self.end.row
            && addr.col >= self.start.col
            && addr.col <= self.end.col
    }

    /// Get the number of rows in the range
    pub fn row_count(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    /// Get the number of columns in the range
    pub fn col_count(&self) -> u16 {
        self.end.col - self.start.col + 1
    }

    /// Get the total number of cells in the range
    pub fn cell_count(&self) -> u64 {
        self.row_count() as u64 * self.col_count() as u64
    }

    /// Check if this range overlaps with another
    pub fn overlaps(&self, other: &CellRange) -> bool {
        self.start.row <= other.end.row
            && self.end.row >= other.start.row
            && self.start.col <= other.end.col
            && self.end.col >= other.start.col
    }

    /// Iterate over all cell addresses in the range (row by row)
    pub fn cells(&self) -> CellRangeIterator {
        CellRangeIterator {
            range: *self,
            current_row: self.start.row,
            current_col: self.start.col,
            remaining: self.cell_count() as usize,
        }
    }

    /// Format as A1:B10 string
    pub fn to_a1_string(&self) -> String {
        if self.start == self.end {
            self.start.to_a1_string()
        } else {
            format!("{}:{}", self.start.to_a1_string(), self.end.to_a1_string())
        }
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1_string())
    }
}

impl FromStr for CellRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Iterator over cells in a range
pub struct CellRangeIterator {
    range: CellRange,
    current_row: u32,
    current_col: u16,
    remaining: usize,
}

impl Iterator for CellRangeIterator {
    type Item = CellAddress;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_row > self.range.end.row {
            return None;
        }

        let addr = CellAddress::new(self.current_row, self.current_col);

        self.current_col += 1;
        if self.current_col > self.range.end.col {
            self.current_col = self.range.start.col;
            self.current_row += 1;
        }
        self.remaining -= 1;

        Some(addr)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for CellRangeIterator {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_to_letters() {
        assert_eq!(CellAddress::column_to_letters(0), "A");
        assert_eq!(CellAddress::column_to_letters(25), "Z");
        assert_eq!(CellAddress::column_to_letters(26), "AA");
        assert_eq!(CellAddress::column_to_letters(701), "ZZ");
        assert_eq!(CellAddress::column_to_letters(16383), "XFD");
    }

    #[test]
    fn test_letters_to_column() {
        assert_eq!(CellAddress::letters_to_column("A").unwrap(), 0);
        assert_eq!(CellAddress::letters_to_column("AB").unwrap(), 27);
        assert_eq!(CellAddress::letters_to_column("XFD").unwrap(), 16383);
        assert_eq!(CellAddress::letters_to_column("aa").unwrap(), 26);
        assert!(CellAddress::letters_to_column("XFE").is_err());
    }

    #[test]
    fn test_cell_address_parse() {
        let addr = CellAddress::parse("B2").unwrap();
        assert_eq!(addr.row, 1);
        assert_eq!(addr.col, 1);
        assert!(!addr.row_absolute);

        let addr = CellAddress::parse("$A1").unwrap();
        assert!(addr.col_absolute);
        assert!(!addr.row_absolute);

        let addr = CellAddress::parse("XFD1048576").unwrap();
        assert_eq!(addr.row, 1048575);
        assert_eq!(addr.col, 16383);
    }

    #[test]
    fn test_cell_address_parse_errors() {
        assert!(CellAddress::parse("").is_err());
        assert!(CellAddress::parse("A").is_err());
        assert!(CellAddress::parse("1").is_err());
        assert!(CellAddress::parse("A0").is_err());
        assert!(CellAddress::parse("A1048577").is_err());
        assert!(CellAddress::parse("XFE1").is_err());
    }

    #[test]
    fn test_r1c1_absolute_and_relative() {
        let origin = CellAddress::new(4, 2); // C5

        let abs = CellAddress::parse_r1c1("R1C1", origin).unwrap();
        assert_eq!(abs, CellAddress::absolute(0, 0));

        let rel = CellAddress::parse_r1c1("R[1]C[-1]", origin).unwrap();
        assert_eq!((rel.row, rel.col), (5, 1));
        assert!(!rel.row_absolute && !rel.col_absolute);

        let same = CellAddress::parse_r1c1("RC", origin).unwrap();
        assert_eq!((same.row, same.col), (4, 2));

        let mixed = CellAddress::parse_r1c1("r2c[0]", origin).unwrap();
        assert_eq!((mixed.row, mixed.col), (1, 2));
        assert!(mixed.row_absolute && !mixed.col_absolute);
    }

    #[test]
    fn test_r1c1_errors() {
        let origin = CellAddress::new(0, 0);
        assert!(CellAddress::parse_r1c1("R[-1]C", origin).is_err());
        assert!(CellAddress::parse_r1c1("RC[-1]", origin).is_err());
        assert!(CellAddress::parse_r1c1("R0C1", origin).is_err());
        assert!(CellAddress::parse_r1c1("C1", origin).is_err());
        assert!(CellAddress::parse_r1c1("R1C1X", origin).is_err());
    }

    #[test]
    fn test_r1c1_out_of_range() {
        let a1 = CellAddress::new(0, 0);
        assert!(matches!(
            CellAddress::parse_r1c1("R[4294967296]C", a1),
            Err(Error::RowOutOfBounds(..))
        ));
        assert!(matches!(
            CellAddress::parse_r1c1("R4294967297C1", a1),
            Err(Error::RowOutOfBounds(..))
        ));
        assert!(matches!(
            CellAddress::parse_r1c1("R1048577C1", a1),
            Err(Error::RowOutOfBounds(1_048_576, _))
        ));
        assert!(matches!(
            CellAddress::parse_r1c1("R[9223372036854775807]C", CellAddress::new(5, 0)),
            Err(Error::InvalidAddress(_))
        ));
        assert!(matches!(
            CellAddress::parse_r1c1("RC[-9223372036854775808]", CellAddress::new(0, 3)),
            Err(Error::InvalidAddress(_))
        ));
        assert!(matches!(
            CellAddress::parse_r1c1("R1C[70000]", a1),
            Err(Error::ColumnOutOfBounds(..))
        ));
        assert!(CellAddress::parse_r1c1("R99999999999999999999C1", a1).is_err());
        assert!(matches!(
            CellAddress::parse("A1048577"),
            Err(Error::RowOutOfBounds(1_048_576, _))
        ));
        assert!(CellAddress::parse("A4294967296").is_err());
        assert_eq!(
            CellAddress::parse_r1c1("R1048576C16384", a1).unwrap().to_a1_string(),
            "$XFD$1048576"
        );
    }

    #[test]
    fn test_both_notations_resolve_to_same_cell() {
        let origin = CellAddress::new(2, 3); // D3
        let a1 = CellAddress::parse("B1").unwrap();
        let r1c1 = CellAddress::parse_r1c1("R[-2]C[-2]", origin).unwrap();
        assert_eq!((a1.row, a1.col), (r1c1.row, r1c1.col));
        assert_eq!(a1.to_r1c1_string(origin), "R[-2]C[-2]");
        assert_eq!(CellAddress::absolute(0, 0).to_r1c1_string(origin), "R1C1");
    }

    #[test]
    fn test_cell_range_parse() {
        let range = CellRange::parse("A1:B2").unwrap();
        assert_eq!(range.start, CellAddress::new(0, 0));
        assert_eq!(range.end, CellAddress::new(1, 1));

        let range = CellRange::parse("C3").unwrap();
        assert_eq!(range.start, range.end);

        let origin = CellAddress::new(5, 0);
        let range =
            CellRange::parse_with_style("R[-3]C:R[-1]C", ReferenceStyle::R1C1, origin).unwrap();
        assert_eq!(range.to_a1_string(), "A3:A5");
    }

    #[test]
    fn test_cell_range_iterator() {
        let range = CellRange::parse("A1:B2").unwrap();
        let cells = range.cells();
        assert_eq!(cells.len(), 4);
        let cells: Vec<_> = cells.collect();
        assert_eq!(cells[1], CellAddress::new(0, 1));
        assert_eq!(cells[2], CellAddress::new(1, 0));
    }
}
