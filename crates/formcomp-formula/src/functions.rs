//! Catalogue of supported function and aggregator names

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;

/// Scalar functions with a fixed argument list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    If,
    Index,
    And,
    Or,
    Not,
    Abs,
    Sign,
    Int,
    Mod,
    Sqrt,
    Exp,
    Ln,
    Round,
    RoundUp,
    RoundDown,
    Now,
    Today,
    Rand,
    Concatenate,
    Left,
    Right,
    Mid,
    Upper,
    Lower,
    Trim,
    Len,
    /// `SUMIF(tested, criterion[, summed])`
    SumIf,
    /// `COUNTIF(tested, criterion)`
    CountIf,
    /// `DSUM(database, field, criteria)` and friends: filter the rows of a table, then aggregate
    Database(Aggregator),
    VLookup,
    HLookup,
    Match,
    Choose,
}

/// Functions that reduce any number of values, ranges and repeating sections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aggregator {
    Sum,
    Product,
    Min,
    Max,
    Count,
    Average,
    VarP,
    Var,
    StDevP,
    StDev,
}

/// Either kind of callable name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Callable {
    Function(Function),
    Aggregator(Aggregator),
}

/// Static description of a callable
#[derive(Debug, Clone, Copy)]
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    pub callable: Callable,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Produces a new value on every evaluation
    pub volatile: bool,
}

impl FunctionDef {
    const fn function(name: &'static str, f: Function, min: usize, max: Option<usize>) -> Self {
        Self {
            name,
            callable: Callable::Function(f),
            min_args: min,
            max_args: max,
            volatile: false,
        }
    }

    const fn database(name: &'static str, a: Aggregator) -> Self {
        Self::function(name, Function::Database(a), 3, Some(3))
    }

    const fn aggregator(name: &'static str, a: Aggregator) -> Self {
        Self {
            name,
            callable: Callable::Aggregator(a),
            min_args: 1,
            max_args: None,
            volatile: false,
        }
    }

    const fn volatile(self) -> Self {
        Self {
            volatile: true,
            ..self
        }
    }

    /// Check an argument count against this definition
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min_args && self.max_args.map_or(true, |max| count <= max)
    }

    /// Human readable arity, e.g. "2 to 3" or "at least 1"
    pub fn arity(&self) -> String {
        match self.max_args {
            Some(max) if max == self.min_args => max.to_string(),
            Some(max) => format!("{} to {}", self.min_args, max),
            None => format!("at least {}", self.min_args),
        }
    }
}

static DEFINITIONS: &[FunctionDef] = &[
    FunctionDef::function("IF", Function::If, 2, Some(3)),
    FunctionDef::function("INDEX", Function::Index, 2, Some(3)),
    FunctionDef::function("AND", Function::And, 1, None),
    FunctionDef::function("OR", Function::Or, 1, None),
    FunctionDef::function("NOT", Function::Not, 1, Some(1)),
    FunctionDef::function("ABS", Function::Abs, 1, Some(1)),
    FunctionDef::function("SIGN", Function::Sign, 1, Some(1)),
    FunctionDef::function("INT", Function::Int, 1, Some(1)),
    FunctionDef::function("MOD", Function::Mod, 2, Some(2)),
    FunctionDef::function("SQRT", Function::Sqrt, 1, Some(1)),
    FunctionDef::function("EXP", Function::Exp, 1, Some(1)),
    FunctionDef::function("LN", Function::Ln, 1, Some(1)),
    FunctionDef::function("ROUND", Function::Round, 2, Some(2)),
    FunctionDef::function("ROUNDUP", Function::RoundUp, 2, Some(2)),
    FunctionDef::function("ROUNDDOWN", Function::RoundDown, 2, Some(2)),
    FunctionDef::function("NOW", Function::Now, 0, Some(0)).volatile(),
    FunctionDef::function("TODAY", Function::Today, 0, Some(0)).volatile(),
    FunctionDef::function("RAND", Function::Rand, 0, Some(0)).volatile(),
    FunctionDef::function("CONCATENATE", Function::Concatenate, 1, None),
    FunctionDef::function("LEFT", Function::Left, 1, Some(2)),
    FunctionDef::function("RIGHT", Function::Right, 1, Some(2)),
    FunctionDef::function("MID", Function::Mid, 3, Some(3)),
    FunctionDef::function("UPPER", Function::Upper, 1, Some(1)),
    FunctionDef::function("LOWER", Function::Lower, 1, Some(1)),
    FunctionDef::function("TRIM", Function::Trim, 1, Some(1)),
    FunctionDef::function("LEN", Function::Len, 1, Some(1)),
    FunctionDef::function("SUMIF", Function::SumIf, 2, Some(3)),
    FunctionDef::function("COUNTIF", Function::CountIf, 2, Some(2)),
    FunctionDef::database("DSUM", Aggregator::Sum),
    FunctionDef::database("DPRODUCT", Aggregator::Product),
    FunctionDef::database("DMIN", Aggregator::Min),
    FunctionDef::database("DMAX", Aggregator::Max),
    FunctionDef::database("DCOUNT", Aggregator::Count),
    FunctionDef::database("DAVERAGE", Aggregator::Average),
    FunctionDef::database("DVARP", Aggregator::VarP),
    FunctionDef::database("DVAR", Aggregator::Var),
    FunctionDef::database("DSTDEVP", Aggregator::StDevP),
    FunctionDef::database("DSTDEV", Aggregator::StDev),
    FunctionDef::function("VLOOKUP", Function::VLookup, 3, Some(4)),
    FunctionDef::function("HLOOKUP", Function::HLookup, 3, Some(4)),
    FunctionDef::function("MATCH", Function::Match, 2, Some(3)),
    FunctionDef::function("CHOOSE", Function::Choose, 2, None),
    FunctionDef::aggregator("SUM", Aggregator::Sum),
    FunctionDef::aggregator("PRODUCT", Aggregator::Product),
    FunctionDef::aggregator("MIN", Aggregator::Min),
    FunctionDef::aggregator("MAX", Aggregator::Max),
    FunctionDef::aggregator("COUNT", Aggregator::Count),
    FunctionDef::aggregator("AVERAGE", Aggregator::Average),
    FunctionDef::aggregator("VARP", Aggregator::VarP),
    FunctionDef::aggregator("VAR", Aggregator::Var),
    FunctionDef::aggregator("STDEVP", Aggregator::StDevP),
    FunctionDef::aggregator("STDEV", Aggregator::StDev),
];

static BY_NAME: Lazy<HashMap<&'static str, &'static FunctionDef>> =
    Lazy::new(|| DEFINITIONS.iter().map(|d| (d.name, d)).collect());

static BY_CALLABLE: Lazy<HashMap<Callable, &'static FunctionDef>> =
    Lazy::new(|| DEFINITIONS.iter().map(|d| (d.callable, d)).collect());

/// Look up a function by name (case-insensitive)
pub fn lookup(name: &str) -> Option<&'static FunctionDef> {
    BY_NAME.get(name.to_uppercase().as_str()).copied()
}

fn definition(callable: Callable) -> Option<&'static FunctionDef> {
    BY_CALLABLE.get(&callable).copied()
}

impl Function {
    pub fn name(self) -> &'static str {
        definition(Callable::Function(self)).map_or("?", |d| d.name)
    }

    pub fn is_volatile(self) -> bool {
        definition(Callable::Function(self)).map_or(false, |d| d.volatile)
    }

    /// Functions whose result is always text
    pub fn returns_text(self) -> bool {
        matches!(
            self,
            Function::Concatenate
                | Function::Left
                | Function::Right
                | Function::Mid
                | Function::Upper
                | Function::Lower
                | Function::Trim
        )
    }

    /// Whether the argument at `position` may be a multi-cell range
    pub fn accepts_range(self, position: usize) -> bool {
        match self {
            Function::Index => position == 0,
            Function::SumIf | Function::Database(_) => position == 0 || position == 2,
            Function::CountIf => position == 0,
            Function::VLookup | Function::HLookup | Function::Match => position == 1,
            _ => false,
        }
    }
}

impl Aggregator {
    pub fn name(self) -> &'static str {
        definition(Callable::Aggregator(self)).map_or("?", |d| d.name)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let def = lookup("sum").unwrap();
        assert_eq!(def.callable, Callable::Aggregator(Aggregator::Sum));
        assert!(lookup("Concatenate").is_some());
        assert_eq!(lookup("vlookup").unwrap().callable, Callable::Function(Function::VLookup));
        assert_eq!(
            lookup("DStDev").unwrap().callable,
            Callable::Function(Function::Database(Aggregator::StDev))
        );
        assert!(lookup("DGET").is_none());
    }

    #[test]
    fn test_names_round_trip() {
        for def in DEFINITIONS {
            assert_eq!(lookup(def.name).map(|d| d.callable), Some(def.callable));
        }
        assert_eq!(Function::RoundDown.name(), "ROUNDDOWN");
        assert_eq!(Aggregator::StDevP.to_string(), "STDEVP");
    }

    #[test]
    fn test_arity() {
        let def = lookup("IF").unwrap();
        assert!(!def.accepts(1));
        assert!(def.accepts(3));
        assert!(!def.accepts(4));
        assert_eq!(def.arity(), "2 to 3");
        assert_eq!(lookup("NOW").unwrap().arity(), "0");
        assert_eq!(lookup("SUM").unwrap().arity(), "at least 1");
        assert!(lookup("RAND").unwrap().volatile);
        assert!(Function::Now.is_volatile());
        assert!(!Function::Abs.is_volatile());
        assert_eq!(lookup("DSUM").unwrap().arity(), "3");
        assert_eq!(lookup("CHOOSE").unwrap().arity(), "at least 2");
    }

    #[test]
    fn test_range_arguments() {
        assert!(Function::Index.accepts_range(0));
        assert!(!Function::Index.accepts_range(1));
        assert!(Function::SumIf.accepts_range(2));
        assert!(!Function::SumIf.accepts_range(1));
        assert!(Function::VLookup.accepts_range(1));
        assert!(Function::Database(Aggregator::Max).accepts_range(2));
        assert!(!Function::Choose.accepts_range(1));
    }
}
