//! Formula parser
//!
//! A recursive descent parser for spreadsheet formulas with proper operator precedence.
//! References are written either in A1 notation (`B3`, `$B$3`) or in R1C1 notation relative to
//! the cell holding the formula (`R3C2`, `R[1]C[-1]`).

use formcomp_core::{CellAddress, CellRange, ReferenceStyle};
use lazy_regex::{regex_find, regex_is_match};

use crate::ast::{BinaryOperator, CellReference, FormulaExpr, RangeReference, UnaryOperator};
use crate::error::{ParseError, ParseErrorKind, ParseResult};
use crate::functions::{self, Callable};

/// Where a formula lives and how its references are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseContext {
    /// The cell holding the formula; R1C1 offsets are relative to it
    pub origin: CellAddress,
    pub style: ReferenceStyle,
}

/// A1 notation with the formula in A1
impl Default for ParseContext {
    fn default() -> Self {
        Self::a1(CellAddress::new(0, 0))
    }
}

impl ParseContext {
    pub fn new(origin: CellAddress, style: ReferenceStyle) -> Self {
        Self { origin, style }
    }

    /// A1 notation for a formula in `origin`
    pub fn a1(origin: CellAddress) -> Self {
        Self::new(origin, ReferenceStyle::A1)
    }

    /// R1C1 notation for a formula in `origin`
    pub fn r1c1(origin: CellAddress) -> Self {
        Self::new(origin, ReferenceStyle::R1C1)
    }
}

/// Parse an A1-style formula into an AST
///
/// # Example
/// ```rust
/// use formcomp_formula::parse_formula;
///
/// let ast = parse_formula("=1+2").unwrap();
/// let ast = parse_formula("=SUM(A1:A10)").unwrap();
/// let ast = parse_formula("=IF(A1>0,\"Yes\",\"No\")").unwrap();
/// ```
pub fn parse_formula(formula: &str) -> ParseResult<FormulaExpr> {
    parse_formula_with(formula, &ParseContext::default())
}

/// Parse a formula written in the notation given by `context`
///
/// # Example
/// ```rust
/// use formcomp_core::CellAddress;
/// use formcomp_formula::{parse_formula, parse_formula_with, ParseContext};
///
/// let context = ParseContext::r1c1(CellAddress::new(2, 0)); // A3
/// let r1c1 = parse_formula_with("=R[-2]C+R[-1]C", &context).unwrap();
/// assert_eq!(r1c1, parse_formula("=A1+A2").unwrap());
/// ```
pub fn parse_formula_with(formula: &str, context: &ParseContext) -> ParseResult<FormulaExpr> {
    let formula = formula.trim();

    if !formula.starts_with('=') {
        return Err(ParseError::new(
            formula,
            0,
            ParseErrorKind::Syntax("Formula must start with '='".into()),
        ));
    }

    let mut parser = FormulaParser::new(formula, *context);
    let expr = parser.parse_expression()?;

    match parser.current_token() {
        Token::Eof => Ok(expr),
        Token::Bad(kind) => Err(parser.error(parser.token_start, kind.clone())),
        other => Err(parser.error(
            parser.token_start,
            ParseErrorKind::Syntax(format!("Unexpected {} after expression", other.describe())),
        )),
    }
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
enum Token {
    // Literals
    Number(String),
    String(String),
    Boolean(bool),

    // Identifiers and references
    Identifier(String),
    CellRef(CellAddress),
    SheetRef(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Percent,
    Ampersand,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Colon,
    Comma,

    // Delimiters
    LeftParen,
    RightParen,

    /// Text that could not be scanned
    Bad(ParseErrorKind),

    Eof,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {}", n),
            Token::String(s) => format!("string \"{}\"", s),
            Token::Boolean(b) => format!("{}", if *b { "TRUE" } else { "FALSE" }),
            Token::Identifier(name) => format!("name {}", name),
            Token::CellRef(addr) => format!("reference {}", addr),
            Token::SheetRef(sheet) => format!("sheet {}!", sheet),
            Token::Plus => "'+'".into(),
            Token::Minus => "'-'".into(),
            Token::Star => "'*'".into(),
            Token::Slash => "'/'".into(),
            Token::Caret => "'^'".into(),
            Token::Percent => "'%'".into(),
            Token::Ampersand => "'&'".into(),
            Token::Equal => "'='".into(),
            Token::NotEqual => "'<>'".into(),
            Token::LessThan => "'<'".into(),
            Token::LessEqual => "'<='".into(),
            Token::GreaterThan => "'>'".into(),
            Token::GreaterEqual => "'>='".into(),
            Token::Colon => "':'".into(),
            Token::Comma => "','".into(),
            Token::LeftParen => "'('".into(),
            Token::RightParen => "')'".into(),
            Token::Bad(kind) => kind.to_string(),
            Token::Eof => "end of formula".into(),
        }
    }
}

/// Formula parser
struct FormulaParser<'a> {
    /// The whole formula including the leading '='
    formula: &'a str,
    context: ParseContext,
    pos: usize,
    /// Byte position where `current_token` starts
    token_start: usize,
    current_token: Token,
}

impl<'a> FormulaParser<'a> {
    fn new(formula: &'a str, context: ParseContext) -> Self {
        let mut parser = Self {
            formula,
            context,
            pos: 1,
            token_start: 1,
            current_token: Token::Eof,
        };
        parser.advance_token();
        parser
    }

    fn error(&self, byte_pos: usize, kind: ParseErrorKind) -> ParseError {
        let column = self.formula[..byte_pos.min(self.formula.len())]
            .chars()
            .count();
        ParseError::new(self.formula, column, kind)
    }

    // === Token scanning ===

    fn advance_token(&mut self) {
        self.skip_whitespace();
        self.token_start = self.pos;
        self.current_token = self.scan_token();
    }

    fn scan_token(&mut self) -> Token {
        let Some(c) = self.peek_char() else {
            return Token::Eof;
        };

        let single = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '^' => Some(Token::Caret),
            '%' => Some(Token::Percent),
            '&' => Some(Token::Ampersand),
            ':' => Some(Token::Colon),
            ',' => Some(Token::Comma),
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            '=' => Some(Token::Equal),
            _ => None,
        };
        if let Some(token) = single {
            self.advance();
            return token;
        }

        match c {
            '<' => {
                self.advance();
                match self.peek_char() {
                    Some('=') => {
                        self.advance();
                        Token::LessEqual
                    }
                    Some('>') => {
                        self.advance();
                        Token::NotEqual
                    }
                    _ => Token::LessThan,
                }
            }
            '>' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    return Token::GreaterEqual;
                }
                Token::GreaterThan
            }
            '"' => self.scan_string(),
            '\'' => self.scan_quoted_sheet(),
            _ if c.is_ascii_digit()
                || (c == '.' && self.peek_char_at(1).map_or(false, |c| c.is_ascii_digit())) =>
            {
                self.scan_number()
            }
            _ if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
                self.scan_identifier_or_ref()
            }
            _ => {
                self.advance();
                Token::Bad(ParseErrorKind::Syntax(format!("Unexpected character '{}'", c)))
            }
        }
    }

    fn scan_string(&mut self) -> Token {
        self.advance(); // opening quote

        let mut s = String::new();
        loop {
            match self.peek_char() {
                None => {
                    return Token::Bad(ParseErrorKind::Syntax(
                        "Unterminated string literal".into(),
                    ))
                }
                // Escaped quote ("")
                Some('"') if self.peek_char_at(1) == Some('"') => {
                    s.push('"');
                    self.advance();
                    self.advance();
                }
                Some('"') => {
                    self.advance();
                    return Token::String(s);
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
            }
        }
    }

    fn scan_quoted_sheet(&mut self) -> Token {
        self.advance(); // opening quote

        let mut name = String::new();
        loop {
            match self.peek_char() {
                None => {
                    return Token::Bad(ParseErrorKind::Syntax("Unterminated sheet name".into()))
                }
                Some('\'') if self.peek_char_at(1) == Some('\'') => {
                    name.push('\'');
                    self.advance();
                    self.advance();
                }
                Some('\'') => {
                    self.advance();
                    break;
                }
                Some(c) => {
                    name.push(c);
                    self.advance();
                }
            }
        }

        if self.peek_char() == Some('!') {
            self.advance();
            Token::SheetRef(name)
        } else {
            Token::Bad(ParseErrorKind::Syntax(
                "Expected '!' after quoted sheet name".into(),
            ))
        }
    }

    fn scan_number(&mut self) -> Token {
        let start = self.pos;

        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }

        if self.peek_char() == Some('.') {
            self.advance();
            while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        if self.peek_char().map_or(false, |c| c == 'e' || c == 'E') {
            self.advance();
            if self.peek_char().map_or(false, |c| c == '+' || c == '-') {
                self.advance();
            }
            while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let text = &self.formula[start..self.pos];
        match text.parse::<f64>() {
            Ok(_) => Token::Number(text.to_string()),
            Err(_) => Token::Bad(ParseErrorKind::Syntax(format!("Invalid number '{}'", text))),
        }
    }

    fn scan_identifier_or_ref(&mut self) -> Token {
        if self.context.style == ReferenceStyle::R1C1 {
            if let Some(token) = self.scan_r1c1_reference() {
                return token;
            }
        }

        let formula = self.formula;
        let start = self.pos;
        while self.peek_char().map_or(false, |c| {
            c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.'
        }) {
            self.advance();
        }
        let text = &formula[start..self.pos];

        if self.peek_char() == Some('!') {
            self.advance();
            return Token::SheetRef(text.to_string());
        }

        // A following '(' makes it a function call (LOG10(100) is not a cell)
        let is_call = self.peek_char() == Some('(');
        if !is_call {
            if text.eq_ignore_ascii_case("TRUE") {
                return Token::Boolean(true);
            }
            if text.eq_ignore_ascii_case("FALSE") {
                return Token::Boolean(false);
            }
        }

        if !is_call
            && self.context.style == ReferenceStyle::A1
            && regex_is_match!(r"^\$?[A-Za-z]{1,3}\$?[0-9]+$", text)
        {
            return match CellAddress::parse(text) {
                Ok(address) => Token::CellRef(address),
                Err(e) => Token::Bad(ParseErrorKind::InvalidReference(e.to_string())),
            };
        }

        Token::Identifier(text.to_string())
    }

    /// Scan an R1C1 reference at the current position, if there is one
    fn scan_r1c1_reference(&mut self) -> Option<Token> {
        let formula = self.formula;
        let rest = &formula[self.pos..];
        let found = regex_find!(
            r"^[Rr](?:\[-?[0-9]+\]|[0-9]+)?[Cc](?:\[-?[0-9]+\]|[0-9]+)?",
            rest
        )?;

        // "RCount" or "RC(" are names, not references
        let follower = rest[found.len()..].chars().next();
        if follower.map_or(false, |c| {
            c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '$' | '(' | '!')
        }) {
            return None;
        }

        self.pos += found.len();
        Some(match CellAddress::parse_r1c1(found, self.context.origin) {
            Ok(address) => Token::CellRef(address),
            Err(e) => Token::Bad(ParseErrorKind::InvalidReference(e.to_string())),
        })
    }

    // === Helper methods ===

    fn peek_char(&self) -> Option<char> {
        self.formula[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.formula[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_whitespace()) {
            self.advance();
        }
    }

    fn current_token(&self) -> &Token {
        &self.current_token
    }

    fn consume(&mut self) -> Token {
        let token = std::mem::replace(&mut self.current_token, Token::Eof);
        self.advance_token();
        token
    }

    fn expect(&mut self, expected: &Token) -> ParseResult<()> {
        if self.current_token() == expected {
            self.consume();
            return Ok(());
        }
        let kind = match self.current_token() {
            Token::Bad(kind) => kind.clone(),
            other => ParseErrorKind::Syntax(format!(
                "Expected {}, got {}",
                expected.describe(),
                other.describe()
            )),
        };
        Err(self.error(self.token_start, kind))
    }

    // === Expression parsing with precedence ===
    // Precedence (lowest to highest):
    // 1. Comparison: =, <>, <, <=, >, >=
    // 2. Concatenation: &
    // 3. Addition/Subtraction: +, -
    // 4. Multiplication/Division: *, /
    // 5. Exponentiation: ^
    // 6. Unary: -, %
    // 7. Range: :
    // 8. Primary: literals, references, function calls, parentheses

    fn parse_expression(&mut self) -> ParseResult<FormulaExpr> {
        self.parse_comparison()
    }

    fn binary(op: BinaryOperator, left: FormulaExpr, right: FormulaExpr) -> FormulaExpr {
        FormulaExpr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn parse_comparison(&mut self) -> ParseResult<FormulaExpr> {
        let mut left = self.parse_concatenation()?;

        loop {
            let op = match self.current_token() {
                Token::Equal => BinaryOperator::Equal,
                Token::NotEqual => BinaryOperator::NotEqual,
                Token::LessThan => BinaryOperator::LessThan,
                Token::LessEqual => BinaryOperator::LessEqual,
                Token::GreaterThan => BinaryOperator::GreaterThan,
                Token::GreaterEqual => BinaryOperator::GreaterEqual,
                _ => break,
            };

            self.consume();
            let right = self.parse_concatenation()?;
            left = Self::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_concatenation(&mut self) -> ParseResult<FormulaExpr> {
        let mut left = self.parse_additive()?;

        while matches!(self.current_token(), Token::Ampersand) {
            self.consume();
            let right = self.parse_additive()?;
            left = Self::binary(BinaryOperator::Concat, left, right);
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> ParseResult<FormulaExpr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current_token() {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };

            self.consume();
            let right = self.parse_multiplicative()?;
            left = Self::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> ParseResult<FormulaExpr> {
        let mut left = self.parse_exponent()?;

        loop {
            let op = match self.current_token() {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                _ => break,
            };

            self.consume();
            let right = self.parse_exponent()?;
            left = Self::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_exponent(&mut self) -> ParseResult<FormulaExpr> {
        let left = self.parse_unary()?;

        if matches!(self.current_token(), Token::Caret) {
            self.consume();
            let right = self.parse_exponent()?; // Right associative
            return Ok(Self::binary(BinaryOperator::Power, left, right));
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<FormulaExpr> {
        if matches!(self.current_token(), Token::Minus) {
            self.consume();
            let operand = self.parse_unary()?;
            return Ok(FormulaExpr::UnaryOp {
                op: UnaryOperator::Negate,
                operand: Box::new(operand),
            });
        }

        // Prefix plus is a no-op
        if matches!(self.current_token(), Token::Plus) {
            self.consume();
            return self.parse_unary();
        }

        let mut expr = self.parse_range()?;

        while matches!(self.current_token(), Token::Percent) {
            self.consume();
            expr = FormulaExpr::UnaryOp {
                op: UnaryOperator::Percent,
                operand: Box::new(expr),
            };
        }

        Ok(expr)
    }

    fn parse_range(&mut self) -> ParseResult<FormulaExpr> {
        let start = self.token_start;
        let left = self.parse_primary()?;

        if !matches!(self.current_token(), Token::Colon) {
            return Ok(left);
        }
        self.consume();
        let right = self.parse_primary()?;

        match (left, right) {
            (FormulaExpr::CellRef(first), FormulaExpr::CellRef(last)) => {
                if last.sheet.is_some() && last.sheet != first.sheet {
                    return Err(self.error(
                        start,
                        ParseErrorKind::InvalidReference(
                            "Range references must be on the same sheet".into(),
                        ),
                    ));
                }
                Ok(FormulaExpr::RangeRef(RangeReference {
                    sheet: first.sheet,
                    range: CellRange::new(first.address, last.address),
                }))
            }
            _ => Err(self.error(
                start,
                ParseErrorKind::Unsupported(
                    "Range operator ':' is only supported between cell references".into(),
                ),
            )),
        }
    }

    fn parse_primary(&mut self) -> ParseResult<FormulaExpr> {
        let start = self.token_start;

        match self.consume() {
            Token::Number(n) => Ok(FormulaExpr::Number(n)),
            Token::String(s) => Ok(FormulaExpr::String(s)),
            Token::Boolean(b) => Ok(FormulaExpr::Boolean(b)),

            Token::LeftParen => {
                let expr = self.parse_expression()?;
                self.expect(&Token::RightParen)?;
                Ok(expr)
            }

            Token::SheetRef(sheet) => {
                let ref_start = self.token_start;
                match self.consume() {
                    Token::CellRef(address) => Ok(FormulaExpr::CellRef(CellReference {
                        sheet: Some(sheet),
                        address,
                    })),
                    Token::Bad(kind) => Err(self.error(ref_start, kind)),
                    _ => Err(self.error(
                        ref_start,
                        ParseErrorKind::Syntax("Expected cell reference after sheet name".into()),
                    )),
                }
            }

            Token::CellRef(address) => Ok(FormulaExpr::CellRef(CellReference {
                sheet: None,
                address,
            })),

            Token::Identifier(name) => {
                if matches!(self.current_token(), Token::LeftParen) {
                    self.parse_function_call(name, start)
                } else {
                    Ok(FormulaExpr::NameRef(name))
                }
            }

            Token::Bad(kind) => Err(self.error(start, kind)),

            Token::Eof => Err(self.error(
                start,
                ParseErrorKind::Syntax("Unexpected end of formula".into()),
            )),

            other => Err(self.error(
                start,
                ParseErrorKind::Syntax(format!("Unexpected {}", other.describe())),
            )),
        }
    }

    fn parse_function_call(&mut self, name: String, start: usize) -> ParseResult<FormulaExpr> {
        let def = functions::lookup(&name).ok_or_else(|| {
            self.error(
                start,
                ParseErrorKind::Unsupported(format!(
                    "Unsupported function {}",
                    name.to_uppercase()
                )),
            )
        })?;

        self.expect(&Token::LeftParen)?;

        let mut args = Vec::new();
        if !matches!(self.current_token(), Token::RightParen) {
            args.push(self.parse_expression()?);

            while matches!(self.current_token(), Token::Comma) {
                self.consume();
                args.push(self.parse_expression()?);
            }
        }

        self.expect(&Token::RightParen)?;

        if !def.accepts(args.len()) {
            return Err(self.error(
                start,
                ParseErrorKind::Unsupported(format!(
                    "{} expects {} arguments, got {}",
                    def.name,
                    def.arity(),
                    args.len()
                )),
            ));
        }

        Ok(match def.callable {
            Callable::Function(function) => FormulaExpr::Function { function, args },
            Callable::Aggregator(aggregator) => FormulaExpr::Aggregate { aggregator, args },
        })
    }
}
