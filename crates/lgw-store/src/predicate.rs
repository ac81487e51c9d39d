//! Filter and join predicates over projected contracts.
//!
//! Predicates are data: a small expression tree over the `contract_id`
//! column and JSON paths into the `payload` column, compared against
//! positional parameters, literals, or other columns. The textual form
//! follows SQL:
//!
//! ```text
//! user = ? AND provider = ?
//! prim.licenseNum = sec.licenseNum AND prim.user = sec.user
//! payload->'settlement'->'settlementRef'->>'id' = ?
//! NOT (expiresAt IS NULL) OR contract_id = 'x'
//! ```
//!
//! `prim.` and `sec.` select the side of a join; unprefixed columns belong
//! to the primary template. A bare dotted path is a payload path, so
//! `settlement.settlementRef.id` and `payload.settlement.settlementRef.id`
//! are the same column.

use std::fmt;

use lgw_types::Party;

use crate::error::{StoreError, StoreResult};

/// A positional query parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Param {
    Text(String),
    Int(i64),
    Bool(bool),
}

impl From<&str> for Param {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Param {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&Party> for Param {
    fn from(v: &Party) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for Param {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Self::Int(i) => write!(f, "{i}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Primary,
    Secondary,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Column {
    ContractId(Side),
    /// JSON path into the payload, outermost field first.
    Payload(Side, Vec<String>),
}

impl Column {
    pub fn contract_id() -> Self {
        Self::ContractId(Side::Primary)
    }

    pub fn payload<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Payload(Side::Primary, path.into_iter().map(Into::into).collect())
    }

    pub fn side(&self) -> Side {
        match self {
            Self::ContractId(side) | Self::Payload(side, _) => *side,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    Column(Column),
    /// Zero-based position among the `?` placeholders.
    Param(usize),
    Literal(Param),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    pub fn is_ordering(self) -> bool {
        !matches!(self, Self::Eq | Self::Ne)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Predicate {
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    IsNull {
        column: Column,
        negated: bool,
    },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    /// Parse the textual form.
    pub fn parse(input: &str) -> StoreResult<Self> {
        let tokens = tokenize(input)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            params: 0,
            end: input.len(),
        };
        let predicate = parser.parse_or()?;
        if let Some((offset, tok)) = parser.tokens.get(parser.pos) {
            return Err(StoreError::predicate(*offset, format!("unexpected {tok:?}")));
        }
        Ok(predicate)
    }

    pub fn compare(left: Operand, op: CompareOp, right: Operand) -> Self {
        Self::Compare { left, op, right }
    }

    pub fn and(self, other: Predicate) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Predicate) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Number of `?` placeholders.
    pub fn param_count(&self) -> usize {
        let mut max = None;
        self.visit_operands(&mut |op| {
            if let Operand::Param(i) = op {
                max = Some(max.map_or(*i, |m: usize| m.max(*i)));
            }
        });
        max.map_or(0, |m| m + 1)
    }

    /// Whether any column refers to the secondary side of a join.
    pub fn references_secondary(&self) -> bool {
        let mut found = false;
        self.visit_columns(&mut |c| found |= c.side() == Side::Secondary);
        found
    }

    fn visit_operands(&self, f: &mut impl FnMut(&Operand)) {
        match self {
            Self::Compare { left, right, .. } => {
                f(left);
                f(right);
            }
            Self::IsNull { .. } => {}
            Self::And(a, b) | Self::Or(a, b) => {
                a.visit_operands(f);
                b.visit_operands(f);
            }
            Self::Not(p) => p.visit_operands(f),
        }
    }

    fn visit_columns(&self, f: &mut impl FnMut(&Column)) {
        match self {
            Self::IsNull { column, .. } => f(column),
            Self::And(a, b) | Self::Or(a, b) => {
                a.visit_columns(f);
                b.visit_columns(f);
            }
            Self::Not(p) => p.visit_columns(f),
            Self::Compare { .. } => self.visit_operands(&mut |op| {
                if let Operand::Column(c) = op {
                    f(c);
                }
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Tok {
    Ident(String),
    Str(String),
    Int(i64),
    Question,
    LParen,
    RParen,
    Dot,
    Arrow,
    Op(CompareOp),
    And,
    Or,
    Not,
    Is,
    Null,
    True,
    False,
}

fn tokenize(input: &str) -> StoreResult<Vec<(usize, Tok)>> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut out = Vec::new();
    let mut i = 0;
    let peek = |i: usize| chars.get(i).map(|(_, c)| *c);

    while let Some(&(offset, c)) = chars.get(i) {
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                out.push((offset, Tok::LParen));
                i += 1;
            }
            ')' => {
                out.push((offset, Tok::RParen));
                i += 1;
            }
            '.' => {
                out.push((offset, Tok::Dot));
                i += 1;
            }
            '?' => {
                out.push((offset, Tok::Question));
                i += 1;
            }
            '=' => {
                out.push((offset, Tok::Op(CompareOp::Eq)));
                i += 1;
            }
            '!' if peek(i + 1) == Some('=') => {
                out.push((offset, Tok::Op(CompareOp::Ne)));
                i += 2;
            }
            '<' => {
                let (op, len) = match peek(i + 1) {
                    Some('=') => (CompareOp::Le, 2),
                    Some('>') => (CompareOp::Ne, 2),
                    _ => (CompareOp::Lt, 1),
                };
                out.push((offset, Tok::Op(op)));
                i += len;
            }
            '>' => {
                let (op, len) = match peek(i + 1) {
                    Some('=') => (CompareOp::Ge, 2),
                    _ => (CompareOp::Gt, 1),
                };
                out.push((offset, Tok::Op(op)));
                i += len;
            }
            '-' if peek(i + 1) == Some('>') => {
                out.push((offset, Tok::Arrow));
                i += if peek(i + 2) == Some('>') { 3 } else { 2 };
            }
            '\'' | '"' => {
                let quote = c;
                let mut value = String::new();
                i += 1;
                loop {
                    match peek(i) {
                        None => {
                            return Err(StoreError::predicate(offset, "unterminated quoted text"))
                        }
                        Some(q) if q == quote && peek(i + 1) == Some(quote) => {
                            value.push(quote);
                            i += 2;
                        }
                        Some(q) if q == quote => {
                            i += 1;
                            break;
                        }
                        Some(other) => {
                            value.push(other);
                            i += 1;
                        }
                    }
                }
                let tok = if quote == '"' { Tok::Ident(value) } else { Tok::Str(value) };
                out.push((offset, tok));
            }
            c if c.is_ascii_digit()
                || (c == '-' && peek(i + 1).is_some_and(|d| d.is_ascii_digit())) =>
            {
                let start = i;
                i += 1;
                while peek(i).is_some_and(|d| d.is_ascii_digit()) {
                    i += 1;
                }
                let text: String = chars[start..i].iter().map(|(_, c)| *c).collect();
                let value = text.parse::<i64>().map_err(|_| {
                    StoreError::predicate(offset, format!("integer {text} out of range"))
                })?;
                out.push((offset, Tok::Int(value)));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while peek(i).is_some_and(|d| d.is_alphanumeric() || d == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().map(|(_, c)| *c).collect();
                let tok = match word.to_ascii_uppercase().as_str() {
                    "AND" => Tok::And,
                    "OR" => Tok::Or,
                    "NOT" => Tok::Not,
                    "IS" => Tok::Is,
                    "NULL" => Tok::Null,
                    "TRUE" => Tok::True,
                    "FALSE" => Tok::False,
                    _ => Tok::Ident(word),
                };
                out.push((offset, tok));
            }
            other => {
                return Err(StoreError::predicate(
                    offset,
                    format!("unexpected character {other:?}"),
                ))
            }
        }
    }
    Ok(out)
}

struct Parser {
    tokens: Vec<(usize, Tok)>,
    pos: usize,
    params: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(o, _)| *o)
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn next(&mut self) -> Option<(usize, Tok)> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn parse_or(&mut self) -> StoreResult<Predicate> {
        let mut left = self.parse_and()?;
        while self.eat(&Tok::Or) {
            left = left.or(self.parse_and()?);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> StoreResult<Predicate> {
        let mut left = self.parse_unary()?;
        while self.eat(&Tok::And) {
            left = left.and(self.parse_unary()?);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> StoreResult<Predicate> {
        if self.eat(&Tok::Not) {
            return Ok(self.parse_unary()?.negate());
        }
        if self.eat(&Tok::LParen) {
            let inner = self.parse_or()?;
            if !self.eat(&Tok::RParen) {
                return Err(StoreError::predicate(self.offset(), "expected ')'"));
            }
            return Ok(inner);
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> StoreResult<Predicate> {
        let left_offset = self.offset();
        let left = self.parse_operand()?;
        if self.eat(&Tok::Is) {
            let negated = self.eat(&Tok::Not);
            if !self.eat(&Tok::Null) {
                return Err(StoreError::predicate(self.offset(), "expected NULL"));
            }
            let Operand::Column(column) = left else {
                return Err(StoreError::predicate(left_offset, "IS NULL needs a column"));
            };
            return Ok(Predicate::IsNull { column, negated });
        }
        let op = match self.next() {
            Some((_, Tok::Op(op))) => op,
            Some((offset, tok)) => {
                return Err(StoreError::predicate(
                    offset,
                    format!("expected comparison, found {tok:?}"),
                ))
            }
            None => return Err(StoreError::predicate(self.end, "expected comparison")),
        };
        let right = self.parse_operand()?;
        if !matches!(left, Operand::Column(_)) && !matches!(right, Operand::Column(_)) {
            return Err(StoreError::predicate(left_offset, "comparison needs at least one column"));
        }
        Ok(Predicate::Compare { left, op, right })
    }

    fn parse_operand(&mut self) -> StoreResult<Operand> {
        match self.next() {
            Some((_, Tok::Question)) => {
                let index = self.params;
                self.params += 1;
                Ok(Operand::Param(index))
            }
            Some((_, Tok::Str(s))) => Ok(Operand::Literal(Param::Text(s))),
            Some((_, Tok::Int(i))) => Ok(Operand::Literal(Param::Int(i))),
            Some((_, Tok::True)) => Ok(Operand::Literal(Param::Bool(true))),
            Some((_, Tok::False)) => Ok(Operand::Literal(Param::Bool(false))),
            Some((offset, Tok::Ident(first))) => {
                self.parse_column(offset, first).map(Operand::Column)
            }
            Some((offset, tok)) => Err(StoreError::predicate(
                offset,
                format!("expected operand, found {tok:?}"),
            )),
            None => Err(StoreError::predicate(self.end, "expected operand")),
        }
    }

    fn parse_column(&mut self, offset: usize, first: String) -> StoreResult<Column> {
        let mut segments = vec![first];
        while self.eat(&Tok::Dot) {
            match self.next() {
                Some((_, Tok::Ident(seg))) => segments.push(seg),
                _ => {
                    return Err(StoreError::predicate(
                        self.offset(),
                        "expected field name after '.'",
                    ))
                }
            }
        }

        let side = match segments[0].to_ascii_lowercase().as_str() {
            "prim" => Some(Side::Primary),
            "sec" => Some(Side::Secondary),
            _ => None,
        };
        if side.is_some() {
            segments.remove(0);
        }
        let side = side.unwrap_or(Side::Primary);

        let has_arrows = self.peek() == Some(&Tok::Arrow);
        let head = segments.first().cloned();
        match head.as_deref() {
            None => return Err(StoreError::predicate(offset, "expected column after alias")),
            Some("contract_id") if segments.len() == 1 && !has_arrows => {
                return Ok(Column::ContractId(side));
            }
            Some("contract_id") => {
                return Err(StoreError::predicate(offset, "contract_id has no fields"));
            }
            Some("payload") => {
                segments.remove(0);
            }
            Some(_) => {}
        }

        while self.eat(&Tok::Arrow) {
            match self.next() {
                Some((_, Tok::Str(seg))) => segments.push(seg),
                _ => {
                    return Err(StoreError::predicate(
                        self.offset(),
                        "expected quoted field after '->'",
                    ))
                }
            }
        }
        if segments.is_empty() {
            return Err(StoreError::predicate(offset, "payload column needs a field path"));
        }
        Ok(Column::Payload(side, segments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(path: &[&str]) -> Operand {
        Operand::Column(Column::payload(path.iter().copied()))
    }

    #[test]
    fn parses_conjunction_with_params() {
        let p = Predicate::parse("user = ? AND provider = ?").unwrap();
        assert_eq!(
            p,
            Predicate::compare(field(&["user"]), CompareOp::Eq, Operand::Param(0))
                .and(Predicate::compare(field(&["provider"]), CompareOp::Eq, Operand::Param(1)))
        );
        assert_eq!(p.param_count(), 2);
    }

    #[test]
    fn dotted_and_arrow_paths_agree() {
        let dotted = Predicate::parse("settlement.settlementRef.id = ?").unwrap();
        let arrows = Predicate::parse("payload->'settlement'->'settlementRef'->>'id' = ?").unwrap();
        let prefixed = Predicate::parse("payload.settlement.settlementRef.id = ?").unwrap();
        assert_eq!(dotted, arrows);
        assert_eq!(dotted, prefixed);
    }

    #[test]
    fn join_sides() {
        let p =
            Predicate::parse("prim.licenseNum = sec.licenseNum AND prim.user = sec.user").unwrap();
        assert!(p.references_secondary());
        assert_eq!(p.param_count(), 0);
        let Predicate::And(first, _) = p else {
            panic!("expected AND");
        };
        assert_eq!(
            *first,
            Predicate::compare(
                Operand::Column(Column::Payload(Side::Primary, vec!["licenseNum".into()])),
                CompareOp::Eq,
                Operand::Column(Column::Payload(Side::Secondary, vec!["licenseNum".into()])),
            )
        );
        assert!(!Predicate::parse("user = ?").unwrap().references_secondary());
    }

    #[test]
    fn precedence_and_grouping() {
        let p = Predicate::parse("a = ? OR b = ? AND c = ?").unwrap();
        assert!(matches!(p, Predicate::Or(_, ref rhs) if matches!(**rhs, Predicate::And(_, _))));
        let p = Predicate::parse("(a = ? OR b = ?) AND NOT c IS NULL").unwrap();
        let Predicate::And(lhs, rhs) = p else {
            panic!("expected AND");
        };
        assert!(matches!(*lhs, Predicate::Or(_, _)));
        assert!(matches!(*rhs, Predicate::Not(_)));
    }

    #[test]
    fn literals_and_null_checks() {
        let source = "contract_id = 'it''s' AND n >= -3 AND flag = true AND x IS NOT NULL";
        let p = Predicate::parse(source).unwrap();
        assert_eq!(p.param_count(), 0);
        let text = Predicate::parse("contract_id <> 'it''s'").unwrap();
        assert_eq!(
            text,
            Predicate::compare(
                Operand::Column(Column::contract_id()),
                CompareOp::Ne,
                Operand::Literal(Param::Text("it's".into()))
            )
        );
    }

    #[test]
    fn quoted_identifiers() {
        let p = Predicate::parse("\"odd-name\" = ?").unwrap();
        assert_eq!(p, Predicate::compare(field(&["odd-name"]), CompareOp::Eq, Operand::Param(0)));
    }

    #[test]
    fn rejects_code_and_garbage() {
        for bad in [
            "",
            "user = ? ;DROP TABLE x",
            "user = ? AND",
            "(user = ?",
            "? = ?",
            "contract_id.x = ?",
            "prim = ?",
            "user LIKE ?",
            "'unterminated = ?",
            "5 IS NULL",
        ] {
            assert!(
                matches!(Predicate::parse(bad), Err(StoreError::InvalidPredicate { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn param_display_escapes_quotes() {
        assert_eq!(Param::from("o'brien").to_string(), "'o''brien'");
        assert_eq!(Param::from(7i64).to_string(), "7");
    }
}
