//! Rate expressions.
//!
//! A rate is an arithmetic tree over numbers, named parameters and agent
//! patterns. An agent pattern `[A{_}::cell]` stands for the number of
//! complexes in the current state it is compatible with. Before state-space
//! generation the patterns can be vectorized into index masks over the
//! model's ordering of complexes, after which evaluation is a masked sum.
//!
//! Evaluation fails soft: a result that is zero, negative, not finite, or
//! needs a parameter with no value yields `None`, which disables the rule
//! in that state.

use crate::complex::{Complex, NotationError};
use crate::multiset::Multiset;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops;
use std::str::FromStr;
use thiserror::Error;

/// Parameter name -> value.
pub type Definitions = BTreeMap<String, f64>;

/// Malformed rate text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateError {
    #[error("unexpected `{found}` at offset {offset} in rate expression")]
    Unexpected { found: String, offset: usize },
    #[error("unexpected end of rate expression")]
    UnexpectedEnd,
    #[error("invalid agent pattern in rate: {0}")]
    Agent(#[from] NotationError),
}

/// Node of a rate expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum RateExpr {
    Number(f64),
    Param(String),
    /// Count of state complexes compatible with the pattern.
    Agent(Complex),
    /// Vectorized agent: positions in the ordering whose counts are summed.
    Mask(Vec<usize>),
    Neg(Box<RateExpr>),
    Add(Box<RateExpr>, Box<RateExpr>),
    Sub(Box<RateExpr>, Box<RateExpr>),
    Mul(Box<RateExpr>, Box<RateExpr>),
    Div(Box<RateExpr>, Box<RateExpr>),
    Pow(Box<RateExpr>, Box<RateExpr>),
}

impl RateExpr {
    fn precedence(&self) -> u8 {
        match self {
            RateExpr::Add(..) | RateExpr::Sub(..) => 1,
            RateExpr::Mul(..) | RateExpr::Div(..) => 2,
            RateExpr::Neg(..) => 3,
            RateExpr::Pow(..) => 4,
            _ => 5,
        }
    }

    fn map_leaves<F>(&self, leaf: &mut F) -> RateExpr
    where
        F: FnMut(&RateExpr) -> Option<RateExpr>,
    {
        if let Some(replaced) = leaf(self) {
            return replaced;
        }
        match self {
            RateExpr::Neg(inner) => RateExpr::Neg(Box::new(inner.map_leaves(leaf))),
            RateExpr::Add(l, r) => {
                RateExpr::Add(Box::new(l.map_leaves(leaf)), Box::new(r.map_leaves(leaf)))
            }
            RateExpr::Sub(l, r) => {
                RateExpr::Sub(Box::new(l.map_leaves(leaf)), Box::new(r.map_leaves(leaf)))
            }
            RateExpr::Mul(l, r) => {
                RateExpr::Mul(Box::new(l.map_leaves(leaf)), Box::new(r.map_leaves(leaf)))
            }
            RateExpr::Div(l, r) => {
                RateExpr::Div(Box::new(l.map_leaves(leaf)), Box::new(r.map_leaves(leaf)))
            }
            RateExpr::Pow(l, r) => {
                RateExpr::Pow(Box::new(l.map_leaves(leaf)), Box::new(r.map_leaves(leaf)))
            }
            other => other.clone(),
        }
    }

    fn visit<'a>(&'a self, f: &mut impl FnMut(&'a RateExpr)) {
        f(self);
        match self {
            RateExpr::Neg(inner) => inner.visit(f),
            RateExpr::Add(l, r)
            | RateExpr::Sub(l, r)
            | RateExpr::Mul(l, r)
            | RateExpr::Div(l, r)
            | RateExpr::Pow(l, r) => {
                l.visit(f);
                r.visit(f);
            }
            _ => {}
        }
    }

    fn eval(&self, leaf: &impl Fn(&RateExpr) -> Option<f64>) -> Option<f64> {
        Some(match self {
            RateExpr::Number(x) => *x,
            RateExpr::Param(_) | RateExpr::Agent(_) | RateExpr::Mask(_) => leaf(self)?,
            RateExpr::Neg(inner) => -inner.eval(leaf)?,
            RateExpr::Add(l, r) => l.eval(leaf)? + r.eval(leaf)?,
            RateExpr::Sub(l, r) => l.eval(leaf)? - r.eval(leaf)?,
            RateExpr::Mul(l, r) => l.eval(leaf)? * r.eval(leaf)?,
            RateExpr::Div(l, r) => l.eval(leaf)? / r.eval(leaf)?,
            RateExpr::Pow(l, r) => l.eval(leaf)?.powf(r.eval(leaf)?),
        })
    }
}

/// Writes an operand, parenthesized when it binds looser than its parent.
///
/// `strict` also parenthesizes equal precedence, for right operands of
/// non-associative operators and the base of a power.
fn write_operand(f: &mut fmt::Formatter<'_>, operand: &RateExpr, parent: u8, strict: bool) -> fmt::Result {
    let needs = if strict {
        operand.precedence() <= parent
    } else {
        operand.precedence() < parent
    };
    if needs {
        write!(f, "({})", operand)
    } else {
        write!(f, "{}", operand)
    }
}

impl fmt::Display for RateExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prec = self.precedence();
        let (l, op, r, strict) = match self {
            RateExpr::Number(x) => return write!(f, "{}", x),
            RateExpr::Param(name) => return write!(f, "{}", name),
            RateExpr::Agent(complex) => return write!(f, "[{}]", complex),
            RateExpr::Mask(indices) => {
                write!(f, "(")?;
                for (i, index) in indices.iter().enumerate() {
                    if i > 0 {
                        write!(f, " + ")?;
                    }
                    write!(f, "y[{}]", index)?;
                }
                if indices.is_empty() {
                    write!(f, "0")?;
                }
                return write!(f, ")");
            }
            RateExpr::Neg(inner) => {
                write!(f, "-")?;
                return write_operand(f, inner, prec, false);
            }
            RateExpr::Add(l, r) => (l, "+", r, false),
            RateExpr::Sub(l, r) => (l, "-", r, true),
            RateExpr::Mul(l, r) => (l, "*", r, false),
            RateExpr::Div(l, r) => (l, "/", r, true),
            RateExpr::Pow(l, r) => {
                write_operand(f, l, prec, true)?;
                write!(f, "**")?;
                return write_operand(f, r, prec, false);
            }
        };
        write_operand(f, l, prec, false)?;
        write!(f, "{}", op)?;
        write_operand(f, r, prec, strict)
    }
}

/// A rate expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Rate(RateExpr);

impl Rate {
    pub fn new(expr: RateExpr) -> Self {
        Self(expr)
    }

    pub fn number(value: f64) -> Self {
        Self(RateExpr::Number(value))
    }

    pub fn param(name: impl Into<String>) -> Self {
        Self(RateExpr::Param(name.into()))
    }

    pub fn agent(complex: Complex) -> Self {
        Self(RateExpr::Agent(complex))
    }

    pub fn expr(&self) -> &RateExpr {
        &self.0
    }

    pub fn pow(self, exponent: Rate) -> Rate {
        Rate(RateExpr::Pow(Box::new(self.0), Box::new(exponent.0)))
    }

    /// Agent patterns occurring in the expression, in order of appearance.
    pub fn agents(&self) -> Vec<&Complex> {
        let mut found = Vec::new();
        self.0.visit(&mut |e| {
            if let RateExpr::Agent(complex) = e {
                found.push(complex);
            }
        });
        found
    }

    /// Names of parameters occurring in the expression.
    pub fn params(&self) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        self.0.visit(&mut |e| {
            if let RateExpr::Param(name) = e {
                found.insert(name.clone());
            }
        });
        found
    }

    /// Replaces every defined parameter by its value.
    pub fn substitute(&self, definitions: &Definitions) -> Rate {
        Rate(self.0.map_leaves(&mut |e| match e {
            RateExpr::Param(name) => definitions.get(name).map(|v| RateExpr::Number(*v)),
            _ => None,
        }))
    }

    /// Turns agent patterns into index masks over `ordering` and binds parameters.
    pub fn vectorize(&self, ordering: &[Complex], definitions: &Definitions) -> Rate {
        Rate(self.0.map_leaves(&mut |e| match e {
            RateExpr::Agent(complex) => Some(RateExpr::Mask(complex.identify_compatible(ordering))),
            RateExpr::Param(name) => definitions.get(name).map(|v| RateExpr::Number(*v)),
            _ => None,
        }))
    }

    /// Strips context from every agent pattern.
    pub fn reduce_context(&self) -> Rate {
        Rate(self.0.map_leaves(&mut |e| match e {
            RateExpr::Agent(complex) => Some(RateExpr::Agent(complex.reduce_context())),
            _ => None,
        }))
    }

    /// Evaluates against a multiset state.
    pub fn evaluate(&self, state: &Multiset, definitions: &Definitions) -> Option<f64> {
        let value = self.0.eval(&|leaf| match leaf {
            RateExpr::Param(name) => definitions.get(name).copied(),
            RateExpr::Agent(complex) => Some(state.count_compatible(complex) as f64),
            _ => None,
        })?;
        usable(value)
    }

    /// Evaluates a vectorized rate against counts laid out along the ordering.
    pub fn evaluate_vector(&self, counts: &[u32]) -> Option<f64> {
        let value = self.0.eval(&|leaf| match leaf {
            RateExpr::Mask(indices) => Some(
                indices
                    .iter()
                    .map(|&i| counts.get(i).copied().unwrap_or(0) as f64)
                    .sum(),
            ),
            _ => None,
        })?;
        usable(value)
    }
}

fn usable(value: f64) -> Option<f64> {
    (value.is_finite() && value > 0.0).then_some(value)
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<f64> for Rate {
    fn from(value: f64) -> Self {
        Rate::number(value)
    }
}

macro_rules! impl_rate_op {
    ($($trait:ident, $method:ident, $variant:ident);*) => {
        $(
            impl ops::$trait for Rate {
                type Output = Rate;
                fn $method(self, rhs: Rate) -> Rate {
                    Rate(RateExpr::$variant(Box::new(self.0), Box::new(rhs.0)))
                }
            }
        )*
    };
}

impl_rate_op!(Add, add, Add; Sub, sub, Sub; Mul, mul, Mul; Div, div, Div);

impl ops::Neg for Rate {
    type Output = Rate;
    fn neg(self) -> Rate {
        Rate(RateExpr::Neg(Box::new(self.0)))
    }
}

/// Parses `k1*[X()::rep]`, `(a+b)/2`, `k**2`, `-x`.
impl FromStr for Rate {
    type Err = RateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser { text: s, pos: 0 };
        let expr = parser.sum()?;
        parser.skip_ws();
        match parser.peek() {
            None => Ok(Rate(expr)),
            Some(c) => Err(RateError::Unexpected {
                found: c.to_string(),
                offset: parser.pos,
            }),
        }
    }
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn skip_ws(&mut self) {
        while let Some(c) = self.peek().filter(|c| c.is_whitespace()) {
            self.pos += c.len_utf8();
        }
    }

    fn take_while(&mut self, accept: impl Fn(char) -> bool) {
        while let Some(c) = self.peek().filter(|&c| accept(c)) {
            self.pos += c.len_utf8();
        }
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_ws();
        if self.text[self.pos..].starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn sum(&mut self) -> Result<RateExpr, RateError> {
        let mut left = self.product()?;
        loop {
            if self.eat("+") {
                left = RateExpr::Add(Box::new(left), Box::new(self.product()?));
            } else if self.eat("-") {
                left = RateExpr::Sub(Box::new(left), Box::new(self.product()?));
            } else {
                return Ok(left);
            }
        }
    }

    fn product(&mut self) -> Result<RateExpr, RateError> {
        let mut left = self.unary()?;
        loop {
            self.skip_ws();
            if self.text[self.pos..].starts_with("**") {
                return Ok(left);
            }
            if self.eat("*") {
                left = RateExpr::Mul(Box::new(left), Box::new(self.unary()?));
            } else if self.eat("/") {
                left = RateExpr::Div(Box::new(left), Box::new(self.unary()?));
            } else {
                return Ok(left);
            }
        }
    }

    fn unary(&mut self) -> Result<RateExpr, RateError> {
        if self.eat("-") {
            return Ok(RateExpr::Neg(Box::new(self.unary()?)));
        }
        self.power()
    }

    fn power(&mut self) -> Result<RateExpr, RateError> {
        let base = self.atom()?;
        if self.eat("**") || self.eat("^") {
            // Right associative.
            let exponent = self.unary()?;
            return Ok(RateExpr::Pow(Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<RateExpr, RateError> {
        self.skip_ws();
        let start = self.pos;
        let c = self.peek().ok_or(RateError::UnexpectedEnd)?;
        if c == '(' {
            self.pos += 1;
            let inner = self.sum()?;
            if !self.eat(")") {
                return Err(self.unexpected());
            }
            return Ok(inner);
        }
        if c == '[' {
            let end = self.text[start..].find(']').ok_or(RateError::UnexpectedEnd)? + start;
            let complex: Complex = self.text[start + 1..end].parse()?;
            self.pos = end + 1;
            return Ok(RateExpr::Agent(complex));
        }
        if c.is_ascii_digit() || c == '.' {
            self.take_while(|c| c.is_ascii_digit() || c == '.');
            if matches!(self.peek(), Some('e' | 'E')) {
                self.pos += 1;
                if matches!(self.peek(), Some('+' | '-')) {
                    self.pos += 1;
                }
                self.take_while(|c| c.is_ascii_digit());
            }
            return self.text[start..self.pos]
                .parse()
                .map(RateExpr::Number)
                .map_err(|_| RateError::Unexpected {
                    found: self.text[start..self.pos].to_string(),
                    offset: start,
                });
        }
        if c.is_ascii_alphabetic() || c == '_' {
            self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
            return Ok(RateExpr::Param(self.text[start..self.pos].to_string()));
        }
        Err(self.unexpected())
    }

    fn unexpected(&self) -> RateError {
        match self.peek() {
            Some(c) => RateError::Unexpected {
                found: c.to_string(),
                offset: self.pos,
            },
            None => RateError::UnexpectedEnd,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(entries: &[(&str, u32)]) -> Multiset {
        entries
            .iter()
            .map(|(c, n)| (c.parse::<Complex>().unwrap(), *n))
            .collect()
    }

    #[test]
    fn parses_and_renders() {
        let rate: Rate = "k1*[X()::rep]".parse().unwrap();
        assert_eq!(rate.to_string(), "k1*[X()::rep]");
        let rate: Rate = "(a+b)/(c-d)".parse().unwrap();
        assert_eq!(rate.to_string(), "(a+b)/(c-d)");
        let rate: Rate = "a-(b-c)".parse().unwrap();
        assert_eq!(rate.to_string(), "a-(b-c)");
        let rate: Rate = "k**2*x".parse().unwrap();
        assert_eq!(rate.to_string(), "k**2*x");
        assert!("k1*".parse::<Rate>().is_err());
        assert!("k1)".parse::<Rate>().is_err());
    }

    #[test]
    fn scientific_notation_constants() {
        let empty = Multiset::new();
        let defs = Definitions::new();
        for (text, value) in [("1e-5", 1e-5), ("2.5E+3", 2.5e3), ("3e2", 300.0), ("0.5", 0.5)] {
            let rate: Rate = text.parse().unwrap();
            assert_eq!(rate.evaluate(&empty, &defs), Some(value), "{text}");
        }
        let rate: Rate = "k1*1e-3".parse().unwrap();
        let defs = Definitions::from([("k1".to_string(), 2.0)]);
        assert_eq!(rate.evaluate(&empty, &defs), Some(2e-3));
        assert!("1e".parse::<Rate>().is_err());
        assert!("1e-".parse::<Rate>().is_err());
    }

    #[test]
    fn unicode_whitespace_and_symbols_do_not_split_characters() {
        let rate: Rate = "k1\u{00A0}* 2".parse().unwrap();
        assert_eq!(rate.to_string(), "k1*2");
        let rate: Rate = "\u{2003}k1\u{2003}+\u{3000}k2\u{2003}".parse().unwrap();
        assert_eq!(rate.params().len(), 2);
        assert!(matches!(
            "k1 \u{00D7} 2".parse::<Rate>(),
            Err(RateError::Unexpected { found, .. }) if found == "\u{00D7}"
        ));
        assert!("\u{00E9}k".parse::<Rate>().is_err());
    }

    #[test]
    fn agent_patterns_count_compatible_complexes() {
        let rate: Rate = "k1*[A{_}::c]".parse().unwrap();
        let defs = Definitions::from([("k1".to_string(), 0.5)]);
        let s = state(&[("A{i}::c", 2), ("A{a}::c", 2), ("B{i}::c", 7)]);
        assert_eq!(rate.evaluate(&s, &defs), Some(2.0));
        assert_eq!(rate.agents().len(), 1);
        assert_eq!(rate.params(), BTreeSet::from(["k1".to_string()]));
    }

    #[test]
    fn zero_or_unresolved_rates_disable() {
        let rate: Rate = "k1*[X()::rep]".parse().unwrap();
        let defs = Definitions::from([("k1".to_string(), 0.05)]);
        assert_eq!(rate.evaluate(&Multiset::new(), &defs), None);
        assert_eq!(rate.evaluate(&state(&[("X()::rep", 1)]), &Definitions::new()), None);
        let div: Rate = "1/0".parse().unwrap();
        assert_eq!(div.evaluate(&Multiset::new(), &defs), None);
    }

    #[test]
    fn vectorized_rate_matches_multiset_evaluation() {
        let ordering: Vec<Complex> = ["A{a}::c", "A{i}::c", "B{i}::c"]
            .iter()
            .map(|c| c.parse().unwrap())
            .collect();
        let defs = Definitions::from([("k".to_string(), 3.0)]);
        let rate: Rate = "k*[A{_}::c]+[B{i}::c]".parse().unwrap();
        let vectorized = rate.vectorize(&ordering, &defs);
        assert_eq!(vectorized.to_string(), "3*(y[0] + y[1])+(y[2])");
        let s = state(&[("A{i}::c", 1), ("B{i}::c", 2)]);
        assert_eq!(
            vectorized.evaluate_vector(&s.to_vector(&ordering)),
            rate.evaluate(&s, &defs)
        );
    }

    #[test]
    fn substitution_and_operators() {
        let rate = Rate::param("k") * Rate::number(2.0) + Rate::number(1.0);
        let bound = rate.substitute(&Definitions::from([("k".to_string(), 4.0)]));
        assert_eq!(bound.to_string(), "4*2+1");
        assert!(bound.params().is_empty());
        assert_eq!(bound.evaluate(&Multiset::new(), &Definitions::new()), Some(9.0));
    }
}
