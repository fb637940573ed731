//! Sandboxed expression evaluator for condition, formula, and math
//! expressions.
//!
//! Custom checks carry small expressions over record fields:
//! `{total_incl_vat} - {vat_amount}` or
//! `{currency} != "AED" && {exchange_rate} > 0`. These are parsed into an
//! AST and interpreted against a single record; field references are
//! resolved at evaluation time, never substituted into source text, and no
//! dynamic code execution is involved.
//!
//! Grammar (comparisons do not chain):
//!
//! ```text
//! expr   := and ( ("||" | "or") and )*
//! and    := unary ( ("&&" | "and") unary )*
//! unary  := ("!" | "not") unary | cmp
//! cmp    := sum ( ("=" | "==" | "!=" | "<>" | ">" | "<" | ">=" | "<=") sum )?
//! sum    := term ( ("+" | "-") term )*
//! term   := factor ( ("*" | "/") factor )*
//! factor := number | string | "true" | "false" | "null"
//!         | "{" field-path "}" | "(" expr ")" | "-" factor
//! ```

use einv_model::Record;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExprError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("eval error: {0}")]
    Eval(String),
}

/// Runtime value of an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprValue {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
}

impl ExprValue {
    /// Truthiness for condition/formula results: false, zero, empty string,
    /// and null are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            ExprValue::Null => false,
            ExprValue::Bool(b) => *b,
            ExprValue::Num(n) => *n != 0.0,
            ExprValue::Str(s) => !s.is_empty(),
        }
    }
}

impl fmt::Display for ExprValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprValue::Null => write!(f, "null"),
            ExprValue::Bool(b) => write!(f, "{b}"),
            ExprValue::Num(n) => write!(f, "{n}"),
            ExprValue::Str(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    And,
    Or,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Lit(ExprValue),
    Field(String),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(f64),
    Str(String),
    Field(String),
    True,
    False,
    Null,
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    And,
    Or,
    Not,
}

fn lex(src: &str) -> Result<Vec<Tok>, ExprError> {
    let mut toks = Vec::new();
    let mut chars = src.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '0'..='9' => {
                let mut buf = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        buf.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let n = buf
                    .parse::<f64>()
                    .map_err(|_| ExprError::Parse(format!("bad number literal: {buf}")))?;
                toks.push(Tok::Num(n));
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut buf = String::new();
                loop {
                    match chars.next() {
                        Some(ch) if ch == quote => break,
                        Some(ch) => buf.push(ch),
                        None => return Err(ExprError::Parse("unterminated string".to_string())),
                    }
                }
                toks.push(Tok::Str(buf));
            }
            '{' => {
                chars.next();
                let mut buf = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => buf.push(ch),
                        None => {
                            return Err(ExprError::Parse("unterminated field reference".to_string()));
                        }
                    }
                }
                let name = buf.trim().to_string();
                if name.is_empty() {
                    return Err(ExprError::Parse("empty field reference".to_string()));
                }
                toks.push(Tok::Field(name));
            }
            '+' => {
                chars.next();
                toks.push(Tok::Plus);
            }
            '-' => {
                chars.next();
                toks.push(Tok::Minus);
            }
            '*' => {
                chars.next();
                toks.push(Tok::Star);
            }
            '/' => {
                chars.next();
                toks.push(Tok::Slash);
            }
            '(' => {
                chars.next();
                toks.push(Tok::LParen);
            }
            ')' => {
                chars.next();
                toks.push(Tok::RParen);
            }
            '=' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                }
                toks.push(Tok::Eq);
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    toks.push(Tok::Ne);
                } else {
                    toks.push(Tok::Not);
                }
            }
            '<' => {
                chars.next();
                match chars.peek() {
                    Some('=') => {
                        chars.next();
                        toks.push(Tok::Le);
                    }
                    Some('>') => {
                        chars.next();
                        toks.push(Tok::Ne);
                    }
                    _ => toks.push(Tok::Lt),
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    toks.push(Tok::Ge);
                } else {
                    toks.push(Tok::Gt);
                }
            }
            '&' => {
                chars.next();
                if chars.peek() == Some(&'&') {
                    chars.next();
                    toks.push(Tok::And);
                } else {
                    return Err(ExprError::Parse("expected '&&'".to_string()));
                }
            }
            '|' => {
                chars.next();
                if chars.peek() == Some(&'|') {
                    chars.next();
                    toks.push(Tok::Or);
                } else {
                    return Err(ExprError::Parse("expected '||'".to_string()));
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut buf = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' {
                        buf.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match buf.to_lowercase().as_str() {
                    "true" => toks.push(Tok::True),
                    "false" => toks.push(Tok::False),
                    "null" => toks.push(Tok::Null),
                    "and" => toks.push(Tok::And),
                    "or" => toks.push(Tok::Or),
                    "not" => toks.push(Tok::Not),
                    _ => {
                        return Err(ExprError::Parse(format!(
                            "bare identifier '{buf}' (field references use {{braces}})"
                        )));
                    }
                }
            }
            other => return Err(ExprError::Parse(format!("unexpected character '{other}'"))),
        }
    }
    Ok(toks)
}

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.toks.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn parse_expr(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Tok::Or) {
            self.next();
            let right = self.parse_and()?;
            left = Expr::Binary(BinOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_unary()?;
        while self.peek() == Some(&Tok::And) {
            self.next();
            let right = self.parse_unary()?;
            left = Expr::Binary(BinOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        if self.peek() == Some(&Tok::Not) {
            self.next();
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_cmp()
    }

    fn parse_cmp(&mut self) -> Result<Expr, ExprError> {
        let left = self.parse_sum()?;
        let op = match self.peek() {
            Some(Tok::Eq) => Some(BinOp::Eq),
            Some(Tok::Ne) => Some(BinOp::Ne),
            Some(Tok::Gt) => Some(BinOp::Gt),
            Some(Tok::Lt) => Some(BinOp::Lt),
            Some(Tok::Ge) => Some(BinOp::Ge),
            Some(Tok::Le) => Some(BinOp::Le),
            _ => None,
        };
        let Some(op) = op else {
            return Ok(left);
        };
        self.next();
        let right = self.parse_sum()?;
        // A second comparison operator means chaining (a < b < c), which
        // the grammar rejects.
        if matches!(
            self.peek(),
            Some(Tok::Eq | Tok::Ne | Tok::Gt | Tok::Lt | Tok::Ge | Tok::Le)
        ) {
            return Err(ExprError::Parse(
                "comparison chaining is not supported".to_string(),
            ));
        }
        Ok(Expr::Binary(op, Box::new(left), Box::new(right)))
    }

    fn parse_sum(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Plus) => BinOp::Add,
                Some(Tok::Minus) => BinOp::Sub,
                _ => break,
            };
            self.next();
            let right = self.parse_term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Star) => BinOp::Mul,
                Some(Tok::Slash) => BinOp::Div,
                _ => break,
            };
            self.next();
            let right = self.parse_factor()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expr, ExprError> {
        match self.next() {
            Some(Tok::Num(n)) => Ok(Expr::Lit(ExprValue::Num(n))),
            Some(Tok::Str(s)) => Ok(Expr::Lit(ExprValue::Str(s))),
            Some(Tok::True) => Ok(Expr::Lit(ExprValue::Bool(true))),
            Some(Tok::False) => Ok(Expr::Lit(ExprValue::Bool(false))),
            Some(Tok::Null) => Ok(Expr::Lit(ExprValue::Null)),
            Some(Tok::Field(name)) => Ok(Expr::Field(name)),
            Some(Tok::Minus) => {
                let inner = self.parse_factor()?;
                Ok(Expr::Neg(Box::new(inner)))
            }
            Some(Tok::LParen) => {
                let inner = self.parse_expr()?;
                match self.next() {
                    Some(Tok::RParen) => Ok(inner),
                    _ => Err(ExprError::Parse("expected ')'".to_string())),
                }
            }
            other => Err(ExprError::Parse(format!("unexpected token: {other:?}"))),
        }
    }
}

/// Parse an expression once; the returned AST can be evaluated against any
/// number of records.
pub fn parse(src: &str) -> Result<Expr, ExprError> {
    let toks = lex(src)?;
    if toks.is_empty() {
        return Err(ExprError::Parse("empty expression".to_string()));
    }
    let mut parser = Parser { toks, pos: 0 };
    let expr = parser.parse_expr()?;
    if parser.pos != parser.toks.len() {
        return Err(ExprError::Parse(format!(
            "trailing tokens at position {}",
            parser.pos
        )));
    }
    Ok(expr)
}

impl Expr {
    pub fn eval(&self, record: &Record) -> Result<ExprValue, ExprError> {
        match self {
            Expr::Lit(v) => Ok(v.clone()),
            Expr::Field(path) => Ok(resolve_field(record, path)),
            Expr::Neg(inner) => {
                let n = as_number(&inner.eval(record)?)?;
                Ok(ExprValue::Num(-n))
            }
            Expr::Not(inner) => Ok(ExprValue::Bool(!inner.eval(record)?.is_truthy())),
            Expr::Binary(op, left, right) => self.eval_binary(*op, left, right, record),
        }
    }

    fn eval_binary(
        &self,
        op: BinOp,
        left: &Expr,
        right: &Expr,
        record: &Record,
    ) -> Result<ExprValue, ExprError> {
        // Boolean operators short-circuit so an unresolvable right side
        // cannot fail an already-decided condition.
        match op {
            BinOp::And => {
                if !left.eval(record)?.is_truthy() {
                    return Ok(ExprValue::Bool(false));
                }
                return Ok(ExprValue::Bool(right.eval(record)?.is_truthy()));
            }
            BinOp::Or => {
                if left.eval(record)?.is_truthy() {
                    return Ok(ExprValue::Bool(true));
                }
                return Ok(ExprValue::Bool(right.eval(record)?.is_truthy()));
            }
            _ => {}
        }
        let lv = left.eval(record)?;
        let rv = right.eval(record)?;
        match op {
            BinOp::Add => Ok(ExprValue::Num(as_number(&lv)? + as_number(&rv)?)),
            BinOp::Sub => Ok(ExprValue::Num(as_number(&lv)? - as_number(&rv)?)),
            BinOp::Mul => Ok(ExprValue::Num(as_number(&lv)? * as_number(&rv)?)),
            BinOp::Div => {
                let divisor = as_number(&rv)?;
                if divisor == 0.0 {
                    return Err(ExprError::Eval("division by zero".to_string()));
                }
                Ok(ExprValue::Num(as_number(&lv)? / divisor))
            }
            BinOp::Eq => {
                require_comparable(left, right, &lv, &rv)?;
                Ok(ExprValue::Bool(values_equal(&lv, &rv)))
            }
            BinOp::Ne => {
                require_comparable(left, right, &lv, &rv)?;
                Ok(ExprValue::Bool(!values_equal(&lv, &rv)))
            }
            BinOp::Gt => Ok(ExprValue::Bool(as_number(&lv)? > as_number(&rv)?)),
            BinOp::Lt => Ok(ExprValue::Bool(as_number(&lv)? < as_number(&rv)?)),
            BinOp::Ge => Ok(ExprValue::Bool(as_number(&lv)? >= as_number(&rv)?)),
            BinOp::Le => Ok(ExprValue::Bool(as_number(&lv)? <= as_number(&rv)?)),
            BinOp::And | BinOp::Or => unreachable!("handled above"),
        }
    }
}

/// A null operand in `=`/`!=` is an evaluation error unless one side is
/// the `null` literal, so a missing field skips the record instead of
/// silently comparing unequal. Explicit `{field} = null` checks still work.
fn require_comparable(
    left: &Expr,
    right: &Expr,
    lv: &ExprValue,
    rv: &ExprValue,
) -> Result<(), ExprError> {
    let explicit_null = matches!(left, Expr::Lit(ExprValue::Null))
        || matches!(right, Expr::Lit(ExprValue::Null));
    if !explicit_null && (*lv == ExprValue::Null || *rv == ExprValue::Null) {
        return Err(ExprError::Eval("null operand in comparison".to_string()));
    }
    Ok(())
}

fn resolve_field(record: &Record, path: &str) -> ExprValue {
    match record.field(path) {
        None | Some(Value::Null) => ExprValue::Null,
        Some(Value::Bool(b)) => ExprValue::Bool(*b),
        Some(Value::Number(n)) => n.as_f64().map(ExprValue::Num).unwrap_or(ExprValue::Null),
        Some(Value::String(s)) => ExprValue::Str(s.clone()),
        Some(other) => ExprValue::Str(other.to_string()),
    }
}

fn as_number(value: &ExprValue) -> Result<f64, ExprError> {
    match value {
        ExprValue::Num(n) => Ok(*n),
        ExprValue::Str(s) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
            cleaned
                .parse::<f64>()
                .map_err(|_| ExprError::Eval(format!("not a number: {s}")))
        }
        other => Err(ExprError::Eval(format!("not a number: {other}"))),
    }
}

fn values_equal(a: &ExprValue, b: &ExprValue) -> bool {
    match (a, b) {
        (ExprValue::Null, ExprValue::Null) => true,
        (ExprValue::Null, _) | (_, ExprValue::Null) => false,
        (ExprValue::Bool(x), ExprValue::Bool(y)) => x == y,
        (ExprValue::Num(x), ExprValue::Num(y)) => x == y,
        (ExprValue::Str(x), ExprValue::Str(y)) => x == y,
        // Mixed number/string compares numerically when the string parses.
        (ExprValue::Num(x), ExprValue::Str(_)) => as_number(b).map(|y| *x == y).unwrap_or(false),
        (ExprValue::Str(_), ExprValue::Num(y)) => as_number(a).map(|x| x == *y).unwrap_or(false),
        _ => false,
    }
}

/// Evaluate a boolean expression against a record. `None` on parse or
/// evaluation failure — callers pick the fail-open or fail-closed default.
pub fn eval_bool(src: &str, record: &Record) -> Option<bool> {
    let expr = parse(src).ok()?;
    expr.eval(record).ok().map(|v| v.is_truthy())
}

/// Evaluate a numeric expression against a record. `None` on parse or
/// evaluation failure (missing / non-numeric field).
pub fn eval_number(src: &str, record: &Record) -> Option<f64> {
    let expr = parse(src).ok()?;
    as_number(&expr.eval(record).ok()?).ok()
}
