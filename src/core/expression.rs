//! Equation parsing, evaluation and differentiation for derived measurements
//!
//! An equation such as `V = I * R` is parsed into an [`Expr`] tree. The tree
//! reports its free variables, evaluates against a scope of nominal values,
//! and yields partial derivatives through a swappable [`Differentiation`]
//! strategy (symbolic by default, central finite difference as fallback).

use miette::{Diagnostic, NamedSource, SourceSpan};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Variable bindings used during evaluation
pub type Scope = BTreeMap<String, f64>;

/// Errors raised while parsing or evaluating an equation
#[derive(Debug, Error, Diagnostic)]
pub enum ExpressionError {
    #[error("Equation is empty")]
    #[diagnostic(
        code(calrisk::expression::empty),
        help("write the equation as `Y = f(x1, x2, ...)`")
    )]
    Empty,

    #[error("Equation syntax error: {message}")]
    #[diagnostic(code(calrisk::expression::syntax))]
    Syntax {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: SourceSpan,
    },

    #[error("Unknown function '{name}'")]
    #[diagnostic(
        code(calrisk::expression::unknown_function),
        help("supported functions: sqrt, exp, ln, log, log10, sin, cos, tan, asin, acos, atan, abs")
    )]
    UnknownFunction {
        name: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("not a known function")]
        span: SourceSpan,
    },

    #[error("No value bound for variable '{0}'")]
    #[diagnostic(code(calrisk::expression::unbound))]
    UnboundVariable(String),

    #[error("Expression produced a non-finite value while {context}")]
    #[diagnostic(code(calrisk::expression::non_finite))]
    NonFinite { context: String },
}

/// Named mathematical constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constant {
    Pi,
    E,
}

impl Constant {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "pi" => Some(Constant::Pi),
            "e" => Some(Constant::E),
            _ => None,
        }
    }

    pub fn value(self) -> f64 {
        match self {
            Constant::Pi => std::f64::consts::PI,
            Constant::E => std::f64::consts::E,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Constant::Pi => "pi",
            Constant::E => "e",
        }
    }
}

/// Built-in single-argument functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Sqrt,
    Exp,
    Ln,
    Log10,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Abs,
}

impl Function {
    fn from_name(name: &str) -> Option<Self> {
        let f = match name {
            "sqrt" => Function::Sqrt,
            "exp" => Function::Exp,
            // log is natural, as in most expression languages
            "ln" | "log" => Function::Ln,
            "log10" => Function::Log10,
            "sin" => Function::Sin,
            "cos" => Function::Cos,
            "tan" => Function::Tan,
            "asin" => Function::Asin,
            "acos" => Function::Acos,
            "atan" => Function::Atan,
            "abs" => Function::Abs,
            _ => return None,
        };
        Some(f)
    }

    fn name(self) -> &'static str {
        match self {
            Function::Sqrt => "sqrt",
            Function::Exp => "exp",
            Function::Ln => "ln",
            Function::Log10 => "log10",
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Tan => "tan",
            Function::Asin => "asin",
            Function::Acos => "acos",
            Function::Atan => "atan",
            Function::Abs => "abs",
        }
    }

    fn apply(self, x: f64) -> f64 {
        match self {
            Function::Sqrt => x.sqrt(),
            Function::Exp => x.exp(),
            Function::Ln => x.ln(),
            Function::Log10 => x.log10(),
            Function::Sin => x.sin(),
            Function::Cos => x.cos(),
            Function::Tan => x.tan(),
            Function::Asin => x.asin(),
            Function::Acos => x.acos(),
            Function::Atan => x.atan(),
            Function::Abs => x.abs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Add | BinaryOp::Sub => 1,
            BinaryOp::Mul | BinaryOp::Div => 2,
            BinaryOp::Pow => 4,
        }
    }
}

/// Expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Constant(Constant),
    Variable(String),
    Neg(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(Function, Box<Expr>),
}

impl Expr {
    /// Parse an expression (right-hand side only)
    pub fn parse(input: &str) -> Result<Expr, ExpressionError> {
        Parser::new(input, input, 0)?.parse_all()
    }

    /// Free variables, excluding constants and function names
    pub fn variables(&self) -> BTreeSet<String> {
        let mut vars = BTreeSet::new();
        self.collect_variables(&mut vars);
        vars
    }

    fn collect_variables(&self, vars: &mut BTreeSet<String>) {
        match self {
            Expr::Variable(name) => {
                vars.insert(name.clone());
            }
            Expr::Neg(inner) | Expr::Call(_, inner) => inner.collect_variables(vars),
            Expr::Binary(_, lhs, rhs) => {
                lhs.collect_variables(vars);
                rhs.collect_variables(vars);
            }
            Expr::Number(_) | Expr::Constant(_) => {}
        }
    }

    fn contains(&self, variable: &str) -> bool {
        match self {
            Expr::Variable(name) => name == variable,
            Expr::Neg(inner) | Expr::Call(_, inner) => inner.contains(variable),
            Expr::Binary(_, lhs, rhs) => lhs.contains(variable) || rhs.contains(variable),
            Expr::Number(_) | Expr::Constant(_) => false,
        }
    }

    /// Evaluate against a scope; the result may be non-finite
    pub fn eval(&self, scope: &Scope) -> Result<f64, ExpressionError> {
        let value = match self {
            Expr::Number(n) => *n,
            Expr::Constant(c) => c.value(),
            Expr::Variable(name) => *scope
                .get(name)
                .ok_or_else(|| ExpressionError::UnboundVariable(name.clone()))?,
            Expr::Neg(inner) => -inner.eval(scope)?,
            Expr::Binary(op, lhs, rhs) => {
                let a = lhs.eval(scope)?;
                let b = rhs.eval(scope)?;
                match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    BinaryOp::Pow => a.powf(b),
                }
            }
            Expr::Call(func, arg) => func.apply(arg.eval(scope)?),
        };
        Ok(value)
    }

    /// Symbolic partial derivative with respect to `variable`
    pub fn derivative(&self, variable: &str) -> Expr {
        match self {
            Expr::Number(_) | Expr::Constant(_) => num(0.0),
            Expr::Variable(name) => num(if name == variable { 1.0 } else { 0.0 }),
            Expr::Neg(inner) => neg(inner.derivative(variable)),
            Expr::Binary(op, a, b) => {
                let da = a.derivative(variable);
                let db = b.derivative(variable);
                let (a, b) = (a.as_ref().clone(), b.as_ref().clone());
                match op {
                    BinaryOp::Add => add(da, db),
                    BinaryOp::Sub => sub(da, db),
                    BinaryOp::Mul => add(mul(da, b.clone()), mul(a, db)),
                    BinaryOp::Div => div(
                        sub(mul(da, b.clone()), mul(a, db)),
                        pow(b, num(2.0)),
                    ),
                    BinaryOp::Pow => {
                        if !b.contains(variable) {
                            // d(u^n) = n u^(n-1) u'
                            mul(mul(b.clone(), pow(a, sub(b, num(1.0)))), da)
                        } else if !a.contains(variable) {
                            // d(c^v) = c^v ln(c) v'
                            mul(mul(pow(a.clone(), b), call(Function::Ln, a)), db)
                        } else {
                            // d(u^v) = u^v (v' ln u + v u'/u)
                            let power = pow(a.clone(), b.clone());
                            let inner = add(
                                mul(db, call(Function::Ln, a.clone())),
                                div(mul(b, da), a),
                            );
                            mul(power, inner)
                        }
                    }
                }
            }
            Expr::Call(func, arg) => {
                let du = arg.derivative(variable);
                let u = arg.as_ref().clone();
                let outer = match func {
                    Function::Sqrt => div(num(1.0), mul(num(2.0), call(Function::Sqrt, u))),
                    Function::Exp => call(Function::Exp, u),
                    Function::Ln => div(num(1.0), u),
                    Function::Log10 => div(num(1.0), mul(u, call(Function::Ln, num(10.0)))),
                    Function::Sin => call(Function::Cos, u),
                    Function::Cos => neg(call(Function::Sin, u)),
                    Function::Tan => div(num(1.0), pow(call(Function::Cos, u), num(2.0))),
                    Function::Asin => div(
                        num(1.0),
                        call(Function::Sqrt, sub(num(1.0), pow(u, num(2.0)))),
                    ),
                    Function::Acos => neg(div(
                        num(1.0),
                        call(Function::Sqrt, sub(num(1.0), pow(u, num(2.0)))),
                    )),
                    Function::Atan => div(num(1.0), add(num(1.0), pow(u, num(2.0)))),
                    Function::Abs => div(u.clone(), call(Function::Abs, u)),
                };
                mul(outer, du)
            }
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Binary(op, _, _) => op.precedence(),
            Expr::Neg(_) => 3,
            Expr::Number(n) if *n < 0.0 => 3,
            _ => 5,
        }
    }

    fn fmt_child(&self, f: &mut std::fmt::Formatter<'_>, min_precedence: u8) -> std::fmt::Result {
        if self.precedence() < min_precedence {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{}", n),
            Expr::Constant(c) => write!(f, "{}", c.name()),
            Expr::Variable(name) => write!(f, "{}", name),
            Expr::Neg(inner) => {
                write!(f, "-")?;
                inner.fmt_child(f, 4)
            }
            Expr::Binary(op, lhs, rhs) => {
                let p = op.precedence();
                let (left_min, right_min) = match op {
                    BinaryOp::Add | BinaryOp::Mul => (p, p),
                    BinaryOp::Sub | BinaryOp::Div => (p, p + 1),
                    BinaryOp::Pow => (p + 1, p),
                };
                lhs.fmt_child(f, left_min)?;
                write!(f, " {} ", op.symbol())?;
                rhs.fmt_child(f, right_min)
            }
            Expr::Call(func, arg) => write!(f, "{}({})", func.name(), arg),
        }
    }
}

// Constructors that fold the trivial cases produced by differentiation

fn num(n: f64) -> Expr {
    Expr::Number(n)
}

fn as_number(e: &Expr) -> Option<f64> {
    match e {
        Expr::Number(n) => Some(*n),
        _ => None,
    }
}

fn neg(e: Expr) -> Expr {
    match e {
        Expr::Number(n) => num(-n),
        Expr::Neg(inner) => *inner,
        other => Expr::Neg(Box::new(other)),
    }
}

fn add(a: Expr, b: Expr) -> Expr {
    match (as_number(&a), as_number(&b)) {
        (Some(x), Some(y)) => num(x + y),
        (Some(x), _) if x == 0.0 => b,
        (_, Some(y)) if y == 0.0 => a,
        _ => Expr::Binary(BinaryOp::Add, Box::new(a), Box::new(b)),
    }
}

fn sub(a: Expr, b: Expr) -> Expr {
    match (as_number(&a), as_number(&b)) {
        (Some(x), Some(y)) => num(x - y),
        (Some(x), _) if x == 0.0 => neg(b),
        (_, Some(y)) if y == 0.0 => a,
        _ => Expr::Binary(BinaryOp::Sub, Box::new(a), Box::new(b)),
    }
}

fn mul(a: Expr, b: Expr) -> Expr {
    match (as_number(&a), as_number(&b)) {
        (Some(x), Some(y)) => num(x * y),
        (Some(x), _) | (_, Some(x)) if x == 0.0 => num(0.0),
        (Some(x), _) if x == 1.0 => b,
        (_, Some(y)) if y == 1.0 => a,
        (Some(x), _) if x == -1.0 => neg(b),
        (_, Some(y)) if y == -1.0 => neg(a),
        _ => Expr::Binary(BinaryOp::Mul, Box::new(a), Box::new(b)),
    }
}

fn div(a: Expr, b: Expr) -> Expr {
    match (as_number(&a), as_number(&b)) {
        (Some(x), _) if x == 0.0 => num(0.0),
        (_, Some(y)) if y == 1.0 => a,
        (Some(x), Some(y)) if y != 0.0 => num(x / y),
        _ => Expr::Binary(BinaryOp::Div, Box::new(a), Box::new(b)),
    }
}

fn pow(a: Expr, b: Expr) -> Expr {
    match as_number(&b) {
        Some(y) if y == 0.0 => num(1.0),
        Some(y) if y == 1.0 => a,
        _ => match (as_number(&a), as_number(&b)) {
            (Some(x), Some(y)) => num(x.powf(y)),
            _ => Expr::Binary(BinaryOp::Pow, Box::new(a), Box::new(b)),
        },
    }
}

fn call(func: Function, arg: Expr) -> Expr {
    Expr::Call(func, Box::new(arg))
}

/// A parsed `Y = f(x...)` equation
#[derive(Debug, Clone, PartialEq)]
pub struct Equation {
    /// Left-hand side name, if one was written
    pub output: Option<String>,

    /// Right-hand side
    pub expr: Expr,
}

impl Equation {
    /// Parse an equation; a leading `Y =` is optional
    pub fn parse(input: &str) -> Result<Equation, ExpressionError> {
        let (output, rhs, offset) = match input.find('=') {
            Some(idx) => {
                let lhs = input[..idx].trim();
                let output = if lhs.is_empty() {
                    None
                } else {
                    Some(lhs.to_string())
                };
                (output, &input[idx + 1..], idx + 1)
            }
            None => (None, input, 0),
        };

        if rhs.trim().is_empty() {
            return Err(ExpressionError::Empty);
        }

        let expr = Parser::new(input, rhs, offset)?.parse_all()?;
        Ok(Equation { output, expr })
    }

    /// Free variables of the right-hand side
    pub fn variables(&self) -> BTreeSet<String> {
        self.expr.variables()
    }

    /// Evaluate at the given scope, failing on non-finite results
    pub fn evaluate(&self, scope: &Scope) -> Result<f64, ExpressionError> {
        let value = self.expr.eval(scope)?;
        if !value.is_finite() {
            return Err(ExpressionError::NonFinite {
                context: "evaluating the nominal result".to_string(),
            });
        }
        Ok(value)
    }

    /// Sensitivity coefficient ∂f/∂`variable` at `scope`
    pub fn sensitivity(
        &self,
        variable: &str,
        scope: &Scope,
        strategy: &dyn Differentiation,
    ) -> Result<f64, ExpressionError> {
        let value = strategy.partial(&self.expr, variable, scope)?;
        if !value.is_finite() {
            return Err(ExpressionError::NonFinite {
                context: format!("differentiating with respect to '{}'", variable),
            });
        }
        Ok(value)
    }
}

impl std::fmt::Display for Equation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.output {
            Some(out) => write!(f, "{} = {}", out, self.expr),
            None => write!(f, "{}", self.expr),
        }
    }
}

/// Strategy for evaluating a partial derivative at a point
pub trait Differentiation {
    fn partial(&self, expr: &Expr, variable: &str, scope: &Scope) -> Result<f64, ExpressionError>;
}

/// Exact derivative from the expression tree
#[derive(Debug, Clone, Copy, Default)]
pub struct Symbolic;

impl Differentiation for Symbolic {
    fn partial(&self, expr: &Expr, variable: &str, scope: &Scope) -> Result<f64, ExpressionError> {
        expr.derivative(variable).eval(scope)
    }
}

/// Central finite difference with a step relative to the variable's magnitude
#[derive(Debug, Clone, Copy)]
pub struct CentralDifference {
    pub relative_step: f64,
}

impl Default for CentralDifference {
    fn default() -> Self {
        Self { relative_step: 1e-6 }
    }
}

impl Differentiation for CentralDifference {
    fn partial(&self, expr: &Expr, variable: &str, scope: &Scope) -> Result<f64, ExpressionError> {
        let x = *scope
            .get(variable)
            .ok_or_else(|| ExpressionError::UnboundVariable(variable.to_string()))?;
        let h = self.relative_step * x.abs().max(1.0);

        let mut shifted = scope.clone();
        shifted.insert(variable.to_string(), x + h);
        let forward = expr.eval(&shifted)?;
        shifted.insert(variable.to_string(), x - h);
        let backward = expr.eval(&shifted)?;

        Ok((forward - backward) / (2.0 * h))
    }
}

// ============================================================================
// Tokenizer and recursive-descent parser
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Number(n) => write!(f, "number {}", n),
            Token::Ident(name) => write!(f, "name '{}'", name),
            Token::Plus => write!(f, "'+'"),
            Token::Minus => write!(f, "'-'"),
            Token::Star => write!(f, "'*'"),
            Token::Slash => write!(f, "'/'"),
            Token::Caret => write!(f, "'^'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
        }
    }
}

struct Parser<'a> {
    /// Full text shown in diagnostics
    source: &'a str,
    tokens: Vec<(Token, usize, usize)>,
    pos: usize,
    end: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, text: &str, offset: usize) -> Result<Self, ExpressionError> {
        let tokens = tokenize(source, text, offset)?;
        Ok(Parser {
            source,
            tokens,
            pos: 0,
            end: offset + text.len(),
        })
    }

    fn error(&self, message: impl Into<String>, start: usize, end: usize) -> ExpressionError {
        ExpressionError::Syntax {
            message: message.into(),
            src: NamedSource::new("equation", self.source.to_string()),
            span: SourceSpan::from(start..end.max(start + 1)),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _, _)| t)
    }

    fn next(&mut self) -> Option<(Token, usize, usize)> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn parse_all(mut self) -> Result<Expr, ExpressionError> {
        if self.tokens.is_empty() {
            return Err(ExpressionError::Empty);
        }
        let expr = self.parse_sum()?;
        if let Some((tok, start, end)) = self.next() {
            return Err(self.error(format!("unexpected {}", tok), start, end));
        }
        Ok(expr)
    }

    fn parse_sum(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.parse_product()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_product()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_product(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ExpressionError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(Expr::Neg(Box::new(self.parse_unary()?)))
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<Expr, ExpressionError> {
        let base = self.parse_primary()?;
        if let Some(Token::Caret) = self.peek() {
            self.pos += 1;
            // right-associative; exponent may carry a sign
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, ExpressionError> {
        let (tok, start, end) = match self.next() {
            Some(t) => t,
            None => {
                let at = self.end.saturating_sub(1);
                return Err(self.error("unexpected end of equation", at, self.end));
            }
        };

        match tok {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::LParen => {
                let inner = self.parse_sum()?;
                self.expect_rparen(start)?;
                Ok(inner)
            }
            Token::Ident(name) => {
                if let Some(Token::LParen) = self.peek() {
                    let func = Function::from_name(&name).ok_or_else(|| {
                        ExpressionError::UnknownFunction {
                            name: name.clone(),
                            src: NamedSource::new("equation", self.source.to_string()),
                            span: SourceSpan::from(start..end),
                        }
                    })?;
                    let (_, open, _) = self.next().ok_or(ExpressionError::Empty)?;
                    let arg = self.parse_sum()?;
                    self.expect_rparen(open)?;
                    return Ok(Expr::Call(func, Box::new(arg)));
                }
                match Constant::from_name(&name) {
                    Some(c) => Ok(Expr::Constant(c)),
                    None => Ok(Expr::Variable(name)),
                }
            }
            other => Err(self.error(format!("unexpected {}", other), start, end)),
        }
    }

    fn expect_rparen(&mut self, open: usize) -> Result<(), ExpressionError> {
        match self.next() {
            Some((Token::RParen, _, _)) => Ok(()),
            Some((tok, start, end)) => Err(self.error(format!("expected ')' but found {}", tok), start, end)),
            None => Err(self.error("unclosed '('", open, open + 1)),
        }
    }
}

fn tokenize(source: &str, text: &str, offset: usize) -> Result<Vec<(Token, usize, usize)>, ExpressionError> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        let start = i;

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || c == '.' {
            while i < bytes.len() && ((bytes[i] as char).is_ascii_digit() || bytes[i] == b'.') {
                i += 1;
            }
            // exponent part, only when followed by a digit or sign+digit
            if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                let mut j = i + 1;
                if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                    j += 1;
                }
                if j < bytes.len() && bytes[j].is_ascii_digit() {
                    i = j;
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let literal = &text[start..i];
            let value: f64 = literal.parse().map_err(|_| ExpressionError::Syntax {
                message: format!("invalid number '{}'", literal),
                src: NamedSource::new("equation", source.to_string()),
                span: SourceSpan::from(offset + start..offset + i),
            })?;
            tokens.push((Token::Number(value), offset + start, offset + i));
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            tokens.push((Token::Ident(text[start..i].to_string()), offset + start, offset + i));
            continue;
        }

        let tok = match c {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '^' => Token::Caret,
            '(' => Token::LParen,
            ')' => Token::RParen,
            _ => {
                let width = text[start..].chars().next().map_or(1, |ch| ch.len_utf8());
                return Err(ExpressionError::Syntax {
                    message: format!("unexpected character '{}'", &text[start..start + width]),
                    src: NamedSource::new("equation", source.to_string()),
                    span: SourceSpan::from(offset + start..offset + start + width),
                });
            }
        };
        i += 1;
        tokens.push((tok, offset + start, offset + i));
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(pairs: &[(&str, f64)]) -> Scope {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_parse_equation_with_output() {
        let eq = Equation::parse("V = I * R").unwrap();
        assert_eq!(eq.output.as_deref(), Some("V"));
        let vars: Vec<_> = eq.variables().into_iter().collect();
        assert_eq!(vars, vec!["I", "R"]);
    }

    #[test]
    fn test_parse_without_lhs() {
        let eq = Equation::parse("a + b^2").unwrap();
        assert!(eq.output.is_none());
        assert_eq!(eq.evaluate(&scope(&[("a", 1.0), ("b", 3.0)])).unwrap(), 10.0);
    }

    #[test]
    fn test_empty_equation() {
        assert!(matches!(Equation::parse("Y ="), Err(ExpressionError::Empty)));
        assert!(matches!(Equation::parse("   "), Err(ExpressionError::Empty)));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(Equation::parse("Y = I *"), Err(ExpressionError::Syntax { .. })));
        assert!(matches!(Equation::parse("Y = (I * R"), Err(ExpressionError::Syntax { .. })));
        assert!(matches!(Equation::parse("Y = I # R"), Err(ExpressionError::Syntax { .. })));
        assert!(matches!(Equation::parse("Y = I R"), Err(ExpressionError::Syntax { .. })));
    }

    #[test]
    fn test_unknown_function() {
        let err = Equation::parse("Y = frob(x)").unwrap_err();
        assert!(matches!(err, ExpressionError::UnknownFunction { ref name, .. } if name == "frob"));
    }

    #[test]
    fn test_constants_are_not_variables() {
        let eq = Equation::parse("A = pi * r^2").unwrap();
        let vars: Vec<_> = eq.variables().into_iter().collect();
        assert_eq!(vars, vec!["r"]);
        let area = eq.evaluate(&scope(&[("r", 2.0)])).unwrap();
        assert!((area - 4.0 * std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn test_precedence_and_associativity() {
        let s = Scope::new();
        assert_eq!(Expr::parse("2 + 3 * 4").unwrap().eval(&s).unwrap(), 14.0);
        assert_eq!(Expr::parse("2 ^ 3 ^ 2").unwrap().eval(&s).unwrap(), 512.0);
        assert_eq!(Expr::parse("-2 ^ 2").unwrap().eval(&s).unwrap(), -4.0);
        assert_eq!(Expr::parse("10 - 4 - 3").unwrap().eval(&s).unwrap(), 3.0);
        assert_eq!(Expr::parse("2 ^ -1").unwrap().eval(&s).unwrap(), 0.5);
        assert_eq!(Expr::parse("1.5e3 / 3").unwrap().eval(&s).unwrap(), 500.0);
    }

    #[test]
    fn test_unbound_variable() {
        let eq = Equation::parse("Y = a * b").unwrap();
        let err = eq.evaluate(&scope(&[("a", 1.0)])).unwrap_err();
        assert!(matches!(err, ExpressionError::UnboundVariable(ref v) if v == "b"));
    }

    #[test]
    fn test_ohms_law_sensitivities() {
        let eq = Equation::parse("V = I * R").unwrap();
        let s = scope(&[("I", 2.0), ("R", 10.0)]);
        assert_eq!(eq.evaluate(&s).unwrap(), 20.0);
        assert_eq!(eq.sensitivity("I", &s, &Symbolic).unwrap(), 10.0);
        assert_eq!(eq.sensitivity("R", &s, &Symbolic).unwrap(), 2.0);
    }

    #[test]
    fn test_symbolic_matches_finite_difference() {
        let exprs = [
            "P = V^2 / R",
            "Y = sqrt(a^2 + b^2)",
            "Y = exp(-t / tau) * sin(w * t)",
            "Y = log10(x) + ln(x) + atan(x)",
            "Y = x ^ y",
            "Y = 2 ^ x",
        ];
        let s = scope(&[
            ("V", 5.0),
            ("R", 50.0),
            ("a", 3.0),
            ("b", 4.0),
            ("t", 0.3),
            ("tau", 1.5),
            ("w", 2.0),
            ("x", 1.7),
            ("y", 2.2),
        ]);
        for text in exprs {
            let eq = Equation::parse(text).unwrap();
            for var in eq.variables() {
                let exact = eq.sensitivity(&var, &s, &Symbolic).unwrap();
                let approx = eq.sensitivity(&var, &s, &CentralDifference::default()).unwrap();
                assert!(
                    (exact - approx).abs() < 1e-5 * exact.abs().max(1.0),
                    "{} d/d{}: {} vs {}",
                    text,
                    var,
                    exact,
                    approx
                );
            }
        }
    }

    #[test]
    fn test_non_finite_derivative() {
        let eq = Equation::parse("Y = sqrt(x)").unwrap();
        let err = eq.sensitivity("x", &scope(&[("x", 0.0)]), &Symbolic).unwrap_err();
        assert!(matches!(err, ExpressionError::NonFinite { .. }));
    }

    #[test]
    fn test_derivative_simplifies() {
        let expr = Expr::parse("I * R").unwrap();
        assert_eq!(expr.derivative("I").to_string(), "R");
        assert_eq!(Expr::parse("x^2").unwrap().derivative("x").to_string(), "2 * x");
        assert_eq!(Expr::parse("a + 3").unwrap().derivative("b").to_string(), "0");
    }

    #[test]
    fn test_display_round_trips() {
        for text in ["a - (b - c)", "(a + b) * c", "a / (b * c)", "(-a) ^ 2", "-a ^ 2", "sqrt(x + 1)"] {
            let expr = Expr::parse(text).unwrap();
            let reparsed = Expr::parse(&expr.to_string()).unwrap();
            assert_eq!(expr, reparsed, "{}", text);
        }
    }
}
