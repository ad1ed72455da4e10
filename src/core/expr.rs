//! WC-004: Restricted expression language for `when` gates and `{{ }}` templates.
//!
//! A small lexer, a recursive-descent parser producing [`Expr`], and a
//! tree-walking evaluator over `serde_json::Value`. Identifiers resolve
//! against the [`VariableStore`]; the only callable functions are the
//! whitelisted helpers in [`call_function`]. Nesting depth is bounded so
//! hostile recipe text cannot exhaust the stack.
//!
//! Precedence, lowest first: `||`/`or`, `&&`/`and`, `!`/`not`, comparisons
//! (`== != < <= > >= in`), `+ -`, `* / %`, unary `-`, member/index access.

use super::error::EvalError;
use super::store::VariableStore;
use super::types::value_to_display_string;
use serde_json::Value;
use std::cmp::Ordering;

/// Words that never resolve to a variable.
pub const KEYWORDS: &[&str] = &["and", "or", "not", "in", "true", "false", "null"];

const MAX_DEPTH: usize = 64;

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Var(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

// ============================================================================
// Lexer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(Value),
    Str(String),
    Ident(String),
    Op(&'static str),
    Eof,
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    offset: usize,
}

const OPERATORS: [&str; 20] = [
    "==", "!=", "<=", ">=", "&&", "||", "<", ">", "!", "+", "-", "*", "/", "%", "(", ")", "[",
    "]", ".", ",",
];

fn syntax(offset: usize, message: impl Into<String>) -> EvalError {
    EvalError::Syntax {
        offset,
        message: message.into(),
    }
}

fn tokenize(src: &str) -> Result<Vec<Token>, EvalError> {
    let bytes = src.as_bytes();
    let mut tokens: Vec<Token> = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        let after_dot = tokens.last().is_some_and(|t| t.tok == Tok::Op("."));

        if c.is_ascii_digit() {
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            // `rows.0.1` is two index segments, not the float 0.1
            let has_fraction = !after_dot
                && i + 1 < bytes.len()
                && bytes[i] == b'.'
                && bytes[i + 1].is_ascii_digit();
            if has_fraction {
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
            }
            let text = &src[start..i];
            let value = if has_fraction {
                text.parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
            } else {
                text.parse::<i64>().ok().map(Value::from)
            };
            let value = value.ok_or_else(|| syntax(start, format!("invalid number '{}'", text)))?;
            tokens.push(Token {
                tok: Tok::Num(value),
                offset: start,
            });
            continue;
        }

        if c == b'_' || c.is_ascii_alphabetic() || c == b'$' {
            while i < bytes.len()
                && (bytes[i] == b'_' || bytes[i] == b'$' || bytes[i].is_ascii_alphanumeric())
            {
                i += 1;
            }
            tokens.push(Token {
                tok: Tok::Ident(src[start..i].to_string()),
                offset: start,
            });
            continue;
        }

        if c == b'\'' || c == b'"' {
            let (s, next) = lex_string(src, i)?;
            tokens.push(Token {
                tok: Tok::Str(s),
                offset: start,
            });
            i = next;
            continue;
        }

        let op = OPERATORS
            .iter()
            .find(|op| src[i..].starts_with(**op))
            .ok_or_else(|| {
                let ch = src[i..].chars().next().unwrap_or('?');
                syntax(i, format!("unexpected character '{}'", ch))
            })?;
        i += op.len();
        tokens.push(Token {
            tok: Tok::Op(op),
            offset: start,
        });
    }

    tokens.push(Token {
        tok: Tok::Eof,
        offset: src.len(),
    });
    Ok(tokens)
}

/// Lex a quoted string starting at `start`; returns the unescaped text and
/// the offset just past the closing quote.
fn lex_string(src: &str, start: usize) -> Result<(String, usize), EvalError> {
    let mut chars = src[start..].char_indices();
    let (_, quote) = chars.next().ok_or_else(|| syntax(start, "expected string"))?;
    let mut out = String::new();
    while let Some((idx, ch)) = chars.next() {
        match ch {
            '\\' => {
                let (_, esc) = chars
                    .next()
                    .ok_or_else(|| syntax(start + idx, "unterminated escape"))?;
                out.push(match esc {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => other,
                });
            }
            c if c == quote => return Ok((out, start + idx + ch.len_utf8())),
            c => out.push(c),
        }
    }
    Err(syntax(start, "unterminated string literal"))
}

// ============================================================================
// Parser
// ============================================================================

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Tok {
        &self.tokens[self.pos].tok
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos].offset
    }

    fn advance(&mut self) -> Tok {
        let tok = self.tokens[self.pos].tok.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if matches!(self.peek(), Tok::Op(o) if *o == op) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if matches!(self.peek(), Tok::Ident(name) if name == kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: &str) -> Result<(), EvalError> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(syntax(self.offset(), format!("expected '{}'", op)))
        }
    }

    fn enter(&mut self) -> Result<(), EvalError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(syntax(self.offset(), "expression nested too deeply"));
        }
        Ok(())
    }

    fn expression(&mut self) -> Result<Expr, EvalError> {
        self.enter()?;
        let expr = self.or();
        self.depth -= 1;
        expr
    }

    fn or(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.and()?;
        while self.eat_op("||") || self.eat_keyword("or") {
            let right = self.and()?;
            left = Expr::Binary(BinOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.not()?;
        while self.eat_op("&&") || self.eat_keyword("and") {
            let right = self.not()?;
            left = Expr::Binary(BinOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not(&mut self) -> Result<Expr, EvalError> {
        if self.eat_op("!") || self.eat_keyword("not") {
            self.enter()?;
            let inner = self.not();
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner?)));
        }
        self.compare()
    }

    fn compare(&mut self) -> Result<Expr, EvalError> {
        let left = self.additive()?;
        let op = match self.peek() {
            Tok::Op(op) => match *op {
                "==" => BinOp::Eq,
                "!=" => BinOp::Ne,
                "<" => BinOp::Lt,
                "<=" => BinOp::Le,
                ">" => BinOp::Gt,
                ">=" => BinOp::Ge,
                _ => return Ok(left),
            },
            Tok::Ident(kw) if kw == "in" => BinOp::In,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.additive()?;
        Ok(Expr::Binary(op, Box::new(left), Box::new(right)))
    }

    fn additive(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Tok::Op(op) if *op == "+" => BinOp::Add,
                Tok::Op(op) if *op == "-" => BinOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn term(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Tok::Op(op) if *op == "*" => BinOp::Mul,
                Tok::Op(op) if *op == "/" => BinOp::Div,
                Tok::Op(op) if *op == "%" => BinOp::Rem,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn unary(&mut self) -> Result<Expr, EvalError> {
        if self.eat_op("-") {
            self.enter()?;
            let inner = self.unary();
            self.depth -= 1;
            return Ok(Expr::Neg(Box::new(inner?)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, EvalError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat_op(".") {
                let offset = self.offset();
                let field = match self.advance() {
                    Tok::Ident(name) => name,
                    Tok::Num(Value::Number(n)) if n.is_u64() => n.to_string(),
                    _ => return Err(syntax(offset, "expected property name after '.'")),
                };
                expr = Expr::Member(Box::new(expr), field);
            } else if self.eat_op("[") {
                let index = self.expression()?;
                self.expect_op("]")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, EvalError> {
        let offset = self.offset();
        match self.advance() {
            Tok::Num(n) => Ok(Expr::Literal(n)),
            Tok::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Tok::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" => Ok(Expr::Literal(Value::Null)),
                "and" | "or" | "not" | "in" => {
                    Err(syntax(offset, format!("unexpected keyword '{}'", name)))
                }
                _ if self.eat_op("(") => {
                    let mut args = Vec::new();
                    if !self.eat_op(")") {
                        loop {
                            args.push(self.expression()?);
                            if self.eat_op(")") {
                                break;
                            }
                            self.expect_op(",")?;
                        }
                    }
                    Ok(Expr::Call(name, args))
                }
                _ => Ok(Expr::Var(name)),
            },
            Tok::Op("(") => {
                let inner = self.expression()?;
                self.expect_op(")")?;
                Ok(inner)
            }
            Tok::Op(op) => Err(syntax(offset, format!("unexpected '{}'", op))),
            Tok::Eof => Err(syntax(offset, "unexpected end of expression")),
        }
    }
}

/// Parse an expression string.
pub fn parse(src: &str) -> Result<Expr, EvalError> {
    if src.trim().is_empty() {
        return Err(syntax(0, "empty expression"));
    }
    let tokens = tokenize(src)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.expression()?;
    if *parser.peek() != Tok::Eof {
        return Err(syntax(parser.offset(), "unexpected trailing input"));
    }
    Ok(expr)
}

// ============================================================================
// Evaluator
// ============================================================================

/// JavaScript-style truthiness: `false`, `null`, `0`, and `""` are falsy.
pub fn truthy(val: &Value) -> bool {
    match val {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Parse and evaluate `src` against the store.
pub fn evaluate(src: &str, store: &VariableStore) -> Result<Value, EvalError> {
    parse(src)?.eval(store)
}

/// Parse and evaluate `src`, coercing the result by truthiness.
pub fn evaluate_bool(src: &str, store: &VariableStore) -> Result<bool, EvalError> {
    evaluate(src, store).map(|v| truthy(&v))
}

impl Expr {
    pub fn eval(&self, store: &VariableStore) -> Result<Value, EvalError> {
        match self {
            Self::Literal(v) => Ok(v.clone()),
            Self::Var(name) => store
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::UnknownVariable(name.clone())),
            Self::Member(target, field) => member(&target.eval(store)?, field),
            Self::Index(target, index) => {
                let target = target.eval(store)?;
                let index = index.eval(store)?;
                let key = match &index {
                    Value::String(s) => s.clone(),
                    Value::Number(n) if n.is_u64() => n.to_string(),
                    other => {
                        return Err(EvalError::Type(format!("invalid index {}", other)));
                    }
                };
                member(&target, &key)
            }
            Self::Call(name, args) => {
                let values = args
                    .iter()
                    .map(|a| a.eval(store))
                    .collect::<Result<Vec<_>, _>>()?;
                call_function(name, &values)
            }
            Self::Not(inner) => Ok(Value::Bool(!truthy(&inner.eval(store)?))),
            Self::Neg(inner) => match inner.eval(store)? {
                Value::Number(n) => Ok(number_result(
                    -as_f64(&n),
                    n.as_i64().and_then(i64::checked_neg),
                )),
                other => Err(EvalError::Type(format!(
                    "cannot negate {}",
                    type_name(&other)
                ))),
            },
            Self::Binary(BinOp::Or, l, r) => {
                let left = l.eval(store)?;
                if truthy(&left) {
                    Ok(left)
                } else {
                    r.eval(store)
                }
            }
            Self::Binary(BinOp::And, l, r) => {
                let left = l.eval(store)?;
                if truthy(&left) {
                    r.eval(store)
                } else {
                    Ok(left)
                }
            }
            Self::Binary(op, l, r) => binary(*op, &l.eval(store)?, &r.eval(store)?),
        }
    }
}

fn member(target: &Value, field: &str) -> Result<Value, EvalError> {
    match target {
        Value::Object(map) => Ok(map.get(field).cloned().unwrap_or(Value::Null)),
        Value::Array(items) if field == "length" => Ok(Value::from(items.len())),
        Value::Array(items) => match field.parse::<usize>() {
            Ok(i) => Ok(items.get(i).cloned().unwrap_or(Value::Null)),
            Err(_) => Err(EvalError::Type(format!("array has no property '{}'", field))),
        },
        Value::String(s) if field == "length" => Ok(Value::from(s.chars().count())),
        other => Err(EvalError::Type(format!(
            "cannot read property '{}' of {}",
            field,
            type_name(other)
        ))),
    }
}

fn type_name(val: &Value) -> &'static str {
    match val {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn as_f64(n: &serde_json::Number) -> f64 {
    n.as_f64().unwrap_or(f64::NAN)
}

/// Prefer an exact integer result when one is available.
fn number_result(float: f64, int: Option<i64>) -> Value {
    match int {
        Some(i) => Value::from(i),
        None => serde_json::Number::from_f64(float)
            .map(Value::Number)
            .unwrap_or(Value::Null),
    }
}

/// Integers compare exactly; floats fall back to f64.
fn compare_numbers(x: &serde_json::Number, y: &serde_json::Number) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return Some(a.cmp(&b));
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return Some(a.cmp(&b));
    }
    // One side is above i64::MAX, the other negative
    if x.is_u64() && y.is_i64() {
        return Some(Ordering::Greater);
    }
    if x.is_i64() && y.is_u64() {
        return Some(Ordering::Less);
    }
    as_f64(x).partial_cmp(&as_f64(y))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y) == Some(Ordering::Equal),
        _ => a == b,
    }
}

fn contains(haystack: &Value, needle: &Value) -> Result<bool, EvalError> {
    match (haystack, needle) {
        (Value::String(h), Value::String(n)) => Ok(h.contains(n.as_str())),
        (Value::Array(items), n) => Ok(items.iter().any(|v| values_equal(v, n))),
        (Value::Object(map), Value::String(key)) => Ok(map.contains_key(key)),
        (h, n) => Err(EvalError::Type(format!(
            "cannot test {} membership in {}",
            type_name(n),
            type_name(h)
        ))),
    }
}

fn binary(op: BinOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
    match op {
        BinOp::Eq => Ok(Value::Bool(values_equal(l, r))),
        BinOp::Ne => Ok(Value::Bool(!values_equal(l, r))),
        BinOp::In => contains(r, l).map(Value::Bool),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ord = match (l, r) {
                (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
                (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
                _ => {
                    return Err(EvalError::Type(format!(
                        "cannot compare {} with {}",
                        type_name(l),
                        type_name(r)
                    )))
                }
            };
            let Some(ord) = ord else {
                return Ok(Value::Bool(false));
            };
            Ok(Value::Bool(match op {
                BinOp::Lt => ord.is_lt(),
                BinOp::Le => ord.is_le(),
                BinOp::Gt => ord.is_gt(),
                _ => ord.is_ge(),
            }))
        }
        BinOp::Add => match (l, r) {
            (Value::Number(x), Value::Number(y)) => Ok(number_result(
                as_f64(x) + as_f64(y),
                x.as_i64().zip(y.as_i64()).and_then(|(a, b)| a.checked_add(b)),
            )),
            (Value::String(_), _) | (_, Value::String(_)) => Ok(Value::String(format!(
                "{}{}",
                value_to_display_string(l),
                value_to_display_string(r)
            ))),
            _ => Err(EvalError::Type(format!(
                "cannot add {} and {}",
                type_name(l),
                type_name(r)
            ))),
        },
        BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem => {
            let (Value::Number(x), Value::Number(y)) = (l, r) else {
                return Err(EvalError::Type(format!(
                    "arithmetic on {} and {}",
                    type_name(l),
                    type_name(r)
                )));
            };
            let ints = x.as_i64().zip(y.as_i64());
            let (a, b) = (as_f64(x), as_f64(y));
            match op {
                BinOp::Sub => Ok(number_result(a - b, ints.and_then(|(p, q)| p.checked_sub(q)))),
                BinOp::Mul => Ok(number_result(a * b, ints.and_then(|(p, q)| p.checked_mul(q)))),
                _ if b == 0.0 => Err(EvalError::Type("division by zero".to_string())),
                BinOp::Div => Ok(number_result(
                    a / b,
                    ints.filter(|(p, q)| p.checked_rem(*q) == Some(0))
                        .and_then(|(p, q)| p.checked_div(q)),
                )),
                _ => Ok(number_result(a % b, ints.and_then(|(p, q)| p.checked_rem(q)))),
            }
        }
        // Expr::eval short-circuits these before both sides are known
        BinOp::And => Ok(Value::Bool(truthy(l) && truthy(r))),
        BinOp::Or => Ok(Value::Bool(truthy(l) || truthy(r))),
    }
}

fn expect_str<'a>(name: &str, val: &'a Value) -> Result<&'a str, EvalError> {
    val.as_str()
        .ok_or_else(|| EvalError::Type(format!("{}() expects a string, got {}", name, type_name(val))))
}

fn arity(name: &str, args: &[Value], n: usize) -> Result<(), EvalError> {
    if args.len() == n {
        Ok(())
    } else {
        Err(EvalError::Type(format!(
            "{}() takes {} argument(s), got {}",
            name,
            n,
            args.len()
        )))
    }
}

/// The whitelisted helper functions.
pub fn call_function(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    match name {
        "len" => {
            arity(name, args, 1)?;
            match &args[0] {
                Value::String(s) => Ok(Value::from(s.chars().count())),
                Value::Array(a) => Ok(Value::from(a.len())),
                Value::Object(o) => Ok(Value::from(o.len())),
                other => Err(EvalError::Type(format!("len() of {}", type_name(other)))),
            }
        }
        "contains" => {
            arity(name, args, 2)?;
            contains(&args[0], &args[1]).map(Value::Bool)
        }
        "starts_with" | "startsWith" => {
            arity(name, args, 2)?;
            Ok(Value::Bool(
                expect_str(name, &args[0])?.starts_with(expect_str(name, &args[1])?),
            ))
        }
        "ends_with" | "endsWith" => {
            arity(name, args, 2)?;
            Ok(Value::Bool(
                expect_str(name, &args[0])?.ends_with(expect_str(name, &args[1])?),
            ))
        }
        "lower" => {
            arity(name, args, 1)?;
            Ok(Value::String(expect_str(name, &args[0])?.to_lowercase()))
        }
        "upper" => {
            arity(name, args, 1)?;
            Ok(Value::String(expect_str(name, &args[0])?.to_uppercase()))
        }
        "trim" => {
            arity(name, args, 1)?;
            Ok(Value::String(expect_str(name, &args[0])?.trim().to_string()))
        }
        "string" => {
            arity(name, args, 1)?;
            Ok(Value::String(value_to_display_string(&args[0])))
        }
        _ => Err(EvalError::UnknownFunction(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn store() -> VariableStore {
        let mut s = VariableStore::new();
        s.set("val", json!("hello"));
        s.set("count", json!(3));
        s.set("flag", json!(false));
        s.set("rows", json!([{"name": "a"}, {"name": "b"}]));
        s.set("user", json!({"name": "ada", "tags": ["admin", "dev"]}));
        s
    }

    fn eval(src: &str) -> Result<Value, EvalError> {
        evaluate(src, &store())
    }

    #[test]
    fn test_wc004_literals() {
        assert_eq!(eval("true").unwrap(), json!(true));
        assert_eq!(eval("false").unwrap(), json!(false));
        assert_eq!(eval("null").unwrap(), Value::Null);
        assert_eq!(eval("42").unwrap(), json!(42));
        assert_eq!(eval("2.5").unwrap(), json!(2.5));
        assert_eq!(eval("'single'").unwrap(), json!("single"));
        assert_eq!(eval("\"double\"").unwrap(), json!("double"));
        assert_eq!(eval(r"'it\'s'").unwrap(), json!("it's"));
    }

    #[test]
    fn test_wc004_variables_and_paths() {
        assert_eq!(eval("val").unwrap(), json!("hello"));
        assert_eq!(eval("user.name").unwrap(), json!("ada"));
        assert_eq!(eval("user.tags.1").unwrap(), json!("dev"));
        assert_eq!(eval("rows[1].name").unwrap(), json!("b"));
        assert_eq!(eval("rows.0.name").unwrap(), json!("a"));
        assert_eq!(eval("user['name']").unwrap(), json!("ada"));
        assert_eq!(eval("rows.length").unwrap(), json!(2));
        assert_eq!(eval("val.length").unwrap(), json!(5));
        assert_eq!(eval("user.missing").unwrap(), Value::Null);
    }

    #[test]
    fn test_wc004_unset_variable_is_error() {
        assert_eq!(
            eval("ghost == 1").unwrap_err(),
            EvalError::UnknownVariable("ghost".into())
        );
    }

    #[test]
    fn test_wc004_comparisons() {
        assert_eq!(eval("count == 3").unwrap(), json!(true));
        assert_eq!(eval("count == 3.0").unwrap(), json!(true));
        assert_eq!(eval("count != 3").unwrap(), json!(false));
        assert_eq!(eval("count > 2 && count <= 3").unwrap(), json!(true));
        assert_eq!(eval("val == 'hello'").unwrap(), json!(true));
        assert_eq!(eval("'a' < 'b'").unwrap(), json!(true));
        assert_eq!(eval("'admin' in user.tags").unwrap(), json!(true));
        assert_eq!(eval("'ell' in val").unwrap(), json!(true));
        assert!(matches!(eval("val < 3"), Err(EvalError::Type(_))));
    }

    #[test]
    fn test_wc004_logic_and_keywords() {
        assert!(evaluate_bool("!flag", &store()).unwrap());
        assert!(evaluate_bool("not flag and count == 3", &store()).unwrap());
        assert!(evaluate_bool("flag or val", &store()).unwrap());
        assert_eq!(eval("flag || 'fallback'").unwrap(), json!("fallback"));
        assert_eq!(eval("val && count").unwrap(), json!(3));
        // Short-circuit: the unset variable is never evaluated
        assert!(!evaluate_bool("false && ghost", &store()).unwrap());
        assert!(evaluate_bool("true || ghost", &store()).unwrap());
    }

    #[test]
    fn test_wc004_large_integers_compare_exactly() {
        let mut s = VariableStore::new();
        s.set("id", json!(9_007_199_254_740_993i64));
        s.set("big", json!(u64::MAX));
        assert!(!evaluate_bool("id == 9007199254740992", &s).unwrap());
        assert!(evaluate_bool("id != 9007199254740992", &s).unwrap());
        assert!(evaluate_bool("id > 9007199254740992", &s).unwrap());
        assert!(evaluate_bool("id == 9007199254740993", &s).unwrap());
        assert!(evaluate_bool("big > id", &s).unwrap());
        assert!(evaluate_bool("-1 < big", &s).unwrap());
    }

    #[test]
    fn test_wc004_precedence() {
        assert_eq!(eval("1 + 2 * 3").unwrap(), json!(7));
        assert_eq!(eval("(1 + 2) * 3").unwrap(), json!(9));
        assert_eq!(eval("-count + 1").unwrap(), json!(-2));
        assert_eq!(eval("7 % 4").unwrap(), json!(3));
        assert_eq!(eval("6 / 3").unwrap(), json!(2));
        assert_eq!(eval("7 / 2").unwrap(), json!(3.5));
        assert!(evaluate_bool("true || false && false", &store()).unwrap());
    }

    #[test]
    fn test_wc004_string_concat() {
        assert_eq!(eval("val + ' world'").unwrap(), json!("hello world"));
        assert_eq!(eval("'n=' + count").unwrap(), json!("n=3"));
    }

    #[test]
    fn test_wc004_functions() {
        assert_eq!(eval("len(rows)").unwrap(), json!(2));
        assert_eq!(eval("len(val)").unwrap(), json!(5));
        assert_eq!(eval("contains(user.tags, 'dev')").unwrap(), json!(true));
        assert_eq!(eval("starts_with(val, 'he')").unwrap(), json!(true));
        assert_eq!(eval("endsWith(val, 'lo')").unwrap(), json!(true));
        assert_eq!(eval("upper(val)").unwrap(), json!("HELLO"));
        assert_eq!(eval("lower('ABC')").unwrap(), json!("abc"));
        assert_eq!(eval("trim('  x ')").unwrap(), json!("x"));
        assert_eq!(eval("string(count)").unwrap(), json!("3"));
    }

    #[test]
    fn test_wc004_unknown_function() {
        assert_eq!(
            eval("exec('rm -rf /')").unwrap_err(),
            EvalError::UnknownFunction("exec".into())
        );
    }

    #[test]
    fn test_wc004_syntax_errors() {
        for src in ["", "   ", "1 +", "(1", "val ==", "'open", "a.", "1 2", "@", "and"] {
            assert!(
                matches!(parse(src), Err(EvalError::Syntax { .. })),
                "expected syntax error for {:?}",
                src
            );
        }
    }

    #[test]
    fn test_wc004_division_by_zero() {
        assert!(matches!(eval("1 / 0"), Err(EvalError::Type(_))));
        assert!(matches!(eval("1 % 0"), Err(EvalError::Type(_))));
    }

    #[test]
    fn test_wc004_nesting_limit() {
        let deep = format!("{}1{}", "(".repeat(500), ")".repeat(500));
        assert!(matches!(parse(&deep), Err(EvalError::Syntax { .. })));
        let negations = format!("{}true", "!".repeat(500));
        assert!(matches!(parse(&negations), Err(EvalError::Syntax { .. })));
    }

    #[test]
    fn test_wc004_truthiness() {
        assert!(!truthy(&json!(null)));
        assert!(!truthy(&json!(false)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!(0.0)));
        assert!(!truthy(&json!("")));
        assert!(truthy(&json!("false")));
        assert!(truthy(&json!([])));
        assert!(truthy(&json!({})));
        assert!(truthy(&json!(-1)));
    }

    proptest! {
        #[test]
        fn prop_integer_literals_roundtrip(n in 0i64..1_000_000) {
            prop_assert_eq!(evaluate(&n.to_string(), &VariableStore::new()).unwrap(), json!(n));
        }

        #[test]
        fn prop_equality_is_reflexive_for_stored_strings(s in "[a-zA-Z0-9 ]{0,24}") {
            let mut store = VariableStore::new();
            store.set("x", json!(s));
            prop_assert!(evaluate_bool("x == x", &store).unwrap());
        }

        #[test]
        fn prop_parser_never_panics(src in "[ -~]{0,40}") {
            let _ = parse(&src);
        }
    }
}
