//! Calculator Tool
//!
//! Evaluates arithmetic expressions with a small recursive-descent parser.

use async_trait::async_trait;
use serde_json::{Value, json};

use manus_core::{
    Result as CoreResult, Tool, ToolArgs, ToolSpec,
    tool::{ParameterSpec, arg_str},
};

const NAME: &str = "calculator";

/// Bound on nested unary operators, parentheses and exponents
const MAX_DEPTH: usize = 256;

/// Tool for evaluating mathematical expressions
pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            NAME,
            "Evaluate a mathematical expression. Supports + - * / % ^, parentheses, \
             sqrt, abs, ln, log10, sin, cos, tan and the constants pi and e.",
        )
        .param(
            "expression",
            ParameterSpec::new("string", "Expression to evaluate (e.g., '2 + 2', 'sqrt(16) * 3')"),
        )
    }

    async fn execute(&self, args: &ToolArgs) -> CoreResult<Value> {
        let expression = arg_str(NAME, args, "expression")?;

        match evaluate(expression) {
            Ok(result) => Ok(json!({ "expression": expression, "result": result })),
            Err(e) => Ok(json!({ "error": format!("cannot evaluate '{expression}': {e}") })),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut literal = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        literal.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = literal
                    .parse()
                    .map_err(|_| format!("invalid number '{literal}'"))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_alphabetic() => {
                let mut ident = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_alphanumeric() {
                        ident.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident.to_lowercase()));
            }
            '*' => {
                chars.next();
                if chars.peek() == Some(&'*') {
                    chars.next();
                    tokens.push(Token::Op('^'));
                } else {
                    tokens.push(Token::Op('*'));
                }
            }
            '+' | '-' | '/' | '%' | '^' => {
                chars.next();
                tokens.push(Token::Op(c));
            }
            '×' => {
                chars.next();
                tokens.push(Token::Op('*'));
            }
            '÷' => {
                chars.next();
                tokens.push(Token::Op('/'));
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat_op(&mut self, ops: &[char]) -> Option<char> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(op) => {
                let op = *op;
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, String> {
        let mut value = self.term()?;
        while let Some(op) = self.eat_op(&['+', '-']) {
            let rhs = self.term()?;
            value = if op == '+' { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    // term := unary (('*' | '/' | '%') unary)*
    fn term(&mut self) -> Result<f64, String> {
        let mut value = self.unary()?;
        while let Some(op) = self.eat_op(&['*', '/', '%']) {
            let rhs = self.unary()?;
            value = match op {
                '*' => value * rhs,
                _ if rhs == 0.0 => return Err("division by zero".into()),
                '/' => value / rhs,
                _ => value % rhs,
            };
        }
        Ok(value)
    }

    // unary := ('-' | '+') unary | power
    // Every recursive path passes through here, so depth is counted once.
    fn unary(&mut self) -> Result<f64, String> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err("expression nested too deeply".into());
        }
        let value = match self.eat_op(&['-', '+']) {
            Some('-') => self.unary().map(|v| -v),
            Some(_) => self.unary(),
            None => self.power(),
        };
        self.depth -= 1;
        value
    }

    // power := atom ('^' unary)?   (right-associative)
    fn power(&mut self) -> Result<f64, String> {
        let base = self.atom()?;
        if self.eat_op(&['^']).is_some() {
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<f64, String> {
        match self.next() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.expr()?;
                self.expect_rparen()?;
                Ok(value)
            }
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    let arg = self.expr()?;
                    self.expect_rparen()?;
                    apply_function(&name, arg)
                } else {
                    constant(&name)
                }
            }
            Some(token) => Err(format!("unexpected token {token:?}")),
            None => Err("unexpected end of expression".into()),
        }
    }

    fn expect_rparen(&mut self) -> Result<(), String> {
        match self.next() {
            Some(Token::RParen) => Ok(()),
            _ => Err("missing closing parenthesis".into()),
        }
    }
}

fn apply_function(name: &str, arg: f64) -> Result<f64, String> {
    match name {
        "sqrt" if arg < 0.0 => Err("square root of a negative number".into()),
        "sqrt" => Ok(arg.sqrt()),
        "abs" => Ok(arg.abs()),
        "ln" | "log10" if arg <= 0.0 => Err("logarithm of a non-positive number".into()),
        "ln" => Ok(arg.ln()),
        "log10" => Ok(arg.log10()),
        "sin" => Ok(arg.sin()),
        "cos" => Ok(arg.cos()),
        "tan" => Ok(arg.tan()),
        other => Err(format!("unknown function '{other}'")),
    }
}

fn constant(name: &str) -> Result<f64, String> {
    match name {
        "pi" => Ok(std::f64::consts::PI),
        "e" => Ok(std::f64::consts::E),
        other => Err(format!("unknown identifier '{other}'")),
    }
}

/// Evaluate an arithmetic expression
pub fn evaluate(expression: &str) -> Result<f64, String> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err("empty expression".into());
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if let Some(token) = parser.peek() {
        return Err(format!("unexpected trailing token {token:?}"));
    }
    if !value.is_finite() {
        return Err("result is not a finite number".into());
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(expression: &str, expected: f64) {
        let value = evaluate(expression).unwrap();
        assert!((value - expected).abs() < 1e-9, "{expression} = {value}, expected {expected}");
    }

    #[test]
    fn test_precedence() {
        approx("2 + 2", 4.0);
        approx("2 - 3 * 4", -10.0);
        approx("(2 + 3) * 4", 20.0);
        approx("10 / 4", 2.5);
        approx("10 % 4", 2.0);
        approx("2 ^ 3 ^ 2", 512.0);
        approx("2 ** 8", 256.0);
        approx("-2 ^ 2", -4.0);
        approx("3 × 4 ÷ 2", 6.0);
    }

    #[test]
    fn test_functions_and_constants() {
        approx("sqrt(16) * 3", 12.0);
        approx("abs(-5)", 5.0);
        approx("cos(0)", 1.0);
        approx("2 * pi", std::f64::consts::TAU);
        approx("log10(1000)", 3.0);
    }

    #[test]
    fn test_errors() {
        assert_eq!(evaluate("1 / 0").unwrap_err(), "division by zero");
        assert!(evaluate("").is_err());
        assert!(evaluate("(1 + 2").is_err());
        assert!(evaluate("1 + ").is_err());
        assert!(evaluate("sqrt(-1)").is_err());
        assert!(evaluate("foo(2)").is_err());
        assert!(evaluate("2 $ 3").is_err());
        assert!(evaluate("1 2").is_err());
    }

    #[test]
    fn test_nesting_is_bounded() {
        let signs = format!("{}1", "-".repeat(200_000));
        assert_eq!(evaluate(&signs).unwrap_err(), "expression nested too deeply");

        let parens = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
        assert_eq!(evaluate(&parens).unwrap_err(), "expression nested too deeply");

        let powers = vec!["2"; 10_000].join("^");
        assert!(evaluate(&powers).is_err());

        approx(&format!("{}1{}", "(".repeat(50), ")".repeat(50)), 1.0);
        approx("--1", 1.0);
    }

    #[tokio::test]
    async fn test_deep_nesting_is_structured_error() {
        let mut args = ToolArgs::new();
        args.insert("expression".into(), json!(format!("{}1", "-".repeat(200_000))));

        let result = CalculatorTool.execute(&args).await.unwrap();
        assert!(result["error"].as_str().unwrap().contains("nested too deeply"));
    }

    #[tokio::test]
    async fn test_domain_error_is_structured() {
        let mut args = ToolArgs::new();
        args.insert("expression".into(), json!("1/0"));

        let result = CalculatorTool.execute(&args).await.unwrap();
        assert!(result["error"].as_str().unwrap().contains("division by zero"));
    }

    #[tokio::test]
    async fn test_result_payload() {
        let mut args = ToolArgs::new();
        args.insert("expression".into(), json!("6 * 7"));

        let result = CalculatorTool.execute(&args).await.unwrap();
        assert_eq!(result, json!({"expression": "6 * 7", "result": 42.0}));
    }
}
