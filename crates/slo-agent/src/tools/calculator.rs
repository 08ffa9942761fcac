use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::{AgentError, AgentResult};
use crate::models::tool::Tool;
use crate::tools::ToolHandler;

pub struct CalculatorTool;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CalculatorArgs {
    expression: String,
}

#[async_trait]
impl ToolHandler for CalculatorTool {
    fn definition(&self) -> Tool {
        Tool::new(
            "calculator",
            "Evaluate an arithmetic expression. Supports +, -, *, /, ^ and parentheses.",
            json!({
                "type": "object",
                "properties": {
                    "expression": {
                        "type": "string",
                        "description": "The expression to evaluate, e.g. '25 * 47'"
                    }
                },
                "required": ["expression"]
            }),
        )
    }

    async fn call(&self, arguments: Value) -> AgentResult<String> {
        let args: CalculatorArgs = serde_json::from_value(arguments)
            .map_err(|e| AgentError::InvalidParameters(e.to_string()))?;

        let value = evaluate(&args.expression).map_err(AgentError::ExecutionError)?;
        Ok(format_number(value))
    }
}

/// Integer results render without a trailing `.0` so `25 * 47` reads `1175`.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

struct Parser<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

/// Recursive-descent evaluation over the usual precedence ladder:
/// addition/subtraction, multiplication/division, then right-associative
/// exponentiation and unary minus.
fn evaluate(expression: &str) -> Result<f64, String> {
    let mut parser = Parser {
        chars: expression.chars().peekable(),
    };
    let value = parser.expr()?;
    parser.skip_spaces();
    match parser.chars.peek() {
        None => Ok(value),
        Some(c) => Err(format!("unexpected character '{}'", c)),
    }
}

impl<'a> Parser<'a> {
    fn skip_spaces(&mut self) {
        while matches!(self.chars.peek(), Some(c) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn expr(&mut self) -> Result<f64, String> {
        let mut value = self.term()?;
        loop {
            self.skip_spaces();
            match self.chars.peek() {
                Some('+') => {
                    self.chars.next();
                    value += self.term()?;
                }
                Some('-') => {
                    self.chars.next();
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> Result<f64, String> {
        let mut value = self.power()?;
        loop {
            self.skip_spaces();
            match self.chars.peek() {
                Some('*') => {
                    self.chars.next();
                    value *= self.power()?;
                }
                Some('/') => {
                    self.chars.next();
                    let divisor = self.power()?;
                    if divisor == 0.0 {
                        return Err("division by zero".to_string());
                    }
                    value /= divisor;
                }
                _ => return Ok(value),
            }
        }
    }

    fn power(&mut self) -> Result<f64, String> {
        let base = self.factor()?;
        self.skip_spaces();
        if let Some('^') = self.chars.peek() {
            self.chars.next();
            // Right-associative: 2 ^ 3 ^ 2 is 2 ^ (3 ^ 2).
            let exponent = self.power()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn factor(&mut self) -> Result<f64, String> {
        self.skip_spaces();
        match self.chars.peek() {
            Some('-') => {
                self.chars.next();
                Ok(-self.factor()?)
            }
            Some('(') => {
                self.chars.next();
                let value = self.expr()?;
                self.skip_spaces();
                match self.chars.next() {
                    Some(')') => Ok(value),
                    _ => Err("missing closing parenthesis".to_string()),
                }
            }
            Some(c) if c.is_ascii_digit() || *c == '.' => self.number(),
            Some(c) => Err(format!("unexpected character '{}'", c)),
            None => Err("unexpected end of expression".to_string()),
        }
    }

    fn number(&mut self) -> Result<f64, String> {
        let mut raw = String::new();
        while matches!(self.chars.peek(), Some(c) if c.is_ascii_digit() || *c == '.') {
            raw.push(self.chars.next().unwrap());
        }
        raw.parse::<f64>()
            .map_err(|_| format!("invalid number '{}'", raw))
    }
}
