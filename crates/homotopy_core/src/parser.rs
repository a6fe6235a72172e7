//! Text front-end: builds expression trees from strings such as
//! `"x^2 + 3*y - 1.25"`.
//!
//! Numeric literals are kept exact. `pi`, `e` and `I` denote the constants
//! unless the symbol table defines them.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::function_tree::{self as ft, Node, NodeKind, Number};

/// Names visible to the parser: variables and named subexpressions.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: HashMap<String, Node>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a variable, registers it under its name and returns it.
    pub fn variable(&mut self, name: &str) -> Node {
        let node = Node::variable(name);
        self.symbols.insert(name.to_string(), node.clone());
        node
    }

    /// Registers an existing node, typically a variable or a subfunction.
    pub fn insert(&mut self, name: impl Into<String>, node: Node) {
        self.symbols.insert(name.into(), node);
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.symbols.get(name)
    }
}

/// Parses `input` into a node whose variables are taken from `symbols`.
pub fn parse_expression(input: &str, symbols: &SymbolTable) -> Result<Node> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        symbols,
    };
    let node = parser.parse_expression()?;
    match parser.peek() {
        None => Ok(node),
        Some(token) => Err(Error::Parse(format!("Unexpected trailing {:?}", token))),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(String),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];
        if c.is_whitespace() {
            pos += 1;
        } else if c.is_ascii_digit() || c == '.' {
            let start = pos;
            while pos < chars.len() && (chars[pos].is_ascii_digit() || chars[pos] == '.') {
                pos += 1;
            }
            // Scientific exponent, only if digits follow: `2e` stays `2*e` territory.
            if pos < chars.len() && (chars[pos] == 'e' || chars[pos] == 'E') {
                let mut look = pos + 1;
                if look < chars.len() && (chars[look] == '+' || chars[look] == '-') {
                    look += 1;
                }
                if look < chars.len() && chars[look].is_ascii_digit() {
                    pos = look;
                    while pos < chars.len() && chars[pos].is_ascii_digit() {
                        pos += 1;
                    }
                }
            }
            tokens.push(Token::Number(chars[start..pos].iter().collect()));
        } else if c.is_alphabetic() || c == '_' {
            let start = pos;
            while pos < chars.len() && (chars[pos].is_alphanumeric() || chars[pos] == '_') {
                pos += 1;
            }
            tokens.push(Token::Identifier(chars[start..pos].iter().collect()));
        } else {
            tokens.push(match c {
                '+' => Token::Plus,
                '-' => Token::Minus,
                '*' => Token::Star,
                '/' => Token::Slash,
                '^' => Token::Caret,
                '(' => Token::LParen,
                ')' => Token::RParen,
                other => return Err(Error::Parse(format!("Unexpected character '{}'", other))),
            });
            pos += 1;
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    symbols: &'a SymbolTable,
}

impl Parser<'_> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).cloned()
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect_rparen(&mut self) -> Result<()> {
        match self.consume() {
            Some(Token::RParen) => Ok(()),
            _ => Err(Error::Parse("Expected ')'".to_string())),
        }
    }

    fn parse_expression(&mut self) -> Result<Node> {
        self.parse_term()
    }

    fn parse_term(&mut self) -> Result<Node> {
        let mut left = self.parse_factor_op()?;

        while let Some(token) = self.peek() {
            match token {
                Token::Plus => {
                    self.consume();
                    let right = self.parse_factor_op()?;
                    left = left + right;
                }
                Token::Minus => {
                    self.consume();
                    let right = self.parse_factor_op()?;
                    left = left - right;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_factor_op(&mut self) -> Result<Node> {
        let mut left = self.parse_unary()?;

        while let Some(token) = self.peek() {
            match token {
                Token::Star => {
                    self.consume();
                    let right = self.parse_unary()?;
                    left = left * right;
                }
                Token::Slash => {
                    self.consume();
                    let right = self.parse_unary()?;
                    left = left / right;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Node> {
        match self.peek() {
            Some(Token::Minus) => {
                self.consume();
                Ok(-self.parse_unary()?)
            }
            Some(Token::Plus) => {
                self.consume();
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    /// Right associative; the exponent may carry a sign, as in `x^-2`.
    fn parse_power(&mut self) -> Result<Node> {
        let base = self.parse_primary()?;
        if let Some(Token::Caret) = self.peek() {
            self.consume();
            let exponent = self.parse_unary()?;
            return Ok(match integer_value(&exponent) {
                Some(k) => match i32::try_from(k) {
                    Ok(k) => ft::pow(&base, k),
                    Err(_) => Node::power(base, exponent),
                },
                None => Node::power(base, exponent),
            });
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Node> {
        match self.consume() {
            Some(Token::Number(text)) => number_literal(&text),
            Some(Token::Identifier(name)) => {
                if let Some(Token::LParen) = self.peek() {
                    self.consume();
                    let arg = self.parse_expression()?;
                    self.expect_rparen()?;
                    apply_function(&name, &arg)
                } else {
                    self.symbol(&name)
                }
            }
            Some(Token::LParen) => {
                let expr = self.parse_expression()?;
                self.expect_rparen()?;
                Ok(expr)
            }
            Some(token) => Err(Error::Parse(format!("Unexpected token {:?}", token))),
            None => Err(Error::Parse("Unexpected end of input".to_string())),
        }
    }

    fn symbol(&self, name: &str) -> Result<Node> {
        if let Some(node) = self.symbols.get(name) {
            return Ok(node.clone());
        }
        match name {
            "pi" => Ok(ft::pi()),
            "e" => Ok(ft::e()),
            "I" => Ok(ft::i()),
            _ => Err(Error::UnknownSymbol(name.to_string())),
        }
    }
}

fn number_literal(text: &str) -> Result<Node> {
    if text.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(value) = text.parse::<i64>() {
            return Ok(Node::integer(value));
        }
    }
    Node::float(text, "")
}

/// Integer value of a constant exponent, looking through one negation.
fn integer_value(node: &Node) -> Option<i64> {
    match &*node.kind() {
        NodeKind::Number(n) => n.as_integer(),
        NodeKind::Unary(ft::UnaryOp::Negate, inner) => match &*inner.kind() {
            NodeKind::Number(Number::Integer(k)) => Some(-k),
            _ => None,
        },
        _ => None,
    }
}

fn apply_function(name: &str, arg: &Node) -> Result<Node> {
    Ok(match name {
        "sqrt" => ft::sqrt(arg),
        "sin" => ft::sin(arg),
        "cos" => ft::cos(arg),
        "tan" => ft::tan(arg),
        "exp" => ft::exp(arg),
        "log" | "ln" => ft::log(arg),
        "asin" => ft::asin(arg),
        "acos" => ft::acos(arg),
        "atan" => ft::atan(arg),
        _ => return Err(Error::UnknownSymbol(name.to_string())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;

    fn table() -> (SymbolTable, Node, Node) {
        let mut symbols = SymbolTable::new();
        let x = symbols.variable("x");
        let y = symbols.variable("y");
        (symbols, x, y)
    }

    #[test]
    fn parses_polynomial_with_exact_constants() {
        let (symbols, x, y) = table();
        let f = parse_expression("x^2 + 3*y - 1.25", &symbols).expect("Failed to parse");
        x.set_value(Complex64::new(2.0, 0.0));
        y.set_value(Complex64::new(1.0, 0.0));
        assert_eq!(f.eval::<Complex64>(None), Complex64::new(5.75, 0.0));
        assert_eq!(f.degree(), 2);
    }

    #[test]
    fn precedence_and_signs() {
        let (symbols, x, _) = table();
        x.set_value(Complex64::new(3.0, 0.0));
        let cases = [
            ("-x^2", -9.0),
            ("2^3^2", 512.0),
            ("x^-1*9", 3.0),
            ("(1 + x) * 2 - 4 / 2", 6.0),
            ("-(x - 1)", -2.0),
            ("1.5e1 - x", 12.0),
        ];
        for (text, expected) in cases {
            let f = parse_expression(text, &symbols).expect("Failed to parse");
            let value: Complex64 = f.eval(None);
            assert!((value.re - expected).abs() < 1e-12, "{} gave {}", text, value);
        }
    }

    #[test]
    fn shares_variables_from_table() {
        let (symbols, x, _) = table();
        let f = parse_expression("x*x", &symbols).expect("Failed to parse");
        assert!(f.children().iter().all(|c| c.ptr_eq(&x)));
    }

    #[test]
    fn constants_and_functions() {
        let (symbols, x, _) = table();
        x.set_value(Complex64::new(0.5, 0.0));
        let f = parse_expression("sin(pi*x) + exp(0) + I*I + e^0", &symbols).expect("Failed to parse");
        let value: Complex64 = f.eval(None);
        assert!((value - Complex64::new(2.0, 0.0)).norm() < 1e-14);
    }

    #[test]
    fn reports_errors() {
        let (symbols, _, _) = table();
        assert!(matches!(parse_expression("z + 1", &symbols), Err(Error::UnknownSymbol(_))));
        assert!(matches!(parse_expression("foo(x)", &symbols), Err(Error::UnknownSymbol(_))));
        assert!(matches!(parse_expression("(x + 1", &symbols), Err(Error::Parse(_))));
        assert!(matches!(parse_expression("x $ 1", &symbols), Err(Error::Parse(_))));
        assert!(matches!(parse_expression("x 1", &symbols), Err(Error::Parse(_))));
        assert!(matches!(parse_expression("1.2.3", &symbols), Err(Error::InvalidLiteral(_))));
    }

    #[test]
    fn round_trips_through_display() {
        let (symbols, x, y) = table();
        let f = parse_expression("x^2*y - x/3 + sin(y) - 2", &symbols).expect("Failed to parse");
        let g = parse_expression(&f.to_string(), &symbols).expect("Failed to reparse");
        x.set_value(Complex64::new(0.3, -1.1));
        y.set_value(Complex64::new(2.0, 0.4));
        let (a, b): (Complex64, Complex64) = (f.eval(None), g.eval(None));
        assert!((a - b).norm() < 1e-14);
    }
}
