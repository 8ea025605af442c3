//! Arithmetic formulas over account codes.
//!
//! The grammar is closed; nothing outside it is ever evaluated:
//!
//! ```text
//!   expression     --> additive
//!   additive       --> multiplicative ( ("+" | "-") multiplicative )*
//!   multiplicative --> unary ( ("*" | "/") unary )*
//!   unary          --> ("-" | "+") unary | primary
//!   primary        --> CODE | "(" expression ")"
//!   CODE           --> DIGITS ( "." DIGITS )*
//! ```
//!
//! A `CODE` token naming an account of the chart becomes a placeholder slot
//! bound to that account's resolved value at evaluation time. Any other token
//! that reads as a number is a literal; the rest are references to unknown
//! accounts and evaluate to 0.

use crate::hierarchy::Hierarchy;
use log::warn;
use std::iter::Peekable;
use std::str::CharIndices;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("unexpected token {found} (expected {expected})")]
    UnexpectedToken { found: String, expected: &'static str },

    #[error("unexpected end of formula")]
    UnexpectedEnd,

    #[error("empty formula")]
    Empty,

    #[error("division by zero")]
    DivisionByZero,

    #[error("result is not a finite number")]
    NonFinite,

    #[error("circular reference through account {0}")]
    CycleDetected(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Code(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    End,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Code(code) => format!("'{}'", code),
            Token::Plus => "'+'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::Slash => "'/'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::End => "end of formula".to_string(),
        }
    }
}

struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
        }
    }

    fn next_token(&mut self) -> Result<Token, FormulaError> {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}

        let Some((offset, ch)) = self.chars.next() else {
            return Ok(Token::End);
        };

        match ch {
            '+' => Ok(Token::Plus),
            '-' => Ok(Token::Minus),
            '*' => Ok(Token::Star),
            '/' => Ok(Token::Slash),
            '(' => Ok(Token::LParen),
            ')' => Ok(Token::RParen),
            c if c.is_ascii_digit() => Ok(self.read_code(offset)),
            c => Err(FormulaError::UnexpectedChar { ch: c, offset }),
        }
    }

    /// Reads `DIGITS ( "." DIGITS )*`. A dot is only consumed when a digit
    /// follows it, so "1." leaves the dot for the parser to reject.
    fn read_code(&mut self, start: usize) -> Token {
        let mut end = start + 1;
        loop {
            while let Some((idx, _)) = self.chars.next_if(|(_, c)| c.is_ascii_digit()) {
                end = idx + 1;
            }

            let rest = &self.source[end..];
            let mut ahead = rest.chars();
            let dot_then_digit =
                ahead.next() == Some('.') && ahead.next().is_some_and(|c| c.is_ascii_digit());
            if !dot_then_digit {
                break;
            }
            self.chars.next();
            end += 1;
        }
        Token::Code(self.source[start..end].to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(f64),
    /// Index into [`Formula::references`].
    Placeholder(usize),
    Negate(Box<Expression>),
    Binary {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
}

struct Parser<'a, F: Fn(&str) -> bool> {
    lexer: Lexer<'a>,
    current: Token,
    is_account: F,
    references: Vec<String>,
}

impl<'a, F: Fn(&str) -> bool> Parser<'a, F> {
    fn new(source: &'a str, is_account: F) -> Result<Self, FormulaError> {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token()?;
        Ok(Self {
            lexer,
            current,
            is_account,
            references: Vec::new(),
        })
    }

    fn advance(&mut self) -> Result<(), FormulaError> {
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    fn parse(mut self) -> Result<(Expression, Vec<String>), FormulaError> {
        if self.current == Token::End {
            return Err(FormulaError::Empty);
        }

        let expr = self.parse_additive()?;
        if self.current != Token::End {
            return Err(FormulaError::UnexpectedToken {
                found: self.current.describe(),
                expected: "an operator or end of formula",
            });
        }
        Ok((expr, self.references))
    }

    fn parse_additive(&mut self) -> Result<Expression, FormulaError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_multiplicative()?;
            left = Expression::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expression, FormulaError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_unary()?;
            left = Expression::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression, FormulaError> {
        match self.current {
            Token::Minus => {
                self.advance()?;
                Ok(Expression::Negate(Box::new(self.parse_unary()?)))
            }
            Token::Plus => {
                self.advance()?;
                self.parse_unary()
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expression, FormulaError> {
        match std::mem::replace(&mut self.current, Token::End) {
            Token::Code(code) => {
                self.advance()?;
                Ok(self.code_expression(code))
            }
            Token::LParen => {
                self.advance()?;
                let inner = self.parse_additive()?;
                if self.current != Token::RParen {
                    return Err(match self.current {
                        Token::End => FormulaError::UnexpectedEnd,
                        ref other => FormulaError::UnexpectedToken {
                            found: other.describe(),
                            expected: "')'",
                        },
                    });
                }
                self.advance()?;
                Ok(inner)
            }
            Token::End => Err(FormulaError::UnexpectedEnd),
            other => Err(FormulaError::UnexpectedToken {
                found: other.describe(),
                expected: "an account code, a number or '('",
            }),
        }
    }

    fn code_expression(&mut self, code: String) -> Expression {
        if !(self.is_account)(&code) {
            if let Ok(number) = code.parse::<f64>() {
                return Expression::Literal(number);
            }
        }

        let slot = match self.references.iter().position(|r| *r == code) {
            Some(slot) => slot,
            None => {
                self.references.push(code);
                self.references.len() - 1
            }
        };
        Expression::Placeholder(slot)
    }
}

/// A parsed formula: the syntax tree plus the distinct account codes it
/// references, in order of first appearance.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    expression: Expression,
    references: Vec<String>,
}

impl Formula {
    /// Parses `source`. `is_account` decides whether a code-shaped token
    /// refers to an account or is a numeric literal.
    pub fn parse(source: &str, is_account: impl Fn(&str) -> bool) -> Result<Self, FormulaError> {
        let (expression, references) = Parser::new(source, is_account)?.parse()?;
        Ok(Self {
            source: source.to_string(),
            expression,
            references,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    pub fn references(&self) -> &[String] {
        &self.references
    }

    /// Evaluates with `bindings[i]` as the value of `references()[i]`.
    /// Missing bindings count as 0.
    pub fn evaluate(&self, bindings: &[f64]) -> Result<f64, FormulaError> {
        let value = eval(&self.expression, bindings)?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(FormulaError::NonFinite)
        }
    }
}

fn eval(expr: &Expression, bindings: &[f64]) -> Result<f64, FormulaError> {
    match expr {
        Expression::Literal(n) => Ok(*n),
        Expression::Placeholder(slot) => Ok(bindings.get(*slot).copied().unwrap_or(0.0)),
        Expression::Negate(inner) => Ok(-eval(inner, bindings)?),
        Expression::Binary { left, op, right } => {
            let l = eval(left, bindings)?;
            let r = eval(right, bindings)?;
            match op {
                BinaryOperator::Add => Ok(l + r),
                BinaryOperator::Subtract => Ok(l - r),
                BinaryOperator::Multiply => Ok(l * r),
                BinaryOperator::Divide => {
                    if r == 0.0 {
                        Err(FormulaError::DivisionByZero)
                    } else {
                        Ok(l / r)
                    }
                }
            }
        }
    }
}

/// Compiled formulas of one chart, indexed like the chart's accounts.
/// Each placeholder slot is pre-mapped to the account index it names
/// (`None` for codes absent from the chart).
#[derive(Debug)]
pub struct FormulaTable {
    entries: Vec<Option<CompiledFormula>>,
}

#[derive(Debug)]
pub enum CompiledFormula {
    Ready {
        formula: Formula,
        targets: Vec<Option<usize>>,
    },
    Invalid {
        source: String,
        error: FormulaError,
    },
}

impl FormulaTable {
    pub fn compile(hierarchy: &Hierarchy<'_>) -> Self {
        let entries = hierarchy
            .accounts()
            .iter()
            .map(|account| {
                let source = account.formula.as_deref()?;
                let compiled = match Formula::parse(source, |code| hierarchy.contains(code)) {
                    Ok(formula) => {
                        let targets = formula
                            .references()
                            .iter()
                            .map(|code| hierarchy.index_of(code))
                            .collect();
                        CompiledFormula::Ready { formula, targets }
                    }
                    Err(error) => {
                        warn!(
                            "Formula '{}' of account {} cannot be parsed ({}); its value will be 0",
                            source, account.code, error
                        );
                        CompiledFormula::Invalid {
                            source: source.to_string(),
                            error,
                        }
                    }
                };
                Some(compiled)
            })
            .collect();

        Self { entries }
    }

    pub fn get(&self, idx: usize) -> Option<&CompiledFormula> {
        self.entries.get(idx)?.as_ref()
    }
}
