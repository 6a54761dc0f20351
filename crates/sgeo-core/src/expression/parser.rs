//! 递归下降语法分析
//!
//! 优先级从高到低：括号、字面量、常量、变量、一元负号、`^`（右结合）、
//! `*` `/`（左结合）、`+` `-`（左结合）。

use super::lexer::{Token, TokenKind};
use super::{BinaryOp, Expr, ExprError, Function};

pub struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
    end: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, source_len: usize) -> Self {
        Self {
            tokens,
            cursor: 0,
            end: source_len,
        }
    }

    /// 解析完整输入
    pub fn parse(mut self) -> Result<Expr, ExprError> {
        if self.tokens.is_empty() {
            return Err(ExprError::Empty);
        }
        let expr = self.expression()?;
        match self.peek() {
            None => Ok(expr),
            Some(token) => Err(match token.kind {
                TokenKind::RightParen => ExprError::MissingParenthesis {
                    position: token.position,
                },
                TokenKind::Number(_) | TokenKind::Identifier(_) | TokenKind::LeftParen => {
                    ExprError::MissingOperator {
                        position: token.position,
                    }
                }
                _ => ExprError::UnexpectedToken {
                    token: token.text.clone(),
                    position: token.position,
                },
            }),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor).cloned();
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek().map(|t| &t.kind == kind).unwrap_or(false)
    }

    fn expression(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek().map(|t| &t.kind) {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Subtract,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.term()?;
            left = Expr::binary(op, left, right);
        }
    }

    fn term(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.power()?;
        loop {
            let op = match self.peek().map(|t| &t.kind) {
                Some(TokenKind::Star) => BinaryOp::Multiply,
                Some(TokenKind::Slash) => BinaryOp::Divide,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.power()?;
            left = Expr::binary(op, left, right);
        }
    }

    fn power(&mut self) -> Result<Expr, ExprError> {
        let base = self.unary()?;
        if self.check(&TokenKind::Caret) {
            self.advance();
            let exponent = self.power()?;
            return Ok(Expr::binary(BinaryOp::Power, base, exponent));
        }
        Ok(base)
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        if self.check(&TokenKind::Minus) {
            self.advance();
            let operand = self.unary()?;
            return Ok(Expr::Negate(Box::new(operand)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        let Some(token) = self.advance() else {
            return Err(ExprError::MissingOperand {
                found: "end of input".to_string(),
                position: self.end,
            });
        };

        match &token.kind {
            TokenKind::Number(value) => Ok(Expr::Number(*value)),
            TokenKind::LeftParen => {
                let inner = self.expression()?;
                if !self.check(&TokenKind::RightParen) {
                    return Err(ExprError::MissingParenthesis {
                        position: token.position,
                    });
                }
                self.advance();
                Ok(inner)
            }
            TokenKind::Identifier(name) => {
                if let Some(function) = Function::from_name(name) {
                    return self.call(function, &token);
                }
                match name.as_str() {
                    "pi" => Ok(Expr::Constant {
                        name: "pi",
                        value: std::f64::consts::PI,
                    }),
                    "e" => Ok(Expr::Constant {
                        name: "e",
                        value: std::f64::consts::E,
                    }),
                    _ => Ok(Expr::Variable(name.clone())),
                }
            }
            _ => Err(ExprError::MissingOperand {
                found: token.text.clone(),
                position: token.position,
            }),
        }
    }

    fn call(&mut self, function: Function, name_token: &Token) -> Result<Expr, ExprError> {
        let open = match self.peek() {
            Some(t) if t.kind == TokenKind::LeftParen => t.position,
            _ => {
                return Err(ExprError::MissingFunctionParenthesis {
                    function: name_token.text.clone(),
                    position: name_token.position,
                })
            }
        };
        self.advance();

        let mut args = vec![self.expression()?];
        while self.check(&TokenKind::Comma) {
            self.advance();
            args.push(self.expression()?);
        }
        if !self.check(&TokenKind::RightParen) {
            return Err(ExprError::MissingParenthesis { position: open });
        }
        self.advance();

        let (min, max) = function.arity();
        if args.len() < min || max.map(|m| args.len() > m).unwrap_or(false) {
            return Err(ExprError::WrongArgumentCount {
                function: name_token.text.clone(),
                found: args.len(),
            });
        }
        Ok(Expr::Call { function, args })
    }
}
