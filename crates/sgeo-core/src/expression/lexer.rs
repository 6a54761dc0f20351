//! 词法分析

use super::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LeftParen,
    RightParen,
    Comma,
}

/// 词法单元，`position` 为字符偏移
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
    pub text: String,
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, ExprError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let start = i;
        let kind = match c {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '^' => TokenKind::Caret,
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            ',' => TokenKind::Comma,
            c if c.is_ascii_digit() || c == '.' => {
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(Token {
                    kind: TokenKind::Number(parse_number(&text, start)?),
                    position: start,
                    text,
                });
                continue;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(Token {
                    kind: TokenKind::Identifier(text.clone()),
                    position: start,
                    text,
                });
                continue;
            }
            other => {
                return Err(ExprError::UnexpectedCharacter {
                    character: other,
                    position: start,
                })
            }
        };
        tokens.push(Token {
            kind,
            position: start,
            text: c.to_string(),
        });
        i += 1;
    }

    Ok(tokens)
}

/// 数字字面量：`digits`、`digits.digits` 或 `.digits`，不支持指数形式
fn parse_number(text: &str, position: usize) -> Result<f64, ExprError> {
    let malformed = || ExprError::MalformedNumber {
        text: text.to_string(),
        position,
    };
    let mut parts = text.split('.');
    let whole = parts.next().unwrap_or("");
    let fraction = parts.next();
    if parts.next().is_some() || fraction == Some("") || (whole.is_empty() && fraction.is_none()) {
        return Err(malformed());
    }
    text.parse::<f64>().map_err(|_| malformed())
}
