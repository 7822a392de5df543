use logos::Logos;

use crate::source::Span;

#[derive(Logos, Debug, PartialEq, Clone)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("^")]
    Caret,
    #[token("=")]
    Assign,
    #[token(",")]
    Comma,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,

    // Literals: plain, fractional and scientific ("1", "2.5", ".5", "3e-4", "1.E6")
    #[regex(r"[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
}

impl Token {
    /// Binary operators that may sit between two operands.
    pub fn is_binary_op(&self) -> bool {
        matches!(
            self,
            Token::Plus | Token::Minus | Token::Star | Token::Slash | Token::Percent | Token::Caret
        )
    }

    pub fn describe(&self) -> String {
        match self {
            Token::Plus => "'+'".into(),
            Token::Minus => "'-'".into(),
            Token::Star => "'*'".into(),
            Token::Slash => "'/'".into(),
            Token::Percent => "'%'".into(),
            Token::Caret => "'^'".into(),
            Token::Assign => "'='".into(),
            Token::Comma => "','".into(),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
            Token::Number(n) => format!("number {n}"),
            Token::Ident(name) => format!("'{name}'"),
        }
    }
}

/// Lex an expression into tokens with byte spans.
pub fn lex(source: &str) -> Result<Vec<(Token, Span)>, LexError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        let range = lexer.span();
        let span = Span::new(range.start, range.end);
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => {
                return Err(LexError {
                    position: span.start,
                    snippet: source[range].to_string(),
                });
            }
        }
    }

    Ok(tokens)
}

#[derive(Debug, thiserror::Error)]
#[error("unexpected character(s) '{snippet}' at position {position}")]
pub struct LexError {
    pub position: usize,
    pub snippet: String,
}
