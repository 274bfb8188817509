use thiserror::Error;

/// Failures while turning source text into a parse tree. Everything past
/// the parse phase travels as a first-class `Value::Err` instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("expected '{0}' before end of input")]
    Unclosed(char),
    #[error("unexpected '{0}'")]
    UnexpectedClose(char),
    #[error("unexpected end of input")]
    UnexpectedEof,
}

pub type Result<T> = std::result::Result<T, ParseError>;
