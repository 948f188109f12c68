use std::fmt::Display;

use crate::span::Position;

pub const KEYWORDS: &[&str] = &[
    "fn", "local", "const", "class", "if", "elseif", "else", "for", "in", "while", "return",
    "print", "true", "false", "nil", "and", "or", "not", "break", "continue",
];

pub const TYPE_NAMES: &[&str] = &[
    "number", "string", "bool", "array", "Class", "function", "table",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Number,
    String,
    Identifier,
    Keyword,
    TypeName,
    Operator,
    Punctuation,
    Comment,
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Number => write!(f, "number"),
            TokenKind::String => write!(f, "string"),
            TokenKind::Identifier => write!(f, "identifier"),
            TokenKind::Keyword => write!(f, "keyword"),
            TokenKind::TypeName => write!(f, "type name"),
            TokenKind::Operator => write!(f, "operator"),
            TokenKind::Punctuation => write!(f, "punctuation"),
            TokenKind::Comment => write!(f, "comment"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, position: Position) -> Self {
        Self {
            kind,
            text: text.into(),
            line: position.line,
            column: position.column,
        }
    }

    pub fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
        }
    }

    pub fn is(&self, kind: TokenKind, text: &str) -> bool {
        self.kind == kind && self.text == text
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            TokenKind::String => write!(f, "\"{}\"", self.text),
            _ => write!(f, "{}", self.text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TokenizeError {
    #[error("Unexpected character '{character}' at {line}:{column}")]
    UnexpectedCharacter {
        character: char,
        line: usize,
        column: usize,
    },
    #[error("Unterminated string starting at {line}:{column}")]
    UnterminatedString { line: usize, column: usize },
}

pub fn tokens(source: &str) -> Result<Vec<Token>, TokenizeError> {
    let mut tokens = Vec::new();
    let mut remaining = source;
    let mut position = Position::start();

    while let Some((token, rest)) = token(remaining, &mut position)? {
        tokens.push(token);
        remaining = rest;
    }

    Ok(tokens)
}

/// Scans one token, skipping leading whitespace. `position` is moved past
/// everything consumed. Returns `None` at end of input.
pub fn token<'a>(
    mut source: &'a str,
    position: &mut Position,
) -> Result<Option<(Token, &'a str)>, TokenizeError> {
    if let Some((_, rest)) = whitespace(source) {
        *position = position.advance(&source[..source.len() - rest.len()]);
        source = rest;
    }

    let Some(first) = source.chars().next() else {
        return Ok(None);
    };

    let start = *position;
    let ((kind, text), rest) = maximal(
        &[
            comment,
            // operators
            concat,
            equal_equal,
            bang_equal,
            less_equal,
            greater_equal,
            less,
            greater,
            plus,
            minus,
            star,
            slash,
            percent,
            caret,
            equal,
            // punctuation
            left_paren,
            right_paren,
            left_brace,
            right_brace,
            comma,
            colon,
            semicolon,
            dot,
            // literals
            word,
            string,
            number,
        ],
        source,
    )
    .ok_or(if first == '"' {
        TokenizeError::UnterminatedString {
            line: start.line,
            column: start.column,
        }
    } else {
        TokenizeError::UnexpectedCharacter {
            character: first,
            line: start.line,
            column: start.column,
        }
    })?;

    *position = position.advance(&source[..source.len() - rest.len()]);
    Ok(Some((Token::new(kind, text, start), rest)))
}

type Lexeme = (TokenKind, String);

fn maximal<'a, T: std::fmt::Debug>(
    parsers: &[fn(&str) -> Option<(T, &str)>],
    source: &'a str,
) -> Option<(T, &'a str)> {
    let mut min_left = source.len() + 1;
    let mut max_match = None;

    let matching_parsers = parsers.iter().filter_map(|parser| parser(source));
    for (m, rest) in matching_parsers {
        let left = rest.len();
        if left < min_left {
            min_left = left;
            max_match = Some((m, rest));
        }
    }

    max_match
}

fn whitespace(source: &str) -> Option<((), &str)> {
    let len = source
        .chars()
        .take_while(|c| c.is_whitespace())
        .map(char::len_utf8)
        .sum();
    if len > 0 {
        Some(((), &source[len..]))
    } else {
        None
    }
}

fn comment(source: &str) -> Option<(Lexeme, &str)> {
    if source.starts_with("--") {
        let len = source
            .chars()
            .take_while(|c| *c != '\n')
            .map(char::len_utf8)
            .sum();
        Some((
            (TokenKind::Comment, source[..len].to_string()),
            &source[len..],
        ))
    } else {
        None
    }
}

macro_rules! match_literal {
    ($name:ident, $word:literal, $kind:expr) => {
        fn $name(source: &str) -> Option<(Lexeme, &str)> {
            if source.starts_with($word) {
                Some((($kind, $word.to_string()), &source[$word.len()..]))
            } else {
                None
            }
        }
    };
}

match_literal! { concat, "..", TokenKind::Operator }
match_literal! { equal_equal, "==", TokenKind::Operator }
match_literal! { bang_equal, "!=", TokenKind::Operator }
match_literal! { less_equal, "<=", TokenKind::Operator }
match_literal! { greater_equal, ">=", TokenKind::Operator }
match_literal! { less, "<", TokenKind::Operator }
match_literal! { greater, ">", TokenKind::Operator }
match_literal! { plus, "+", TokenKind::Operator }
match_literal! { minus, "-", TokenKind::Operator }
match_literal! { star, "*", TokenKind::Operator }
match_literal! { slash, "/", TokenKind::Operator }
match_literal! { percent, "%", TokenKind::Operator }
match_literal! { caret, "^", TokenKind::Operator }
match_literal! { equal, "=", TokenKind::Operator }
match_literal! { left_paren, "(", TokenKind::Punctuation }
match_literal! { right_paren, ")", TokenKind::Punctuation }
match_literal! { left_brace, "{", TokenKind::Punctuation }
match_literal! { right_brace, "}", TokenKind::Punctuation }
match_literal! { comma, ",", TokenKind::Punctuation }
match_literal! { colon, ":", TokenKind::Punctuation }
match_literal! { semicolon, ";", TokenKind::Punctuation }
match_literal! { dot, ".", TokenKind::Punctuation }

fn word(source: &str) -> Option<(Lexeme, &str)> {
    let mut chars = source.chars();

    let first = chars.next()?;
    if !first.is_ascii_alphabetic() && first != '_' {
        return None;
    }

    let len = first.len_utf8()
        + chars
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .map(char::len_utf8)
            .sum::<usize>();

    let text = &source[..len];
    let kind = if KEYWORDS.contains(&text) {
        TokenKind::Keyword
    } else if TYPE_NAMES.contains(&text) {
        TokenKind::TypeName
    } else {
        TokenKind::Identifier
    };

    Some(((kind, text.to_string()), &source[len..]))
}

fn string(source: &str) -> Option<(Lexeme, &str)> {
    if !source.starts_with('"') {
        return None;
    }

    let mut value = String::new();
    let mut chars = source.chars().skip(1);
    let mut len = 1;
    while let Some(c) = chars.next() {
        len += c.len_utf8();
        match c {
            '"' => return Some(((TokenKind::String, value), &source[len..])),
            '\\' => {
                let escaped = chars.next()?;
                len += escaped.len_utf8();
                match escaped {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    '"' => value.push('"'),
                    '\\' => value.push('\\'),
                    other => {
                        value.push('\\');
                        value.push(other);
                    }
                }
            }
            c => value.push(c),
        }
    }
    None
}

fn number(source: &str) -> Option<(Lexeme, &str)> {
    let digits = |s: &str| s.chars().take_while(char::is_ascii_digit).count();

    let mut len = digits(source);
    if source[len..].starts_with('.') {
        let fraction = digits(&source[len + 1..]);
        if fraction > 0 {
            len += 1 + fraction;
        }
    }

    if len == 0 {
        return None;
    }

    Some((
        (TokenKind::Number, source[..len].to_string()),
        &source[len..],
    ))
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    fn kinds_and_text(source: &str) -> Vec<(TokenKind, String)> {
        tokens(source)
            .unwrap()
            .into_iter()
            .map(|token| (token.kind, token.text))
            .collect()
    }

    #[test]
    fn test_tokens() {
        let expected = vec![
            (TokenKind::Keyword, "local".to_string()),
            (TokenKind::TypeName, "number".to_string()),
            (TokenKind::Punctuation, ":".to_string()),
            (TokenKind::Identifier, "x".to_string()),
            (TokenKind::Operator, "=".to_string()),
            (TokenKind::Number, "1".to_string()),
        ];
        assert_eq!(kinds_and_text("local number: x = 1"), expected);
    }

    #[test]
    fn test_tokens_with_comments() {
        let expected = vec![
            (TokenKind::Identifier, "x".to_string()),
            (TokenKind::Comment, "-- trailing".to_string()),
            (TokenKind::Identifier, "y".to_string()),
        ];
        assert_eq!(kinds_and_text("x -- trailing\ny"), expected);
    }

    #[test]
    fn test_tokens_with_string_escapes() {
        let expected = vec![(TokenKind::String, "say \"hi\"\n".to_string())];
        assert_eq!(kinds_and_text(r#""say \"hi\"\n""#), expected);
    }

    #[test]
    fn test_concat_is_not_split_into_dots() {
        let expected = vec![
            (TokenKind::Number, "1".to_string()),
            (TokenKind::Operator, "..".to_string()),
            (TokenKind::Identifier, "a".to_string()),
            (TokenKind::Punctuation, ".".to_string()),
            (TokenKind::Identifier, "b".to_string()),
        ];
        assert_eq!(kinds_and_text("1..a.b"), expected);
    }

    #[test]
    fn test_fractional_numbers() {
        let expected = vec![
            (TokenKind::Number, "1.5".to_string()),
            (TokenKind::Operator, "*".to_string()),
            (TokenKind::Number, ".25".to_string()),
        ];
        assert_eq!(kinds_and_text("1.5*.25"), expected);
    }

    #[test]
    fn test_keywords_need_word_boundary() {
        let expected = vec![
            (TokenKind::Identifier, "format".to_string()),
            (TokenKind::Keyword, "for".to_string()),
            (TokenKind::TypeName, "string".to_string()),
        ];
        assert_eq!(kinds_and_text("format for string"), expected);
    }

    #[test]
    fn test_positions() {
        let tokens = tokens("fn f()\n  {\n}").unwrap();
        let positions: Vec<_> = tokens.iter().map(|t| (t.line, t.column)).collect();
        assert_eq!(
            positions,
            vec![(1, 1), (1, 4), (1, 5), (1, 6), (2, 3), (3, 1)]
        );
    }

    #[test]
    fn test_unexpected_character() {
        assert_eq!(
            tokens("x = 1\n  @"),
            Err(TokenizeError::UnexpectedCharacter {
                character: '@',
                line: 2,
                column: 3,
            })
        );
    }

    #[test]
    fn test_unterminated_string() {
        assert_eq!(
            tokens("print \"abc"),
            Err(TokenizeError::UnterminatedString { line: 1, column: 7 })
        );
    }
}
