#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn start() -> Self {
        Self { line: 1, column: 1 }
    }

    /// Position reached after consuming `text` from `self`.
    pub fn advance(self, text: &str) -> Position {
        text.chars().fold(self, |position, c| {
            if c == '\n' {
                Position {
                    line: position.line + 1,
                    column: 1,
                }
            } else {
                Position {
                    line: position.line,
                    column: position.column + 1,
                }
            }
        })
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}
