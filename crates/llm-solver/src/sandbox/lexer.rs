// Snippet tokenizer.
// Supports: numbers (decimal, exponent, hex), single/double-quoted strings with
// escapes, template literals with ${} interpolation, identifiers and the
// punctuators of the supported JavaScript subset, bitwise operators included.

use super::error::ExecutionError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Template(Vec<TemplateChunk>),
    Ident(String),
    // Grouping
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    // Separators
    Comma,
    Semicolon,
    Colon,
    Dot,
    Ellipsis,
    Question,
    QuestionQuestion,
    QuestionDot,
    Arrow,
    // Arithmetic
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    PlusPlus,
    MinusMinus,
    // Logical / comparison
    Bang,
    AndAnd,
    OrOr,
    EqEq,
    EqEqEq,
    NotEq,
    NotEqEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    // Assignment
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    StarStarAssign,
    SlashAssign,
    PercentAssign,
    PipeAssign,
    AmpAssign,
    CaretAssign,
    LtLtAssign,
    GtGtAssign,
    GtGtGtAssign,
    // Bitwise
    Pipe,
    Amp,
    Caret,
    Tilde,
    LtLt,
    GtGt,
    GtGtGt,
}

/// Raw piece of a template literal; expressions are parsed later.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateChunk {
    Text(String),
    Expr(String),
}

/// A token plus the layout facts the parser needs for semicolon insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
    pub newline_before: bool,
}

pub fn tokenize(input: &str) -> Result<Vec<Spanned>, ExecutionError> {
    Lexer::new(input).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    newline_pending: bool,
}

impl Lexer {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            line: 1,
            newline_pending: false,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied();
        if let Some(ch) = c {
            self.pos += 1;
            if ch == '\n' {
                self.line += 1;
            }
        }
        c
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn run(mut self) -> Result<Vec<Spanned>, ExecutionError> {
        let mut tokens = Vec::new();

        while let Some(c) = self.peek() {
            if c == '\n' {
                self.bump();
                self.newline_pending = true;
                continue;
            }
            if c.is_whitespace() {
                self.bump();
                continue;
            }

            let line = self.line;
            let token = match c {
                '0'..='9' => self.number()?,
                '.' if self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) => self.number()?,
                '"' | '\'' => self.string(c)?,
                '`' => self.template()?,
                c if c.is_alphabetic() || c == '_' || c == '$' => self.ident(),
                _ => self.punct()?,
            };

            tokens.push(Spanned {
                token,
                line,
                newline_before: std::mem::take(&mut self.newline_pending),
            });
        }

        Ok(tokens)
    }

    fn number(&mut self) -> Result<Token, ExecutionError> {
        let start = self.pos;

        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x') | Some('X')) {
            self.pos += 2;
            let digits_start = self.pos;
            while self.peek().is_some_and(|d| d.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            let digits: String = self.chars[digits_start..self.pos].iter().collect();
            return u64::from_str_radix(&digits, 16)
                .map(|n| Token::Number(n as f64))
                .map_err(|_| ExecutionError::Syntax("Invalid or unexpected token".to_string()));
        }

        while self.peek().is_some_and(|d| d.is_ascii_digit() || d == '_') {
            self.pos += 1;
        }
        if self.peek() == Some('.') && self.peek_at(1).is_none_or(|d| d != '.') {
            self.pos += 1;
            while self.peek().is_some_and(|d| d.is_ascii_digit() || d == '_') {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let sign = matches!(self.peek_at(1), Some('+') | Some('-'));
            let digit_at = if sign { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|d| d.is_ascii_digit()) {
                self.pos += digit_at;
                while self.peek().is_some_and(|d| d.is_ascii_digit()) {
                    self.pos += 1;
                }
            }
        }

        let text: String = self.chars[start..self.pos]
            .iter()
            .filter(|c| **c != '_')
            .collect();
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| ExecutionError::Syntax(format!("Invalid number: {}", text)))
    }

    fn escape(&mut self) -> Result<char, ExecutionError> {
        let c = self
            .bump()
            .ok_or_else(|| ExecutionError::Syntax("Invalid or unexpected token".to_string()))?;
        Ok(match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'v' => '\u{b}',
            'u' => {
                let hex: String = (0..4).filter_map(|_| self.bump()).collect();
                u32::from_str_radix(&hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| {
                        ExecutionError::Syntax("Invalid Unicode escape sequence".to_string())
                    })?
            }
            other => other,
        })
    }

    fn string(&mut self, quote: char) -> Result<Token, ExecutionError> {
        self.bump();
        let mut s = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => break,
                Some('\\') => s.push(self.escape()?),
                Some('\n') | None => {
                    return Err(ExecutionError::Syntax(
                        "Invalid or unexpected token".to_string(),
                    ));
                }
                Some(c) => s.push(c),
            }
        }
        Ok(Token::Str(s))
    }

    fn template(&mut self) -> Result<Token, ExecutionError> {
        self.bump();
        let mut chunks = Vec::new();
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('`') => break,
                Some('\\') => text.push(self.escape()?),
                Some('$') if self.peek() == Some('{') => {
                    self.bump();
                    if !text.is_empty() {
                        chunks.push(TemplateChunk::Text(std::mem::take(&mut text)));
                    }
                    let mut depth = 1usize;
                    let mut expr = String::new();
                    loop {
                        match self.bump() {
                            Some('{') => {
                                depth += 1;
                                expr.push('{');
                            }
                            Some('}') => {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                                expr.push('}');
                            }
                            Some(c) => expr.push(c),
                            None => {
                                return Err(ExecutionError::Syntax(
                                    "Unterminated template literal".to_string(),
                                ));
                            }
                        }
                    }
                    chunks.push(TemplateChunk::Expr(expr));
                }
                Some(c) => text.push(c),
                None => {
                    return Err(ExecutionError::Syntax(
                        "Unterminated template literal".to_string(),
                    ));
                }
            }
        }
        if !text.is_empty() || chunks.is_empty() {
            chunks.push(TemplateChunk::Text(text));
        }
        Ok(Token::Template(chunks))
    }

    fn ident(&mut self) -> Token {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$')
        {
            self.pos += 1;
        }
        Token::Ident(self.chars[start..self.pos].iter().collect())
    }

    fn punct(&mut self) -> Result<Token, ExecutionError> {
        let Some(c) = self.bump() else {
            return Err(ExecutionError::Syntax("Unexpected end of input".to_string()));
        };
        let token = match c {
            '(' => Token::LParen,
            ')' => Token::RParen,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            ',' => Token::Comma,
            ';' => Token::Semicolon,
            ':' => Token::Colon,
            '.' => {
                if self.peek() == Some('.') && self.peek_at(1) == Some('.') {
                    self.pos += 2;
                    Token::Ellipsis
                } else {
                    Token::Dot
                }
            }
            '?' => {
                if self.eat('?') {
                    Token::QuestionQuestion
                } else if self.peek() == Some('.')
                    && !self.peek_at(1).is_some_and(|d| d.is_ascii_digit())
                {
                    self.pos += 1;
                    Token::QuestionDot
                } else {
                    Token::Question
                }
            }
            '+' => {
                if self.eat('+') {
                    Token::PlusPlus
                } else if self.eat('=') {
                    Token::PlusAssign
                } else {
                    Token::Plus
                }
            }
            '-' => {
                if self.eat('-') {
                    Token::MinusMinus
                } else if self.eat('=') {
                    Token::MinusAssign
                } else {
                    Token::Minus
                }
            }
            '*' => {
                if self.eat('*') {
                    if self.eat('=') {
                        Token::StarStarAssign
                    } else {
                        Token::StarStar
                    }
                } else if self.eat('=') {
                    Token::StarAssign
                } else {
                    Token::Star
                }
            }
            '/' => {
                if self.eat('=') {
                    Token::SlashAssign
                } else {
                    Token::Slash
                }
            }
            '%' => {
                if self.eat('=') {
                    Token::PercentAssign
                } else {
                    Token::Percent
                }
            }
            '!' => {
                if self.eat('=') {
                    if self.eat('=') {
                        Token::NotEqEq
                    } else {
                        Token::NotEq
                    }
                } else {
                    Token::Bang
                }
            }
            '=' => {
                if self.eat('=') {
                    if self.eat('=') {
                        Token::EqEqEq
                    } else {
                        Token::EqEq
                    }
                } else if self.eat('>') {
                    Token::Arrow
                } else {
                    Token::Assign
                }
            }
            '<' => {
                if self.eat('<') {
                    if self.eat('=') {
                        Token::LtLtAssign
                    } else {
                        Token::LtLt
                    }
                } else if self.eat('=') {
                    Token::LtEq
                } else {
                    Token::Lt
                }
            }
            '>' => {
                if self.eat('>') {
                    if self.eat('>') {
                        if self.eat('=') {
                            Token::GtGtGtAssign
                        } else {
                            Token::GtGtGt
                        }
                    } else if self.eat('=') {
                        Token::GtGtAssign
                    } else {
                        Token::GtGt
                    }
                } else if self.eat('=') {
                    Token::GtEq
                } else {
                    Token::Gt
                }
            }
            '&' => {
                if self.eat('&') {
                    Token::AndAnd
                } else if self.eat('=') {
                    Token::AmpAssign
                } else {
                    Token::Amp
                }
            }
            '|' => {
                if self.eat('|') {
                    Token::OrOr
                } else if self.eat('=') {
                    Token::PipeAssign
                } else {
                    Token::Pipe
                }
            }
            '^' => {
                if self.eat('=') {
                    Token::CaretAssign
                } else {
                    Token::Caret
                }
            }
            '~' => Token::Tilde,
            other => {
                return Err(ExecutionError::Syntax(format!(
                    "Invalid or unexpected token '{}'",
                    other
                )));
            }
        };
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token> {
        tokenize(input).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("1 2.5 .5 1e3 2E-2 0xff 1_000"),
            vec![
                Token::Number(1.0),
                Token::Number(2.5),
                Token::Number(0.5),
                Token::Number(1000.0),
                Token::Number(0.02),
                Token::Number(255.0),
                Token::Number(1000.0),
            ]
        );
    }

    #[test]
    fn test_strings_and_escapes() {
        assert_eq!(
            kinds(r#"'it\'s' "a\nb""#),
            vec![Token::Str("it's".to_string()), Token::Str("a\nb".to_string())]
        );
        assert!(tokenize("'unterminated").is_err());
    }

    #[test]
    fn test_template_chunks() {
        assert_eq!(
            kinds("`p = ${x + 1}!`"),
            vec![Token::Template(vec![
                TemplateChunk::Text("p = ".to_string()),
                TemplateChunk::Expr("x + 1".to_string()),
                TemplateChunk::Text("!".to_string()),
            ])]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("a **= b ?? c === d !== e => f?.g ..."),
            vec![
                Token::Ident("a".to_string()),
                Token::StarStarAssign,
                Token::Ident("b".to_string()),
                Token::QuestionQuestion,
                Token::Ident("c".to_string()),
                Token::EqEqEq,
                Token::Ident("d".to_string()),
                Token::NotEqEq,
                Token::Ident("e".to_string()),
                Token::Arrow,
                Token::Ident("f".to_string()),
                Token::QuestionDot,
                Token::Ident("g".to_string()),
                Token::Ellipsis,
            ]
        );
    }

    #[test]
    fn test_bitwise_operators() {
        assert_eq!(
            kinds("a | b & c ^ ~d << 1 >> 2 >>> 3 |= &= >>>="),
            vec![
                Token::Ident("a".to_string()),
                Token::Pipe,
                Token::Ident("b".to_string()),
                Token::Amp,
                Token::Ident("c".to_string()),
                Token::Caret,
                Token::Tilde,
                Token::Ident("d".to_string()),
                Token::LtLt,
                Token::Number(1.0),
                Token::GtGt,
                Token::Number(2.0),
                Token::GtGtGt,
                Token::Number(3.0),
                Token::PipeAssign,
                Token::AmpAssign,
                Token::GtGtGtAssign,
            ]
        );
    }

    #[test]
    fn test_newline_tracking() {
        let tokens = tokenize("a\nb c").unwrap();
        assert!(!tokens[0].newline_before);
        assert!(tokens[1].newline_before);
        assert_eq!(tokens[1].line, 2);
        assert!(!tokens[2].newline_before);
    }

    #[test]
    fn test_rejects_unknown_character() {
        assert!(matches!(tokenize("a # b"), Err(ExecutionError::Syntax(_))));
    }
}
