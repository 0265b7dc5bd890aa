//! Tokenizer for filter expressions

use contracts::ContractError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    And,
    Or,
    Not,
    Exists,
    In,
    Contains,
    StartsWith,
    EndsWith,
    True,
    False,

    // Ident + literals
    Word(String),
    Num(f64),
    Str(String),

    // Punct / operators
    LParen,
    RParen,
    Comma,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LexToken {
    pub kind: Token,
    /// Byte offset into the filter text
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    src: &'a str,
    i: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, i: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.i..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.src[self.i..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.i += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    /// Tokenize the whole input, always ending with [`Token::Eof`]
    pub fn tokenize(mut self) -> Result<Vec<LexToken>, ContractError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == Token::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn next_token(&mut self) -> Result<LexToken, ContractError> {
        self.skip_whitespace();
        let offset = self.i;

        let Some(ch) = self.peek() else {
            return Ok(LexToken {
                kind: Token::Eof,
                offset,
            });
        };

        let kind = match ch {
            '(' => {
                self.bump();
                Token::LParen
            }
            ')' => {
                self.bump();
                Token::RParen
            }
            ',' => {
                self.bump();
                Token::Comma
            }
            '=' => {
                self.bump();
                // "==" is accepted as an alias of "="
                if self.peek() == Some('=') {
                    self.bump();
                }
                Token::Eq
            }
            '!' => {
                self.bump();
                if self.peek() != Some('=') {
                    return Err(ContractError::filter_syntax(
                        offset,
                        "expected '=' after '!'",
                    ));
                }
                self.bump();
                Token::Ne
            }
            '<' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    Token::Le
                } else {
                    Token::Lt
                }
            }
            '>' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    Token::Ge
                } else {
                    Token::Gt
                }
            }
            '"' | '\'' => self.lex_string(ch, offset)?,
            c if c.is_ascii_digit() => self.lex_number(offset)?,
            '-' if matches!(self.peek_second(), Some(c) if c.is_ascii_digit()) => {
                self.lex_number(offset)?
            }
            c if c.is_alphabetic() || c == '_' => self.lex_word(),
            other => {
                return Err(ContractError::filter_syntax(
                    offset,
                    format!("unexpected character '{other}'"),
                ))
            }
        };

        Ok(LexToken { kind, offset })
    }

    fn lex_string(&mut self, quote: char, offset: usize) -> Result<Token, ContractError> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(ContractError::filter_syntax(
                        offset,
                        "unterminated string literal",
                    ))
                }
                Some('\\') => match self.bump() {
                    Some(escaped) => out.push(escaped),
                    None => {
                        return Err(ContractError::filter_syntax(
                            offset,
                            "unterminated string literal",
                        ))
                    }
                },
                Some(c) if c == quote => return Ok(Token::Str(out)),
                Some(c) => out.push(c),
            }
        }
    }

    fn lex_number(&mut self, offset: usize) -> Result<Token, ContractError> {
        let start = self.i;
        if self.peek() == Some('-') {
            self.bump();
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
            self.bump();
        }
        let text = &self.src[start..self.i];
        text.parse::<f64>()
            .map(Token::Num)
            .map_err(|_| ContractError::filter_syntax(offset, format!("invalid number '{text}'")))
    }

    fn lex_word(&mut self) -> Token {
        let start = self.i;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '-'))
        {
            self.bump();
        }
        let word = &self.src[start..self.i];
        match word {
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "exists" => Token::Exists,
            "in" => Token::In,
            "contains" => Token::Contains,
            "startswith" => Token::StartsWith,
            "endswith" => Token::EndsWith,
            "true" => Token::True,
            "false" => Token::False,
            _ => Token::Word(word.to_string()),
        }
    }
}
