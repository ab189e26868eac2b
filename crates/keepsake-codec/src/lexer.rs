//! Tokenizer for the text encoding.

use keepsake_tree::NodePath;

use crate::error::{CodecError, CodecResult};

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token {
    /// Keyword, scalar kind, `true`/`false`, `NaN`, `inf`.
    Ident(String),
    /// Quoted string with escapes resolved.
    Str(String),
    /// Numeric literal, kept verbatim until its kind is known.
    Num(String),
    /// `x"..."` hex literal.
    Blob(Vec<u8>),
    Punct(char),
    Eof,
}

impl Token {
    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Ident(s) => format!("identifier `{s}`"),
            Self::Str(s) => format!("string {s:?}"),
            Self::Num(s) => format!("number `{s}`"),
            Self::Blob(_) => "hex literal".to_string(),
            Self::Punct(c) => format!("`{c}`"),
            Self::Eof => "end of input".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub line: usize,
    pub column: usize,
}

const PUNCT: &[char] = &['{', '}', '[', ']', '<', '>', ';', '=', ':', '@', '#', ','];

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
}

impl Lexer<'_> {
    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, line: usize, column: usize, reason: impl Into<String>) -> CodecError {
        CodecError::Syntax {
            line,
            column,
            path: NodePath::root(),
            reason: reason.into(),
        }
    }

    fn skip_trivia(&mut self) -> CodecResult<()> {
        loop {
            match self.chars.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') => {
                    let (line, column) = (self.line, self.column);
                    self.bump();
                    if self.chars.peek() != Some(&'/') {
                        return Err(self.error(line, column, "expected `//` comment"));
                    }
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn string(&mut self, line: usize, column: usize) -> CodecResult<String> {
        // Opening quote already consumed.
        let mut out = String::new();
        loop {
            let c = self
                .bump()
                .ok_or_else(|| self.error(line, column, "unterminated string"))?;
            match c {
                '"' => return Ok(out),
                '\\' => {
                    let esc = self
                        .bump()
                        .ok_or_else(|| self.error(line, column, "unterminated escape"))?;
                    match esc {
                        '"' => out.push('"'),
                        '\\' => out.push('\\'),
                        'n' => out.push('\n'),
                        'r' => out.push('\r'),
                        't' => out.push('\t'),
                        '0' => out.push('\0'),
                        'u' => out.push(self.unicode_escape(line, column)?),
                        other => {
                            return Err(self.error(
                                self.line,
                                self.column,
                                format!("unknown escape `\\{other}`"),
                            ))
                        }
                    }
                }
                c => out.push(c),
            }
        }
    }

    fn unicode_escape(&mut self, line: usize, column: usize) -> CodecResult<char> {
        if self.bump() != Some('{') {
            return Err(self.error(line, column, "expected `{` after `\\u`"));
        }
        let mut digits = String::new();
        loop {
            match self.bump() {
                Some('}') => break,
                Some(c) if c.is_ascii_hexdigit() && digits.len() < 6 => digits.push(c),
                _ => return Err(self.error(line, column, "malformed unicode escape")),
            }
        }
        u32::from_str_radix(&digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.error(line, column, format!("invalid code point {digits}")))
    }

    fn word(&mut self, first: char) -> String {
        let mut out = String::from(first);
        while let Some(&c) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' || c == '.' || c == '+' || c == '-' {
                out.push(c);
                self.bump();
            } else {
                break;
            }
        }
        out
    }

    fn next_token(&mut self) -> CodecResult<Spanned> {
        self.skip_trivia()?;
        let (line, column) = (self.line, self.column);
        let spanned = |token| Spanned {
            token,
            line,
            column,
        };

        let Some(c) = self.bump() else {
            return Ok(spanned(Token::Eof));
        };

        if PUNCT.contains(&c) {
            return Ok(spanned(Token::Punct(c)));
        }
        if c == '"' {
            return Ok(spanned(Token::Str(self.string(line, column)?)));
        }
        if c == 'x' && self.chars.peek() == Some(&'"') {
            self.bump();
            let digits = self.string(line, column)?;
            let bytes = hex::decode(&digits)
                .map_err(|e| self.error(line, column, format!("bad hex literal: {e}")))?;
            return Ok(spanned(Token::Blob(bytes)));
        }
        if c.is_ascii_digit() || c == '-' || c == '+' {
            return Ok(spanned(Token::Num(self.word(c))));
        }
        if c.is_alphabetic() || c == '_' {
            let mut ident = String::from(c);
            while let Some(&c) = self.chars.peek() {
                if c.is_alphanumeric() || c == '_' {
                    ident.push(c);
                    self.bump();
                } else {
                    break;
                }
            }
            return Ok(spanned(Token::Ident(ident)));
        }
        Err(self.error(line, column, format!("unexpected character {c:?}")))
    }
}

/// Split `source` into tokens, ending with [`Token::Eof`].
///
/// `first_line` is the line number of the first character of `source`.
pub(crate) fn tokenize(source: &str, first_line: usize) -> CodecResult<Vec<Spanned>> {
    let mut lexer = Lexer {
        chars: source.chars().peekable(),
        line: first_line,
        column: 1,
    };
    let mut tokens = Vec::new();
    loop {
        let next = lexer.next_token()?;
        let done = next.token == Token::Eof;
        tokens.push(next);
        if done {
            return Ok(tokens);
        }
    }
}
