use crate::language::{
    span::Span,
    token::{Token, TokenKind},
};
use nom::{
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{char, one_of},
    combinator::{opt, recognize},
    sequence::{pair, tuple},
    IResult,
};

#[derive(Debug)]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct Comment {
    pub span: Span,
    /// Comment text without `//` or `/* */` markers.
    pub text: String,
}

#[derive(Debug, Default)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub comments: Vec<Comment>,
}

pub fn lex(source: &str) -> Result<Lexed, Vec<LexError>> {
    let lexer = Lexer::new(source);
    lexer.run()
}

struct Lexer<'a> {
    src: &'a str,
    chars: std::str::Chars<'a>,
    current: Option<char>,
    offset: usize,
    tokens: Vec<Token>,
    comments: Vec<Comment>,
    errors: Vec<LexError>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        let mut chars = src.chars();
        let current = chars.next();
        Self {
            src,
            chars,
            current,
            offset: 0,
            tokens: Vec::new(),
            comments: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Lexed, Vec<LexError>> {
        while let Some(ch) = self.current {
            match ch {
                '\n' => {
                    self.insert_semi(self.offset);
                    self.bump();
                }
                '/' if self.peek() == Some('/') => self.eat_line_comment(),
                '/' if self.peek() == Some('*') => self.eat_block_comment(),
                ch if ch.is_whitespace() => {
                    self.bump();
                }
                ch if ch.is_alphabetic() || ch == '_' => self.lex_identifier(),
                ch if ch.is_ascii_digit() => self.lex_number(),
                '.' if self.peek().is_some_and(|next| next.is_ascii_digit()) => self.lex_number(),
                '"' => self.lex_string(),
                '`' => self.lex_raw_string(),
                '\'' => self.lex_rune(),
                _ => self.lex_symbol(),
            }
        }
        self.insert_semi(self.offset);
        self.push_token(TokenKind::Eof, self.offset, self.offset);

        if self.errors.is_empty() {
            Ok(Lexed {
                tokens: self.tokens,
                comments: self.comments,
            })
        } else {
            Err(self.errors)
        }
    }

    fn bump(&mut self) -> Option<char> {
        if let Some(ch) = self.current {
            self.offset += ch.len_utf8();
        }
        self.current = self.chars.next();
        self.current
    }

    fn peek(&self) -> Option<char> {
        self.chars.clone().next()
    }

    fn advance_to(&mut self, offset: usize) {
        while self.offset < offset && self.current.is_some() {
            self.bump();
        }
    }

    fn push_token(&mut self, kind: TokenKind, start: usize, end: usize) {
        self.tokens.push(Token {
            kind,
            span: Span::new(start, end),
        });
    }

    fn insert_semi(&mut self, at: usize) {
        if self
            .tokens
            .last()
            .is_some_and(|token| token.kind.ends_statement())
        {
            self.push_token(TokenKind::Semi, at, at);
        }
    }

    fn error(&mut self, start: usize, end: usize, message: impl Into<String>) {
        self.errors.push(LexError {
            message: message.into(),
            span: Span::new(start, end),
        });
    }

    fn eat_line_comment(&mut self) {
        let start = self.offset;
        self.bump();
        self.bump();
        while let Some(ch) = self.current {
            if ch == '\n' {
                break;
            }
            self.bump();
        }
        let raw = &self.src[start + 2..self.offset];
        let text = raw.strip_prefix(' ').unwrap_or(raw).trim_end_matches('\r');
        self.comments.push(Comment {
            span: Span::new(start, self.offset),
            text: text.to_string(),
        });
    }

    fn eat_block_comment(&mut self) {
        let start = self.offset;
        self.bump();
        self.bump();
        while let Some(ch) = self.current {
            if ch == '*' && self.peek() == Some('/') {
                self.bump();
                self.bump();
                let body = &self.src[start + 2..self.offset - 2];
                self.comments.push(Comment {
                    span: Span::new(start, self.offset),
                    text: body.to_string(),
                });
                if body.contains('\n') {
                    self.insert_semi(start);
                }
                return;
            }
            self.bump();
        }
        self.error(start, self.offset, "Unterminated block comment");
    }

    fn lex_identifier(&mut self) {
        let start = self.offset;
        while let Some(ch) = self.current {
            if ch.is_alphanumeric() || ch == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let slice = &self.src[start..self.offset];
        let kind = TokenKind::keyword(slice)
            .unwrap_or_else(|| TokenKind::Identifier(slice.to_string()));
        self.push_token(kind, start, self.offset);
    }

    fn lex_number(&mut self) {
        let start = self.offset;
        let input = &self.src[start..];
        let Ok((rest, class)) = number_literal(input) else {
            self.bump();
            self.error(start, self.offset, "Invalid number literal");
            return;
        };
        let end = start + (input.len() - rest.len());
        let text = self.src[start..end].to_string();
        self.advance_to(end);
        let kind = match class {
            NumberClass::Int => TokenKind::Int(text),
            NumberClass::Float => TokenKind::Float(text),
            NumberClass::Imag => TokenKind::Imag(text),
        };
        self.push_token(kind, start, end);
    }

    fn lex_string(&mut self) {
        let start = self.offset;
        self.bump();
        let mut value = String::new();
        while let Some(ch) = self.current {
            match ch {
                '"' => {
                    self.bump();
                    self.push_token(TokenKind::String(value), start, self.offset);
                    return;
                }
                '\n' => break,
                '\\' => {
                    self.bump();
                    match self.lex_escape('"') {
                        Some(escaped) => value.push(escaped),
                        None => break,
                    }
                }
                _ => {
                    value.push(ch);
                    self.bump();
                }
            }
        }
        self.error(start, self.offset, "Unterminated string literal");
    }

    fn lex_raw_string(&mut self) {
        let start = self.offset;
        self.bump();
        let mut value = String::new();
        while let Some(ch) = self.current {
            if ch == '`' {
                self.bump();
                self.push_token(TokenKind::String(value), start, self.offset);
                return;
            }
            if ch != '\r' {
                value.push(ch);
            }
            self.bump();
        }
        self.error(start, self.offset, "Unterminated raw string literal");
    }

    fn lex_rune(&mut self) {
        let start = self.offset;
        self.bump();
        let value = match self.current {
            Some('\\') => {
                self.bump();
                self.lex_escape('\'')
            }
            Some('\'') | Some('\n') | None => None,
            Some(ch) => {
                self.bump();
                Some(ch)
            }
        };
        match value {
            Some(value) if self.current == Some('\'') => {
                self.bump();
                self.push_token(TokenKind::Char(value), start, self.offset);
            }
            _ => self.error(start, self.offset, "Invalid rune literal"),
        }
    }

    /// Consumes the escape sequence after a backslash.
    fn lex_escape(&mut self, quote: char) -> Option<char> {
        let ch = self.current?;
        let simple = match ch {
            'a' => Some('\u{7}'),
            'b' => Some('\u{8}'),
            'f' => Some('\u{c}'),
            'n' => Some('\n'),
            'r' => Some('\r'),
            't' => Some('\t'),
            'v' => Some('\u{b}'),
            '\\' => Some('\\'),
            c if c == quote => Some(c),
            _ => None,
        };
        if let Some(value) = simple {
            self.bump();
            return Some(value);
        }
        let (radix, digits) = match ch {
            'x' => (16, 2),
            'u' => (16, 4),
            'U' => (16, 8),
            '0'..='7' => (8, 3),
            _ => return None,
        };
        if radix == 16 {
            self.bump();
        }
        let mut code = 0u32;
        for _ in 0..digits {
            let digit = self.current?.to_digit(radix)?;
            code = code * radix + digit;
            self.bump();
        }
        char::from_u32(code)
    }

    fn lex_symbol(&mut self) {
        let start = self.offset;
        let rest = &self.src[start..];
        // Longest match first.
        const SYMBOLS: &[(&str, TokenKind)] = &[
            ("<<=", TokenKind::ShlEq),
            (">>=", TokenKind::ShrEq),
            ("&^=", TokenKind::AndNotEq),
            ("...", TokenKind::Ellipsis),
            ("&&", TokenKind::AndAnd),
            ("||", TokenKind::OrOr),
            ("<-", TokenKind::Arrow),
            ("++", TokenKind::Inc),
            ("--", TokenKind::Dec),
            ("==", TokenKind::EqEq),
            ("!=", TokenKind::BangEq),
            ("<=", TokenKind::LtEq),
            (">=", TokenKind::GtEq),
            (":=", TokenKind::Define),
            ("+=", TokenKind::PlusEq),
            ("-=", TokenKind::MinusEq),
            ("*=", TokenKind::StarEq),
            ("/=", TokenKind::SlashEq),
            ("%=", TokenKind::PercentEq),
            ("&=", TokenKind::AmpersandEq),
            ("|=", TokenKind::PipeEq),
            ("^=", TokenKind::CaretEq),
            ("<<", TokenKind::Shl),
            (">>", TokenKind::Shr),
            ("&^", TokenKind::AndNot),
            ("+", TokenKind::Plus),
            ("-", TokenKind::Minus),
            ("*", TokenKind::Star),
            ("/", TokenKind::Slash),
            ("%", TokenKind::Percent),
            ("&", TokenKind::Ampersand),
            ("|", TokenKind::Pipe),
            ("^", TokenKind::Caret),
            ("<", TokenKind::Lt),
            (">", TokenKind::Gt),
            ("=", TokenKind::Eq),
            ("!", TokenKind::Bang),
            ("~", TokenKind::Tilde),
            ("(", TokenKind::LParen),
            (")", TokenKind::RParen),
            ("[", TokenKind::LBracket),
            ("]", TokenKind::RBracket),
            ("{", TokenKind::LBrace),
            ("}", TokenKind::RBrace),
            (",", TokenKind::Comma),
            (".", TokenKind::Dot),
            (";", TokenKind::Semi),
            (":", TokenKind::Colon),
        ];
        for (text, kind) in SYMBOLS {
            if rest.starts_with(text) {
                let end = start + text.len();
                self.advance_to(end);
                self.push_token(kind.clone(), start, end);
                return;
            }
        }
        let ch = self.current;
        self.bump();
        if let Some(ch) = ch {
            self.error(start, self.offset, format!("Unexpected character '{}'", ch));
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum NumberClass {
    Int,
    Float,
    Imag,
}

fn digits(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_digit() || c == '_')(input)
}

fn radix_int(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        char('0'),
        one_of("xXbBoO"),
        take_while1(|c: char| c.is_ascii_hexdigit() || c == '_'),
    )))(input)
}

fn decimal(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        alt((
            recognize(pair(digits, opt(pair(char('.'), opt(digits))))),
            recognize(pair(char('.'), digits)),
        )),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digits))),
    )))(input)
}

fn number_literal(input: &str) -> IResult<&str, NumberClass> {
    let (rest, text) = alt((radix_int, decimal))(input)?;
    let (rest, imag) = opt(char('i'))(rest)?;
    let class = if imag.is_some() {
        NumberClass::Imag
    } else if !is_radix(text) && text.contains(['.', 'e', 'E']) {
        NumberClass::Float
    } else {
        NumberClass::Int
    };
    Ok((rest, class))
}

fn is_radix(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.len() > 1 && bytes[0] == b'0' && matches!(bytes[1], b'x' | b'X' | b'b' | b'B' | b'o' | b'O')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source)
            .expect("lex")
            .tokens
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn inserts_semicolons_at_line_ends() {
        let tokens = kinds("x := 1\ny++\n");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Identifier("x".into()),
                TokenKind::Define,
                TokenKind::Int("1".into()),
                TokenKind::Semi,
                TokenKind::Identifier("y".into()),
                TokenKind::Inc,
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn no_semicolon_after_operator_line_break() {
        let tokens = kinds("a +\nb");
        assert!(!tokens[..3].contains(&TokenKind::Semi));
    }

    #[test]
    fn classifies_number_literals() {
        let tokens = kinds("0x1F 1_000 3.5 1e9 .5 2i");
        assert_eq!(tokens[0], TokenKind::Int("0x1F".into()));
        assert_eq!(tokens[1], TokenKind::Int("1_000".into()));
        assert_eq!(tokens[2], TokenKind::Float("3.5".into()));
        assert_eq!(tokens[3], TokenKind::Float("1e9".into()));
        assert_eq!(tokens[4], TokenKind::Float(".5".into()));
        assert_eq!(tokens[5], TokenKind::Imag("2i".into()));
    }

    #[test]
    fn keeps_comments_for_preamble_lookup() {
        let lexed = lex("// #include <stdio.h>\nimport \"C\"").expect("lex");
        assert_eq!(lexed.comments.len(), 1);
        assert_eq!(lexed.comments[0].text, "#include <stdio.h>");
        assert_eq!(lexed.tokens[0].kind, TokenKind::Import);
    }

    #[test]
    fn decodes_escapes() {
        let tokens = kinds(r#""a\tb\x41" '\n' `raw\n`"#);
        assert_eq!(tokens[0], TokenKind::String("a\tbA".into()));
        assert_eq!(tokens[1], TokenKind::Char('\n'));
        assert_eq!(tokens[2], TokenKind::String("raw\\n".into()));
    }
}
