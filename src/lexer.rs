//! Lexer
//!
//! Converts source text into a stream of tokens. The parser pulls tokens one
//! at a time; a `/` is always scanned as a division operator first and
//! rescanned as a regular expression when the parser is in expression
//! position.

use std::iter::Peekable;
use std::str::CharIndices;

use crate::string_dict::StringDict;
use crate::value::JsString;

/// Source span information
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }
}

impl Default for Span {
    fn default() -> Self {
        Self {
            start: 0,
            end: 0,
            line: 1,
            column: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Number(f64),
    /// `0777` style literal, rejected in strict code
    LegacyOctal(f64),
    String(JsString),
    RegExp(String, String), // (pattern, flags)
    True,
    False,
    Null,

    Identifier(JsString),

    // Keywords
    Let,
    Const,
    Var,
    Function,
    Return,
    If,
    Else,
    For,
    While,
    Do,
    Break,
    Continue,
    Switch,
    Case,
    Default,
    Try,
    Catch,
    Finally,
    Throw,
    New,
    This,
    Super,
    Class,
    Extends,
    Import,
    Export,
    Enum,
    Typeof,
    Instanceof,
    In,
    Void,
    Delete,
    With,
    Debugger,

    // Operators
    Plus,       // +
    Minus,      // -
    Star,       // *
    Slash,      // /
    Percent,    // %
    PlusPlus,   // ++
    MinusMinus, // --
    Eq,         // =
    EqEq,       // ==
    EqEqEq,     // ===
    BangEq,     // !=
    BangEqEq,   // !==
    Lt,         // <
    LtEq,       // <=
    Gt,         // >
    GtEq,       // >=
    LtLt,       // <<
    GtGt,       // >>
    GtGtGt,     // >>>
    Amp,        // &
    AmpAmp,     // &&
    Pipe,       // |
    PipePipe,   // ||
    Caret,      // ^
    Tilde,      // ~
    Bang,       // !
    Question,   // ?

    // Assignment operators
    PlusEq,   // +=
    MinusEq,  // -=
    StarEq,   // *=
    SlashEq,  // /=
    PercentEq, // %=
    AmpEq,    // &=
    PipeEq,   // |=
    CaretEq,  // ^=
    LtLtEq,   // <<=
    GtGtEq,   // >>=
    GtGtGtEq, // >>>=

    // Punctuation
    LParen,    // (
    RParen,    // )
    LBrace,    // {
    RBrace,    // }
    LBracket,  // [
    RBracket,  // ]
    Dot,       // .
    DotDotDot, // ...
    Comma,     // ,
    Colon,     // :
    Semicolon, // ;
    Arrow,     // =>

    Eof,
    /// Malformed input; the payload is the message the parser reports
    Error(&'static str),
    Invalid(char),
}

/// A token with its source location
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn eof(pos: usize, line: u32, column: u32) -> Self {
        Self {
            kind: TokenKind::Eof,
            span: Span::new(pos, pos, line, column),
        }
    }
}

/// Lexer state checkpoint for backtracking
#[derive(Clone)]
pub struct LexerCheckpoint {
    current_pos: usize,
    line: u32,
    column: u32,
    saw_newline: bool,
}

pub struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    /// Offset of `chars` within `source` after a reset
    chars_base_offset: usize,
    current_pos: usize,
    line: u32,
    column: u32,
    start_pos: usize,
    start_line: u32,
    start_column: u32,
    /// A line terminator preceded the last token (drives ASI)
    saw_newline: bool,
    string_dict: &'a mut StringDict,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, string_dict: &'a mut StringDict) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            chars_base_offset: 0,
            current_pos: 0,
            line: 1,
            column: 1,
            start_pos: 0,
            start_line: 1,
            start_column: 1,
            saw_newline: false,
            string_dict,
        }
    }

    pub fn string_dict(&mut self) -> &mut StringDict {
        self.string_dict
    }

    /// Source text covered by `span`
    pub fn slice(&self, span: Span) -> &'a str {
        self.source.get(span.start..span.end).unwrap_or("")
    }

    pub fn checkpoint(&self) -> LexerCheckpoint {
        LexerCheckpoint {
            current_pos: self.current_pos,
            line: self.line,
            column: self.column,
            saw_newline: self.saw_newline,
        }
    }

    pub fn restore(&mut self, checkpoint: LexerCheckpoint) {
        self.line = checkpoint.line;
        self.column = checkpoint.column;
        self.saw_newline = checkpoint.saw_newline;
        self.reset_to(checkpoint.current_pos);
    }

    fn reset_to(&mut self, pos: usize) {
        self.current_pos = pos;
        self.chars_base_offset = pos;
        self.chars = self
            .source
            .get(pos..)
            .unwrap_or("")
            .char_indices()
            .peekable();
    }

    /// Rescan the `/` or `/=` token at `span` as a regular expression literal
    pub fn rescan_as_regexp(&mut self, span: Span) -> Token {
        self.line = span.line;
        self.column = span.column;
        self.reset_to(span.start);
        self.scan_regexp()
    }

    pub fn next_token(&mut self) -> Token {
        if let Err(message) = self.skip_whitespace_and_comments() {
            return Token::new(TokenKind::Error(message), self.make_span());
        }

        self.start_pos = self.current_pos;
        self.start_line = self.line;
        self.start_column = self.column;

        let Some((_pos, ch)) = self.advance() else {
            return Token::eof(self.current_pos, self.line, self.column);
        };

        let kind = match ch {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '~' => TokenKind::Tilde,
            ':' => TokenKind::Colon,
            '?' => TokenKind::Question,

            '.' => self.scan_dot(),
            '+' => self.scan_plus(),
            '-' => self.scan_minus(),
            '*' => self.scan_with_eq(TokenKind::Star, TokenKind::StarEq),
            '/' => self.scan_with_eq(TokenKind::Slash, TokenKind::SlashEq),
            '%' => self.scan_with_eq(TokenKind::Percent, TokenKind::PercentEq),
            '^' => self.scan_with_eq(TokenKind::Caret, TokenKind::CaretEq),
            '=' => self.scan_equals(),
            '!' => self.scan_bang(),
            '<' => self.scan_less_than(),
            '>' => self.scan_greater_than(),
            '&' => self.scan_doubled('&', TokenKind::Amp, TokenKind::AmpAmp, TokenKind::AmpEq),
            '|' => self.scan_doubled('|', TokenKind::Pipe, TokenKind::PipePipe, TokenKind::PipeEq),

            '"' | '\'' => self.scan_string(ch),
            '`' => TokenKind::Error("Template literals are not supported"),

            '0'..='9' => self.scan_number(ch),

            c if is_id_start(c) => self.scan_identifier(c),

            c => TokenKind::Invalid(c),
        };

        Token::new(kind, self.make_span())
    }

    pub fn had_newline_before(&self) -> bool {
        self.saw_newline
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let result = self.chars.next();
        if let Some((pos, ch)) = result {
            self.current_pos = self.chars_base_offset + pos + ch.len_utf8();
            if is_line_terminator(ch) {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        result
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn peek_next(&self) -> Option<char> {
        let slice = self.source.get(self.current_pos..)?;
        let mut iter = slice.chars();
        iter.next();
        iter.next()
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn make_span(&self) -> Span {
        Span::new(
            self.start_pos,
            self.current_pos,
            self.start_line,
            self.start_column,
        )
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), &'static str> {
        self.saw_newline = false;

        loop {
            match self.peek() {
                Some(' ' | '\t' | '\r' | '\u{000B}' | '\u{000C}' | '\u{00A0}' | '\u{FEFF}') => {
                    self.advance();
                }
                Some(c) if is_line_terminator(c) => {
                    self.saw_newline = true;
                    self.advance();
                }
                Some('/') => match self.peek_next() {
                    Some('/') => {
                        self.advance();
                        self.advance();
                        while let Some(ch) = self.peek() {
                            if is_line_terminator(ch) {
                                break;
                            }
                            self.advance();
                        }
                    }
                    Some('*') => {
                        self.start_pos = self.current_pos;
                        self.start_line = self.line;
                        self.start_column = self.column;
                        self.advance();
                        self.advance();
                        loop {
                            match self.advance() {
                                Some((_, '*')) if self.peek() == Some('/') => {
                                    self.advance();
                                    break;
                                }
                                Some((_, c)) if is_line_terminator(c) => {
                                    self.saw_newline = true;
                                }
                                Some(_) => {}
                                None => return Err("Unterminated comment"),
                            }
                        }
                    }
                    _ => break,
                },
                Some(c) if c != '\u{200B}' && c.is_whitespace() => {
                    self.advance();
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn scan_dot(&mut self) -> TokenKind {
        if self.peek() == Some('.') && self.peek_next() == Some('.') {
            self.advance();
            self.advance();
            TokenKind::DotDotDot
        } else if matches!(self.peek(), Some('0'..='9')) {
            self.scan_number('.')
        } else {
            TokenKind::Dot
        }
    }

    fn scan_plus(&mut self) -> TokenKind {
        if self.match_char('+') {
            TokenKind::PlusPlus
        } else if self.match_char('=') {
            TokenKind::PlusEq
        } else {
            TokenKind::Plus
        }
    }

    fn scan_minus(&mut self) -> TokenKind {
        if self.match_char('-') {
            TokenKind::MinusMinus
        } else if self.match_char('=') {
            TokenKind::MinusEq
        } else {
            TokenKind::Minus
        }
    }

    fn scan_with_eq(&mut self, plain: TokenKind, with_eq: TokenKind) -> TokenKind {
        if self.match_char('=') { with_eq } else { plain }
    }

    /// `&`/`|` family: single, doubled, or compound assignment
    fn scan_doubled(
        &mut self,
        ch: char,
        single: TokenKind,
        double: TokenKind,
        with_eq: TokenKind,
    ) -> TokenKind {
        if self.match_char(ch) {
            double
        } else if self.match_char('=') {
            with_eq
        } else {
            single
        }
    }

    /// Scan a regular expression literal starting at the current `/`
    pub fn scan_regexp(&mut self) -> Token {
        let start_pos = self.current_pos;
        let start_line = self.line;
        let start_column = self.column;

        self.advance();

        let mut pattern = String::new();
        let mut in_class = false;

        let terminated = loop {
            match self.advance() {
                Some((_, '/')) if !in_class => break true,
                Some((_, '[')) => {
                    in_class = true;
                    pattern.push('[');
                }
                Some((_, ']')) => {
                    in_class = false;
                    pattern.push(']');
                }
                Some((_, '\\')) => {
                    pattern.push('\\');
                    match self.advance() {
                        Some((_, c)) if !is_line_terminator(c) => pattern.push(c),
                        _ => break false,
                    }
                }
                Some((_, c)) if is_line_terminator(c) => break false,
                Some((_, c)) => pattern.push(c),
                None => break false,
            }
        };

        let span = |lexer: &Self| Span::new(start_pos, lexer.current_pos, start_line, start_column);
        if !terminated {
            return Token::new(
                TokenKind::Error("Unterminated regular expression literal"),
                span(self),
            );
        }

        let mut flags = String::new();
        while let Some(ch) = self.peek() {
            if is_id_continue(ch) {
                flags.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        Token::new(TokenKind::RegExp(pattern, flags), span(self))
    }

    fn scan_equals(&mut self) -> TokenKind {
        if self.match_char('=') {
            if self.match_char('=') {
                TokenKind::EqEqEq
            } else {
                TokenKind::EqEq
            }
        } else if self.match_char('>') {
            TokenKind::Arrow
        } else {
            TokenKind::Eq
        }
    }

    fn scan_bang(&mut self) -> TokenKind {
        if self.match_char('=') {
            if self.match_char('=') {
                TokenKind::BangEqEq
            } else {
                TokenKind::BangEq
            }
        } else {
            TokenKind::Bang
        }
    }

    fn scan_less_than(&mut self) -> TokenKind {
        if self.match_char('<') {
            if self.match_char('=') {
                TokenKind::LtLtEq
            } else {
                TokenKind::LtLt
            }
        } else if self.match_char('=') {
            TokenKind::LtEq
        } else {
            TokenKind::Lt
        }
    }

    fn scan_greater_than(&mut self) -> TokenKind {
        if self.match_char('>') {
            if self.match_char('>') {
                if self.match_char('=') {
                    TokenKind::GtGtGtEq
                } else {
                    TokenKind::GtGtGt
                }
            } else if self.match_char('=') {
                TokenKind::GtGtEq
            } else {
                TokenKind::GtGt
            }
        } else if self.match_char('=') {
            TokenKind::GtEq
        } else {
            TokenKind::Gt
        }
    }

    fn scan_string(&mut self, quote: char) -> TokenKind {
        let mut value = String::new();

        loop {
            match self.advance() {
                Some((_, c)) if c == quote => break,
                Some((_, '\\')) => match self.advance() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 'r')) => value.push('\r'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, 'b')) => value.push('\x08'),
                    Some((_, 'f')) => value.push('\x0C'),
                    Some((_, 'v')) => value.push('\x0B'),
                    Some((_, c @ '0'..='7')) => {
                        // \0 alone is NUL, anything longer is a legacy octal escape
                        let mut code = c.to_digit(8).unwrap_or(0);
                        let max_len = if c <= '3' { 3 } else { 2 };
                        let mut len = 1;
                        while len < max_len {
                            match self.peek().and_then(|p| p.to_digit(8)) {
                                Some(d) => {
                                    code = code * 8 + d;
                                    self.advance();
                                    len += 1;
                                }
                                None => break,
                            }
                        }
                        value.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
                    }
                    Some((_, 'x')) => match self.scan_hex_escape(2) {
                        Some(ch) => value.push(ch),
                        None => return TokenKind::Error("Invalid hexadecimal escape sequence"),
                    },
                    Some((_, 'u')) => match self.scan_unicode_escape() {
                        Some(ch) => value.push(ch),
                        None => return TokenKind::Error("Invalid Unicode escape sequence"),
                    },
                    Some((_, '\r')) => {
                        self.match_char('\n');
                    }
                    Some((_, c)) if is_line_terminator(c) => {}
                    Some((_, c)) => value.push(c),
                    None => return TokenKind::Error("Unterminated string literal"),
                },
                Some((_, c)) if is_line_terminator(c) || c == '\r' => {
                    return TokenKind::Error("Unterminated string literal");
                }
                Some((_, c)) => value.push(c),
                None => return TokenKind::Error("Unterminated string literal"),
            }
        }

        TokenKind::String(self.string_dict.get_or_insert(&value))
    }

    fn scan_hex_escape(&mut self, count: usize) -> Option<char> {
        let mut code = 0u32;
        for _ in 0..count {
            let digit = self.peek()?.to_digit(16)?;
            self.advance();
            code = code * 16 + digit;
        }
        char::from_u32(code)
    }

    /// `\uXXXX`, with surrogate pairs combined and lone surrogates replaced
    fn scan_unicode_escape(&mut self) -> Option<char> {
        let mut code = 0u32;
        for _ in 0..4 {
            let digit = self.peek()?.to_digit(16)?;
            self.advance();
            code = code * 16 + digit;
        }
        if (0xD800..0xDC00).contains(&code) && self.peek() == Some('\\') && self.peek_next() == Some('u') {
            let checkpoint = self.checkpoint();
            self.advance();
            self.advance();
            let mut low = 0u32;
            let mut ok = true;
            for _ in 0..4 {
                match self.peek().and_then(|c| c.to_digit(16)) {
                    Some(d) => {
                        self.advance();
                        low = low * 16 + d;
                    }
                    None => {
                        ok = false;
                        break;
                    }
                }
            }
            if ok && (0xDC00..0xE000).contains(&low) {
                return char::from_u32(0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00));
            }
            self.restore(checkpoint);
        }
        Some(char::from_u32(code).unwrap_or('\u{FFFD}'))
    }

    fn scan_number(&mut self, first: char) -> TokenKind {
        if first == '0' {
            match self.peek() {
                Some('x' | 'X') => {
                    self.advance();
                    let mut value = 0.0;
                    let mut digits = 0;
                    while let Some(d) = self.peek().and_then(|c| c.to_digit(16)) {
                        self.advance();
                        value = value * 16.0 + f64::from(d);
                        digits += 1;
                    }
                    if digits == 0 {
                        return TokenKind::Error("Invalid hexadecimal literal");
                    }
                    return self.check_number_end(TokenKind::Number(value));
                }
                Some('0'..='9') => {
                    let mut digits = String::new();
                    while let Some(c) = self.peek() {
                        if c.is_ascii_digit() {
                            digits.push(c);
                            self.advance();
                        } else {
                            break;
                        }
                    }
                    // 08 and 09 fall back to decimal
                    if digits.chars().all(|c| c <= '7') {
                        let value = digits
                            .chars()
                            .filter_map(|c| c.to_digit(8))
                            .fold(0.0, |acc, d| acc * 8.0 + f64::from(d));
                        return self.check_number_end(TokenKind::LegacyOctal(value));
                    }
                    let value = digits.parse().unwrap_or(f64::NAN);
                    return self.check_number_end(TokenKind::LegacyOctal(value));
                }
                _ => {}
            }
        }

        let mut num_str = String::new();
        num_str.push(first);
        self.scan_digits(&mut num_str);

        if first != '.' && self.peek() == Some('.') {
            self.advance();
            num_str.push('.');
            self.scan_digits(&mut num_str);
        }

        if matches!(self.peek(), Some('e' | 'E')) {
            self.advance();
            num_str.push('e');
            if let Some(sign @ ('+' | '-')) = self.peek() {
                self.advance();
                num_str.push(sign);
            }
            if !matches!(self.peek(), Some('0'..='9')) {
                return TokenKind::Error("Invalid number literal");
            }
            self.scan_digits(&mut num_str);
        }

        self.check_number_end(TokenKind::Number(num_str.parse().unwrap_or(f64::NAN)))
    }

    fn scan_digits(&mut self, out: &mut String) {
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                out.push(c);
                self.advance();
            } else {
                break;
            }
        }
    }

    /// A numeric literal must not run straight into an identifier (`3in`)
    fn check_number_end(&mut self, kind: TokenKind) -> TokenKind {
        match self.peek() {
            Some(c) if is_id_start(c) || c.is_ascii_digit() => {
                TokenKind::Error("Identifier starts immediately after numeric literal")
            }
            _ => kind,
        }
    }

    fn scan_identifier(&mut self, first: char) -> TokenKind {
        let mut name = String::new();
        name.push(first);

        while let Some(ch) = self.peek() {
            if is_id_continue(ch) {
                name.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        match name.as_str() {
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,

            "let" => TokenKind::Let,
            "const" => TokenKind::Const,
            "var" => TokenKind::Var,
            "function" => TokenKind::Function,
            "return" => TokenKind::Return,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "for" => TokenKind::For,
            "while" => TokenKind::While,
            "do" => TokenKind::Do,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "switch" => TokenKind::Switch,
            "case" => TokenKind::Case,
            "default" => TokenKind::Default,
            "try" => TokenKind::Try,
            "catch" => TokenKind::Catch,
            "finally" => TokenKind::Finally,
            "throw" => TokenKind::Throw,
            "new" => TokenKind::New,
            "this" => TokenKind::This,
            "super" => TokenKind::Super,
            "class" => TokenKind::Class,
            "extends" => TokenKind::Extends,
            "import" => TokenKind::Import,
            "export" => TokenKind::Export,
            "enum" => TokenKind::Enum,
            "typeof" => TokenKind::Typeof,
            "instanceof" => TokenKind::Instanceof,
            "in" => TokenKind::In,
            "void" => TokenKind::Void,
            "delete" => TokenKind::Delete,
            "with" => TokenKind::With,
            "debugger" => TokenKind::Debugger,

            _ => TokenKind::Identifier(self.string_dict.get_or_insert(&name)),
        }
    }
}

impl TokenKind {
    /// Keywords that may appear as property names after `.` or in literals
    pub fn keyword_text(&self) -> Option<&'static str> {
        Some(match self {
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Null => "null",
            TokenKind::Let => "let",
            TokenKind::Const => "const",
            TokenKind::Var => "var",
            TokenKind::Function => "function",
            TokenKind::Return => "return",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::For => "for",
            TokenKind::While => "while",
            TokenKind::Do => "do",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::Switch => "switch",
            TokenKind::Case => "case",
            TokenKind::Default => "default",
            TokenKind::Try => "try",
            TokenKind::Catch => "catch",
            TokenKind::Finally => "finally",
            TokenKind::Throw => "throw",
            TokenKind::New => "new",
            TokenKind::This => "this",
            TokenKind::Super => "super",
            TokenKind::Class => "class",
            TokenKind::Extends => "extends",
            TokenKind::Import => "import",
            TokenKind::Export => "export",
            TokenKind::Enum => "enum",
            TokenKind::Typeof => "typeof",
            TokenKind::Instanceof => "instanceof",
            TokenKind::In => "in",
            TokenKind::Void => "void",
            TokenKind::Delete => "delete",
            TokenKind::With => "with",
            TokenKind::Debugger => "debugger",
            _ => return None,
        })
    }
}

fn is_line_terminator(ch: char) -> bool {
    matches!(ch, '\n' | '\u{2028}' | '\u{2029}')
}

fn is_id_start(ch: char) -> bool {
    ch == '_' || ch == '$' || unicode_xid::UnicodeXID::is_xid_start(ch)
}

fn is_id_continue(ch: char) -> bool {
    ch == '_'
        || ch == '$'
        || ch == '\u{200C}'
        || ch == '\u{200D}'
        || unicode_xid::UnicodeXID::is_xid_continue(ch)
}
