//! Hand-written tokenizer for the JavaScript subset.
//!
//! Tokens carry their source span and whether a line terminator preceded
//! them; the parser needs the latter for automatic semicolon insertion and
//! for the restricted productions after `return`, `throw`, `break` and
//! `continue`.

use crate::{
    ast::{CodeLoc, CodeRange},
    exception::Exception,
};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    String(String),
    Ident(String),
    Keyword(Kw),
    Punct(Punct),
    Eof,
}

/// Reserved words. Words for constructs outside the subset still lex as
/// keywords so the parser can reject them with a message naming the
/// construct instead of a generic syntax error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kw {
    Var,
    Let,
    Const,
    Function,
    Return,
    If,
    Else,
    For,
    While,
    Do,
    Break,
    Continue,
    New,
    Delete,
    TypeOf,
    Void,
    In,
    InstanceOf,
    This,
    Null,
    True,
    False,
    Try,
    Catch,
    Finally,
    Throw,
    Class,
    Async,
    Await,
    Yield,
    Switch,
    Case,
    Default,
    Import,
    Export,
    Super,
    Extends,
    Static,
    Debugger,
    With,
}

fn keyword(word: &str) -> Option<Kw> {
    Some(match word {
        "var" => Kw::Var,
        "let" => Kw::Let,
        "const" => Kw::Const,
        "function" => Kw::Function,
        "return" => Kw::Return,
        "if" => Kw::If,
        "else" => Kw::Else,
        "for" => Kw::For,
        "while" => Kw::While,
        "do" => Kw::Do,
        "break" => Kw::Break,
        "continue" => Kw::Continue,
        "new" => Kw::New,
        "delete" => Kw::Delete,
        "typeof" => Kw::TypeOf,
        "void" => Kw::Void,
        "in" => Kw::In,
        "instanceof" => Kw::InstanceOf,
        "this" => Kw::This,
        "null" => Kw::Null,
        "true" => Kw::True,
        "false" => Kw::False,
        "try" => Kw::Try,
        "catch" => Kw::Catch,
        "finally" => Kw::Finally,
        "throw" => Kw::Throw,
        "class" => Kw::Class,
        "async" => Kw::Async,
        "await" => Kw::Await,
        "yield" => Kw::Yield,
        "switch" => Kw::Switch,
        "case" => Kw::Case,
        "default" => Kw::Default,
        "import" => Kw::Import,
        "export" => Kw::Export,
        "super" => Kw::Super,
        "extends" => Kw::Extends,
        "static" => Kw::Static,
        "debugger" => Kw::Debugger,
        "with" => Kw::With,
        _ => return None,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punct {
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semicolon,
    Comma,
    Dot,
    Ellipsis,
    OptionalDot,
    Question,
    Colon,
    Arrow,
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    ExpAssign,
    BitAndAssign,
    BitOrAssign,
    BitXorAssign,
    ShlAssign,
    ShrAssign,
    UShrAssign,
    AndAssign,
    OrAssign,
    NullishAssign,
    EqLoose,
    NeLoose,
    EqStrict,
    NeStrict,
    Lt,
    Gt,
    Le,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Exp,
    Inc,
    Dec,
    Not,
    BitNot,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub range: CodeRange,
    /// A line terminator appeared between the previous token and this one.
    pub newline_before: bool,
}

impl Token {
    #[must_use]
    pub fn start(&self) -> CodeLoc {
        self.range.start
    }
}

/// Tokenizes `source`, raising a `SyntaxError` exception on malformed input.
pub fn tokenize(source: &str) -> Result<Vec<Token>, Exception> {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    newline_pending: bool,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 0,
            newline_pending: false,
            tokens: Vec::new(),
        }
    }

    fn loc(&self) -> CodeLoc {
        CodeLoc::new(self.line, self.column)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn push(&mut self, kind: TokenKind, start: CodeLoc) {
        let token = Token {
            kind,
            range: CodeRange::new(start, self.loc()),
            newline_before: self.newline_pending,
        };
        self.newline_pending = false;
        self.tokens.push(token);
    }

    fn run(mut self) -> Result<Vec<Token>, Exception> {
        while let Some(c) = self.peek() {
            if c == '\n' {
                self.newline_pending = true;
                self.bump();
                continue;
            }
            if c.is_whitespace() {
                self.bump();
                continue;
            }
            if c == '/' && self.peek_at(1) == Some('/') {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.bump();
                }
                continue;
            }
            if c == '/' && self.peek_at(1) == Some('*') {
                self.block_comment()?;
                continue;
            }
            let start = self.loc();
            if c == '"' || c == '\'' {
                let text = self.string_literal(c)?;
                self.push(TokenKind::String(text), start);
                continue;
            }
            if c == '`' {
                return Err(Exception::unsupported("template literals are", start));
            }
            if c.is_ascii_digit() || (c == '.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit())) {
                let n = self.number_literal()?;
                self.push(TokenKind::Number(n), start);
                continue;
            }
            if c == '_' || c == '$' || c.is_alphabetic() {
                let word = self.word();
                let kind = match keyword(&word) {
                    Some(kw) => TokenKind::Keyword(kw),
                    None => TokenKind::Ident(word),
                };
                self.push(kind, start);
                continue;
            }
            if c == '/' && self.regex_position() {
                return Err(Exception::unsupported("regular expression literals are", start));
            }
            let punct = self.punct()?;
            self.push(TokenKind::Punct(punct), start);
        }
        let eof_start = self.loc();
        self.push(TokenKind::Eof, eof_start);
        Ok(self.tokens)
    }

    fn block_comment(&mut self) -> Result<(), Exception> {
        let start = self.loc();
        self.bump();
        self.bump();
        loop {
            match self.bump() {
                Some('*') if self.peek() == Some('/') => {
                    self.bump();
                    return Ok(());
                }
                Some('\n') => self.newline_pending = true,
                Some(_) => {}
                None => return Err(Exception::syntax("unterminated block comment", start)),
            }
        }
    }

    /// True when a `/` at the current position would start a regex in real
    /// JavaScript: the previous token cannot end an expression.
    fn regex_position(&self) -> bool {
        match self.tokens.last().map(|t| &t.kind) {
            None => true,
            Some(TokenKind::Number(_) | TokenKind::String(_) | TokenKind::Ident(_)) => false,
            Some(TokenKind::Keyword(kw)) => !matches!(kw, Kw::This | Kw::Null | Kw::True | Kw::False),
            Some(TokenKind::Punct(p)) => !matches!(p, Punct::RParen | Punct::RBracket | Punct::RBrace | Punct::Inc | Punct::Dec),
            Some(TokenKind::Eof) => true,
        }
    }

    fn string_literal(&mut self, quote: char) -> Result<String, Exception> {
        let start = self.loc();
        self.bump();
        let mut out = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(Exception::syntax("unterminated string literal", start));
            };
            if c == quote {
                return Ok(out);
            }
            if c == '\n' {
                return Err(Exception::syntax("unterminated string literal", start));
            }
            if c != '\\' {
                out.push(c);
                continue;
            }
            let Some(esc) = self.bump() else {
                return Err(Exception::syntax("unterminated string literal", start));
            };
            match esc {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                'b' => out.push('\u{8}'),
                'f' => out.push('\u{c}'),
                'v' => out.push('\u{b}'),
                '0' => out.push('\0'),
                '\n' => {}
                'x' => {
                    let hi = self.hex_digit(start)?;
                    let lo = self.hex_digit(start)?;
                    out.push(char::from(hi * 16 + lo));
                }
                'u' => {
                    let code = if self.eat('{') {
                        let mut code: u32 = 0;
                        while !self.eat('}') {
                            code = code * 16 + u32::from(self.hex_digit(start)?);
                            if code > 0x0010_FFFF {
                                return Err(Exception::syntax("invalid unicode escape", start));
                            }
                        }
                        code
                    } else {
                        let mut code: u32 = 0;
                        for _ in 0..4 {
                            code = code * 16 + u32::from(self.hex_digit(start)?);
                        }
                        code
                    };
                    match char::from_u32(code) {
                        Some(c) => out.push(c),
                        None => return Err(Exception::syntax("invalid unicode escape", start)),
                    }
                }
                other => out.push(other),
            }
        }
    }

    fn hex_digit(&mut self, start: CodeLoc) -> Result<u8, Exception> {
        match self.bump().and_then(|c| c.to_digit(16)) {
            Some(d) => Ok(d as u8),
            None => Err(Exception::syntax("invalid escape sequence", start)),
        }
    }

    fn number_literal(&mut self) -> Result<f64, Exception> {
        let start = self.loc();
        let begin = self.pos;
        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x' | 'X' | 'o' | 'O' | 'b' | 'B')) {
            self.bump();
            let radix = match self.bump() {
                Some('x' | 'X') => 16,
                Some('o' | 'O') => 8,
                _ => 2,
            };
            let digits_begin = self.pos;
            while self.peek().is_some_and(|c| c.is_digit(radix)) {
                self.bump();
            }
            if self.pos == digits_begin {
                return Err(Exception::syntax("invalid number literal", start));
            }
            let digits: String = self.chars[digits_begin..self.pos].iter().collect();
            let value = u64::from_str_radix(&digits, radix)
                .map_err(|_| Exception::syntax("invalid number literal", start))?;
            return Ok(value as f64);
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        if self.peek() == Some('.') {
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            self.bump();
            if matches!(self.peek(), Some('+' | '-')) {
                self.bump();
            }
            let digits_begin = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
            if self.pos == digits_begin {
                return Err(Exception::syntax("invalid number literal", start));
            }
        }
        if self.peek() == Some('n') {
            return Err(Exception::unsupported("BigInt literals are", start));
        }
        let text: String = self.chars[begin..self.pos].iter().collect();
        text.parse::<f64>()
            .map_err(|_| Exception::syntax("invalid number literal", start))
    }

    fn word(&mut self) -> String {
        let begin = self.pos;
        while self
            .peek()
            .is_some_and(|c| c == '_' || c == '$' || c.is_alphanumeric())
        {
            self.bump();
        }
        self.chars[begin..self.pos].iter().collect()
    }

    fn punct(&mut self) -> Result<Punct, Exception> {
        let start = self.loc();
        let c = self.bump().expect("punct called at end of input");
        let p = match c {
            '(' => Punct::LParen,
            ')' => Punct::RParen,
            '{' => Punct::LBrace,
            '}' => Punct::RBrace,
            '[' => Punct::LBracket,
            ']' => Punct::RBracket,
            ';' => Punct::Semicolon,
            ',' => Punct::Comma,
            ':' => Punct::Colon,
            '~' => Punct::BitNot,
            '.' => {
                if self.peek() == Some('.') && self.peek_at(1) == Some('.') {
                    self.bump();
                    self.bump();
                    Punct::Ellipsis
                } else {
                    Punct::Dot
                }
            }
            '?' => {
                if self.eat('?') {
                    if self.eat('=') { Punct::NullishAssign } else { Punct::Nullish }
                } else if self.peek() == Some('.') && !self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
                    self.bump();
                    Punct::OptionalDot
                } else {
                    Punct::Question
                }
            }
            '=' => {
                if self.eat('=') {
                    if self.eat('=') { Punct::EqStrict } else { Punct::EqLoose }
                } else if self.eat('>') {
                    Punct::Arrow
                } else {
                    Punct::Assign
                }
            }
            '!' => {
                if self.eat('=') {
                    if self.eat('=') { Punct::NeStrict } else { Punct::NeLoose }
                } else {
                    Punct::Not
                }
            }
            '<' => {
                if self.eat('<') {
                    if self.eat('=') { Punct::ShlAssign } else { Punct::Shl }
                } else if self.eat('=') {
                    Punct::Le
                } else {
                    Punct::Lt
                }
            }
            '>' => {
                if self.eat('>') {
                    if self.eat('>') {
                        if self.eat('=') { Punct::UShrAssign } else { Punct::UShr }
                    } else if self.eat('=') {
                        Punct::ShrAssign
                    } else {
                        Punct::Shr
                    }
                } else if self.eat('=') {
                    Punct::Ge
                } else {
                    Punct::Gt
                }
            }
            '+' => {
                if self.eat('+') {
                    Punct::Inc
                } else if self.eat('=') {
                    Punct::AddAssign
                } else {
                    Punct::Plus
                }
            }
            '-' => {
                if self.eat('-') {
                    Punct::Dec
                } else if self.eat('=') {
                    Punct::SubAssign
                } else {
                    Punct::Minus
                }
            }
            '*' => {
                if self.eat('*') {
                    if self.eat('=') { Punct::ExpAssign } else { Punct::Exp }
                } else if self.eat('=') {
                    Punct::MulAssign
                } else {
                    Punct::Star
                }
            }
            '/' => {
                if self.eat('=') { Punct::DivAssign } else { Punct::Slash }
            }
            '%' => {
                if self.eat('=') { Punct::ModAssign } else { Punct::Percent }
            }
            '&' => {
                if self.eat('&') {
                    if self.eat('=') { Punct::AndAssign } else { Punct::And }
                } else if self.eat('=') {
                    Punct::BitAndAssign
                } else {
                    Punct::BitAnd
                }
            }
            '|' => {
                if self.eat('|') {
                    if self.eat('=') { Punct::OrAssign } else { Punct::Or }
                } else if self.eat('=') {
                    Punct::BitOrAssign
                } else {
                    Punct::BitOr
                }
            }
            '^' => {
                if self.eat('=') { Punct::BitXorAssign } else { Punct::BitXor }
            }
            other => {
                return Err(Exception::syntax(format!("unexpected character '{other}'"), start));
            }
        };
        Ok(p)
    }
}

#[cfg(test)]
mod tests {
    use super::{Kw, Punct, TokenKind, tokenize};

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).expect("tokenize failed").into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn numbers_strings_and_words() {
        let toks = kinds("let x = 1.5e2; 'a\\n'");
        assert_eq!(toks[0], TokenKind::Keyword(Kw::Let));
        assert_eq!(toks[1], TokenKind::Ident("x".to_owned()));
        assert_eq!(toks[2], TokenKind::Punct(Punct::Assign));
        assert_eq!(toks[3], TokenKind::Number(150.0));
        assert_eq!(toks[5], TokenKind::String("a\n".to_owned()));
    }

    #[test]
    fn hex_and_binary_literals() {
        assert_eq!(kinds("0xff")[0], TokenKind::Number(255.0));
        assert_eq!(kinds("0b101")[0], TokenKind::Number(5.0));
        assert_eq!(kinds("0o17")[0], TokenKind::Number(15.0));
    }

    #[test]
    fn newline_flag_tracks_line_breaks() {
        let toks = tokenize("a\nb").expect("tokenize failed");
        assert!(!toks[0].newline_before);
        assert!(toks[1].newline_before);
    }

    #[test]
    fn optional_chain_is_not_ternary_with_number() {
        // `a?.5:0` must lex `.5` as a number (conditional), not optional chaining.
        let toks = kinds("a?.5:0");
        assert_eq!(toks[1], TokenKind::Punct(Punct::Question));
        assert_eq!(toks[2], TokenKind::Number(0.5));
    }

    #[test]
    fn division_after_value_is_not_a_regex() {
        let toks = kinds("a / b");
        assert_eq!(toks[1], TokenKind::Punct(Punct::Slash));
    }

    #[test]
    fn regex_literals_are_rejected() {
        let err = tokenize("x = /ab+/;").expect_err("regex should be rejected");
        assert!(err.message().is_some_and(|m| m.contains("regular expression")));
    }

    #[test]
    fn template_literals_are_rejected() {
        let err = tokenize("`hi`").expect_err("template should be rejected");
        assert!(err.message().is_some_and(|m| m.contains("template literals")));
    }

    #[test]
    fn line_and_column_positions() {
        let toks = tokenize("a\n  bb").expect("tokenize failed");
        assert_eq!(toks[0].range.start.line, 1);
        assert_eq!(toks[0].range.start.column, 0);
        assert_eq!(toks[1].range.start.line, 2);
        assert_eq!(toks[1].range.start.column, 2);
        assert_eq!(toks[1].range.end.column, 4);
    }
}
