//! Lexer.
//!
//! A hand-written scanner over the source bytes. The output is a token
//! vector whose last element is always `Eof`. Numeric literals are
//! decoded during scanning; character literals decode their escape
//! sequences directly into the token's integer value; identifiers are
//! interned and checked against the C23 keyword table with an
//! exact-length comparison.
//!
//! Tabs advance the column counter to the next multiple of the
//! configured tab width, so diagnostic carets line up with tab-expanded
//! source.

use crate::diag::{Diagnostic, Span};
use crate::intern::Symbol;
use crate::tu::TranslationUnit;
use std::fmt;
use std::fmt::Write as _;

/// Index into the translation unit's token vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Eof,
    Ident,
    IntLit,
    FloatLit,
    StrLit,

    // Keywords, C23 (N3096) 6.4.1.
    KwAlignas,
    KwAlignof,
    KwAuto,
    KwBool,
    KwBreak,
    KwCase,
    KwChar,
    KwConst,
    KwConstexpr,
    KwContinue,
    KwDefault,
    KwDo,
    KwDouble,
    KwElse,
    KwEnum,
    KwExtern,
    KwFalse,
    KwFloat,
    KwFor,
    KwGoto,
    KwIf,
    KwInline,
    KwInt,
    KwLong,
    KwNullptr,
    KwRegister,
    KwRestrict,
    KwReturn,
    KwShort,
    KwSigned,
    KwSizeof,
    KwStatic,
    KwStaticAssert,
    KwStruct,
    KwSwitch,
    KwThreadLocal,
    KwTrue,
    KwTypedef,
    KwTypeof,
    KwTypeofUnqual,
    KwUnion,
    KwUnsigned,
    KwVoid,
    KwVolatile,
    KwWhile,
    KwAtomic,
    KwBitInt,
    KwComplex,
    KwDecimal128,
    KwDecimal32,
    KwDecimal64,
    KwGeneric,
    KwImaginary,
    KwNoreturn,

    // Punctuators.
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semi,
    Comma,
    Colon,
    ColonColon,
    Question,
    Dot,
    Ellipsis,
    Arrow,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    PlusPlus,
    MinusMinus,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Bang,
    AmpAmp,
    PipePipe,
    Less,
    Greater,
    LessEq,
    GreaterEq,
    EqEq,
    NotEq,
    Shl,
    Shr,
    Assign,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    AmpEq,
    PipeEq,
    CaretEq,
    ShlEq,
    ShrEq,
}

static KEYWORDS: &[(&str, TokenKind)] = &[
    ("alignas", TokenKind::KwAlignas),
    ("alignof", TokenKind::KwAlignof),
    ("auto", TokenKind::KwAuto),
    ("bool", TokenKind::KwBool),
    ("break", TokenKind::KwBreak),
    ("case", TokenKind::KwCase),
    ("char", TokenKind::KwChar),
    ("const", TokenKind::KwConst),
    ("constexpr", TokenKind::KwConstexpr),
    ("continue", TokenKind::KwContinue),
    ("default", TokenKind::KwDefault),
    ("do", TokenKind::KwDo),
    ("double", TokenKind::KwDouble),
    ("else", TokenKind::KwElse),
    ("enum", TokenKind::KwEnum),
    ("extern", TokenKind::KwExtern),
    ("false", TokenKind::KwFalse),
    ("float", TokenKind::KwFloat),
    ("for", TokenKind::KwFor),
    ("goto", TokenKind::KwGoto),
    ("if", TokenKind::KwIf),
    ("inline", TokenKind::KwInline),
    ("int", TokenKind::KwInt),
    ("long", TokenKind::KwLong),
    ("nullptr", TokenKind::KwNullptr),
    ("register", TokenKind::KwRegister),
    ("restrict", TokenKind::KwRestrict),
    ("return", TokenKind::KwReturn),
    ("short", TokenKind::KwShort),
    ("signed", TokenKind::KwSigned),
    ("sizeof", TokenKind::KwSizeof),
    ("static", TokenKind::KwStatic),
    ("static_assert", TokenKind::KwStaticAssert),
    ("struct", TokenKind::KwStruct),
    ("switch", TokenKind::KwSwitch),
    ("thread_local", TokenKind::KwThreadLocal),
    ("true", TokenKind::KwTrue),
    ("typedef", TokenKind::KwTypedef),
    ("typeof", TokenKind::KwTypeof),
    ("typeof_unqual", TokenKind::KwTypeofUnqual),
    ("union", TokenKind::KwUnion),
    ("unsigned", TokenKind::KwUnsigned),
    ("void", TokenKind::KwVoid),
    ("volatile", TokenKind::KwVolatile),
    ("while", TokenKind::KwWhile),
    ("_Atomic", TokenKind::KwAtomic),
    ("_BitInt", TokenKind::KwBitInt),
    ("_Complex", TokenKind::KwComplex),
    ("_Decimal128", TokenKind::KwDecimal128),
    ("_Decimal32", TokenKind::KwDecimal32),
    ("_Decimal64", TokenKind::KwDecimal64),
    ("_Generic", TokenKind::KwGeneric),
    ("_Imaginary", TokenKind::KwImaginary),
    ("_Noreturn", TokenKind::KwNoreturn),
];

impl TokenKind {
    /// The token's spelling, or a category name for tokens that carry
    /// their own text.
    pub fn text(self) -> &'static str {
        use TokenKind::*;
        match self {
            Eof => "eof",
            Ident => "ident",
            IntLit => "int",
            FloatLit => "float",
            StrLit => "string",
            LParen => "(",
            RParen => ")",
            LBrace => "{",
            RBrace => "}",
            LBracket => "[",
            RBracket => "]",
            Semi => ";",
            Comma => ",",
            Colon => ":",
            ColonColon => "::",
            Question => "?",
            Dot => ".",
            Ellipsis => "...",
            Arrow => "->",
            Plus => "+",
            Minus => "-",
            Star => "*",
            Slash => "/",
            Percent => "%",
            PlusPlus => "++",
            MinusMinus => "--",
            Amp => "&",
            Pipe => "|",
            Caret => "^",
            Tilde => "~",
            Bang => "!",
            AmpAmp => "&&",
            PipePipe => "||",
            Less => "<",
            Greater => ">",
            LessEq => "<=",
            GreaterEq => ">=",
            EqEq => "==",
            NotEq => "!=",
            Shl => "<<",
            Shr => ">>",
            Assign => "=",
            PlusEq => "+=",
            MinusEq => "-=",
            StarEq => "*=",
            SlashEq => "/=",
            PercentEq => "%=",
            AmpEq => "&=",
            PipeEq => "|=",
            CaretEq => "^=",
            ShlEq => "<<=",
            ShrEq => ">>=",
            kw => {
                for &(text, kind) in KEYWORDS {
                    if kind == kw {
                        return text;
                    }
                }
                "unknown"
            }
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.text();
        // Single-character punctuators print quoted, everything else
        // prints its spelling or category name bare.
        if text.len() == 1 {
            write!(f, "'{}'", text)
        } else {
            write!(f, "{}", text)
        }
    }
}

/// Decoded payload of a token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenValue {
    None,
    /// Integer and character literals.
    Int(u64),
    /// Float literals.
    Float(f64),
    /// Identifiers.
    Name(Symbol),
}

#[derive(Debug, Clone, Copy)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the first character in the source.
    pub index: u32,
    /// Length in bytes.
    pub len: u32,
    /// 1-based source line.
    pub line: u32,
    /// 1-based column, tab-expanded.
    pub column: u32,
    pub value: TokenValue,
}

impl Token {
    pub fn span(&self) -> Span {
        Span {
            index: self.index,
            len: self.len.max(1),
            line: self.line,
            column: self.column,
        }
    }

    pub fn int_value(&self) -> u64 {
        match self.value {
            TokenValue::Int(v) => v,
            _ => 0,
        }
    }

    pub fn float_value(&self) -> f64 {
        match self.value {
            TokenValue::Float(v) => v,
            _ => 0.0,
        }
    }

    pub fn name(&self) -> Option<Symbol> {
        match self.value {
            TokenValue::Name(sym) => Some(sym),
            _ => None,
        }
    }
}

struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: u32,
    line_start: usize,
    extra_cols: u32,
    tab_width: u32,
    tokens: Vec<Token>,
    diags: Vec<Diagnostic>,
}

/// Tokenize the translation unit's source. Lexical errors are appended
/// to the diagnostic list; the token vector is always EOF-terminated
/// and usable by the parser regardless.
pub fn tokenize(tu: &mut TranslationUnit, tab_width: u32) {
    let mut lexer = Lexer {
        src: tu.source.as_bytes(),
        pos: 0,
        line: 0,
        line_start: 0,
        extra_cols: 0,
        tab_width: tab_width.max(1),
        tokens: Vec::new(),
        diags: Vec::new(),
    };

    while lexer.more_data() {
        lexer.skip_whitespace_and_comments();
        if !lexer.more_data() {
            break;
        }

        let c = lexer.cur();
        if c.is_ascii_alphabetic() || c == b'_' {
            lexer.read_ident(&mut tu.interner);
        } else if c.is_ascii_digit() {
            lexer.read_number();
        } else if c == b'"' {
            lexer.read_string();
        } else if c == b'\'' {
            lexer.read_char();
        } else {
            lexer.read_symbol();
        }
    }

    let eof = lexer.new_token(TokenKind::Eof);
    lexer.finish_token(eof);

    tu.tokens = lexer.tokens;
    tu.diagnostics.extend(lexer.diags);
}

impl<'a> Lexer<'a> {
    fn more_data(&self) -> bool {
        self.pos < self.src.len()
    }

    fn cur(&self) -> u8 {
        self.src[self.pos]
    }

    fn peek(&self) -> u8 {
        if self.pos + 1 < self.src.len() {
            self.src[self.pos + 1]
        } else {
            0
        }
    }

    fn pass(&mut self) {
        self.pos += 1;
    }

    /// Consume `c` if it is the next character.
    fn pull(&mut self, c: u8) -> bool {
        if self.more_data() && self.cur() == c {
            self.pos += 1;
            return true;
        }
        false
    }

    fn column(&self) -> u32 {
        (self.pos - self.line_start) as u32 + self.extra_cols
    }

    fn new_line(&mut self) {
        self.line += 1;
        self.line_start = self.pos;
        self.extra_cols = 0;
    }

    fn skip_whitespace_and_comments(&mut self) {
        while self.more_data() {
            let c = self.cur();
            if c == b'\n' {
                self.pass();
                self.new_line();
            } else if c == b'\t' {
                // Advance the visual column to the next tab stop.
                let visual = self.column();
                self.extra_cols += self.tab_width - (visual % self.tab_width) - 1;
                self.pass();
            } else if c.is_ascii_whitespace() {
                self.pass();
            } else if c == b'/' && self.peek() == b'/' {
                while self.more_data() && self.cur() != b'\n' {
                    self.pass();
                }
            } else if c == b'/' && self.peek() == b'*' {
                let open = self.make_span(self.pos, 2);
                self.pass();
                self.pass();
                loop {
                    if !self.more_data() {
                        self.diags
                            .push(Diagnostic::error("unterminated block comment", open));
                        break;
                    }
                    if self.cur() == b'\n' {
                        self.pass();
                        self.new_line();
                        continue;
                    }
                    if self.cur() == b'*' && self.peek() == b'/' {
                        self.pass();
                        self.pass();
                        break;
                    }
                    self.pass();
                }
            } else {
                break;
            }
        }
    }

    fn make_span(&self, index: usize, len: u32) -> Span {
        Span {
            index: index as u32,
            len,
            line: self.line + 1,
            column: (index - self.line_start) as u32 + self.extra_cols + 1,
        }
    }

    /// Start a token at the current position. `finish_token` fills the
    /// length once the end is known.
    fn new_token(&mut self, kind: TokenKind) -> usize {
        self.tokens.push(Token {
            kind,
            index: self.pos as u32,
            len: 0,
            line: self.line + 1,
            column: self.column() + 1,
            value: TokenValue::None,
        });
        self.tokens.len() - 1
    }

    fn finish_token(&mut self, token: usize) {
        let start = self.tokens[token].index;
        self.tokens[token].len = self.pos as u32 - start;
    }

    fn error_here(&mut self, message: impl Into<String>) {
        let span = self.make_span(self.pos.min(self.src.len().saturating_sub(1)), 1);
        self.diags.push(Diagnostic::error(message, span));
    }

    fn read_ident(&mut self, interner: &mut crate::intern::Interner) {
        let token = self.new_token(TokenKind::Ident);
        let start = self.pos;
        while self.more_data() && (self.cur().is_ascii_alphanumeric() || self.cur() == b'_') {
            self.pass();
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap_or("");

        // Exact-length comparison: "intx" must stay an identifier.
        let mut kind = TokenKind::Ident;
        for &(keyword, keyword_kind) in KEYWORDS {
            if keyword == text {
                kind = keyword_kind;
                break;
            }
        }
        self.tokens[token].kind = kind;
        if kind == TokenKind::Ident {
            self.tokens[token].value = TokenValue::Name(interner.intern(text));
        }
        self.finish_token(token);
    }

    fn read_number(&mut self) {
        let token = self.new_token(TokenKind::IntLit);
        let start = self.pos;

        let (radix, digits_start) = if self.cur() == b'0' && (self.peek() == b'x' || self.peek() == b'X')
        {
            self.pass();
            self.pass();
            (16, self.pos)
        } else if self.cur() == b'0' && (self.peek() == b'b' || self.peek() == b'B') {
            self.pass();
            self.pass();
            (2, self.pos)
        } else if self.cur() == b'0' && self.peek().is_ascii_digit() {
            self.pass();
            (8, self.pos)
        } else {
            (10, self.pos)
        };

        let is_digit = |c: u8| match radix {
            16 => c.is_ascii_hexdigit() || c == b'\'',
            _ => c.is_ascii_digit() || c == b'\'',
        };
        while self.more_data() && is_digit(self.cur()) {
            self.pass();
        }

        let mut is_float = false;
        if radix == 10 || radix == 8 {
            if self.more_data() && self.cur() == b'.' {
                is_float = true;
                self.pass();
                while self.more_data() && (self.cur().is_ascii_digit() || self.cur() == b'\'') {
                    self.pass();
                }
            }
            if self.more_data() && (self.cur() == b'e' || self.cur() == b'E') {
                is_float = true;
                self.pass();
                if self.more_data() && (self.cur() == b'+' || self.cur() == b'-') {
                    self.pass();
                }
                while self.more_data() && self.cur().is_ascii_digit() {
                    self.pass();
                }
            }
        } else if radix == 16 && self.more_data() && (self.cur() == b'.' || self.cur() == b'p' || self.cur() == b'P')
        {
            self.error_here("hexadecimal float literals are not supported");
            while self.more_data()
                && (self.cur().is_ascii_hexdigit()
                    || matches!(self.cur(), b'.' | b'p' | b'P' | b'+' | b'-'))
            {
                self.pass();
            }
        }

        let text_end = self.pos;

        // Integer/float suffixes are consumed and ignored.
        while self.more_data() && matches!(self.cur(), b'u' | b'U' | b'l' | b'L' | b'f' | b'F') {
            self.pass();
        }

        let raw = std::str::from_utf8(&self.src[digits_start.min(text_end)..text_end]).unwrap_or("");
        let cleaned: String = raw.chars().filter(|&c| c != '\'').collect();

        if is_float {
            let full = std::str::from_utf8(&self.src[start..text_end]).unwrap_or("");
            let cleaned_full: String = full.chars().filter(|&c| c != '\'').collect();
            match cleaned_full.parse::<f64>() {
                Ok(v) if v.is_finite() => {
                    self.tokens[token].kind = TokenKind::FloatLit;
                    self.tokens[token].value = TokenValue::Float(v);
                }
                _ => {
                    self.tokens[token].kind = TokenKind::FloatLit;
                    self.tokens[token].value = TokenValue::Float(0.0);
                    self.error_here("number literal out of range");
                }
            }
        } else {
            let digits = if cleaned.is_empty() { "0" } else { cleaned.as_str() };
            match u64::from_str_radix(digits, radix) {
                Ok(v) => self.tokens[token].value = TokenValue::Int(v),
                Err(_) => {
                    self.tokens[token].value = TokenValue::Int(0);
                    self.error_here("number literal out of range");
                }
            }
        }

        self.finish_token(token);
    }

    fn read_string(&mut self) {
        let token = self.new_token(TokenKind::StrLit);
        self.pass(); // opening quote
        loop {
            if !self.more_data() || self.cur() == b'\n' {
                self.finish_token(token);
                let span = self.tokens[token].span();
                self.diags
                    .push(Diagnostic::error("unterminated string literal", span));
                return;
            }
            match self.cur() {
                b'"' => {
                    self.pass();
                    break;
                }
                b'\\' => {
                    self.pass();
                    if self.more_data() {
                        self.pass();
                    }
                }
                _ => self.pass(),
            }
        }
        self.finish_token(token);
    }

    fn read_char(&mut self) {
        let token = self.new_token(TokenKind::IntLit);
        self.pass(); // opening quote

        let mut value: u64 = 0;
        loop {
            if !self.more_data() || self.cur() == b'\n' {
                self.finish_token(token);
                let span = self.tokens[token].span();
                self.diags
                    .push(Diagnostic::error("unterminated character literal", span));
                self.tokens[token].value = TokenValue::Int(value);
                return;
            }
            match self.cur() {
                b'\'' => {
                    self.pass();
                    break;
                }
                b'\\' => {
                    self.pass();
                    let escaped = if self.more_data() { self.cur() } else { 0 };
                    let decoded = match escaped {
                        b'\\' => Some(b'\\'),
                        b'\'' => Some(b'\''),
                        b'?' => Some(b'?'),
                        b'"' => Some(b'"'),
                        b'a' => Some(0x07),
                        b'b' => Some(0x08),
                        b'f' => Some(0x0c),
                        b'n' => Some(b'\n'),
                        b'r' => Some(b'\r'),
                        b't' => Some(b'\t'),
                        b'v' => Some(0x0b),
                        b'0' => Some(0),
                        b'x' => {
                            self.error_here("hex escape codes are not supported");
                            None
                        }
                        b'1'..=b'7' => {
                            self.error_here("octal escape codes are not supported");
                            None
                        }
                        _ => {
                            self.error_here("unknown escape code");
                            None
                        }
                    };
                    if let Some(byte) = decoded {
                        value = (value << 8) | byte as u64;
                    }
                    if self.more_data() {
                        self.pass();
                    }
                }
                c => {
                    value = (value << 8) | c as u64;
                    self.pass();
                }
            }
        }

        self.tokens[token].value = TokenValue::Int(value);
        self.finish_token(token);
    }

    fn read_symbol(&mut self) {
        use TokenKind::*;
        let token = self.new_token(TokenKind::Eof);
        let c = self.cur();
        self.pass();

        let kind = match c {
            b'(' => LParen,
            b')' => RParen,
            b'{' => LBrace,
            b'}' => RBrace,
            b'[' => LBracket,
            b']' => RBracket,
            b';' => Semi,
            b',' => Comma,
            b'?' => Question,
            b'~' => Tilde,
            b'!' => {
                if self.pull(b'=') {
                    NotEq
                } else {
                    Bang
                }
            }
            b'+' => {
                if self.pull(b'=') {
                    PlusEq
                } else if self.pull(b'+') {
                    PlusPlus
                } else {
                    Plus
                }
            }
            b'-' => {
                if self.pull(b'=') {
                    MinusEq
                } else if self.pull(b'-') {
                    MinusMinus
                } else if self.pull(b'>') {
                    Arrow
                } else {
                    Minus
                }
            }
            b'*' => {
                if self.pull(b'=') {
                    StarEq
                } else {
                    Star
                }
            }
            b'/' => {
                if self.pull(b'=') {
                    SlashEq
                } else {
                    Slash
                }
            }
            b'%' => {
                if self.pull(b'=') {
                    PercentEq
                } else {
                    Percent
                }
            }
            b'^' => {
                if self.pull(b'=') {
                    CaretEq
                } else {
                    Caret
                }
            }
            b'=' => {
                if self.pull(b'=') {
                    EqEq
                } else {
                    Assign
                }
            }
            b':' => {
                if self.pull(b':') {
                    ColonColon
                } else {
                    Colon
                }
            }
            b'>' => {
                if self.pull(b'>') {
                    if self.pull(b'=') { ShrEq } else { Shr }
                } else if self.pull(b'=') {
                    GreaterEq
                } else {
                    Greater
                }
            }
            b'<' => {
                if self.pull(b'<') {
                    if self.pull(b'=') { ShlEq } else { Shl }
                } else if self.pull(b'=') {
                    LessEq
                } else {
                    Less
                }
            }
            b'|' => {
                if self.pull(b'|') {
                    PipePipe
                } else if self.pull(b'=') {
                    PipeEq
                } else {
                    Pipe
                }
            }
            b'&' => {
                if self.pull(b'&') {
                    AmpAmp
                } else if self.pull(b'=') {
                    AmpEq
                } else {
                    Amp
                }
            }
            b'.' => {
                if self.more_data() && self.cur() == b'.' && self.peek() == b'.' {
                    self.pass();
                    self.pass();
                    Ellipsis
                } else {
                    Dot
                }
            }
            _ => {
                self.tokens.pop();
                let span = self.make_span(self.pos - 1, 1);
                self.diags.push(Diagnostic::error(
                    format!("unknown character '{}'", c as char),
                    span,
                ));
                return;
            }
        };

        self.tokens[token].kind = kind;
        self.finish_token(token);
    }
}

/// One token per line, followed by the highlighted source line.
pub fn dump_tokens(tu: &TranslationUnit) -> String {
    let mut out = String::new();
    for token in &tu.tokens {
        let lexeme = tu.token_text_raw(token);
        let _ = writeln!(
            out,
            "token({})@({}:{}) '{}'",
            token.kind, token.line, token.column, lexeme
        );
        out.push_str(&crate::diag::snippet(&tu.source, token.span()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tu::TranslationUnit;

    fn lex(source: &str) -> TranslationUnit {
        let mut tu = TranslationUnit::new("test.c", source);
        tokenize(&mut tu, 8);
        tu
    }

    fn kinds(tu: &TranslationUnit) -> Vec<TokenKind> {
        tu.tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_empty_source_is_just_eof() {
        let tu = lex("");
        assert_eq!(kinds(&tu), vec![TokenKind::Eof]);
        assert!(tu.diagnostics.is_empty());
    }

    #[test]
    fn test_keywords_are_exact_length() {
        let tu = lex("int intx do double doubles");
        assert_eq!(
            kinds(&tu),
            vec![
                TokenKind::KwInt,
                TokenKind::Ident,
                TokenKind::KwDo,
                TokenKind::KwDouble,
                TokenKind::Ident,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_underscore_keywords() {
        let tu = lex("_Atomic _Noreturn _atomic");
        assert_eq!(
            kinds(&tu),
            vec![
                TokenKind::KwAtomic,
                TokenKind::KwNoreturn,
                TokenKind::Ident,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_integer_literals() {
        let tu = lex("42 0x2a 0b101 052");
        let values: Vec<u64> = tu.tokens[..4].iter().map(|t| t.int_value()).collect();
        assert_eq!(values, vec![42, 42, 5, 42]);
    }

    #[test]
    fn test_integer_suffixes_are_consumed() {
        let tu = lex("10ul 7LL");
        assert_eq!(
            kinds(&tu),
            vec![TokenKind::IntLit, TokenKind::IntLit, TokenKind::Eof]
        );
        assert_eq!(tu.tokens[0].int_value(), 10);
        assert_eq!(tu.tokens[1].int_value(), 7);
    }

    #[test]
    fn test_float_literals() {
        let tu = lex("3.5 1e3");
        assert_eq!(tu.tokens[0].kind, TokenKind::FloatLit);
        assert_eq!(tu.tokens[0].float_value(), 3.5);
        assert_eq!(tu.tokens[1].float_value(), 1000.0);
    }

    #[test]
    fn test_number_out_of_range() {
        let tu = lex("99999999999999999999999999");
        assert_eq!(tu.error_count(), 1);
        assert!(tu.diagnostics[0].message.contains("out of range"));
    }

    #[test]
    fn test_char_literal_escapes() {
        let tu = lex(r"'a' '\n' '\\'");
        assert_eq!(tu.tokens[0].int_value(), 'a' as u64);
        assert_eq!(tu.tokens[1].int_value(), '\n' as u64);
        assert_eq!(tu.tokens[2].int_value(), '\\' as u64);
        assert!(tu.diagnostics.is_empty());
    }

    #[test]
    fn test_multi_char_literal_packs_bytes() {
        let tu = lex("'ab'");
        assert_eq!(tu.tokens[0].int_value(), (('a' as u64) << 8) | 'b' as u64);
    }

    #[test]
    fn test_unterminated_string() {
        let tu = lex("\"oops\n");
        assert_eq!(tu.error_count(), 1);
        assert!(tu.diagnostics[0].message.contains("unterminated string"));
    }

    #[test]
    fn test_unterminated_char() {
        let tu = lex("'x\n");
        assert_eq!(tu.error_count(), 1);
        assert!(
            tu.diagnostics[0]
                .message
                .contains("unterminated character")
        );
    }

    #[test]
    fn test_unknown_character() {
        let tu = lex("int @ x;");
        assert_eq!(tu.error_count(), 1);
        assert!(tu.diagnostics[0].message.contains("unknown character"));
    }

    #[test]
    fn test_greedy_punctuators() {
        let tu = lex(">>= <<= -> ... :: == != <= >= && || ++ --");
        assert_eq!(
            kinds(&tu),
            vec![
                TokenKind::ShrEq,
                TokenKind::ShlEq,
                TokenKind::Arrow,
                TokenKind::Ellipsis,
                TokenKind::ColonColon,
                TokenKind::EqEq,
                TokenKind::NotEq,
                TokenKind::LessEq,
                TokenKind::GreaterEq,
                TokenKind::AmpAmp,
                TokenKind::PipePipe,
                TokenKind::PlusPlus,
                TokenKind::MinusMinus,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        let tu = lex("int // trailing\n/* block\n comment */ x;");
        assert_eq!(
            kinds(&tu),
            vec![
                TokenKind::KwInt,
                TokenKind::Ident,
                TokenKind::Semi,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_line_and_column_positions() {
        let tu = lex("int\n  x;");
        // "x" is on line 2, column 3.
        assert_eq!(tu.tokens[1].line, 2);
        assert_eq!(tu.tokens[1].column, 3);
    }

    #[test]
    fn test_tab_expands_columns() {
        let tu = lex("\tint");
        // With a tab width of 8, the keyword starts at visual column 9.
        assert_eq!(tu.tokens[0].column, 9);
    }

    #[test]
    fn test_identifiers_are_interned() {
        let tu = lex("abc abc");
        assert_eq!(tu.tokens[0].name(), tu.tokens[1].name());
    }

    #[test]
    fn test_token_dump_format() {
        let tu = lex("int x;");
        let dump = dump_tokens(&tu);
        assert!(dump.contains("token(int)@(1:1) 'int'"));
        assert!(dump.contains("token(ident)@(1:5) 'x'"));
        assert!(dump.contains("token(';')@(1:6) ';'"));
        assert!(dump.contains("token(eof)@(1:7) ''"));
    }
}
