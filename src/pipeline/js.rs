// src/pipeline/js.rs

//! A small JavaScript tokenizer and the checks built on it.
//!
//! This is not a parser. It knows enough about the lexical grammar to find
//! unterminated literals, unbalanced brackets and the handful of lint rules
//! we enforce, and to strip whitespace and comments without changing what
//! automatic semicolon insertion does.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    Str,
    Template,
    Regex,
    Punct,
    LineComment,
    BlockComment,
    Whitespace,
    Newline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// 0-based line of the first byte.
    pub line: usize,
    /// 0-based byte column of the first byte.
    pub column: usize,
}

impl Token<'_> {
    fn is_trivia(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Whitespace
                | TokenKind::Newline
                | TokenKind::LineComment
                | TokenKind::BlockComment
        )
    }

    fn is_punct(&self, p: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == p
    }
}

/// A lexical or bracket error with a 1-based line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct LexError {
    pub line: usize,
    pub message: String,
}

// Longest first.
const PUNCTUATORS: &[&str] = &[
    ">>>=", "...", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&=", "||=", "??=", "=>", "==",
    "!=", "<=", ">=", "&&", "||", "??", "?.", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=",
    "|=", "^=", "**", "<<", ">>",
];

/// Keywords after which a `/` starts a regular expression.
const EXPRESSION_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case",
    "do", "else", "yield", "await",
];

struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token<'a>>,
    // One entry per open `(`: whether it opened an if/while/for head.
    parens: Vec<bool>,
    // Token index of the last `)` that closed a statement head.
    head_close: Option<usize>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            line: 0,
            column: 0,
            tokens: Vec::new(),
            parens: Vec::new(),
            head_close: None,
        }
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn bump(&mut self) {
        if let Some(b) = self.peek(0) {
            self.pos += 1;
            if b == b'\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
    }

    fn error(&self, line: usize, message: &str) -> LexError {
        LexError {
            line: line + 1,
            message: message.to_string(),
        }
    }

    fn last_significant(&self) -> Option<(usize, &Token<'a>)> {
        self.tokens.iter().enumerate().rev().find(|(_, t)| !t.is_trivia())
    }

    fn regex_allowed(&self) -> bool {
        match self.last_significant() {
            None => true,
            Some((i, t)) => match t.kind {
                // `if (x) /re/.test(s)`: the head's `)` ends no expression.
                TokenKind::Punct if t.text == ")" => self.head_close == Some(i),
                TokenKind::Punct => !matches!(t.text, "]" | "}" | "++" | "--"),
                TokenKind::Ident => EXPRESSION_KEYWORDS.contains(&t.text),
                _ => false,
            },
        }
    }

    fn run(mut self) -> Result<Vec<Token<'a>>, LexError> {
        while let Some(c) = self.peek(0) {
            let (start, line, column) = (self.pos, self.line, self.column);
            let kind = match c {
                b'\n' => {
                    self.bump();
                    TokenKind::Newline
                }
                b'\r' if self.peek(1) == Some(b'\n') => {
                    self.bump();
                    self.bump();
                    TokenKind::Newline
                }
                b' ' | b'\t' | b'\r' | 0x0b | 0x0c => {
                    while matches!(self.peek(0), Some(b' ' | b'\t' | 0x0b | 0x0c))
                        || (self.peek(0) == Some(b'\r') && self.peek(1) != Some(b'\n'))
                    {
                        self.bump();
                    }
                    TokenKind::Whitespace
                }
                b'/' if self.peek(1) == Some(b'/') => {
                    while !matches!(self.peek(0), None | Some(b'\n')) {
                        self.bump();
                    }
                    TokenKind::LineComment
                }
                b'/' if self.peek(1) == Some(b'*') => {
                    self.scan_block_comment(line)?;
                    TokenKind::BlockComment
                }
                b'/' if self.regex_allowed() => {
                    self.scan_regex(line)?;
                    TokenKind::Regex
                }
                b'\'' | b'"' => {
                    self.scan_string(c, line)?;
                    TokenKind::Str
                }
                b'`' => {
                    self.scan_template(line)?;
                    TokenKind::Template
                }
                b'0'..=b'9' => {
                    self.scan_number();
                    TokenKind::Number
                }
                b'.' if matches!(self.peek(1), Some(b'0'..=b'9')) => {
                    self.scan_number();
                    TokenKind::Number
                }
                c if is_ident_start(c) => {
                    while self.peek(0).is_some_and(is_ident_byte) {
                        self.bump();
                    }
                    TokenKind::Ident
                }
                _ => {
                    let rest = &self.src[self.pos..];
                    let len = PUNCTUATORS
                        .iter()
                        .find(|p| rest.starts_with(**p))
                        .map_or(1, |p| p.len());
                    match c {
                        b'(' => {
                            let head = self.last_significant().is_some_and(|(_, t)| {
                                t.kind == TokenKind::Ident
                                    && matches!(t.text, "if" | "while" | "for" | "with")
                            });
                            self.parens.push(head);
                        }
                        b')' => {
                            if self.parens.pop() == Some(true) {
                                self.head_close = Some(self.tokens.len());
                            }
                        }
                        _ => {}
                    }
                    for _ in 0..len {
                        self.bump();
                    }
                    TokenKind::Punct
                }
            };
            self.tokens.push(Token {
                kind,
                text: &self.src[start..self.pos],
                line,
                column,
            });
        }
        Ok(self.tokens)
    }

    fn scan_block_comment(&mut self, line: usize) -> Result<(), LexError> {
        self.bump();
        self.bump();
        loop {
            match self.peek(0) {
                None => return Err(self.error(line, "unterminated comment")),
                Some(b'*') if self.peek(1) == Some(b'/') => {
                    self.bump();
                    self.bump();
                    return Ok(());
                }
                Some(_) => self.bump(),
            }
        }
    }

    fn scan_string(&mut self, quote: u8, line: usize) -> Result<(), LexError> {
        self.bump();
        loop {
            match self.peek(0) {
                None | Some(b'\n') => return Err(self.error(line, "unterminated string literal")),
                Some(b'\\') => {
                    self.bump();
                    self.bump();
                }
                Some(b) if b == quote => {
                    self.bump();
                    return Ok(());
                }
                Some(_) => self.bump(),
            }
        }
    }

    fn scan_template(&mut self, line: usize) -> Result<(), LexError> {
        self.bump();
        let mut depth = 0usize;
        loop {
            match self.peek(0) {
                None => return Err(self.error(line, "unterminated template literal")),
                Some(b'\\') => {
                    self.bump();
                    self.bump();
                }
                Some(b'`') if depth == 0 => {
                    self.bump();
                    return Ok(());
                }
                Some(b'$') if self.peek(1) == Some(b'{') => {
                    depth += 1;
                    self.bump();
                    self.bump();
                }
                Some(b'{') if depth > 0 => {
                    depth += 1;
                    self.bump();
                }
                Some(b'}') if depth > 0 => {
                    depth -= 1;
                    self.bump();
                }
                Some(_) => self.bump(),
            }
        }
    }

    fn scan_regex(&mut self, line: usize) -> Result<(), LexError> {
        self.bump();
        let mut in_class = false;
        loop {
            match self.peek(0) {
                None | Some(b'\n') => {
                    return Err(self.error(line, "unterminated regular expression"));
                }
                Some(b'\\') => {
                    self.bump();
                    self.bump();
                }
                Some(b'[') => {
                    in_class = true;
                    self.bump();
                }
                Some(b']') => {
                    in_class = false;
                    self.bump();
                }
                Some(b'/') if !in_class => {
                    self.bump();
                    break;
                }
                Some(_) => self.bump(),
            }
        }
        while self.peek(0).is_some_and(is_ident_byte) {
            self.bump();
        }
        Ok(())
    }

    fn scan_number(&mut self) {
        let radix_prefix = self.peek(0) == Some(b'0')
            && matches!(self.peek(1), Some(b'x' | b'X' | b'o' | b'O' | b'b' | b'B'));
        if radix_prefix {
            self.bump();
            self.bump();
            while self.peek(0).is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_') {
                self.bump();
            }
            return;
        }

        self.eat_digits();
        if self.peek(0) == Some(b'.') {
            self.bump();
            self.eat_digits();
        }
        if matches!(self.peek(0), Some(b'e' | b'E')) {
            let sign = usize::from(matches!(self.peek(1), Some(b'+' | b'-')));
            if self.peek(1 + sign).is_some_and(|b| b.is_ascii_digit()) {
                for _ in 0..=sign {
                    self.bump();
                }
                self.eat_digits();
            }
        }
        if self.peek(0) == Some(b'n') {
            self.bump();
        }
    }

    fn eat_digits(&mut self) {
        while self.peek(0).is_some_and(|b| b.is_ascii_digit() || b == b'_') {
            self.bump();
        }
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || matches!(b, b'_' | b'$' | b'#' | b'\\') || b >= 0x80
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'$' | b'\\') || b >= 0x80
}

pub fn tokenize(src: &str) -> Result<Vec<Token<'_>>, LexError> {
    Lexer::new(src).run()
}

/// Check that `src` tokenizes and that its brackets balance.
pub fn validate(src: &str) -> Result<(), LexError> {
    let tokens = tokenize(src)?;
    let mut stack: Vec<(&str, usize)> = Vec::new();

    for t in tokens.iter().filter(|t| t.kind == TokenKind::Punct) {
        let expected_open = match t.text {
            "(" | "[" | "{" => {
                stack.push((t.text, t.line));
                continue;
            }
            ")" => "(",
            "]" => "[",
            "}" => "{",
            _ => continue,
        };
        match stack.pop() {
            Some((open, _)) if open == expected_open => {}
            _ => {
                return Err(LexError {
                    line: t.line + 1,
                    message: format!("unexpected '{}'", t.text),
                });
            }
        }
    }

    if let Some((open, line)) = stack.pop() {
        return Err(LexError {
            line: line + 1,
            message: format!("unclosed '{open}'"),
        });
    }
    Ok(())
}

/// A token-level lint finding with a 1-based line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintFinding {
    pub line: usize,
    pub rule: &'static str,
    pub message: String,
}

/// Token-based rules. Sources that do not tokenize yield no findings; the
/// compile stage reports those.
pub fn lint(src: &str) -> Vec<LintFinding> {
    let Ok(tokens) = tokenize(src) else {
        return Vec::new();
    };
    let significant: Vec<&Token<'_>> = tokens.iter().filter(|t| !t.is_trivia()).collect();
    let mut findings = Vec::new();

    for (i, t) in significant.iter().enumerate() {
        match (t.kind, t.text) {
            (TokenKind::Ident, "debugger") => findings.push(LintFinding {
                line: t.line + 1,
                rule: "no-debugger",
                message: "Unexpected 'debugger' statement.".to_string(),
            }),
            (TokenKind::Punct, op @ ("==" | "!=")) => findings.push(LintFinding {
                line: t.line + 1,
                rule: "eqeqeq",
                message: format!("Expected '{op}=' and instead saw '{op}'."),
            }),
            (TokenKind::Ident, name @ ("alert" | "confirm" | "prompt")) => {
                let called = significant.get(i + 1).is_some_and(|n| n.is_punct("("));
                let member = i >= 1 && significant[i - 1].is_punct(".");
                let on_window = i >= 2 && member && significant[i - 2].text == "window";
                if called && (!member || on_window) {
                    findings.push(LintFinding {
                        line: t.line + 1,
                        rule: "no-alert",
                        message: format!("Unexpected {name}."),
                    });
                }
            }
            _ => {}
        }
    }
    findings
}

/// Output of [`minify`]: the code plus `(out line, out column, in line,
/// in column)` for every emitted token, all 0-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Minified {
    pub code: String,
    pub positions: Vec<(usize, usize, usize, usize)>,
}

// A statement cannot start with any of these, so a line break before
// them never ends a statement.
const CONTINUES_BEFORE: &[&str] = &[
    ")", "]", "}", ",", ";", ".", "?.", ":", "=", "==", "===", "!=", "!==", "<", ">", "<=",
    ">=", "*", "**", "%", "&", "|", "^", "&&", "||", "??", "?", "=>", "+=", "-=", "*=", "/=",
    "%=", "&=", "|=", "^=", "<<=", ">>=", ">>>=", "**=", "&&=", "||=", "??=", "<<", ">>",
    ">>>",
];

fn needs_newline(prev: &Token<'_>, next: &Token<'_>) -> bool {
    let prev_continues =
        prev.kind == TokenKind::Punct && !matches!(prev.text, ")" | "]" | "}" | "++" | "--");
    if prev_continues {
        return false;
    }
    !(next.kind == TokenKind::Punct && CONTINUES_BEFORE.contains(&next.text))
}

fn needs_space(prev: &Token<'_>, next: &Token<'_>) -> bool {
    let (Some(&a), Some(&b)) = (prev.text.as_bytes().last(), next.text.as_bytes().first()) else {
        return false;
    };
    (is_ident_byte(a) && is_ident_byte(b))
        || (a == b'+' && b == b'+')
        || (a == b'-' && b == b'-')
        || (a == b'/' && matches!(b, b'/' | b'*'))
        || (prev.kind == TokenKind::Number && b == b'.')
}

struct Emitter {
    code: String,
    line: usize,
    column: usize,
}

impl Emitter {
    fn push(&mut self, text: &str) {
        for ch in text.chars() {
            if ch == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += ch.len_utf8();
            }
        }
        self.code.push_str(text);
    }
}

/// Strip whitespace and comments. `/*! ... */` comments are kept on their
/// own line.
pub fn minify(src: &str) -> Result<Minified, LexError> {
    let tokens = tokenize(src)?;
    let mut out = Emitter {
        code: String::with_capacity(src.len()),
        line: 0,
        column: 0,
    };
    let mut positions = Vec::new();
    let mut prev: Option<Token<'_>> = None;
    let mut saw_newline = false;

    for t in tokens {
        match t.kind {
            TokenKind::Whitespace | TokenKind::LineComment => continue,
            TokenKind::Newline => {
                saw_newline = true;
                continue;
            }
            TokenKind::BlockComment if t.text.starts_with("/*!") => {
                if !out.code.is_empty() && !out.code.ends_with('\n') {
                    out.push("\n");
                }
                out.push(t.text);
                out.push("\n");
                prev = None;
                saw_newline = false;
                continue;
            }
            TokenKind::BlockComment => {
                saw_newline |= t.text.contains('\n');
                continue;
            }
            _ => {}
        }

        if let Some(p) = &prev {
            if saw_newline && needs_newline(p, &t) {
                out.push("\n");
            } else if needs_space(p, &t) {
                out.push(" ");
            }
        }
        positions.push((out.line, out.column, t.line, t.column));
        out.push(t.text);
        prev = Some(t);
        saw_newline = false;
    }

    Ok(Minified {
        code: out.code,
        positions,
    })
}
