//! Lexical analysis of Jack source code.
//!
//! The tokenizer is line-buffered: it pulls one source line at a time from
//! the underlying reader, strips comments and blank lines, and then cuts
//! tokens off the remainder left to right. It exposes a one-token lookahead
//! through [`Tokenizer::current`] and [`Tokenizer::advance`].

use std::io::BufRead;

use phf::{phf_set, Set};
use snafu::ResultExt;

use crate::error::{
    CompileResult, IoSnafu, UnknownTokenSnafu, UnterminatedCommentSnafu, UnterminatedStringSnafu,
};

/// The 21 reserved words of the Jack language.
static KEYWORDS: Set<&'static str> = phf_set! {
    "class",
    "constructor",
    "function",
    "method",
    "field",
    "static",
    "var",
    "int",
    "char",
    "boolean",
    "void",
    "true",
    "false",
    "null",
    "this",
    "let",
    "do",
    "if",
    "else",
    "while",
    "return",
};

/// Single-character symbols; each one is always its own token.
static SYMBOLS: Set<char> = phf_set! {
    '{', '}',
    '(', ')',
    '[', ']',
    '.', ',', ';',
    '+', '-', '*', '/',
    '&', '|',
    '<', '>',
    '=', '~',
};

// region: Token

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Keyword,
    Symbol,
    Identifier,
    IntConst,
    StringConst,
}

/// A classified lexeme. For string constants `text` holds the contents
/// without the surrounding quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
}

impl Token {
    pub fn is(&self, text: &str) -> bool {
        self.text == text
    }
}

// endregion

// region: Tokenizer

#[derive(Debug)]
pub struct Tokenizer<R> {
    input: R,
    /// Text of the code line currently being tokenized, comments stripped.
    line: String,
    /// Untokenized tail of that line.
    rest: String,
    line_nr: usize,
    current: Option<Token>,
}

impl<R: BufRead> Tokenizer<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            line: String::new(),
            rest: String::new(),
            line_nr: 0,
            current: None,
        }
    }

    /// The token most recently advanced past. `None` before the first
    /// [`advance`](Self::advance) and after end of input.
    pub fn current(&self) -> Option<&Token> {
        self.current.as_ref()
    }

    /// Number of the line the tokenizer is positioned on (1-based).
    pub fn line_nr(&self) -> usize {
        self.line_nr
    }

    /// Text of that line, for diagnostics.
    pub fn current_line(&self) -> &str {
        &self.line
    }

    /// Consume one token, updating [`current`](Self::current).
    /// `Ok(None)` signals end of input; it is not an error.
    pub fn advance(&mut self) -> CompileResult<Option<&Token>> {
        loop {
            if let Some(token) = self.next_token()? {
                self.current = Some(token);
                return Ok(self.current.as_ref());
            }

            match self.read_code_line()? {
                Some(line) => {
                    self.line.clone_from(&line);
                    self.rest = line;
                }
                None => {
                    self.current = None;
                    return Ok(None);
                }
            }
        }
    }

    /// Cut one token off the front of the current line remainder.
    /// `Ok(None)` means the remainder is exhausted.
    fn next_token(&mut self) -> CompileResult<Option<Token>> {
        let rest = std::mem::take(&mut self.rest);
        let rest = rest.trim();

        let Some(first) = rest.chars().next() else {
            return Ok(None);
        };

        let (lexeme, tail) = if first == '"' {
            match rest[1..].find('"') {
                // closing quote found at `end` of the stripped slice,
                // so `end + 1` in `rest`; keep both quotes in the lexeme
                Some(end) => (&rest[..end + 2], &rest[end + 2..]),
                None => {
                    return UnterminatedStringSnafu {
                        line: self.line_nr,
                        source_line: self.line.clone(),
                    }
                    .fail()
                }
            }
        } else if SYMBOLS.contains(&first) {
            rest.split_at(first.len_utf8())
        } else {
            let end = rest
                .find(|c: char| c.is_whitespace() || c == '"' || SYMBOLS.contains(&c))
                .unwrap_or(rest.len());
            rest.split_at(end)
        };

        self.rest = tail.trim_start().to_string();

        let kind = self.classify(lexeme)?;
        let text = match kind {
            TokenKind::StringConst => lexeme.trim_matches('"').to_string(),
            _ => lexeme.to_string(),
        };

        Ok(Some(Token {
            kind,
            text,
            line: self.line_nr,
        }))
    }

    fn classify(&self, lexeme: &str) -> CompileResult<TokenKind> {
        let kind = if KEYWORDS.contains(lexeme) {
            TokenKind::Keyword
        } else if lexeme.chars().count() == 1
            && lexeme.chars().all(|c| SYMBOLS.contains(&c))
        {
            TokenKind::Symbol
        } else if lexeme.starts_with('"') {
            TokenKind::StringConst
        } else if lexeme.chars().all(|c| c.is_ascii_digit()) {
            TokenKind::IntConst
        } else if is_identifier(lexeme) {
            TokenKind::Identifier
        } else {
            return UnknownTokenSnafu {
                line: self.line_nr,
                source_line: self.line.clone(),
                lexeme,
            }
            .fail();
        };

        Ok(kind)
    }

    /// Read lines until one carries code, skipping blanks and comments.
    /// `Ok(None)` at end of input.
    fn read_code_line(&mut self) -> CompileResult<Option<String>> {
        loop {
            let Some(line) = self.read_raw_line()? else {
                return Ok(None);
            };

            if line.is_empty() || line.starts_with("//") {
                continue;
            }

            // a line opening with `/*` is comment until the matching `*/`,
            // which may be several lines down
            let line = if let Some(after_open) = line.strip_prefix("/*") {
                match after_open.find("*/") {
                    Some(close) => after_open[close + 2..].trim_start().to_string(),
                    None => self.skip_block_comment()?,
                }
            } else {
                line
            };

            let line = strip_trailing_comment(&line).trim_end().to_string();
            if line.is_empty() {
                continue;
            }

            return Ok(Some(line));
        }
    }

    /// Consume lines until the `*/` closing the open block comment,
    /// returning whatever code follows the closer on its line.
    fn skip_block_comment(&mut self) -> CompileResult<String> {
        loop {
            let Some(line) = self.read_raw_line()? else {
                return UnterminatedCommentSnafu { line: self.line_nr }.fail();
            };

            if let Some(close) = line.find("*/") {
                return Ok(line[close + 2..].trim_start().to_string());
            }
        }
    }

    fn read_raw_line(&mut self) -> CompileResult<Option<String>> {
        let mut buf = String::new();
        let read = self.input.read_line(&mut buf).context(IoSnafu)?;
        if read == 0 {
            return Ok(None);
        }

        self.line_nr += 1;
        Ok(Some(buf.replace('\t', " ").trim().to_string()))
    }
}

// endregion

/// Truncate a code line at a trailing `//` comment. Quote-aware, so a
/// `//` inside a string constant does not cut the line short.
fn strip_trailing_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut in_string = false;

    for i in 0..bytes.len() {
        match bytes[i] {
            b'"' => in_string = !in_string,
            b'/' if !in_string && bytes.get(i + 1) == Some(&b'/') => {
                return &line[..i];
            }
            _ => {}
        }
    }

    line
}

fn is_identifier(lexeme: &str) -> bool {
    let mut chars = lexeme.chars();

    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::{Token, TokenKind, Tokenizer};
    use crate::error::CompileError;

    fn tokenize(source: &str) -> Vec<Token> {
        let mut tokenizer = Tokenizer::new(source.as_bytes());
        let mut tokens = Vec::new();

        while let Some(token) = tokenizer.advance().expect("tokenization should succeed") {
            tokens.push(token.clone());
        }

        tokens
    }

    fn kinds_and_texts(tokens: &[Token]) -> Vec<(TokenKind, &str)> {
        tokens
            .iter()
            .map(|token| (token.kind, token.text.as_str()))
            .collect()
    }

    #[test]
    fn test_token_stream_with_comments() {
        let source = r#"
// leading line comment
/* leading block comment */
/*
spanning
several lines
*/
class Main { // trailing comment
    static int count;
    /* mid */ let x = 31; // tail
}
"#;

        let expected = vec![
            (TokenKind::Keyword, "class"),
            (TokenKind::Identifier, "Main"),
            (TokenKind::Symbol, "{"),
            (TokenKind::Keyword, "static"),
            (TokenKind::Keyword, "int"),
            (TokenKind::Identifier, "count"),
            (TokenKind::Symbol, ";"),
            (TokenKind::Keyword, "let"),
            (TokenKind::Identifier, "x"),
            (TokenKind::Symbol, "="),
            (TokenKind::IntConst, "31"),
            (TokenKind::Symbol, ";"),
            (TokenKind::Symbol, "}"),
        ];

        assert_eq!(kinds_and_texts(&tokenize(source)), expected);
    }

    #[test]
    fn test_symbols_split_without_whitespace() {
        let expected = vec![
            (TokenKind::Keyword, "let"),
            (TokenKind::Identifier, "a"),
            (TokenKind::Symbol, "["),
            (TokenKind::Identifier, "i"),
            (TokenKind::Symbol, "]"),
            (TokenKind::Symbol, "="),
            (TokenKind::Symbol, "-"),
            (TokenKind::IntConst, "1"),
            (TokenKind::Symbol, ";"),
        ];

        assert_eq!(kinds_and_texts(&tokenize("let a[i]=-1;")), expected);
    }

    #[test]
    fn test_string_constant_keeps_interior_text() {
        let tokens = tokenize(r#"do Output.printString("len: 3 // ok");"#);

        let string = tokens
            .iter()
            .find(|token| token.kind == TokenKind::StringConst)
            .expect("a string constant");

        assert_eq!(string.text, "len: 3 // ok");
    }

    #[test]
    fn test_line_numbers() {
        let source = "class A {\n\n// gap\nfield int x;\n}\n";
        let tokens = tokenize(source);

        assert_eq!(tokens[0].line, 1); // class
        assert_eq!(tokens[3].line, 4); // field
    }

    #[test]
    fn test_comment_only_input_is_empty() {
        let source = "// nothing\n/* still\nnothing */\n";
        assert!(tokenize(source).is_empty());
    }

    #[test]
    fn test_unterminated_string() {
        let mut tokenizer = Tokenizer::new(r#"let s = "open;"#.as_bytes());

        let error = loop {
            match tokenizer.advance() {
                Ok(Some(_)) => continue,
                Ok(None) => panic!("expected an error"),
                Err(error) => break error,
            }
        };

        assert!(matches!(error, CompileError::UnterminatedString { line: 1, .. }));
    }

    #[test]
    fn test_unterminated_block_comment() {
        let mut tokenizer = Tokenizer::new("/* never\ncloses\n".as_bytes());

        assert!(matches!(
            tokenizer.advance(),
            Err(CompileError::UnterminatedComment { .. })
        ));
    }

    #[test]
    fn test_unknown_lexeme() {
        let mut tokenizer = Tokenizer::new("let x = @;".as_bytes());

        let error = loop {
            match tokenizer.advance() {
                Ok(Some(_)) => continue,
                Ok(None) => panic!("expected an error"),
                Err(error) => break error,
            }
        };

        assert!(
            matches!(error, CompileError::UnknownToken { ref lexeme, .. } if lexeme == "@")
        );
    }

    #[test]
    fn test_retokenizing_yields_same_stream() {
        let source = r#"
class List { // comment dropped on re-lex
    field int data;
    method void print(int n) {
        do Output.printString("n is");
        do Output.printInt(n);
        return;
    }
}
"#;

        let first = tokenize(source);

        let reconstructed = first
            .iter()
            .map(|token| match token.kind {
                TokenKind::StringConst => format!("\"{}\"", token.text),
                _ => token.text.clone(),
            })
            .collect::<Vec<_>>()
            .join(" ");
        let second = tokenize(&reconstructed);

        assert_eq!(kinds_and_texts(&first), kinds_and_texts(&second));
    }
}
