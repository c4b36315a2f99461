//! Recursive-descent compilation of the Jack grammar.
//!
//! Parsing, symbol-table maintenance and code generation happen in one
//! forward pass with a single token of lookahead; no parse tree is built,
//! the call stack is the parse tree. The current class name and the
//! enclosing subroutine's kind travel as engine state and explicit
//! parameters down the descent.

use std::io::BufRead;

use crate::{
    codegen::{
        symbols::{Symbol, SymbolKind, SymbolTable},
        vm::{Segment, Writer},
    },
    error::{
        CompileResult, IntegerTooLargeSnafu, UndeclaredVariableSnafu, UnexpectedEofSnafu,
        UnexpectedTokenSnafu,
    },
    logger::verbose,
    tokenizer::{Token, TokenKind, Tokenizer},
};

// region: token matchers

/// Token shapes a production can accept. Their `Display` strings form
/// the list of acceptable tokens in syntax errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expected {
    Text(&'static str),
    Identifier,
    Type,
    Op,
    UnaryOp,
    Term,
}

impl Expected {
    fn matches(self, token: &Token) -> bool {
        match self {
            Self::Text(text) => token.is(text),
            Self::Identifier => token.kind == TokenKind::Identifier,
            Self::Type => {
                matches!(token.text.as_str(), "int" | "char" | "boolean")
                    || token.kind == TokenKind::Identifier
            }
            Self::Op => matches!(
                token.text.as_str(),
                "+" | "-" | "*" | "/" | "&" | "|" | "<" | ">" | "="
            ),
            Self::UnaryOp => token.is("-") || token.is("~"),
            Self::Term => {
                matches!(
                    token.kind,
                    TokenKind::IntConst | TokenKind::StringConst | TokenKind::Identifier
                ) || matches!(token.text.as_str(), "true" | "false" | "null" | "this")
            }
        }
    }
}

impl std::fmt::Display for Expected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => write!(f, "{text:?}"),
            Self::Identifier => write!(f, "an identifier"),
            Self::Type => write!(f, "a type"),
            Self::Op => write!(f, "a binary operator"),
            Self::UnaryOp => write!(f, "a unary operator"),
            Self::Term => write!(f, "a term"),
        }
    }
}

fn expected_list(accepted: &[Expected]) -> String {
    accepted
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" or ")
}

// endregion

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
enum SubroutineKind {
    Constructor,
    Function,
    Method,
}

// region: Engine

/// One compilation unit's worth of state: the token cursor, the two
/// scope tables and the instruction writer. Nothing is shared across
/// files; construct a fresh engine per input.
#[derive(Debug)]
pub struct Engine<R> {
    tokenizer: Tokenizer<R>,
    writer: Writer,
    class_name: String,
    class_table: SymbolTable,
    subroutine_table: SymbolTable,
}

impl<R: BufRead> Engine<R> {
    pub fn new(tokenizer: Tokenizer<R>) -> Self {
        Self {
            tokenizer,
            writer: Writer::new(),
            class_name: String::new(),
            class_table: SymbolTable::new(),
            subroutine_table: SymbolTable::new(),
        }
    }

    /// Compile the unit's single class and return the emitted VM text.
    pub fn compile(mut self) -> CompileResult<String> {
        self.tokenizer.advance()?;
        self.compile_class()?;

        if let Some(token) = self.tokenizer.current() {
            return UnexpectedTokenSnafu {
                line: token.line,
                source_line: self.tokenizer.current_line().to_string(),
                expected: "end of file",
                found: token.text.clone(),
            }
            .fail();
        }

        Ok(self.writer.into_output())
    }

    // region: token plumbing

    /// Check the current token against `accepted`; on a match consume it
    /// and advance, otherwise fail with the list of acceptable tokens.
    fn process_token(&mut self, accepted: &[Expected]) -> CompileResult<Token> {
        let Some(token) = self.tokenizer.current() else {
            return UnexpectedEofSnafu {
                line: self.tokenizer.line_nr(),
                expected: expected_list(accepted),
            }
            .fail();
        };

        if !accepted.iter().any(|expected| expected.matches(token)) {
            return UnexpectedTokenSnafu {
                line: token.line,
                source_line: self.tokenizer.current_line().to_string(),
                expected: expected_list(accepted),
                found: token.text.clone(),
            }
            .fail();
        }

        let token = token.clone();
        self.tokenizer.advance()?;

        Ok(token)
    }

    fn check(&self, expected: Expected) -> bool {
        self.tokenizer
            .current()
            .is_some_and(|token| expected.matches(token))
    }

    // endregion

    // region: symbol plumbing

    /// Subroutine scope first, then class scope.
    fn lookup(&self, name: &str) -> Option<Symbol> {
        self.subroutine_table
            .get(name)
            .or_else(|| self.class_table.get(name))
            .cloned()
    }

    /// A variable reference must resolve in one of the scopes.
    fn resolve_variable(&self, token: &Token) -> CompileResult<Symbol> {
        self.lookup(&token.text).ok_or_else(|| {
            UndeclaredVariableSnafu {
                line: token.line,
                source_line: self.tokenizer.current_line().to_string(),
                name: token.text.clone(),
            }
            .build()
        })
    }

    /// The undeclared-identifier policy: an uppercase first letter means
    /// a class name (Jack performs no linking), anything else is an error.
    fn check_class_name(&self, token: &Token) -> CompileResult<()> {
        if token.text.starts_with(|c: char| c.is_ascii_uppercase()) {
            Ok(())
        } else {
            UndeclaredVariableSnafu {
                line: token.line,
                source_line: self.tokenizer.current_line().to_string(),
                name: token.text.clone(),
            }
            .fail()
        }
    }

    // endregion

    // region: declarations

    fn compile_class(&mut self) -> CompileResult<()> {
        self.process_token(&[Expected::Text("class")])?;
        let name = self.process_token(&[Expected::Identifier])?;
        self.class_name = name.text;
        verbose!("compiling class {}", self.class_name);

        self.process_token(&[Expected::Text("{")])?;

        while self.check(Expected::Text("static")) || self.check(Expected::Text("field")) {
            self.compile_class_var_dec()?;
        }

        while self.check(Expected::Text("constructor"))
            || self.check(Expected::Text("function"))
            || self.check(Expected::Text("method"))
        {
            self.compile_subroutine()?;
        }

        self.process_token(&[Expected::Text("}")])?;

        Ok(())
    }

    fn compile_class_var_dec(&mut self) -> CompileResult<()> {
        let kind_token =
            self.process_token(&[Expected::Text("static"), Expected::Text("field")])?;
        let kind = if kind_token.is("static") {
            SymbolKind::Static
        } else {
            SymbolKind::Field
        };

        let type_token = self.process_token(&[Expected::Type])?;

        loop {
            let name = self.process_token(&[Expected::Identifier])?;
            verbose!("declaring {kind} {} {}", type_token.text, name.text);
            self.class_table
                .define(name.text, type_token.text.clone(), kind);

            if !self.check(Expected::Text(",")) {
                break;
            }
            self.process_token(&[Expected::Text(",")])?;
        }

        self.process_token(&[Expected::Text(";")])?;

        Ok(())
    }

    fn compile_subroutine(&mut self) -> CompileResult<()> {
        self.subroutine_table.reset();

        let kind_token = self.process_token(&[
            Expected::Text("constructor"),
            Expected::Text("function"),
            Expected::Text("method"),
        ])?;
        let kind = match kind_token.text.as_str() {
            "constructor" => SubroutineKind::Constructor,
            "method" => SubroutineKind::Method,
            _ => SubroutineKind::Function,
        };

        let return_type = self.process_token(&[Expected::Text("void"), Expected::Type])?;
        let name = self.process_token(&[Expected::Identifier])?;
        verbose!(
            "compiling {kind} {} {}.{}",
            return_type.text,
            self.class_name,
            name.text
        );

        if kind == SubroutineKind::Method {
            // the receiver occupies argument 0
            self.subroutine_table
                .define("this", self.class_name.clone(), SymbolKind::Argument);
        }

        self.process_token(&[Expected::Text("(")])?;
        self.compile_parameter_list()?;
        self.process_token(&[Expected::Text(")")])?;

        self.compile_subroutine_body(kind, &name.text)
    }

    fn compile_parameter_list(&mut self) -> CompileResult<()> {
        while self.check(Expected::Type) {
            let type_token = self.process_token(&[Expected::Type])?;
            let name = self.process_token(&[Expected::Identifier])?;
            self.subroutine_table
                .define(name.text, type_token.text, SymbolKind::Argument);

            if !self.check(Expected::Text(",")) {
                break;
            }
            self.process_token(&[Expected::Text(",")])?;
        }

        Ok(())
    }

    fn compile_subroutine_body(&mut self, kind: SubroutineKind, name: &str) -> CompileResult<()> {
        self.process_token(&[Expected::Text("{")])?;

        while self.check(Expected::Text("var")) {
            self.compile_var_dec()?;
        }

        let n_locals = self.subroutine_table.count(SymbolKind::Local);
        self.writer.write_function(&self.class_name, name, n_locals);

        match kind {
            SubroutineKind::Constructor => {
                // allocate the object and anchor `this` to it
                let n_fields = self.class_table.count(SymbolKind::Field);
                self.writer.write_push(Segment::Constant, n_fields);
                self.writer.write_call("Memory", "alloc", 1);
                self.writer.write_pop(Segment::Pointer, 0);
            }
            SubroutineKind::Method => {
                // anchor `this` to the receiver
                self.writer.write_push(Segment::Argument, 0);
                self.writer.write_pop(Segment::Pointer, 0);
            }
            SubroutineKind::Function => {}
        }

        self.compile_statements()?;
        self.process_token(&[Expected::Text("}")])?;

        Ok(())
    }

    fn compile_var_dec(&mut self) -> CompileResult<()> {
        self.process_token(&[Expected::Text("var")])?;
        let type_token = self.process_token(&[Expected::Type])?;

        loop {
            let name = self.process_token(&[Expected::Identifier])?;
            self.subroutine_table
                .define(name.text, type_token.text.clone(), SymbolKind::Local);

            if !self.check(Expected::Text(",")) {
                break;
            }
            self.process_token(&[Expected::Text(",")])?;
        }

        self.process_token(&[Expected::Text(";")])?;

        Ok(())
    }

    // endregion

    // region: statements

    fn compile_statements(&mut self) -> CompileResult<()> {
        loop {
            if self.check(Expected::Text("let")) {
                self.compile_let()?;
            } else if self.check(Expected::Text("if")) {
                self.compile_if()?;
            } else if self.check(Expected::Text("while")) {
                self.compile_while()?;
            } else if self.check(Expected::Text("do")) {
                self.compile_do()?;
            } else if self.check(Expected::Text("return")) {
                self.compile_return()?;
            } else {
                break;
            }
        }

        Ok(())
    }

    fn compile_let(&mut self) -> CompileResult<()> {
        self.process_token(&[Expected::Text("let")])?;
        let name = self.process_token(&[Expected::Identifier])?;
        let symbol = self.resolve_variable(&name)?;

        if self.check(Expected::Text("[")) {
            // target address = base + subscript
            self.writer.write_push(symbol.kind.segment(), symbol.index);
            self.process_token(&[Expected::Text("[")])?;
            self.compile_expression()?;
            self.process_token(&[Expected::Text("]")])?;
            self.writer.write_arithmetic("+");

            self.process_token(&[Expected::Text("=")])?;
            self.compile_expression()?;

            // park the value while anchoring `that`; the right-hand side
            // may itself have clobbered pointer 1 with an array access
            self.writer.write_pop(Segment::Temp, 0);
            self.writer.write_pop(Segment::Pointer, 1);
            self.writer.write_push(Segment::Temp, 0);
            self.writer.write_pop(Segment::That, 0);
        } else {
            self.process_token(&[Expected::Text("=")])?;
            self.compile_expression()?;
            self.writer.write_pop(symbol.kind.segment(), symbol.index);
        }

        self.process_token(&[Expected::Text(";")])?;

        Ok(())
    }

    fn compile_if(&mut self) -> CompileResult<()> {
        self.process_token(&[Expected::Text("if")])?;
        self.process_token(&[Expected::Text("(")])?;
        self.compile_expression()?;
        self.process_token(&[Expected::Text(")")])?;
        self.process_token(&[Expected::Text("{")])?;

        self.emit_if(
            |engine| {
                engine.compile_statements()?;
                engine.process_token(&[Expected::Text("}")])?;
                Ok(())
            },
            |engine| {
                if !engine.check(Expected::Text("else")) {
                    return Ok(());
                }

                engine.process_token(&[Expected::Text("else")])?;
                engine.process_token(&[Expected::Text("{")])?;
                engine.compile_statements()?;
                engine.process_token(&[Expected::Text("}")])?;
                Ok(())
            },
        )
    }

    fn compile_while(&mut self) -> CompileResult<()> {
        self.process_token(&[Expected::Text("while")])?;

        self.emit_while(
            |engine| {
                engine.process_token(&[Expected::Text("(")])?;
                engine.compile_expression()?;
                engine.process_token(&[Expected::Text(")")])?;
                Ok(())
            },
            |engine| {
                engine.process_token(&[Expected::Text("{")])?;
                engine.compile_statements()?;
                engine.process_token(&[Expected::Text("}")])?;
                Ok(())
            },
        )
    }

    fn compile_do(&mut self) -> CompileResult<()> {
        self.process_token(&[Expected::Text("do")])?;
        let callee = self.process_token(&[Expected::Identifier])?;
        self.compile_call(&callee)?;
        self.process_token(&[Expected::Text(";")])?;

        // the call's return value is unused
        self.writer.write_pop(Segment::Temp, 0);

        Ok(())
    }

    fn compile_return(&mut self) -> CompileResult<()> {
        self.process_token(&[Expected::Text("return")])?;

        if self.check(Expected::Text(";")) {
            // a bare return still hands the caller a value to discard
            self.writer.write_push(Segment::Constant, 0);
        } else {
            self.compile_expression()?;
        }

        self.process_token(&[Expected::Text(";")])?;
        self.writer.write_return();

        Ok(())
    }

    /// `if`/`else` skeleton. Expects the condition on the stack; the
    /// label pair comes from the writer's monotonic counter.
    fn emit_if(
        &mut self,
        then_emit: impl FnOnce(&mut Self) -> CompileResult<()>,
        else_emit: impl FnOnce(&mut Self) -> CompileResult<()>,
    ) -> CompileResult<()> {
        let (if_false, if_end) = self.writer.if_labels();

        self.writer.write_unary("~");
        self.writer.write_if_goto(&if_false);
        then_emit(self)?;
        self.writer.write_goto(&if_end);
        self.writer.write_label(&if_false);
        else_emit(self)?;
        self.writer.write_label(&if_end);

        Ok(())
    }

    /// `while` skeleton; the condition emitter runs inside the loop head.
    fn emit_while(
        &mut self,
        cond_emit: impl FnOnce(&mut Self) -> CompileResult<()>,
        body_emit: impl FnOnce(&mut Self) -> CompileResult<()>,
    ) -> CompileResult<()> {
        let (exp, end) = self.writer.while_labels();

        self.writer.write_label(&exp);
        cond_emit(self)?;
        self.writer.write_unary("~");
        self.writer.write_if_goto(&end);
        body_emit(self)?;
        self.writer.write_goto(&exp);
        self.writer.write_label(&end);

        Ok(())
    }

    // endregion

    // region: expressions

    /// `term (op term)*`, folded strictly left to right; Jack has no
    /// operator precedence.
    fn compile_expression(&mut self) -> CompileResult<()> {
        self.compile_term()?;

        while self.check(Expected::Op) {
            let op = self.process_token(&[Expected::Op])?;
            self.compile_term()?;
            self.writer.write_arithmetic(&op.text);
        }

        Ok(())
    }

    /// Comma-separated call arguments; returns how many were pushed.
    fn compile_expression_list(&mut self) -> CompileResult<usize> {
        let mut count = 0;

        if self.check(Expected::Text(")")) {
            return Ok(count);
        }

        loop {
            self.compile_expression()?;
            count += 1;

            if !self.check(Expected::Text(",")) {
                break;
            }
            self.process_token(&[Expected::Text(",")])?;
        }

        Ok(count)
    }

    fn compile_term(&mut self) -> CompileResult<()> {
        if self.check(Expected::UnaryOp) {
            let op = self.process_token(&[Expected::UnaryOp])?;
            self.compile_term()?;
            self.writer.write_unary(&op.text);
            return Ok(());
        }

        if self.check(Expected::Text("(")) {
            self.process_token(&[Expected::Text("(")])?;
            self.compile_expression()?;
            self.process_token(&[Expected::Text(")")])?;
            return Ok(());
        }

        let token = self.process_token(&[Expected::Term])?;
        match token.kind {
            TokenKind::IntConst => {
                let value = self.parse_int(&token)?;
                self.writer.write_push(Segment::Constant, value);
            }
            TokenKind::StringConst => self.compile_string_constant(&token.text),
            TokenKind::Keyword => self.writer.write_keyword(&token.text),
            TokenKind::Identifier => return self.compile_identifier_term(&token),
            TokenKind::Symbol => {}
        }

        Ok(())
    }

    fn compile_identifier_term(&mut self, token: &Token) -> CompileResult<()> {
        // subroutine call, bare or through a receiver
        if self.check(Expected::Text("(")) || self.check(Expected::Text(".")) {
            return self.compile_call(token);
        }

        // array subscript
        if self.check(Expected::Text("[")) {
            let symbol = self.resolve_variable(token)?;
            self.writer.write_push(symbol.kind.segment(), symbol.index);

            self.process_token(&[Expected::Text("[")])?;
            self.compile_expression()?;
            self.process_token(&[Expected::Text("]")])?;

            self.writer.write_arithmetic("+");
            self.writer.write_pop(Segment::Pointer, 1);
            self.writer.write_push(Segment::That, 0);

            return Ok(());
        }

        // plain variable reference; an undeclared name is only tolerated
        // when it reads as a class name, and a class name pushes nothing
        match self.lookup(&token.text) {
            Some(symbol) => self.writer.write_push(symbol.kind.segment(), symbol.index),
            None => self.check_class_name(token)?,
        }

        Ok(())
    }

    /// Emit a subroutine call. `callee` is the already-consumed leading
    /// identifier; a `(` or `.` must follow.
    fn compile_call(&mut self, callee: &Token) -> CompileResult<()> {
        let opener = self.process_token(&[Expected::Text("("), Expected::Text(".")])?;

        if opener.is("(") {
            // bare call: a method invoked on the current object
            self.writer.write_push(Segment::Pointer, 0);
            let n_args = self.compile_expression_list()?;
            self.process_token(&[Expected::Text(")")])?;

            self.writer
                .write_call(&self.class_name, &callee.text, n_args + 1);
            return Ok(());
        }

        let name = self.process_token(&[Expected::Identifier])?;

        // a declared receiver makes this a method call on that object;
        // otherwise the callee must be a class name
        let receiver = self.lookup(&callee.text);
        match &receiver {
            Some(symbol) => self.writer.write_push(symbol.kind.segment(), symbol.index),
            None => self.check_class_name(callee)?,
        }

        self.process_token(&[Expected::Text("(")])?;
        let n_args = self.compile_expression_list()?;
        self.process_token(&[Expected::Text(")")])?;

        match receiver {
            Some(symbol) => self
                .writer
                .write_call(&symbol.type_name, &name.text, n_args + 1),
            None => self.writer.write_call(&callee.text, &name.text, n_args),
        }

        Ok(())
    }

    /// A string constant builds a `String` object at runtime, one
    /// character at a time.
    fn compile_string_constant(&mut self, text: &str) {
        self.writer.write_push(Segment::Constant, text.len());
        self.writer.write_call("String", "new", 1);

        for byte in text.bytes() {
            self.writer.write_push(Segment::Constant, usize::from(byte));
            self.writer.write_call("String", "appendChar", 2);
        }
    }

    /// An integer constant must fit the VM's signed word: 0..=32767.
    fn parse_int(&self, token: &Token) -> CompileResult<usize> {
        match token.text.parse::<usize>() {
            Ok(value) if value <= 32767 => Ok(value),
            _ => IntegerTooLargeSnafu {
                line: token.line,
                source_line: self.tokenizer.current_line().to_string(),
                literal: token.text.clone(),
            }
            .fail(),
        }
    }

    // endregion
}

// endregion
