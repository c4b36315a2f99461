//! Emission of Hack VM instructions.
//!
//! The writer formats each instruction straight into an append-only text
//! buffer, one `\n`-terminated line per instruction. It also owns the two
//! monotonic counters numbering the `while` and `if` label pairs, so a
//! fresh writer (one per compilation unit) numbers its labels from zero
//! and output never depends on what was compiled before.

use phf::{phf_map, Map};

use crate::logger::verbose;

/// Memory segments addressable by `push` and `pop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Segment {
    Constant,
    Argument,
    Local,
    Static,
    This,
    That,
    Pointer,
    Temp,
}

/// VM renditions of the nine binary operators. Multiplication and
/// division have no opcode and route through the runtime.
static BINARY_OPS: Map<&'static str, &'static str> = phf_map! {
    "+" => "add",
    "-" => "sub",
    "&" => "and",
    "|" => "or",
    "<" => "lt",
    ">" => "gt",
    "=" => "eq",
    "*" => "call Math.multiply 2",
    "/" => "call Math.divide 2",
};

static UNARY_OPS: Map<&'static str, &'static str> = phf_map! {
    "-" => "neg",
    "~" => "not",
};

/// Append-only emitter of VM instructions.
#[derive(Debug)]
pub struct Writer {
    out: String,
    while_counter: usize,
    if_counter: usize,
}

impl Writer {
    pub const fn new() -> Self {
        Self {
            out: String::new(),
            while_counter: 0,
            if_counter: 0,
        }
    }

    fn emit(&mut self, instruction: &str) {
        self.out.push_str(instruction);
        self.out.push('\n');
    }

    pub fn write_push(&mut self, segment: Segment, index: usize) {
        self.emit(&format!("push {segment} {index}"));
    }

    pub fn write_pop(&mut self, segment: Segment, index: usize) {
        self.emit(&format!("pop {segment} {index}"));
    }

    pub fn write_arithmetic(&mut self, op: &str) {
        match BINARY_OPS.get(op) {
            Some(instruction) => self.emit(instruction),
            None => verbose!("ignoring unknown binary operator {op:?}"),
        }
    }

    pub fn write_unary(&mut self, op: &str) {
        match UNARY_OPS.get(op) {
            Some(instruction) => self.emit(instruction),
            None => verbose!("ignoring unknown unary operator {op:?}"),
        }
    }

    /// The keyword constants `true`, `false`, `null` and `this` compile
    /// to pushes; `true` is all ones, the negation of all zeros.
    pub fn write_keyword(&mut self, keyword: &str) {
        match keyword {
            "true" => {
                self.write_push(Segment::Constant, 0);
                self.emit("not");
            }
            "false" | "null" => self.write_push(Segment::Constant, 0),
            "this" => self.write_push(Segment::Pointer, 0),
            _ => verbose!("ignoring keyword {keyword:?} in constant position"),
        }
    }

    pub fn write_function(&mut self, class_name: &str, name: &str, n_locals: usize) {
        self.emit(&format!("function {class_name}.{name} {n_locals}"));
    }

    pub fn write_call(&mut self, class_name: &str, name: &str, n_args: usize) {
        self.emit(&format!("call {class_name}.{name} {n_args}"));
    }

    pub fn write_return(&mut self) {
        self.emit("return");
    }

    pub fn write_label(&mut self, name: &str) {
        self.emit(&format!("label {name}"));
    }

    pub fn write_goto(&mut self, name: &str) {
        self.emit(&format!("goto {name}"));
    }

    pub fn write_if_goto(&mut self, name: &str) {
        self.emit(&format!("if-goto {name}"));
    }

    /// Fresh `(WHILE_EXP_n, WHILE_END_n)` label pair.
    pub fn while_labels(&mut self) -> (String, String) {
        let n = self.while_counter;
        self.while_counter += 1;

        (format!("WHILE_EXP_{n}"), format!("WHILE_END_{n}"))
    }

    /// Fresh `(IF_FALSE_n, IF_END_n)` label pair.
    pub fn if_labels(&mut self) -> (String, String) {
        let n = self.if_counter;
        self.if_counter += 1;

        (format!("IF_FALSE_{n}"), format!("IF_END_{n}"))
    }

    /// Everything emitted so far, one instruction per line.
    pub fn into_output(self) -> String {
        self.out
    }
}
