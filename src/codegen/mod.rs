//! Single-pass translation of Jack source to Hack VM instructions.
//!
//! Tokens are pulled straight off the reader and compiled as the parser
//! descends; one engine (with its own writer and scope tables) serves
//! one compilation unit.

use std::io::BufRead;

use crate::{error::CompileResult, tokenizer::Tokenizer};

pub mod engine;
pub mod symbols;
pub mod vm;

/// Compile one Jack class from `source`, returning the emitted VM text.
pub fn compile(source: impl BufRead) -> CompileResult<String> {
    engine::Engine::new(Tokenizer::new(source)).compile()
}
