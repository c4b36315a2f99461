//! Scope tables for class- and subroutine-level declarations.

use std::collections::HashMap;

use crate::codegen::vm::Segment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SymbolKind {
    Static,
    Field,
    Argument,
    Local,
}

impl SymbolKind {
    /// Memory segment a symbol of this kind lives in.
    pub const fn segment(self) -> Segment {
        match self {
            Self::Static => Segment::Static,
            Self::Field => Segment::This,
            Self::Argument => Segment::Argument,
            Self::Local => Segment::Local,
        }
    }

    const fn counter_slot(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub type_name: String,
    pub kind: SymbolKind,
    pub index: usize,
}

/// One scope's worth of declarations, plus the per-kind counters that
/// hand out dense, insertion-ordered indices.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: HashMap<String, Symbol>,
    counters: [usize; 4],
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a declaration, assigning the next index of its kind.
    /// Redeclaring a name replaces the earlier entry (last writer wins).
    pub fn define(
        &mut self,
        name: impl Into<String>,
        type_name: impl Into<String>,
        kind: SymbolKind,
    ) -> usize {
        let slot = kind.counter_slot();
        let index = self.counters[slot];
        self.counters[slot] += 1;

        self.symbols.insert(
            name.into(),
            Symbol {
                type_name: type_name.into(),
                kind,
                index,
            },
        );

        index
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    /// How many symbols of `kind` this scope has seen.
    pub fn count(&self, kind: SymbolKind) -> usize {
        self.counters[kind.counter_slot()]
    }

    /// Forget every declaration and reset the counters, ready for a
    /// fresh subroutine scope.
    pub fn reset(&mut self) {
        self.symbols.clear();
        self.counters = [0; 4];
    }
}
