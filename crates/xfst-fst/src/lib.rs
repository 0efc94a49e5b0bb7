//! Weighted finite-state transducer engine.
//!
//! This crate provides the transducer value, the rational algebra over it,
//! path enumeration and lookup, a lookup-optimized compact form, and the
//! textual and binary codecs used to move networks in and out of a session.
//!
//! # Architecture
//!
//! - [`symbols`] -- Special symbols and the indexed symbol table
//! - [`flags`] -- Flag diacritic operations (P, N, R, D, C, U)
//! - [`transducer`] -- The transducer value and structural helpers
//! - [`tokenizer`] -- Longest-match tokenizer over multicharacter symbols
//! - [`config`] -- Engine switches and the compact traversal stack
//! - [`algebra`] -- Union, concatenation, closure, projection, substitution
//! - [`compose`] -- Composition and the other product constructions
//! - [`minimize`] -- Epsilon removal, determinization, minimization, equivalence
//! - [`paths`] -- Path extraction, lookup, ambiguity and random paths
//! - [`transition`] -- Packed transition layout of the compact form
//! - [`compact`] -- Lookup-optimized transducers
//! - [`format`] -- Native binary container
//! - [`att`] -- AT&T tabular text format
//! - [`prolog`] -- Prolog fact format
//! - [`dot`] -- Graphviz output
//! - [`listing`] -- Human-readable network listing

pub mod algebra;
pub mod att;
pub mod compact;
pub mod compose;
pub mod config;
pub mod dot;
pub mod flags;
pub mod format;
pub mod listing;
pub mod minimize;
pub mod paths;
pub mod prolog;
pub mod symbols;
pub mod tokenizer;
pub mod transducer;
pub mod transition;

pub use compact::CompactTransducer;
pub use config::EngineConfig;
pub use paths::Path;
pub use tokenizer::Tokenizer;
pub use transducer::{Arc, State, StateId, Transducer};

/// Error type for engine operations and codecs.
#[derive(Debug, thiserror::Error)]
pub enum FstError {
    #[error("invalid magic number in network header")]
    InvalidMagic,
    #[error("data too short: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },
    #[error("invalid symbol table: {0}")]
    InvalidSymbolTable(String),
    #[error("invalid flag diacritic: {0}")]
    InvalidFlagDiacritic(String),
    #[error("{0} is defined only for automata")]
    NotAutomaton(&'static str),
    #[error("transducer is cyclic")]
    Cyclic,
    #[error("flag diacritics are not identities")]
    FlagsNotIdentities,
    #[error("state limit of {0} exceeded")]
    StateLimit(usize),
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("symbol not in alphabet: {0}")]
    UnknownSymbol(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Upper bound on states created by subset and flag-splitting constructions.
pub const MAX_EXPANDED_STATES: usize = 1 << 20;

/// Upper bound on stack steps taken by one compact lookup.
pub const MAX_LOOP_COUNT: u32 = 1_000_000;
