//! Regular-expression compiler for `xfst-fst` transducers.
//!
//! The supported language is the core of the xfst regex syntax: symbols,
//! quoted symbols, `{strings}`, pairs, grouping, optionality, the usual
//! postfix/prefix/infix operators, weights, and references to definitions,
//! lists and functions resolved through an [`Environment`].
//!
//! - [`lexer`] -- Tokens with byte spans
//! - [`parser`] -- Recursive-descent parser to a [`parser::Regex`] tree
//! - [`compiler`] -- Tree to transducer

use std::collections::BTreeSet;

use tracing::debug;
use xfst_fst::{EngineConfig, FstError, Transducer};

pub mod compiler;
pub mod lexer;
pub mod parser;

#[derive(Debug, thiserror::Error)]
pub enum RegexError {
    #[error("syntax error at offset {position}: {message}")]
    Syntax { position: usize, message: String },
    #[error("unexpected end of regular expression")]
    UnexpectedEnd,
    #[error("no such function: '{0}'")]
    UnknownFunction(String),
    #[error("function '{name}' takes {expected} arguments, {found} given")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("function calls nested too deeply in '{0}'")]
    Recursion(String),
    #[error(transparent)]
    Fst(#[from] FstError),
}

/// Names a regex may refer to.
pub trait Environment {
    fn definition(&self, name: &str) -> Option<&Transducer>;
    fn list(&self, name: &str) -> Option<&BTreeSet<String>>;
    /// Arity and marker-form body of the function `name`, where `name`
    /// includes the opening parenthesis.
    fn function(&self, name: &str) -> Option<(usize, &str)>;
}

/// An environment with no names at all.
pub struct NoEnvironment;

impl Environment for NoEnvironment {
    fn definition(&self, _name: &str) -> Option<&Transducer> {
        None
    }

    fn list(&self, _name: &str) -> Option<&BTreeSet<String>> {
        None
    }

    fn function(&self, _name: &str) -> Option<(usize, &str)> {
        None
    }
}

/// Symbol standing for argument `index` (1-based) inside the body of
/// `function`. Bodies refer to it as a quoted symbol.
pub fn argument_marker(function: &str, index: usize) -> String {
    format!("@{function}{index}@")
}

/// Compile one regular expression, optionally terminated by `;`. The result
/// is minimized when `cfg.minimal` is on.
pub fn compile(text: &str, env: &dyn Environment, cfg: &EngineConfig) -> Result<Transducer, RegexError> {
    let tokens = lexer::tokenize(text)?;
    let tree = parser::parse(&tokens)?;
    let mut t = compiler::Compiler::new(env, cfg).compile(&tree)?;
    if cfg.minimal {
        t.minimize(cfg)?;
    } else {
        t.remove_epsilons();
    }
    debug!(states = t.state_count(), arcs = t.arc_count(), "compiled regex");
    Ok(t)
}
