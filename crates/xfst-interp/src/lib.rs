//! Stack-based interpreter for xfst-style transducer scripts.
//!
//! A [`Session`] owns a stack of networks, a table of named definitions,
//! lists, functions and aliases, and a set of variables. Script text is
//! decoded by a [`ScriptReader`] into [`Command`] values, and each command
//! is executed by [`Session::dispatch`], which writes results to an output
//! sink and diagnostics to an error sink.
//!
//! # Architecture
//!
//! - [`session`] -- Session state and failure escalation
//! - [`dispatch`] -- One command against the session
//! - [`script`] -- Script text to commands
//! - [`command`] -- Decoded commands and help text
//! - [`stack`] -- The value stack
//! - [`names`] -- Definitions, lists, functions and aliases
//! - [`variables`] -- Session variables and engine switches
//! - [`apply`] -- `apply up` / `apply down`
//! - [`printer`] -- Path rendering
//! - [`inspect`] -- `print` and `test` commands
//! - [`files`] -- Loading and saving networks
//! - [`function`] -- Regex function definitions
//! - [`compile_replace`] -- Compiling bracketed regexes on one side of a network
//! - [`error`] -- Error kinds and severities

pub mod apply;
pub mod command;
pub mod compile_replace;
pub mod dispatch;
pub mod error;
pub mod files;
pub mod function;
pub mod inspect;
pub mod names;
pub mod printer;
pub mod script;
pub mod session;
pub mod stack;
pub mod variables;

pub use command::Command;
pub use error::{Severity, XfstError};
pub use script::ScriptReader;
pub use session::{Io, Session};
pub use stack::{Network, Stack};
pub use variables::Variables;
