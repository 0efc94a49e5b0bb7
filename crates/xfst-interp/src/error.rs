// Error kinds reported by the dispatcher and their failure severities.

use xfst_fst::FstError;
use xfst_regex::RegexError;

/// Printed when an operation meets a lookup-optimized network.
pub const OPTIMIZED_UNSUPPORTED: &str = "Operation not supported for optimized lookup format. \
     Consider 'remove-optimization' to convert into ordinary format.";

/// How a failed command escalates to the sticky session failure flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Sets the flag whenever `quit-on-fail` is ON.
    Fail,
    /// Like [`Severity::Fail`], but never while reading interactively.
    LesserFail,
}

#[derive(Debug, thiserror::Error)]
pub enum XfstError {
    #[error("{}", underflow_message(*needed))]
    StackUnderflow { needed: usize },

    #[error("no such {kind}: '{name}'")]
    UndefinedName { kind: &'static str, name: String },

    #[error(
        "Error: '{name}' has already been defined as a {existing} variable.\n\
         It cannot have an incompatible definition as a {requested}.\n\
         Please undefine the variable first."
    )]
    IncompatibleKind {
        name: String,
        existing: &'static str,
        requested: &'static str,
    },

    #[error("{0}")]
    EngineOperationUnsupported(String),

    #[error("{0}")]
    MalformedInput(String),

    #[error("{0}")]
    ResourceFailure(String),

    #[error("no such variable: '{0}'")]
    UnknownVariable(String),

    #[error("invalid value '{value}' for variable '{name}', expected {expected}")]
    InvalidValue {
        name: String,
        value: String,
        expected: &'static str,
    },

    #[error(transparent)]
    Fst(#[from] FstError),

    #[error(transparent)]
    Regex(#[from] RegexError),
}

fn underflow_message(needed: usize) -> String {
    if needed <= 1 {
        "Stack is empty.".to_string()
    } else {
        format!("Not enough networks on stack. Operation requires at least {needed}.")
    }
}

impl From<std::io::Error> for XfstError {
    fn from(e: std::io::Error) -> Self {
        XfstError::ResourceFailure(e.to_string())
    }
}

impl XfstError {
    pub fn severity(&self) -> Severity {
        match self {
            XfstError::IncompatibleKind { .. }
            | XfstError::ResourceFailure(_)
            | XfstError::Fst(_)
            | XfstError::Regex(_) => Severity::Fail,
            XfstError::StackUnderflow { .. }
            | XfstError::UndefinedName { .. }
            | XfstError::EngineOperationUnsupported(_)
            | XfstError::MalformedInput(_)
            | XfstError::UnknownVariable(_)
            | XfstError::InvalidValue { .. } => Severity::LesserFail,
        }
    }

    pub(crate) fn optimized() -> Self {
        XfstError::EngineOperationUnsupported(OPTIMIZED_UNSUPPORTED.to_string())
    }

    pub(crate) fn undefined(kind: &'static str, name: &str) -> Self {
        XfstError::UndefinedName {
            kind,
            name: name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn underflow_messages() {
        assert_eq!(XfstError::StackUnderflow { needed: 1 }.to_string(), "Stack is empty.");
        assert_eq!(
            XfstError::StackUnderflow { needed: 2 }.to_string(),
            "Not enough networks on stack. Operation requires at least 2."
        );
    }

    #[test]
    fn severities() {
        assert_eq!(XfstError::StackUnderflow { needed: 1 }.severity(), Severity::LesserFail);
        assert_eq!(XfstError::ResourceFailure("x".into()).severity(), Severity::Fail);
        assert_eq!(XfstError::Fst(FstError::Cyclic).severity(), Severity::Fail);
    }

    #[test]
    fn incompatible_kind_names_both_kinds() {
        let e = XfstError::IncompatibleKind {
            name: "V".into(),
            existing: "list",
            requested: "transducer",
        };
        let text = e.to_string();
        assert!(text.starts_with("Error: 'V' has already been defined as a list variable."));
        assert!(text.contains("as a transducer."));
    }
}
