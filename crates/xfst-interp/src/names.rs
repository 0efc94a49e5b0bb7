// One table for every named object of a session.
//
// A name is bound to exactly one kind of object at a time. Function names
// carry their opening parenthesis (`Foo(`), so they never collide with the
// other kinds.

use std::collections::{BTreeMap, BTreeSet};

use xfst_fst::Transducer;
use xfst_regex::Environment;

use crate::error::XfstError;

#[derive(Debug, Clone)]
pub enum Binding {
    Definition { net: Transducer, source: String },
    List(BTreeSet<String>),
    Function { arity: usize, body: String, display: String },
    Alias(String),
}

impl Binding {
    pub fn kind(&self) -> &'static str {
        match self {
            Binding::Definition { .. } => "transducer",
            Binding::List(_) => "list",
            Binding::Function { .. } => "function",
            Binding::Alias(_) => "alias",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NameTable {
    entries: BTreeMap<String, Binding>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.entries.get(name)
    }

    /// Fail when `name` is bound to something other than `kind`.
    pub fn check_kind(&self, name: &str, kind: &'static str) -> Result<(), XfstError> {
        match self.entries.get(name) {
            Some(existing) if existing.kind() != kind => Err(XfstError::IncompatibleKind {
                name: name.to_string(),
                existing: existing.kind(),
                requested: kind,
            }),
            _ => Ok(()),
        }
    }

    /// Bind `name` to `binding`, replacing a binding of the same kind.
    /// Returns `true` when an earlier binding was replaced.
    fn bind(&mut self, name: &str, binding: Binding) -> Result<bool, XfstError> {
        self.check_kind(name, binding.kind())?;
        Ok(self.entries.insert(name.to_string(), binding).is_some())
    }

    pub fn define(&mut self, name: &str, net: Transducer, source: impl Into<String>) -> Result<bool, XfstError> {
        self.bind(
            name,
            Binding::Definition {
                net,
                source: source.into(),
            },
        )
    }

    pub fn define_list(&mut self, name: &str, members: BTreeSet<String>) -> Result<bool, XfstError> {
        self.bind(name, Binding::List(members))
    }

    pub fn define_function(
        &mut self,
        name: &str,
        arity: usize,
        body: String,
        display: String,
    ) -> Result<bool, XfstError> {
        self.bind(name, Binding::Function { arity, body, display })
    }

    pub fn define_alias(&mut self, name: &str, body: impl Into<String>) -> Result<bool, XfstError> {
        self.bind(name, Binding::Alias(body.into()))
    }

    /// Remove the definition `name`.
    pub fn undefine(&mut self, name: &str) -> Result<Transducer, XfstError> {
        match self.entries.get(name) {
            Some(Binding::Definition { .. }) => match self.entries.remove(name) {
                Some(Binding::Definition { net, .. }) => Ok(net),
                _ => Err(XfstError::undefined("definition", name)),
            },
            _ => Err(XfstError::undefined("definition", name)),
        }
    }

    /// Remove the list `name`.
    pub fn unlist(&mut self, name: &str) -> Result<(), XfstError> {
        match self.entries.get(name) {
            Some(Binding::List(_)) => {
                self.entries.remove(name);
                Ok(())
            }
            _ => Err(XfstError::undefined("list", name)),
        }
    }

    pub fn alias(&self, name: &str) -> Option<&str> {
        match self.entries.get(name) {
            Some(Binding::Alias(body)) => Some(body),
            _ => None,
        }
    }

    /// Definitions in name order: `(name, net, source)`.
    pub fn definitions(&self) -> impl Iterator<Item = (&str, &Transducer, &str)> {
        self.entries.iter().filter_map(|(name, b)| match b {
            Binding::Definition { net, source } => Some((name.as_str(), net, source.as_str())),
            _ => None,
        })
    }

    pub fn lists(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.entries.iter().filter_map(|(name, b)| match b {
            Binding::List(members) => Some((name.as_str(), members)),
            _ => None,
        })
    }

    /// Functions in name order: `(name, arity, display body)`.
    pub fn functions(&self) -> impl Iterator<Item = (&str, usize, &str)> {
        self.entries.iter().filter_map(|(name, b)| match b {
            Binding::Function { arity, display, .. } => Some((name.as_str(), *arity, display.as_str())),
            _ => None,
        })
    }

    pub fn aliases(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().filter_map(|(name, b)| match b {
            Binding::Alias(body) => Some((name.as_str(), body.as_str())),
            _ => None,
        })
    }
}

impl Environment for NameTable {
    fn definition(&self, name: &str) -> Option<&Transducer> {
        match self.entries.get(name) {
            Some(Binding::Definition { net, .. }) => Some(net),
            _ => None,
        }
    }

    fn list(&self, name: &str) -> Option<&BTreeSet<String>> {
        match self.entries.get(name) {
            Some(Binding::List(members)) => Some(members),
            _ => None,
        }
    }

    fn function(&self, name: &str) -> Option<(usize, &str)> {
        match self.entries.get(name) {
            Some(Binding::Function { arity, body, .. }) => Some((*arity, body.as_str())),
            _ => None,
        }
    }
}
