// The value stack. Each slot owns its network; nothing is shared between
// slots or with the name table.

use xfst_fst::{CompactTransducer, Transducer};

use crate::error::XfstError;

/// A stack value: an ordinary transducer, or one converted for lookup.
#[derive(Debug, Clone)]
pub enum Network {
    Standard(Transducer),
    Optimized(CompactTransducer),
}

impl Network {
    pub fn is_optimized(&self) -> bool {
        matches!(self, Network::Optimized(_))
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Network::Standard(t) => t.name(),
            Network::Optimized(c) => c.name(),
        }
    }

    pub fn as_standard(&self) -> Result<&Transducer, XfstError> {
        match self {
            Network::Standard(t) => Ok(t),
            Network::Optimized(_) => Err(XfstError::optimized()),
        }
    }

    pub fn set_name(&mut self, name: &str) {
        match self {
            Network::Standard(t) => t.set_name(name),
            Network::Optimized(c) => c.set_name(name),
        }
    }

    /// An ordinary transducer with the same paths.
    pub fn to_standard(&self) -> Transducer {
        match self {
            Network::Standard(t) => t.clone(),
            Network::Optimized(c) => c.to_transducer(),
        }
    }
}

/// Last-in first-out sequence of networks; index 0 is the bottom.
#[derive(Debug, Clone, Default)]
pub struct Stack {
    items: Vec<Network>,
}

impl Stack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Fail unless at least `needed` networks are present.
    pub fn require(&self, needed: usize) -> Result<(), XfstError> {
        if self.items.len() < needed {
            Err(XfstError::StackUnderflow { needed })
        } else {
            Ok(())
        }
    }

    pub fn push(&mut self, net: Network) {
        self.items.push(net);
    }

    pub fn push_transducer(&mut self, t: Transducer) {
        self.items.push(Network::Standard(t));
    }

    pub fn pop(&mut self) -> Result<Network, XfstError> {
        self.items.pop().ok_or(XfstError::StackUnderflow { needed: 1 })
    }

    /// Pop an ordinary transducer. An optimized top stays on the stack.
    pub fn pop_standard(&mut self) -> Result<Transducer, XfstError> {
        self.top()?.as_standard()?;
        match self.items.pop() {
            Some(Network::Standard(t)) => Ok(t),
            Some(other) => {
                self.items.push(other);
                Err(XfstError::optimized())
            }
            None => Err(XfstError::StackUnderflow { needed: 1 }),
        }
    }

    pub fn top(&self) -> Result<&Network, XfstError> {
        self.items.last().ok_or(XfstError::StackUnderflow { needed: 1 })
    }

    pub fn top_mut(&mut self) -> Result<&mut Network, XfstError> {
        self.items.last_mut().ok_or(XfstError::StackUnderflow { needed: 1 })
    }

    pub fn top_standard(&self) -> Result<&Transducer, XfstError> {
        self.top()?.as_standard()
    }

    pub fn top_standard_mut(&mut self) -> Result<&mut Transducer, XfstError> {
        match self.items.last_mut() {
            Some(Network::Standard(t)) => Ok(t),
            Some(Network::Optimized(_)) => Err(XfstError::optimized()),
            None => Err(XfstError::StackUnderflow { needed: 1 }),
        }
    }

    /// Networks from top to bottom.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Network> {
        self.items.iter().rev()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Network> {
        self.items.iter_mut().rev()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Reverse the order of the whole stack.
    pub fn turn(&mut self) {
        self.items.reverse();
    }

    /// Move the top network to the bottom.
    pub fn rotate(&mut self) {
        if let Some(top) = self.items.pop() {
            self.items.insert(0, top);
        }
    }

    /// Take every network, bottom first, leaving the stack empty.
    pub fn take_all(&mut self) -> Vec<Network> {
        std::mem::take(&mut self.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> Network {
        let mut t = Transducer::from_symbol(name);
        t.set_name(name);
        Network::Standard(t)
    }

    fn names(stack: &Stack) -> Vec<String> {
        stack.iter().map(|n| n.name().unwrap_or("").to_string()).collect()
    }

    #[test]
    fn underflow_leaves_stack_alone() {
        let mut stack = Stack::new();
        stack.push(named("a"));
        assert!(matches!(stack.require(2), Err(XfstError::StackUnderflow { needed: 2 })));
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn turn_and_rotate() {
        let mut stack = Stack::new();
        for n in ["a", "b", "c"] {
            stack.push(named(n));
        }
        assert_eq!(names(&stack), vec!["c", "b", "a"]);
        stack.rotate();
        assert_eq!(names(&stack), vec!["b", "a", "c"]);
        stack.turn();
        assert_eq!(names(&stack), vec!["c", "a", "b"]);
    }

    #[test]
    fn optimized_top_is_not_popped_as_standard() {
        let mut stack = Stack::new();
        let compact = CompactTransducer::from_transducer(&Transducer::from_symbol("a")).unwrap();
        stack.push(Network::Optimized(compact));
        assert!(matches!(
            stack.pop_standard(),
            Err(XfstError::EngineOperationUnsupported(_))
        ));
        assert_eq!(stack.len(), 1);
    }
}
