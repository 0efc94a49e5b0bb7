// The weighted transducer value: states, arcs, alphabet and the structural
// helpers every algorithm builds on.

use std::collections::{BTreeSet, VecDeque};

use crate::flags::is_flag_diacritic;
use crate::symbols::{self, EPSILON, IDENTITY, UNKNOWN};
use crate::tokenizer::Tokenizer;

pub type StateId = usize;

/// Tolerance used when comparing and hashing weights.
pub const WEIGHT_TOLERANCE: f32 = 1e-4;

/// Quantize a weight for use as a hash or ordering key.
#[inline]
pub fn weight_key(w: f32) -> i64 {
    (w / WEIGHT_TOLERANCE).round() as i64
}

#[inline]
pub fn weights_close(a: f32, b: f32) -> bool {
    (a - b).abs() <= WEIGHT_TOLERANCE * 10.0
}

/// One transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Arc {
    pub input: String,
    pub output: String,
    pub weight: f32,
    pub target: StateId,
}

impl Arc {
    pub fn new(input: impl Into<String>, output: impl Into<String>, weight: f32, target: StateId) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            weight,
            target,
        }
    }

    #[inline]
    pub fn is_epsilon(&self) -> bool {
        self.input == EPSILON && self.output == EPSILON
    }

    #[inline]
    pub fn label(&self) -> (&str, &str) {
        (&self.input, &self.output)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct State {
    pub arcs: Vec<Arc>,
    pub final_weight: Option<f32>,
}

/// A weighted finite-state transducer over the tropical semiring.
///
/// Always has at least one state. The alphabet lists every ordinary symbol
/// the transducer knows about (flags included, epsilon/unknown/identity
/// excluded); a symbol can be in the alphabet without occurring on any arc.
#[derive(Clone)]
pub struct Transducer {
    pub(crate) states: Vec<State>,
    pub(crate) start: StateId,
    pub(crate) alphabet: BTreeSet<String>,
    pub(crate) name: Option<String>,
}

impl std::fmt::Debug for Transducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transducer")
            .field("name", &self.name)
            .field("state_count", &self.states.len())
            .field("arc_count", &self.arc_count())
            .field("alphabet_size", &self.alphabet.len())
            .finish()
    }
}

impl Default for Transducer {
    fn default() -> Self {
        Self::empty()
    }
}

impl Transducer {
    // =========================================================================
    // Construction
    // =========================================================================

    /// The empty language: one non-final state.
    pub fn empty() -> Self {
        Self {
            states: vec![State::default()],
            start: 0,
            alphabet: BTreeSet::new(),
            name: None,
        }
    }

    /// The language containing only the empty string.
    pub fn epsilon() -> Self {
        let mut t = Self::empty();
        t.states[0].final_weight = Some(0.0);
        t
    }

    /// A single arc `input:output`.
    pub fn from_pair(input: &str, output: &str) -> Self {
        let mut t = Self::empty();
        let end = t.add_state();
        t.set_final(end, 0.0);
        t.add_arc(0, Arc::new(input, output, 0.0, end));
        t
    }

    /// A single identity arc.
    pub fn from_symbol(symbol: &str) -> Self {
        Self::from_pair(symbol, symbol)
    }

    /// One path over the given symbol pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: AsRef<str>,
    {
        let mut t = Self::empty();
        let mut current = 0;
        for (i, o) in pairs {
            let next = t.add_state();
            t.add_arc(current, Arc::new(i.as_ref(), o.as_ref(), 0.0, next));
            current = next;
        }
        t.set_final(current, 0.0);
        t
    }

    /// One identity path over the given symbols.
    pub fn from_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let symbols: Vec<S> = symbols.into_iter().collect();
        Self::from_pairs(symbols.iter().map(|s| (s.as_ref(), s.as_ref())))
    }

    /// One identity path for `text`, split with `tokenizer`.
    pub fn from_string(text: &str, tokenizer: &Tokenizer) -> Self {
        Self::from_symbols(tokenizer.tokenize(text))
    }

    /// `?*` extended with every symbol of `alphabet`: the universal language.
    pub fn universal<'a>(alphabet: impl IntoIterator<Item = &'a String>) -> Self {
        let mut t = Self::epsilon();
        t.add_arc(0, Arc::new(IDENTITY, IDENTITY, 0.0, 0));
        for s in alphabet {
            t.add_arc(0, Arc::new(s.as_str(), s.as_str(), 0.0, 0));
        }
        t
    }

    // =========================================================================
    // Mutation primitives
    // =========================================================================

    pub fn add_state(&mut self) -> StateId {
        self.states.push(State::default());
        self.states.len() - 1
    }

    /// Add an arc; both symbols join the alphabet.
    pub fn add_arc(&mut self, from: StateId, arc: Arc) {
        self.add_symbol(&arc.input);
        self.add_symbol(&arc.output);
        self.states[from].arcs.push(arc);
    }

    pub fn set_final(&mut self, state: StateId, weight: f32) {
        self.states[state].final_weight = Some(weight);
    }

    /// Add `symbol` to the alphabet unless it is special.
    pub fn add_symbol(&mut self, symbol: &str) {
        if !symbols::is_special(symbol) && !self.alphabet.contains(symbol) {
            self.alphabet.insert(symbol.to_string());
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub fn start(&self) -> StateId {
        self.start
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn state(&self, id: StateId) -> &State {
        &self.states[id]
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn alphabet(&self) -> &BTreeSet<String> {
        &self.alphabet
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn arc_count(&self) -> usize {
        self.states.iter().map(|s| s.arcs.len()).sum()
    }

    pub fn is_final(&self, state: StateId) -> bool {
        self.states[state].final_weight.is_some()
    }

    /// Iterate over every arc as `(source, arc)`.
    pub fn arcs(&self) -> impl Iterator<Item = (StateId, &Arc)> {
        self.states
            .iter()
            .enumerate()
            .flat_map(|(id, s)| s.arcs.iter().map(move |a| (id, a)))
    }

    /// Every arc has identical input and output symbols.
    pub fn is_automaton(&self) -> bool {
        self.arcs().all(|(_, a)| a.input == a.output)
    }

    pub fn has_flag_diacritics(&self) -> bool {
        self.alphabet.iter().any(|s| is_flag_diacritic(s))
    }

    /// The flag diacritics in the alphabet.
    pub fn flag_diacritics(&self) -> BTreeSet<String> {
        self.alphabet
            .iter()
            .filter(|s| is_flag_diacritic(s))
            .cloned()
            .collect()
    }

    /// Symbols occurring on the input side of some arc.
    pub fn input_symbols(&self) -> BTreeSet<String> {
        self.arcs()
            .filter(|(_, a)| !symbols::is_special(&a.input))
            .map(|(_, a)| a.input.clone())
            .collect()
    }

    /// Whether unknown and identity occur on any arc.
    pub fn uses_wildcards(&self) -> (bool, bool) {
        let mut unknown = false;
        let mut identity = false;
        for (_, a) in self.arcs() {
            unknown |= a.input == UNKNOWN || a.output == UNKNOWN;
            identity |= a.input == IDENTITY || a.output == IDENTITY;
        }
        (unknown, identity)
    }

    /// Sorted, de-duplicated set of arc labels.
    pub fn labels(&self) -> BTreeSet<(String, String)> {
        self.arcs()
            .map(|(_, a)| (a.input.clone(), a.output.clone()))
            .collect()
    }

    /// The language is empty (no final state is reachable).
    pub fn is_empty_language(&self) -> bool {
        let reachable = self.accessible();
        !self
            .states
            .iter()
            .enumerate()
            .any(|(id, s)| reachable[id] && s.final_weight.is_some())
    }

    // =========================================================================
    // Structural helpers
    // =========================================================================

    /// States reachable from the start state.
    pub fn accessible(&self) -> Vec<bool> {
        let mut seen = vec![false; self.states.len()];
        let mut stack = vec![self.start];
        seen[self.start] = true;
        while let Some(s) = stack.pop() {
            for arc in &self.states[s].arcs {
                if !seen[arc.target] {
                    seen[arc.target] = true;
                    stack.push(arc.target);
                }
            }
        }
        seen
    }

    /// States from which a final state is reachable.
    pub fn coaccessible(&self) -> Vec<bool> {
        let mut reverse: Vec<Vec<StateId>> = vec![Vec::new(); self.states.len()];
        for (src, arc) in self.arcs() {
            reverse[arc.target].push(src);
        }
        let mut seen = vec![false; self.states.len()];
        let mut stack: Vec<StateId> = Vec::new();
        for (id, s) in self.states.iter().enumerate() {
            if s.final_weight.is_some() {
                seen[id] = true;
                stack.push(id);
            }
        }
        while let Some(s) = stack.pop() {
            for &p in &reverse[s] {
                if !seen[p] {
                    seen[p] = true;
                    stack.push(p);
                }
            }
        }
        seen
    }

    /// Keep only states that are both accessible and coaccessible. The start
    /// state always survives.
    pub fn trim(&mut self) -> &mut Self {
        let acc = self.accessible();
        let coacc = self.coaccessible();
        let keep: Vec<bool> = (0..self.states.len())
            .map(|i| i == self.start || (acc[i] && coacc[i]))
            .collect();
        self.retain_states(&keep);
        self
    }

    /// Drop states not marked in `keep`, renumbering the rest with the start
    /// state first.
    pub(crate) fn retain_states(&mut self, keep: &[bool]) {
        let mut order: Vec<StateId> = Vec::with_capacity(self.states.len());
        order.push(self.start);
        order.extend((0..self.states.len()).filter(|&i| keep[i] && i != self.start));
        let mut map = vec![usize::MAX; self.states.len()];
        for (new, &old) in order.iter().enumerate() {
            map[old] = new;
        }
        let mut old_states = std::mem::take(&mut self.states);
        self.states = order
            .iter()
            .map(|&old| {
                let mut s = std::mem::take(&mut old_states[old]);
                s.arcs.retain(|a| map[a.target] != usize::MAX);
                for a in &mut s.arcs {
                    a.target = map[a.target];
                }
                s
            })
            .collect();
        self.start = 0;
    }

    /// Renumber states in breadth-first order from the start state, visiting
    /// arcs in label order. Deterministic machines get a canonical numbering.
    pub fn canonicalize(&mut self) -> &mut Self {
        for s in &mut self.states {
            s.arcs.sort_by(|a, b| {
                (&a.input, &a.output)
                    .cmp(&(&b.input, &b.output))
                    .then(weight_key(a.weight).cmp(&weight_key(b.weight)))
                    .then(a.target.cmp(&b.target))
            });
        }
        let mut map = vec![usize::MAX; self.states.len()];
        let mut order = Vec::with_capacity(self.states.len());
        let mut queue = VecDeque::new();
        map[self.start] = 0;
        order.push(self.start);
        queue.push_back(self.start);
        while let Some(s) = queue.pop_front() {
            for arc in &self.states[s].arcs {
                if map[arc.target] == usize::MAX {
                    map[arc.target] = order.len();
                    order.push(arc.target);
                    queue.push_back(arc.target);
                }
            }
        }
        let mut old_states = std::mem::take(&mut self.states);
        self.states = order
            .iter()
            .map(|&old| {
                let mut s = std::mem::take(&mut old_states[old]);
                for a in &mut s.arcs {
                    a.target = map[a.target];
                }
                s
            })
            .collect();
        self.start = 0;
        self
    }

    /// Append the states of `other`, returning the offset of its state ids.
    /// The alphabet is merged; no arcs link the two parts.
    pub(crate) fn append_states(&mut self, other: &Transducer) -> StateId {
        let offset = self.states.len();
        for s in &other.states {
            let mut s = s.clone();
            for a in &mut s.arcs {
                a.target += offset;
            }
            self.states.push(s);
        }
        self.alphabet.extend(other.alphabet.iter().cloned());
        offset
    }

    /// Collapse parallel arcs with the same label and target, keeping the
    /// lowest weight.
    pub(crate) fn dedup_arcs(&mut self) {
        for s in &mut self.states {
            s.arcs.sort_by(|a, b| {
                (&a.input, &a.output, a.target)
                    .cmp(&(&b.input, &b.output, b.target))
                    .then(a.weight.total_cmp(&b.weight))
            });
            s.arcs
                .dedup_by(|b, a| a.input == b.input && a.output == b.output && a.target == b.target);
        }
    }

    /// Reverse adjacency: for each state, the states with an arc into it.
    pub(crate) fn predecessors(&self) -> Vec<Vec<StateId>> {
        let mut reverse: Vec<Vec<StateId>> = vec![Vec::new(); self.states.len()];
        for (src, arc) in self.arcs() {
            reverse[arc.target].push(src);
        }
        reverse
    }

    /// Structural equality after both sides were canonicalized.
    pub(crate) fn same_structure(&self, other: &Transducer) -> bool {
        if self.states.len() != other.states.len() {
            return false;
        }
        self.states.iter().zip(&other.states).all(|(a, b)| {
            let finals_match = match (a.final_weight, b.final_weight) {
                (None, None) => true,
                (Some(x), Some(y)) => weights_close(x, y),
                _ => false,
            };
            finals_match
                && a.arcs.len() == b.arcs.len()
                && a.arcs.iter().zip(&b.arcs).all(|(x, y)| {
                    x.input == y.input
                        && x.output == y.output
                        && x.target == y.target
                        && weights_close(x.weight, y.weight)
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_epsilon() {
        let e = Transducer::empty();
        assert_eq!(e.state_count(), 1);
        assert!(e.is_empty_language());
        let eps = Transducer::epsilon();
        assert!(!eps.is_empty_language());
        assert_eq!(eps.arc_count(), 0);
    }

    #[test]
    fn from_symbols_builds_single_path() {
        let t = Transducer::from_symbols(["c", "a", "t"]);
        assert_eq!(t.state_count(), 4);
        assert_eq!(t.arc_count(), 3);
        assert!(t.is_final(3));
        assert!(t.is_automaton());
        assert_eq!(t.alphabet().len(), 3);
    }

    #[test]
    fn from_string_uses_multichar_symbols() {
        let tok = Tokenizer::with_symbols(["+Pl"]);
        let t = Transducer::from_string("ab+Pl", &tok);
        assert_eq!(t.arc_count(), 3);
        assert!(t.alphabet().contains("+Pl"));
    }

    #[test]
    fn special_symbols_stay_out_of_alphabet() {
        let t = Transducer::from_pair(EPSILON, IDENTITY);
        assert!(t.alphabet().is_empty());
        assert_eq!(t.uses_wildcards(), (false, true));
    }

    #[test]
    fn trim_removes_dead_states() {
        let mut t = Transducer::from_symbols(["a"]);
        let dead = t.add_state();
        t.add_arc(0, Arc::new("b", "b", 0.0, dead));
        assert_eq!(t.state_count(), 3);
        t.trim();
        assert_eq!(t.state_count(), 2);
        assert_eq!(t.arc_count(), 1);
    }

    #[test]
    fn canonicalize_numbers_breadth_first() {
        let mut t = Transducer::empty();
        let far = t.add_state();
        let near = t.add_state();
        t.add_arc(0, Arc::new("b", "b", 0.0, far));
        t.add_arc(0, Arc::new("a", "a", 0.0, near));
        t.set_final(far, 0.0);
        t.set_final(near, 0.0);
        t.canonicalize();
        assert_eq!(t.state(0).arcs[0].input, "a");
        assert_eq!(t.state(0).arcs[0].target, 1);
        assert_eq!(t.state(0).arcs[1].target, 2);
    }

    #[test]
    fn flag_diacritics_are_reported() {
        let t = Transducer::from_symbols(["@P.F.a@", "x"]);
        assert!(t.has_flag_diacritics());
        assert_eq!(t.flag_diacritics().len(), 1);
    }

    #[test]
    fn dedup_keeps_lowest_weight() {
        let mut t = Transducer::from_symbols(["a"]);
        t.add_arc(0, Arc::new("a", "a", -1.0, 1));
        t.dedup_arcs();
        assert_eq!(t.arc_count(), 1);
        assert_eq!(t.state(0).arcs[0].weight, -1.0);
    }
}
