// Lookup-optimized transducers: a packed, sorted transition table traversed
// with an explicit stack.

use std::collections::BTreeSet;

use tracing::debug;

use crate::config::TraversalConfig;
use crate::flags::{self, FlagCheckResult};
use crate::paths::{LookupOptions, Path};
use crate::symbols::{EPSILON, SymbolTable};
use crate::transducer::{Arc, Transducer};
use crate::transition::{COMPACT_FINAL_SYM, CompactTransition, StateRange};
use crate::{FstError, MAX_LOOP_COUNT};

/// Read-only transducer laid out for fast lookup.
///
/// Each state owns a contiguous run of transitions. A final state's run
/// starts with a sentinel carrying the final weight; the remaining
/// transitions are sorted by input symbol index, so epsilons and flags come
/// before anything that consumes input and a binary search finds the
/// matching input symbol.
#[derive(Clone)]
pub struct CompactTransducer {
    transitions: Vec<CompactTransition>,
    states: Vec<StateRange>,
    symbols: SymbolTable,
    alphabet: BTreeSet<String>,
    name: Option<String>,
    infinitely_ambiguous: bool,
}

impl std::fmt::Debug for CompactTransducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompactTransducer")
            .field("name", &self.name)
            .field("state_count", &self.states.len())
            .field("transition_count", &self.transitions.len())
            .field("symbol_count", &self.symbols.len())
            .field("first_normal", &self.symbols.first_normal)
            .finish()
    }
}

impl CompactTransducer {
    /// Convert an ordinary transducer. The start state becomes state 0.
    pub fn from_transducer(t: &Transducer) -> Result<Self, FstError> {
        let mut t = t.clone();
        t.trim();
        let infinitely_ambiguous = t.is_infinitely_ambiguous();
        let mut used: BTreeSet<&str> = t.alphabet.iter().map(String::as_str).collect();
        for (_, arc) in t.arcs() {
            used.insert(&arc.input);
            used.insert(&arc.output);
        }
        let symbols = SymbolTable::build(used.iter().copied())?;

        let mut transitions = Vec::with_capacity(t.arc_count() + t.state_count());
        let mut states = Vec::with_capacity(t.state_count());
        for state in &t.states {
            let first = transitions.len() as u32;
            if let Some(w) = state.final_weight {
                transitions.push(CompactTransition {
                    sym_in: COMPACT_FINAL_SYM,
                    sym_out: 0,
                    target: 0,
                    weight: w,
                });
            }
            let mut run: Vec<CompactTransition> = Vec::with_capacity(state.arcs.len());
            for arc in &state.arcs {
                let index = |s: &str| {
                    symbols
                        .index_of(s)
                        .ok_or_else(|| FstError::UnknownSymbol(s.to_string()))
                };
                run.push(CompactTransition {
                    sym_in: index(&arc.input)?,
                    sym_out: index(&arc.output)?,
                    target: arc.target as u32,
                    weight: arc.weight,
                });
            }
            run.sort_by_key(|tr| (tr.sym_in, tr.sym_out, tr.target));
            transitions.extend(run);
            states.push(StateRange {
                first,
                count: transitions.len() as u32 - first,
            });
        }
        debug!(
            states = states.len(),
            transitions = transitions.len(),
            "converted to lookup format"
        );
        Ok(Self {
            transitions,
            states,
            symbols,
            alphabet: t.alphabet.clone(),
            name: t.name.clone(),
            infinitely_ambiguous,
        })
    }

    /// Rebuild the ordinary form.
    pub fn to_transducer(&self) -> Transducer {
        let mut t = Transducer::empty();
        for _ in 1..self.states.len() {
            t.add_state();
        }
        for (q, range) in self.states.iter().enumerate() {
            for tr in &self.transitions[range.first as usize..range.end() as usize] {
                if tr.is_final() {
                    t.set_final(q, tr.weight);
                } else {
                    t.add_arc(
                        q,
                        Arc::new(
                            self.symbols.symbol(tr.sym_in),
                            self.symbols.symbol(tr.sym_out),
                            tr.weight,
                            tr.target as usize,
                        ),
                    );
                }
            }
        }
        t.alphabet.extend(self.alphabet.iter().cloned());
        t.name = self.name.clone();
        t
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn alphabet(&self) -> &BTreeSet<String> {
        &self.alphabet
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn transition_count(&self) -> usize {
        self.transitions
            .iter()
            .filter(|t| !t.is_final())
            .count()
    }

    pub fn is_infinitely_ambiguous(&self) -> bool {
        self.infinitely_ambiguous
    }

    pub fn flag_feature_count(&self) -> u16 {
        self.symbols.flag_feature_count
    }

    /// Configuration sized for this transducer. `cycles` is how often a path
    /// may revisit a state at one input position.
    pub fn new_config(&self, buffer_size: usize, cycles: Option<usize>) -> TraversalConfig {
        let mut config = TraversalConfig::new(self.symbols.flag_feature_count, buffer_size.max(4));
        config.visit_limit = cycles.map_or(1, |c| c as u32 + 1);
        config
    }

    /// Prepare `config` for `input`. Returns `false` if a token is not a
    /// symbol of the transducer; no traversal is possible then.
    pub fn prepare(&self, config: &mut TraversalConfig, input: &[String]) -> bool {
        config.reset();
        for token in input {
            match self.symbols.index_of(token) {
                Some(idx) if idx >= self.symbols.first_normal => config.input_symbols.push(idx),
                _ => return false,
            }
        }
        config.input_length = config.input_symbols.len();
        config.state_stack[0] = 0;
        config.transition_stack[0] = self.states.first().map_or(0, |s| s.first);
        config.enter(0);
        true
    }

    /// Yield the next accepted path for the prepared input.
    ///
    /// Returns `false` when the search is exhausted or the loop limit was
    /// reached. The stack buffers grow as deep paths need them.
    pub fn next(&self, config: &mut TraversalConfig, path: &mut Path) -> bool {
        let first_normal = self.symbols.first_normal;
        let mut loop_counter: u32 = 0;

        'outer: while loop_counter < MAX_LOOP_COUNT {
            let depth = config.stack_depth;
            if depth + 2 >= config.buffer_size {
                config.grow();
            }
            let state = config.state_stack[depth];
            let end = self.states[state as usize].end();
            let input_sym = config.input_symbols.get(config.input_depth).copied();
            let mut idx = config.transition_stack[depth];

            while idx < end {
                let ct = self.transitions[idx as usize];
                idx += 1;

                if ct.is_final() {
                    if config.input_depth == config.input_length {
                        config.transition_stack[depth] = idx;
                        self.build_path(config, ct.weight, path);
                        return true;
                    }
                    continue;
                }

                let consumes = ct.sym_in >= first_normal;
                let matched = if consumes {
                    match input_sym {
                        Some(sym) if sym == ct.sym_in => true,
                        Some(sym) if ct.sym_in < sym => {
                            // Skip ahead to the first transition reading `sym`.
                            let rest = &self.transitions[idx as usize..end as usize];
                            idx += rest.partition_point(|t| t.sym_in < sym) as u32;
                            continue;
                        }
                        _ => break,
                    }
                } else if config.obey_flags {
                    self.flag_check(config, ct.sym_in)
                } else {
                    true
                };
                if !matched {
                    continue;
                }

                let next_input_depth = config.input_depth + usize::from(consumes);
                let saved_input_depth = config.input_depth;
                config.input_depth = next_input_depth;
                if !config.enter(ct.target) {
                    config.input_depth = saved_input_depth;
                    if self.pushes_flags(config, ct.sym_in) {
                        config.flag_depth -= 1;
                    }
                    continue;
                }
                config.transition_stack[depth] = idx;
                config.taken_stack[depth] = idx - 1;
                config.weight_stack[depth + 1] = config.weight_stack[depth] + ct.weight;
                config.stack_depth += 1;
                config.state_stack[depth + 1] = ct.target;
                config.transition_stack[depth + 1] = self.states[ct.target as usize].first;
                loop_counter += 1;
                continue 'outer;
            }

            // All transitions of this state are exhausted.
            if depth == 0 {
                return false;
            }
            config.leave(state, config.input_depth);
            config.stack_depth -= 1;
            let taken = self.transitions[config.taken_stack[config.stack_depth] as usize];
            if taken.sym_in >= first_normal {
                config.input_depth -= 1;
            } else if self.pushes_flags(config, taken.sym_in) {
                config.flag_depth -= 1;
            }
            loop_counter += 1;
        }
        false
    }

    fn build_path(&self, config: &TraversalConfig, final_weight: f32, path: &mut Path) {
        path.pairs.clear();
        let mut input_pos = 0;
        for &t in &config.taken_stack[..config.stack_depth] {
            let tr = &self.transitions[t as usize];
            let input = self.symbols.symbol(tr.sym_in);
            let output = self.symbols.symbol(tr.sym_out);
            if tr.sym_in >= self.symbols.first_normal {
                input_pos += 1;
            }
            if input == EPSILON && output == EPSILON {
                continue;
            }
            path.pairs.push((input.to_string(), output.to_string()));
        }
        debug_assert_eq!(input_pos, config.input_length);
        path.weight = config.weight_stack[config.stack_depth] + final_weight;
    }

    /// Whether taking `symbol` stepped `flag_depth` up.
    fn pushes_flags(&self, config: &TraversalConfig, symbol: u32) -> bool {
        config.obey_flags && self.symbols.is_flag_index(symbol)
    }

    /// Flag check with copy-on-push. Plain epsilons always pass.
    fn flag_check(&self, config: &mut TraversalConfig, symbol: u32) -> bool {
        if !self.symbols.is_flag_index(symbol) {
            return true;
        }
        let ofv = self.symbols.symbol_to_diacritic[symbol as usize];
        let current = config.current_flags()[ofv.feature as usize];
        match flags::check_flag(&ofv, current) {
            FlagCheckResult::Reject => false,
            FlagCheckResult::AcceptAndUpdate { feature, slot } => {
                config.push_flags();
                config.current_flags_mut()[feature as usize] = slot;
                true
            }
            FlagCheckResult::AcceptNoUpdate { .. } => {
                config.push_flags();
                true
            }
        }
    }

    /// Every path for `input`, sorted by weight. Unknown tokens give no
    /// results.
    pub fn lookup(&self, input: &[String], opts: &LookupOptions) -> Vec<Path> {
        let mut config = self.new_config(input.len() * 4 + 64, opts.cycles);
        config.obey_flags = opts.obey_flags;
        if !self.prepare(&mut config, input) {
            return Vec::new();
        }
        let mut results = Vec::new();
        let mut path = Path {
            pairs: Vec::new(),
            weight: 0.0,
        };
        while self.next(&mut config, &mut path) {
            if opts.max_weight.is_none_or(|m| path.weight <= m) {
                results.push(path.clone());
            }
        }
        results.sort_by(|a, b| a.weight.total_cmp(&b.weight).then(a.pairs.cmp(&b.pairs)));
        results.dedup_by(|b, a| a.pairs == b.pairs);
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn tokens(s: &str) -> Vec<String> {
        s.chars().map(|c| c.to_string()).collect()
    }

    fn outputs(paths: &[Path]) -> Vec<String> {
        paths.iter().map(|p| p.output().collect::<String>()).collect()
    }

    fn obeyed() -> LookupOptions {
        LookupOptions {
            obey_flags: true,
            ..LookupOptions::default()
        }
    }

    fn weighted_ab() -> Transducer {
        let mut t = Transducer::empty();
        let s1 = t.add_state();
        let s2 = t.add_state();
        t.add_arc(0, Arc::new("a", "x", 1.0, s1));
        t.add_arc(s1, Arc::new("b", "y", 2.0, s2));
        t.set_final(s2, 0.5);
        t
    }

    // --- conversion ---

    #[test]
    fn final_sentinel_comes_first() {
        let mut t = Transducer::from_symbols(["a"]);
        t.set_final(0, 0.0);
        let c = CompactTransducer::from_transducer(&t).unwrap();
        assert!(c.transitions[0].is_final());
        assert_eq!(c.transition_count(), 1);
    }

    #[test]
    fn round_trip_preserves_language() {
        let mut t = Transducer::from_pairs([("c", "d"), ("a", "o"), ("t", "g")]);
        t.union(&Transducer::from_symbols(["c", "a", "t"]));
        let back = CompactTransducer::from_transducer(&t).unwrap().to_transducer();
        assert!(back.equivalent(&t).unwrap());
    }

    #[test]
    fn transitions_sorted_by_input() {
        let mut t = Transducer::from_symbols(["z"]);
        t.union(&Transducer::from_symbols(["a"]));
        t.union(&Transducer::from_symbols(["@P.F.v@"]));
        t.minimize(&EngineConfig::default()).unwrap();
        let c = CompactTransducer::from_transducer(&t).unwrap();
        let range = c.states[0];
        let ins: Vec<u32> = c.transitions[range.first as usize..range.end() as usize]
            .iter()
            .map(|t| t.sym_in)
            .collect();
        let mut sorted = ins.clone();
        sorted.sort();
        assert_eq!(ins, sorted);
        assert_eq!(c.symbols().symbol(ins[0]), "@P.F.v@");
    }

    // --- traversal ---

    #[test]
    fn traverse_weighted() {
        let c = CompactTransducer::from_transducer(&weighted_ab()).unwrap();
        let mut config = c.new_config(100, None);
        assert!(c.prepare(&mut config, &tokens("ab")));
        let mut path = Path {
            pairs: Vec::new(),
            weight: 0.0,
        };
        assert!(c.next(&mut config, &mut path));
        assert_eq!(path.output().collect::<String>(), "xy");
        assert!((path.weight - 3.5).abs() < 1e-4);
        assert!(!c.next(&mut config, &mut path));
    }

    #[test]
    fn unknown_token_fails_prepare() {
        let c = CompactTransducer::from_transducer(&weighted_ab()).unwrap();
        let mut config = c.new_config(100, None);
        assert!(!c.prepare(&mut config, &tokens("az")));
        assert!(c.lookup(&tokens("az"), &LookupOptions::default()).is_empty());
    }

    #[test]
    fn multiple_outputs_sorted_by_weight() {
        let mut t = Transducer::from_pairs([("a", "y")]);
        t.set_final(1, 2.0);
        let mut u = Transducer::from_pairs([("a", "x")]);
        u.set_final(1, 1.0);
        t.union(&u);
        let c = CompactTransducer::from_transducer(&t).unwrap();
        assert_eq!(outputs(&c.lookup(&tokens("a"), &LookupOptions::default())), vec!["x", "y"]);
        let capped = LookupOptions {
            max_weight: Some(1.5),
            ..LookupOptions::default()
        };
        assert_eq!(outputs(&c.lookup(&tokens("a"), &capped)), vec!["x"]);
    }

    #[test]
    fn epsilon_arcs_are_followed() {
        let t = Transducer::from_pairs([(EPSILON, "p"), ("a", "b")]);
        let c = CompactTransducer::from_transducer(&t).unwrap();
        assert_eq!(outputs(&c.lookup(&tokens("a"), &LookupOptions::default())), vec!["pb"]);
    }

    #[test]
    fn flags_filter_paths() {
        let mut good = Transducer::from_symbols(["@P.F.a@", "x", "@R.F.a@"]);
        good.union(&Transducer::from_pairs([("@P.F.b@", "@P.F.b@"), ("x", "y"), ("@R.F.a@", "@R.F.a@")]));
        let c = CompactTransducer::from_transducer(&good).unwrap();
        assert_eq!(c.flag_feature_count(), 1);
        let paths = c.lookup(&tokens("x"), &obeyed());
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].output().filter(|s| !flags::is_flag_diacritic(s)).collect::<String>(), "x");
    }

    #[test]
    fn flags_pass_freely_when_not_obeyed() {
        let t = Transducer::from_pairs([("@P.F.a@", "@P.F.a@"), ("@D.F.a@", "@D.F.a@"), ("x", "x")]);
        let c = CompactTransducer::from_transducer(&t).unwrap();
        assert!(c.lookup(&tokens("x"), &obeyed()).is_empty());
        let free = c.lookup(&tokens("x"), &LookupOptions::default());
        assert_eq!(free.len(), 1);
        assert_eq!(free, t.lookup(&tokens("x"), &LookupOptions::default()));
    }

    #[test]
    fn long_epsilon_runs_grow_the_stack() {
        let mut pairs = vec![("a".to_string(), "x1".to_string())];
        pairs.extend((2..=80).map(|n| (EPSILON.to_string(), format!("x{n}"))));
        let t = Transducer::from_pairs(pairs.iter().map(|(i, o)| (i.as_str(), o.as_str())));
        let c = CompactTransducer::from_transducer(&t).unwrap();
        let fast = c.lookup(&tokens("a"), &LookupOptions::default());
        assert_eq!(fast.len(), 1);
        assert_eq!(fast[0].output().count(), 80);
        assert_eq!(fast, t.lookup(&tokens("a"), &LookupOptions::default()));
    }

    #[test]
    fn epsilon_cycle_is_bounded_and_flagged() {
        let mut t = Transducer::from_pairs([(EPSILON, "x")]);
        t.repeat_star();
        t.concatenate(&Transducer::from_symbols(["a"]));
        let c = CompactTransducer::from_transducer(&t).unwrap();
        assert!(c.is_infinitely_ambiguous());
        let once = c.lookup(&tokens("a"), &LookupOptions::default());
        let twice = c.lookup(&tokens("a"), &LookupOptions { cycles: Some(1), ..LookupOptions::default() });
        assert!(!once.is_empty());
        assert!(twice.len() > once.len());
    }

    #[test]
    fn empty_input_on_final_start() {
        let t = Transducer::epsilon();
        let c = CompactTransducer::from_transducer(&t).unwrap();
        assert_eq!(c.lookup(&[], &LookupOptions::default()).len(), 1);
    }
}
