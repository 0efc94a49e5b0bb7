// Rational operations that rewire states and arcs without product
// constructions: union, concatenation, closure, reversal, projection,
// substitution and alphabet maintenance.

use std::collections::{BTreeMap, BTreeSet};

use crate::flags::{self, FlagBindings, FlagState, is_flag_diacritic};
use crate::symbols::{EPSILON, IDENTITY, UNKNOWN};
use crate::transducer::{Arc, StateId, Transducer};
use crate::{FstError, MAX_EXPANDED_STATES};

impl Transducer {
    // =========================================================================
    // Harmonization
    // =========================================================================

    /// Expand unknown and identity arcs of both operands over the symbols
    /// only the other operand knows, and unify the alphabets.
    ///
    /// When `skip_flags` is set, flag diacritics are never matched by
    /// wildcards.
    pub fn harmonize(&mut self, other: &mut Transducer, skip_flags: bool) {
        let new_for_self: BTreeSet<String> = other
            .alphabet
            .difference(&self.alphabet)
            .filter(|s| !(skip_flags && is_flag_diacritic(s)))
            .cloned()
            .collect();
        let new_for_other: BTreeSet<String> = self
            .alphabet
            .difference(&other.alphabet)
            .filter(|s| !(skip_flags && is_flag_diacritic(s)))
            .cloned()
            .collect();
        self.expand_wildcards(&new_for_self);
        other.expand_wildcards(&new_for_other);
        let merged: BTreeSet<String> = self.alphabet.union(&other.alphabet).cloned().collect();
        self.alphabet = merged.clone();
        other.alphabet = merged;
    }

    /// Add explicit arcs for `new` symbols wherever a wildcard arc would have
    /// matched them.
    pub(crate) fn expand_wildcards(&mut self, new: &BTreeSet<String>) {
        if new.is_empty() {
            return;
        }
        for state in &mut self.states {
            let mut extra = Vec::new();
            for arc in &state.arcs {
                let (i, o) = (arc.input.as_str(), arc.output.as_str());
                let mut push = |a: &str, b: &str| {
                    extra.push(Arc::new(a, b, arc.weight, arc.target));
                };
                match (i == IDENTITY, i == UNKNOWN, o == UNKNOWN) {
                    (true, _, _) => {
                        for x in new {
                            push(x, x);
                        }
                    }
                    (false, true, true) => {
                        for x in new {
                            push(x, UNKNOWN);
                            push(UNKNOWN, x);
                            for y in new {
                                if x != y {
                                    push(x, y);
                                }
                            }
                        }
                    }
                    (false, true, false) => {
                        for x in new {
                            push(x, o);
                        }
                    }
                    (false, false, true) => {
                        for x in new {
                            push(i, x);
                        }
                    }
                    _ => {}
                }
            }
            state.arcs.extend(extra);
        }
        self.alphabet.extend(new.iter().cloned());
    }

    /// Harmonized copy of `other`, ready to be combined with `self`.
    pub(crate) fn harmonized_with(&mut self, other: &Transducer) -> Transducer {
        let mut other = other.clone();
        self.harmonize(&mut other, true);
        other
    }

    /// Insert each operand's flag diacritics freely into the other, so that
    /// flags survive composition.
    pub fn harmonize_flag_diacritics(&mut self, other: &mut Transducer) {
        let mine = self.flag_diacritics();
        let theirs = other.flag_diacritics();
        let for_self: Vec<String> = theirs.difference(&mine).cloned().collect();
        let for_other: Vec<String> = mine.difference(&theirs).cloned().collect();
        self.add_flag_loops(&for_self);
        other.add_flag_loops(&for_other);
    }

    fn add_flag_loops(&mut self, flags: &[String]) {
        for id in 0..self.states.len() {
            for f in flags {
                self.add_arc(id, Arc::new(f.as_str(), f.as_str(), 0.0, id));
            }
        }
    }

    // =========================================================================
    // Rational operations
    // =========================================================================

    pub fn union(&mut self, other: &Transducer) -> &mut Self {
        let other = self.harmonized_with(other);
        let offset = self.append_states(&other);
        let new_start = self.add_state();
        let old_start = self.start;
        self.states[new_start]
            .arcs
            .push(Arc::new(EPSILON, EPSILON, 0.0, old_start));
        self.states[new_start]
            .arcs
            .push(Arc::new(EPSILON, EPSILON, 0.0, other.start + offset));
        self.start = new_start;
        self
    }

    pub fn concatenate(&mut self, other: &Transducer) -> &mut Self {
        let other = self.harmonized_with(other);
        let finals: Vec<(StateId, f32)> = self.finals();
        let offset = self.append_states(&other);
        for (f, w) in finals {
            self.states[f].final_weight = None;
            self.states[f]
                .arcs
                .push(Arc::new(EPSILON, EPSILON, w, other.start + offset));
        }
        self
    }

    /// `A*`
    pub fn repeat_star(&mut self) -> &mut Self {
        self.repeat_plus();
        self.optionalize()
    }

    /// `A+`
    pub fn repeat_plus(&mut self) -> &mut Self {
        let start = self.start;
        for (f, w) in self.finals() {
            self.states[f]
                .arcs
                .push(Arc::new(EPSILON, EPSILON, w, start));
        }
        self
    }

    /// `A^n`
    pub fn repeat_n(&mut self, n: usize) -> &mut Self {
        let unit = self.clone();
        *self = Transducer::epsilon();
        self.alphabet = unit.alphabet.clone();
        for _ in 0..n {
            self.concatenate(&unit);
        }
        self
    }

    /// `A^{n,m}`
    pub fn repeat_n_to_k(&mut self, n: usize, k: usize) -> &mut Self {
        let mut optional = self.clone();
        optional.optionalize();
        self.repeat_n(n);
        for _ in n..k {
            self.concatenate(&optional);
        }
        self
    }

    /// `A^{n,}`
    pub fn repeat_n_plus(&mut self, n: usize) -> &mut Self {
        let mut star = self.clone();
        star.repeat_star();
        self.repeat_n(n);
        self.concatenate(&star)
    }

    /// `(A)`: adds the empty string.
    pub fn optionalize(&mut self) -> &mut Self {
        let new_start = self.add_state();
        let old_start = self.start;
        self.states[new_start].final_weight = Some(0.0);
        self.states[new_start]
            .arcs
            .push(Arc::new(EPSILON, EPSILON, 0.0, old_start));
        self.start = new_start;
        self
    }

    pub fn reverse(&mut self) -> &mut Self {
        let n = self.states.len();
        let mut states = vec![crate::transducer::State::default(); n + 1];
        for (src, s) in self.states.iter().enumerate() {
            for a in &s.arcs {
                states[a.target].arcs.push(Arc::new(
                    a.input.as_str(),
                    a.output.as_str(),
                    a.weight,
                    src,
                ));
            }
            if let Some(w) = s.final_weight {
                states[n].arcs.push(Arc::new(EPSILON, EPSILON, w, src));
            }
        }
        states[self.start].final_weight = Some(0.0);
        self.states = states;
        self.start = n;
        self
    }

    /// Swap input and output.
    pub fn invert(&mut self) -> &mut Self {
        for s in &mut self.states {
            for a in &mut s.arcs {
                std::mem::swap(&mut a.input, &mut a.output);
            }
        }
        self
    }

    /// Keep the input side (`upper side`).
    pub fn project_input(&mut self) -> &mut Self {
        self.project(true)
    }

    /// Keep the output side (`lower side`).
    pub fn project_output(&mut self) -> &mut Self {
        self.project(false)
    }

    fn project(&mut self, input: bool) -> &mut Self {
        for s in &mut self.states {
            for a in &mut s.arcs {
                let kept = if input { a.input.clone() } else { a.output.clone() };
                let kept = if kept == UNKNOWN { IDENTITY.to_string() } else { kept };
                a.input = kept.clone();
                a.output = kept;
            }
        }
        self.dedup_arcs();
        self
    }

    /// Complement with respect to the universal language over the alphabet.
    pub fn negate(&mut self) -> Result<&mut Self, FstError> {
        if !self.is_automaton() {
            return Err(FstError::NotAutomaton("negation"));
        }
        let mut universe = Transducer::universal(&self.alphabet);
        universe.subtract(self)?;
        universe.name = self.name.take();
        *self = universe;
        Ok(self)
    }

    /// `A / B`: `B` may be inserted anywhere in `A`.
    pub fn insert_freely(&mut self, other: &Transducer) -> &mut Self {
        let other = self.harmonized_with(other);
        for state in 0..self.states.len() {
            self.insert_transducer(state, state, &other);
        }
        self
    }

    /// Splice `other` between `from` and `to` with epsilon arcs.
    pub fn insert_transducer(&mut self, from: StateId, to: StateId, other: &Transducer) -> &mut Self {
        let offset = self.append_states(other);
        for id in offset..offset + other.states.len() {
            if let Some(w) = self.states[id].final_weight.take() {
                self.states[id]
                    .arcs
                    .push(Arc::new(EPSILON, EPSILON, w, to));
            }
        }
        self.states[from]
            .arcs
            .push(Arc::new(EPSILON, EPSILON, 0.0, other.start + offset));
        self
    }

    /// Add a non-final sink and route every missing label to it.
    pub fn complete(&mut self) -> &mut Self {
        let mut labels: BTreeSet<(String, String)> = self.labels();
        if self.is_automaton() {
            for s in &self.alphabet {
                labels.insert((s.clone(), s.clone()));
            }
            labels.insert((IDENTITY.to_string(), IDENTITY.to_string()));
        }
        labels.remove(&(EPSILON.to_string(), EPSILON.to_string()));
        let sink = self.add_state();
        for id in 0..self.states.len() {
            let present: BTreeSet<(String, String)> = self.states[id]
                .arcs
                .iter()
                .map(|a| (a.input.clone(), a.output.clone()))
                .collect();
            for (i, o) in &labels {
                if !present.contains(&(i.clone(), o.clone())) {
                    self.states[id]
                        .arcs
                        .push(Arc::new(i.as_str(), o.as_str(), 0.0, sink));
                }
            }
        }
        self
    }

    // =========================================================================
    // Substitution
    // =========================================================================

    /// Replace `old` by `new` on both sides of every arc.
    pub fn substitute_symbol(&mut self, old: &str, new: &str) -> &mut Self {
        for s in &mut self.states {
            for a in &mut s.arcs {
                if a.input == old {
                    a.input = new.to_string();
                }
                if a.output == old {
                    a.output = new.to_string();
                }
            }
        }
        self.alphabet.remove(old);
        self.add_symbol(new);
        self
    }

    /// Replace arcs labeled `old` with arcs labeled `new`.
    pub fn substitute_label(&mut self, old: (&str, &str), new: (&str, &str)) -> &mut Self {
        for s in &mut self.states {
            for a in &mut s.arcs {
                if a.label() == old {
                    a.input = new.0.to_string();
                    a.output = new.1.to_string();
                }
            }
        }
        self.add_symbol(new.0);
        self.add_symbol(new.1);
        self.dedup_arcs();
        self
    }

    /// Replace every arc labeled `label` by a copy of `replacement`.
    pub fn substitute_label_with_transducer(
        &mut self,
        label: (&str, &str),
        replacement: &Transducer,
    ) -> &mut Self {
        let replacement = self.harmonized_with(replacement);
        let mut spans = Vec::new();
        for (id, state) in self.states.iter_mut().enumerate() {
            state.arcs.retain(|a| {
                if a.label() == label {
                    spans.push((id, a.target, a.weight));
                    false
                } else {
                    true
                }
            });
        }
        for (from, to, weight) in spans {
            let offset = self.states.len();
            self.insert_transducer(from, to, &replacement);
            if let Some(entry) = self.states[from].arcs.last_mut() {
                debug_assert_eq!(entry.target, replacement.start + offset);
                entry.weight = weight;
            }
        }
        self
    }

    /// Drop alphabet symbols that no arc uses.
    pub fn prune_alphabet(&mut self) -> &mut Self {
        let mut used = BTreeSet::new();
        for (_, a) in self.arcs() {
            used.insert(a.input.clone());
            used.insert(a.output.clone());
        }
        self.alphabet.retain(|s| used.contains(s));
        self
    }

    /// Remove `symbol` from the alphabet and drop the arcs that use it.
    pub fn remove_symbol(&mut self, symbol: &str) -> &mut Self {
        for s in &mut self.states {
            s.arcs.retain(|a| a.input != symbol && a.output != symbol);
        }
        self.alphabet.remove(symbol);
        self
    }

    // =========================================================================
    // Flag diacritic rewriting
    // =========================================================================

    /// Split one-sided flag arcs (`@P.F.a@:x`) into a two-sided flag arc
    /// followed by an arc for the other symbol.
    pub fn twosided_flags(&mut self) -> &mut Self {
        let n = self.states.len();
        for id in 0..n {
            let arcs = std::mem::take(&mut self.states[id].arcs);
            let mut kept = Vec::with_capacity(arcs.len());
            for a in arcs {
                let in_flag = is_flag_diacritic(&a.input);
                let out_flag = is_flag_diacritic(&a.output);
                if (in_flag || out_flag) && a.input != a.output {
                    let (flag, input, output) = if in_flag {
                        (a.input.clone(), EPSILON.to_string(), a.output.clone())
                    } else {
                        (a.output.clone(), a.input.clone(), EPSILON.to_string())
                    };
                    let mid = self.add_state();
                    kept.push(Arc::new(flag.as_str(), flag.as_str(), a.weight, mid));
                    self.states[mid]
                        .arcs
                        .push(Arc::new(input, output, 0.0, a.target));
                } else {
                    kept.push(a);
                }
            }
            self.states[id].arcs = kept;
        }
        self
    }

    /// Compile away the flag diacritics of `feature` (or all features) by
    /// splitting states over the reachable flag configurations. Flag arcs
    /// that fail their check disappear; the rest become epsilons.
    pub fn eliminate_flags(&mut self, feature: Option<&str>) -> Result<&mut Self, FstError> {
        let tracked = |symbol: &str| match flags::flag_feature(symbol) {
            Some(f) => feature.is_none_or(|want| want == f),
            None => false,
        };

        let mut result = Transducer::empty();
        result.alphabet = self
            .alphabet
            .iter()
            .filter(|s| !tracked(s))
            .cloned()
            .collect();
        let mut ids: BTreeMap<(StateId, FlagBindings), StateId> = BTreeMap::new();
        let mut queue: Vec<(StateId, FlagState)> = Vec::new();
        let initial = FlagState::new();
        ids.insert((self.start, initial.bindings()), 0);
        queue.push((self.start, initial));

        while let Some((state, flag_state)) = queue.pop() {
            let id = ids[&(state, flag_state.bindings())];
            result.states[id].final_weight = self.states[state].final_weight;
            for arc in &self.states[state].arcs {
                let flag = [arc.input.as_str(), arc.output.as_str()]
                    .into_iter()
                    .find(|s| tracked(s));
                let (input, output, next_state) = match flag {
                    Some(f) => {
                        let mut next = flag_state.clone();
                        if !next.apply(f) {
                            continue;
                        }
                        let input = if tracked(&arc.input) { EPSILON } else { arc.input.as_str() };
                        let output = if tracked(&arc.output) { EPSILON } else { arc.output.as_str() };
                        (input, output, next)
                    }
                    None => (arc.input.as_str(), arc.output.as_str(), flag_state.clone()),
                };
                let key = (arc.target, next_state.bindings());
                let target = match ids.get(&key) {
                    Some(&t) => t,
                    None => {
                        if ids.len() >= MAX_EXPANDED_STATES {
                            return Err(FstError::StateLimit(MAX_EXPANDED_STATES));
                        }
                        let t = result.add_state();
                        ids.insert(key, t);
                        queue.push((arc.target, next_state));
                        t
                    }
                };
                result.states[id]
                    .arcs
                    .push(Arc::new(input, output, arc.weight, target));
            }
        }
        result.name = self.name.take();
        *self = result;
        self.trim();
        Ok(self)
    }

    pub(crate) fn finals(&self) -> Vec<(StateId, f32)> {
        self.states
            .iter()
            .enumerate()
            .filter_map(|(id, s)| s.final_weight.map(|w| (id, w)))
            .collect()
    }
}
