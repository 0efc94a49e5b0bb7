// Epsilon removal, weighted determinization over pair labels, weight
// pushing, minimization and equivalence.

use std::collections::BTreeMap;

use hashbrown::HashMap;
use tracing::debug;

use crate::config::EngineConfig;
use crate::symbols::EPSILON;
use crate::transducer::{Arc, State, StateId, Transducer, weight_key};
use crate::{FstError, MAX_EXPANDED_STATES};

/// A determinized state: member states with their residual weights, sorted
/// by state id.
type Subset = Vec<(StateId, f32)>;

fn subset_key(subset: &Subset) -> Vec<(StateId, i64)> {
    subset.iter().map(|&(q, r)| (q, weight_key(r))).collect()
}

impl Transducer {
    /// Remove `0:0` arcs, folding their weights into the arcs and final
    /// weights reachable through them.
    pub fn remove_epsilons(&mut self) -> &mut Self {
        let n = self.states.len();
        if !self.arcs().any(|(_, a)| a.is_epsilon()) {
            return self;
        }
        let mut states: Vec<State> = Vec::with_capacity(n);
        for q in 0..n {
            let closure = self.epsilon_closure(q);
            let mut state = State::default();
            for (&p, &d) in &closure {
                if let Some(f) = self.states[p].final_weight {
                    let w = d + f;
                    state.final_weight = Some(state.final_weight.map_or(w, |old: f32| old.min(w)));
                }
                for arc in self.states[p].arcs.iter().filter(|a| !a.is_epsilon()) {
                    state.arcs.push(Arc::new(
                        arc.input.as_str(),
                        arc.output.as_str(),
                        d + arc.weight,
                        arc.target,
                    ));
                }
            }
            states.push(state);
        }
        self.states = states;
        self.dedup_arcs();
        self.trim();
        self
    }

    /// Shortest epsilon distance from `q` to every state reachable through
    /// `0:0` arcs, including `q` itself.
    fn epsilon_closure(&self, q: StateId) -> BTreeMap<StateId, f32> {
        let mut dist = BTreeMap::new();
        dist.insert(q, 0.0f32);
        let mut stack = vec![q];
        let mut relaxations = 0usize;
        let bound = self.states.len().saturating_mul(self.states.len()).max(16);
        while let Some(p) = stack.pop() {
            let d = dist[&p];
            for arc in self.states[p].arcs.iter().filter(|a| a.is_epsilon()) {
                let candidate = d + arc.weight;
                let improved = match dist.get(&arc.target) {
                    Some(&old) => candidate < old - crate::transducer::WEIGHT_TOLERANCE,
                    None => true,
                };
                if improved && relaxations < bound {
                    relaxations += 1;
                    dist.insert(arc.target, candidate);
                    stack.push(arc.target);
                }
            }
        }
        dist
    }

    /// Weighted subset construction treating each `input:output` pair as one
    /// symbol. Epsilons are removed first.
    pub fn determinize(&mut self) -> Result<&mut Self, FstError> {
        self.remove_epsilons();
        let mut result = Transducer::empty();
        result.alphabet = self.alphabet.clone();
        result.name = self.name.take();

        let start: Subset = vec![(self.start, 0.0)];
        let mut ids: HashMap<Vec<(StateId, i64)>, StateId> = HashMap::new();
        ids.insert(subset_key(&start), 0);
        let mut queue = vec![start];

        while let Some(subset) = queue.pop() {
            let id = ids[&subset_key(&subset)];
            let mut final_weight: Option<f32> = None;
            for &(q, r) in &subset {
                if let Some(f) = self.states[q].final_weight {
                    let w = r + f;
                    final_weight = Some(final_weight.map_or(w, |old| old.min(w)));
                }
            }
            result.states[id].final_weight = final_weight;

            let mut by_label: BTreeMap<(&str, &str), Vec<(StateId, f32)>> = BTreeMap::new();
            for &(q, r) in &subset {
                for arc in &self.states[q].arcs {
                    by_label
                        .entry((arc.input.as_str(), arc.output.as_str()))
                        .or_default()
                        .push((arc.target, r + arc.weight));
                }
            }
            for ((input, output), reached) in by_label {
                let w_min = reached
                    .iter()
                    .map(|&(_, w)| w)
                    .fold(f32::INFINITY, f32::min);
                let mut residuals: BTreeMap<StateId, f32> = BTreeMap::new();
                for (t, w) in reached {
                    let r = w - w_min;
                    residuals
                        .entry(t)
                        .and_modify(|old| *old = old.min(r))
                        .or_insert(r);
                }
                let next: Subset = residuals.into_iter().collect();
                let key = subset_key(&next);
                let target = match ids.get(&key) {
                    Some(&t) => t,
                    None => {
                        if ids.len() >= MAX_EXPANDED_STATES {
                            return Err(FstError::StateLimit(MAX_EXPANDED_STATES));
                        }
                        let t = result.add_state();
                        ids.insert(key, t);
                        queue.push(next);
                        t
                    }
                };
                result.states[id]
                    .arcs
                    .push(Arc::new(input, output, w_min, target));
            }
        }
        *self = result;
        Ok(self)
    }

    /// Shortest distance from each state to acceptance, `None` for states
    /// that cannot reach a final state.
    pub(crate) fn distances_to_final(&self) -> Vec<Option<f32>> {
        let n = self.states.len();
        let mut dist: Vec<Option<f32>> = self.states.iter().map(|s| s.final_weight).collect();
        // Bellman-Ford; the bound keeps negative cycles from looping forever.
        for _ in 0..n {
            let mut changed = false;
            for (q, state) in self.states.iter().enumerate() {
                for arc in &state.arcs {
                    if let Some(dt) = dist[arc.target] {
                        let candidate = arc.weight + dt;
                        let better = match dist[q] {
                            Some(old) => candidate < old - crate::transducer::WEIGHT_TOLERANCE,
                            None => true,
                        };
                        if better {
                            dist[q] = Some(candidate);
                            changed = true;
                        }
                    }
                }
            }
            if !changed {
                break;
            }
        }
        dist
    }

    /// Move weights toward the start state so that every state's cheapest
    /// continuation costs zero.
    pub fn push_weights(&mut self) -> &mut Self {
        self.trim();
        let dist = self.distances_to_final();
        let Some(total) = dist[self.start] else {
            return self;
        };
        for q in 0..self.states.len() {
            let Some(dq) = dist[q] else { continue };
            if let Some(f) = self.states[q].final_weight.as_mut() {
                *f -= dq;
            }
            for arc in &mut self.states[q].arcs {
                if let Some(dt) = dist[arc.target] {
                    arc.weight += dt - dq;
                }
            }
        }
        if total.abs() <= crate::transducer::WEIGHT_TOLERANCE {
            return self;
        }
        let start_has_incoming = self.arcs().any(|(_, a)| a.target == self.start);
        if start_has_incoming {
            let copy = self.states[self.start].clone();
            self.states.push(copy);
            self.start = self.states.len() - 1;
        }
        let start = self.start;
        if let Some(f) = self.states[start].final_weight.as_mut() {
            *f += total;
        }
        for arc in &mut self.states[start].arcs {
            arc.weight += total;
        }
        self
    }

    /// Minimal deterministic equivalent, canonically numbered.
    pub fn minimize(&mut self, cfg: &EngineConfig) -> Result<&mut Self, FstError> {
        let before = self.states.len();
        self.determinize()?;
        if !cfg.encode_weights {
            self.push_weights();
        }
        if cfg.hopcroft_min {
            self.refine_partitions();
        } else {
            self.reverse();
            self.determinize()?;
            self.reverse();
            self.determinize()?;
        }
        self.trim();
        self.canonicalize();
        debug!(before, after = self.states.len(), "minimized");
        Ok(self)
    }

    /// Merge equivalent states of a deterministic machine by iterated
    /// partition refinement.
    fn refine_partitions(&mut self) {
        let n = self.states.len();
        let final_class = |s: &State| s.final_weight.map(weight_key);
        let mut block: Vec<usize> = {
            let mut classes: HashMap<Option<i64>, usize> = HashMap::new();
            self.states
                .iter()
                .map(|s| {
                    let next = classes.len();
                    *classes.entry(final_class(s)).or_insert(next)
                })
                .collect()
        };
        let mut count = block.iter().copied().max().map_or(0, |m| m + 1);
        loop {
            type Signature<'a> = (usize, Vec<(&'a str, &'a str, i64, usize)>);
            let mut classes: HashMap<Signature<'_>, usize> = HashMap::new();
            let mut next_block = vec![0usize; n];
            for (q, state) in self.states.iter().enumerate() {
                let mut arcs: Vec<(&str, &str, i64, usize)> = state
                    .arcs
                    .iter()
                    .map(|a| (a.input.as_str(), a.output.as_str(), weight_key(a.weight), block[a.target]))
                    .collect();
                arcs.sort_unstable();
                let next = classes.len();
                next_block[q] = *classes.entry((block[q], arcs)).or_insert(next);
            }
            let new_count = classes.len();
            block = next_block;
            if new_count == count {
                break;
            }
            count = new_count;
        }

        let mut states = vec![State::default(); count];
        let mut built = vec![false; count];
        for (q, state) in self.states.iter().enumerate() {
            let b = block[q];
            if built[b] {
                continue;
            }
            built[b] = true;
            states[b].final_weight = state.final_weight;
            states[b].arcs = state
                .arcs
                .iter()
                .map(|a| Arc::new(a.input.as_str(), a.output.as_str(), a.weight, block[a.target]))
                .collect();
        }
        self.start = block[self.start];
        self.states = states;
    }

    /// Same language with the same weights, up to [`WEIGHT_TOLERANCE`].
    ///
    /// [`WEIGHT_TOLERANCE`]: crate::transducer::WEIGHT_TOLERANCE
    pub fn equivalent(&self, other: &Transducer) -> Result<bool, FstError> {
        let cfg = EngineConfig::default();
        let mut a = self.clone();
        let mut b = other.clone();
        a.harmonize(&mut b, true);
        a.minimize(&cfg)?;
        b.minimize(&cfg)?;
        Ok(a.same_structure(&b))
    }

    /// Whether no state has two arcs with the same label or an epsilon arc.
    pub fn is_deterministic(&self) -> bool {
        self.states.iter().all(|s| {
            let mut labels: Vec<(&str, &str)> = s.arcs.iter().map(|a| a.label()).collect();
            let before = labels.len();
            labels.sort_unstable();
            labels.dedup();
            labels.len() == before && !labels.contains(&(EPSILON, EPSILON))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::IDENTITY;

    fn cfg() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn remove_epsilons_keeps_language() {
        let mut t = Transducer::from_symbols(["a"]);
        t.union(&Transducer::from_symbols(["b"]));
        let reference = t.clone();
        t.remove_epsilons();
        assert!(!t.arcs().any(|(_, a)| a.is_epsilon()));
        assert!(t.equivalent(&reference).unwrap());
    }

    #[test]
    fn epsilon_weights_are_folded() {
        let mut t = Transducer::empty();
        let mid = t.add_state();
        let end = t.add_state();
        t.add_arc(0, Arc::new(EPSILON, EPSILON, 1.5, mid));
        t.add_arc(mid, Arc::new("a", "a", 2.0, end));
        t.set_final(end, 0.5);
        t.remove_epsilons();
        let arc = &t.state(t.start()).arcs[0];
        assert_eq!(arc.input, "a");
        assert!((arc.weight - 3.5).abs() < 1e-4);
    }

    #[test]
    fn determinize_merges_prefixes() {
        let mut t = Transducer::from_symbols(["a", "b"]);
        t.union(&Transducer::from_symbols(["a", "c"]));
        t.determinize().unwrap();
        assert!(t.is_deterministic());
        assert_eq!(t.state(t.start()).arcs.len(), 1);
    }

    #[test]
    fn minimize_shares_suffixes() {
        let mut t = Transducer::from_symbols(["a", "x"]);
        t.union(&Transducer::from_symbols(["b", "x"]));
        t.minimize(&cfg()).unwrap();
        assert_eq!(t.state_count(), 3);
        assert_eq!(t.arc_count(), 3);
    }

    #[test]
    fn brzozowski_agrees_with_refinement() {
        let mut a = Transducer::from_symbols(["a", "b"]);
        a.union(&Transducer::from_symbols(["c", "b"]));
        a.repeat_star();
        let mut b = a.clone();
        a.minimize(&cfg()).unwrap();
        let brz = EngineConfig {
            hopcroft_min: false,
            ..EngineConfig::default()
        };
        b.minimize(&brz).unwrap();
        assert_eq!(a.state_count(), b.state_count());
        assert!(a.same_structure(&b));
    }

    #[test]
    fn push_weights_moves_weight_to_start() {
        let mut t = Transducer::empty();
        let end = t.add_state();
        t.add_arc(0, Arc::new("a", "a", 0.0, end));
        t.set_final(end, 2.0);
        t.push_weights();
        assert!((t.state(t.start()).arcs[0].weight - 2.0).abs() < 1e-4);
        let end = t.state(t.start()).arcs[0].target;
        assert_eq!(t.state(end).final_weight, Some(0.0));
    }

    #[test]
    fn equivalence_respects_weights() {
        let mut light = Transducer::from_symbols(["a"]);
        light.set_final(1, 1.0);
        let mut heavy = Transducer::from_symbols(["a"]);
        heavy.set_final(1, 2.0);
        assert!(!light.equivalent(&heavy).unwrap());
        assert!(light.equivalent(&light.clone()).unwrap());
    }

    #[test]
    fn equivalence_after_harmonization() {
        let any = Transducer::from_symbol(IDENTITY);
        let mut explicit = Transducer::from_symbol(IDENTITY);
        explicit.union(&Transducer::from_symbol("a"));
        // `a` is covered by identity once both sides know about it.
        assert!(any.equivalent(&explicit).unwrap());
    }

    #[test]
    fn minimize_empty_language() {
        let mut t = Transducer::empty();
        t.minimize(&cfg()).unwrap();
        assert_eq!(t.state_count(), 1);
        assert!(t.is_empty_language());
    }
}
