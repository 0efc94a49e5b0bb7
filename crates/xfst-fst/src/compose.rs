// Product constructions: composition, intersection, subtraction, shuffle
// and cross product.

use std::collections::VecDeque;

use hashbrown::HashMap;

use crate::config::EngineConfig;
use crate::flags::is_flag_diacritic;
use crate::symbols::{EPSILON, IDENTITY, UNKNOWN, is_wildcard};
use crate::transducer::{Arc, StateId, Transducer};
use crate::FstError;

/// Pair-state worklist shared by the product constructions.
struct Product<K> {
    result: Transducer,
    ids: HashMap<K, StateId>,
    queue: VecDeque<K>,
}

impl<K: Copy + Eq + std::hash::Hash> Product<K> {
    fn new(start: K) -> Self {
        let mut ids = HashMap::new();
        ids.insert(start, 0);
        Self {
            result: Transducer::empty(),
            ids,
            queue: VecDeque::from([start]),
        }
    }

    fn state(&mut self, key: K) -> StateId {
        if let Some(&id) = self.ids.get(&key) {
            return id;
        }
        let id = self.result.add_state();
        self.ids.insert(key, id);
        self.queue.push_back(key);
        id
    }

    fn arc(&mut self, from: StateId, input: &str, output: &str, weight: f32, to: K) {
        let target = self.state(to);
        self.result
            .add_arc(from, Arc::new(input, output, weight, target));
    }

    fn finish(mut self, a: &Transducer, b: &Transducer) -> Transducer {
        self.result.alphabet = a.alphabet.union(&b.alphabet).cloned().collect();
        self.result.trim();
        self.result
    }
}

/// Middle-tape match of `a.output` against `b.input`, returning the labels
/// of the composed arcs.
fn compose_labels(a: &Arc, b: &Arc) -> Vec<(String, String)> {
    let (mid_a, mid_b) = (a.output.as_str(), b.input.as_str());
    let matched = mid_a == mid_b || (is_wildcard(mid_a) && is_wildcard(mid_b));
    if !matched {
        return Vec::new();
    }
    let input = if a.input == IDENTITY {
        if b.output == IDENTITY { IDENTITY } else { UNKNOWN }
    } else {
        a.input.as_str()
    };
    let output = if b.output == IDENTITY {
        if a.input == IDENTITY { IDENTITY } else { UNKNOWN }
    } else {
        b.output.as_str()
    };
    let mut labels = vec![(input.to_string(), output.to_string())];
    if a.input == UNKNOWN && a.output == UNKNOWN && b.input == UNKNOWN && b.output == UNKNOWN {
        labels.push((IDENTITY.to_string(), IDENTITY.to_string()));
    }
    labels
}

fn check_flag_identities(t: &Transducer) -> Result<(), FstError> {
    for (_, arc) in t.arcs() {
        let flagged = is_flag_diacritic(&arc.input) || is_flag_diacritic(&arc.output);
        if flagged && arc.input != arc.output {
            return Err(FstError::FlagsNotIdentities);
        }
    }
    Ok(())
}

impl Transducer {
    /// `A .o. B`: the output side of `self` feeds the input side of `other`.
    pub fn compose(&mut self, other: &Transducer, cfg: &EngineConfig) -> Result<&mut Self, FstError> {
        let mut b = other.clone();
        if cfg.harmonize_flags {
            self.harmonize_flag_diacritics(&mut b);
        }
        self.harmonize(&mut b, cfg.xerox_composition);
        if cfg.flag_is_epsilon {
            check_flag_identities(self)?;
            check_flag_identities(&b)?;
        }
        let a = &*self;
        let free_flag = |arc: &Arc| cfg.flag_is_epsilon && is_flag_diacritic(&arc.input);

        // Filter 0: neutral, 1: left side moved alone, 2: right side moved alone.
        let mut product = Product::new((a.start, b.start, 0u8));
        while let Some(key @ (qa, qb, filter)) = product.queue.pop_front() {
            let id = product.ids[&key];
            if let (Some(wa), Some(wb)) = (a.states[qa].final_weight, b.states[qb].final_weight) {
                product.result.set_final(id, wa + wb);
            }
            for arc_a in &a.states[qa].arcs {
                if free_flag(arc_a) {
                    product.arc(id, &arc_a.input, &arc_a.output, arc_a.weight, (arc_a.target, qb, filter));
                    continue;
                }
                if arc_a.output == EPSILON {
                    if filter != 2 {
                        product.arc(id, &arc_a.input, EPSILON, arc_a.weight, (arc_a.target, qb, 1));
                    }
                    continue;
                }
                for arc_b in &b.states[qb].arcs {
                    if arc_b.input == EPSILON || free_flag(arc_b) {
                        continue;
                    }
                    for (i, o) in compose_labels(arc_a, arc_b) {
                        product.arc(id, &i, &o, arc_a.weight + arc_b.weight, (arc_a.target, arc_b.target, 0));
                    }
                }
            }
            for arc_b in &b.states[qb].arcs {
                if free_flag(arc_b) {
                    product.arc(id, &arc_b.input, &arc_b.output, arc_b.weight, (qa, arc_b.target, filter));
                    continue;
                }
                if arc_b.input != EPSILON {
                    continue;
                }
                if filter != 1 {
                    product.arc(id, EPSILON, &arc_b.output, arc_b.weight, (qa, arc_b.target, 2));
                }
                if filter == 0 {
                    for arc_a in &a.states[qa].arcs {
                        if arc_a.output == EPSILON && !free_flag(arc_a) {
                            product.arc(
                                id,
                                &arc_a.input,
                                &arc_b.output,
                                arc_a.weight + arc_b.weight,
                                (arc_a.target, arc_b.target, 0),
                            );
                        }
                    }
                }
            }
        }
        let mut result = product.finish(a, &b);
        result.name = self.name.take();
        *self = result;
        Ok(self)
    }

    /// `A & B`: pairs accepted by both operands.
    pub fn intersect(&mut self, other: &Transducer) -> &mut Self {
        let mut b = self.harmonized_with(other);
        self.remove_epsilons();
        b.remove_epsilons();
        let a = &*self;
        let mut product = Product::new((a.start, b.start));
        while let Some(key @ (qa, qb)) = product.queue.pop_front() {
            let id = product.ids[&key];
            if let (Some(wa), Some(wb)) = (a.states[qa].final_weight, b.states[qb].final_weight) {
                product.result.set_final(id, wa + wb);
            }
            for arc_a in &a.states[qa].arcs {
                for arc_b in b.states[qb].arcs.iter().filter(|x| x.label() == arc_a.label()) {
                    product.arc(
                        id,
                        &arc_a.input,
                        &arc_a.output,
                        arc_a.weight + arc_b.weight,
                        (arc_a.target, arc_b.target),
                    );
                }
            }
        }
        let mut result = product.finish(a, &b);
        result.name = self.name.take();
        *self = result;
        self
    }

    /// `A - B`: pairs of `self` not accepted by `other`. Weights come from
    /// `self`.
    pub fn subtract(&mut self, other: &Transducer) -> Result<&mut Self, FstError> {
        let mut b = self.harmonized_with(other);
        b.determinize()?;
        self.remove_epsilons();
        let a = &*self;
        // `None` is the sink reached once `other` has no matching arc.
        let mut product = Product::new((a.start, Some(b.start)));
        while let Some(key @ (qa, qb)) = product.queue.pop_front() {
            let id = product.ids[&key];
            if let Some(wa) = a.states[qa].final_weight {
                let b_accepts = qb.is_some_and(|q| b.states[q].final_weight.is_some());
                if !b_accepts {
                    product.result.set_final(id, wa);
                }
            }
            for arc_a in &a.states[qa].arcs {
                let next_b = qb.and_then(|q| {
                    b.states[q]
                        .arcs
                        .iter()
                        .find(|x| x.label() == arc_a.label())
                        .map(|x| x.target)
                });
                product.arc(id, &arc_a.input, &arc_a.output, arc_a.weight, (arc_a.target, next_b));
            }
        }
        let mut result = product.finish(a, &b);
        result.name = self.name.take();
        *self = result;
        Ok(self)
    }

    /// Interleave the paths of both operands in every possible way.
    pub fn shuffle(&mut self, other: &Transducer) -> &mut Self {
        let b = self.harmonized_with(other);
        let a = &*self;
        let mut product = Product::new((a.start, b.start));
        while let Some(key @ (qa, qb)) = product.queue.pop_front() {
            let id = product.ids[&key];
            if let (Some(wa), Some(wb)) = (a.states[qa].final_weight, b.states[qb].final_weight) {
                product.result.set_final(id, wa + wb);
            }
            for arc in &a.states[qa].arcs {
                product.arc(id, &arc.input, &arc.output, arc.weight, (arc.target, qb));
            }
            for arc in &b.states[qb].arcs {
                product.arc(id, &arc.input, &arc.output, arc.weight, (qa, arc.target));
            }
        }
        let mut result = product.finish(a, &b);
        result.name = self.name.take();
        *self = result;
        self
    }

    /// `A .x. B`: relate every string of `self` to every string of `other`,
    /// aligning symbols left to right and padding the shorter side with
    /// epsilons.
    pub fn cross_product(&mut self, other: &Transducer) -> Result<&mut Self, FstError> {
        if !self.is_automaton() || !other.is_automaton() {
            return Err(FstError::NotAutomaton("cross product"));
        }
        let mut b = self.harmonized_with(other);
        self.remove_epsilons();
        b.remove_epsilons();
        let a = &*self;

        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        enum Phase {
            Both,
            AOnly,
            BOnly,
        }

        let cross_labels = |x: &str, y: &str| -> Vec<(String, String)> {
            match (x == IDENTITY, y == IDENTITY) {
                (true, true) => vec![
                    (UNKNOWN.to_string(), UNKNOWN.to_string()),
                    (IDENTITY.to_string(), IDENTITY.to_string()),
                ],
                (true, false) => vec![(UNKNOWN.to_string(), y.to_string())],
                (false, true) => vec![(x.to_string(), UNKNOWN.to_string())],
                (false, false) => vec![(x.to_string(), y.to_string())],
            }
        };
        fn single(x: &str) -> &str {
            if x == IDENTITY { UNKNOWN } else { x }
        }

        let mut product = Product::new((a.start, b.start, Phase::Both));
        while let Some(key @ (qa, qb, phase)) = product.queue.pop_front() {
            let id = product.ids[&key];
            let fa = a.states[qa].final_weight;
            let fb = b.states[qb].final_weight;
            if let (Some(wa), Some(wb)) = (fa, fb) {
                product.result.set_final(id, wa + wb);
            }
            if phase == Phase::Both {
                for arc_a in &a.states[qa].arcs {
                    for arc_b in &b.states[qb].arcs {
                        for (i, o) in cross_labels(&arc_a.input, &arc_b.input) {
                            product.arc(
                                id,
                                &i,
                                &o,
                                arc_a.weight + arc_b.weight,
                                (arc_a.target, arc_b.target, Phase::Both),
                            );
                        }
                    }
                }
            }
            if phase != Phase::BOnly && fb.is_some() {
                for arc in &a.states[qa].arcs {
                    product.arc(id, single(&arc.input), EPSILON, arc.weight, (arc.target, qb, Phase::AOnly));
                }
            }
            if phase != Phase::AOnly && fa.is_some() {
                for arc in &b.states[qb].arcs {
                    product.arc(id, EPSILON, single(&arc.input), arc.weight, (qa, arc.target, Phase::BOnly));
                }
            }
        }
        let mut result = product.finish(a, &b);
        result.name = self.name.take();
        *self = result;
        Ok(self)
    }
}
