// Path enumeration, lookup, ambiguity checks and random paths.

use rand::Rng;

use crate::flags::{FlagState, is_flag_diacritic};
use crate::symbols::{EPSILON, IDENTITY, UNKNOWN};
use crate::transducer::{Arc, StateId, Transducer, weight_key};
use crate::FstError;

/// One accepted path: its symbol pairs (epsilon pairs dropped) and total
/// weight.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub pairs: Vec<(String, String)>,
    pub weight: f32,
}

impl Path {
    /// Input-side symbols, epsilons skipped.
    pub fn input(&self) -> impl Iterator<Item = &str> {
        self.pairs
            .iter()
            .map(|(i, _)| i.as_str())
            .filter(|s| *s != EPSILON)
    }

    /// Output-side symbols, epsilons skipped.
    pub fn output(&self) -> impl Iterator<Item = &str> {
        self.pairs
            .iter()
            .map(|(_, o)| o.as_str())
            .filter(|s| *s != EPSILON)
    }

    /// Compact pair rendering: `a` for `a:a`, `a:b` otherwise, `0` for
    /// epsilon.
    pub fn render_pairs(&self) -> String {
        let show = |s: &str| if s == EPSILON { "0".to_string() } else { s.to_string() };
        self.pairs
            .iter()
            .map(|(i, o)| {
                if i == o {
                    show(i)
                } else {
                    format!("{}:{}", show(i), show(o))
                }
            })
            .collect()
    }

    fn key(&self) -> (i64, &[(String, String)]) {
        (weight_key(self.weight), &self.pairs)
    }
}

/// Sort by weight then pairs, keeping the cheapest copy of each pair
/// sequence.
fn sort_and_dedup(paths: &mut Vec<Path>) {
    paths.sort_by(|a, b| a.pairs.cmp(&b.pairs).then(a.weight.total_cmp(&b.weight)));
    paths.dedup_by(|b, a| a.pairs == b.pairs);
    paths.sort_by(|a, b| a.key().cmp(&b.key()));
}

/// Options for [`Transducer::extract_paths`].
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Stop after this many paths.
    pub max_paths: Option<usize>,
    /// Times a path may revisit a state; `None` refuses cyclic networks.
    pub cycles: Option<usize>,
    /// Drop paths whose flag diacritics fail.
    pub obey_flags: bool,
}

/// Options for [`Transducer::lookup`].
#[derive(Debug, Clone, Default)]
pub struct LookupOptions {
    /// Times a path may revisit a state at one input position.
    pub cycles: Option<usize>,
    /// Drop results heavier than this.
    pub max_weight: Option<f32>,
    pub obey_flags: bool,
}

struct Walk<'a> {
    t: &'a Transducer,
    limit: usize,
    visits: Vec<usize>,
    pairs: Vec<(String, String)>,
    found: Vec<Path>,
    max_paths: Option<usize>,
    obey_flags: bool,
}

/// One level of an explicit DFS: the state, the next arc to try, and what
/// entering the state pushed onto the shared pair and flag stacks.
struct Frame {
    state: StateId,
    pos: usize,
    next: usize,
    weight: f32,
    pushed_pair: bool,
    pushed_flags: bool,
}

impl Frame {
    fn new(state: StateId, pos: usize, weight: f32, pushed_pair: bool, pushed_flags: bool) -> Self {
        Self {
            state,
            pos,
            next: 0,
            weight,
            pushed_pair,
            pushed_flags,
        }
    }
}

impl Walk<'_> {
    fn full(&self) -> bool {
        self.max_paths.is_some_and(|m| self.found.len() >= m)
    }

    /// Count a visit to `q` and record it if final.
    fn enter(&mut self, q: StateId, weight: f32) {
        self.visits[q] += 1;
        if let Some(f) = self.t.states[q].final_weight {
            self.found.push(Path {
                pairs: self.pairs.clone(),
                weight: weight + f,
            });
        }
    }

    fn run(&mut self) {
        let t = self.t;
        let mut flag_stack = vec![FlagState::new()];
        let mut stack = vec![Frame::new(t.start, 0, 0.0, false, false)];
        self.enter(t.start, 0.0);

        while let Some(frame) = stack.last_mut() {
            if self.full() {
                break;
            }
            let q = frame.state;
            let Some(arc) = t.states[q].arcs.get(frame.next) else {
                self.visits[q] -= 1;
                if frame.pushed_pair {
                    self.pairs.pop();
                }
                if frame.pushed_flags {
                    flag_stack.pop();
                }
                stack.pop();
                continue;
            };
            frame.next += 1;
            let weight = frame.weight + arc.weight;

            let next_flags = if self.obey_flags && is_flag_diacritic(&arc.input) {
                let mut next = flag_stack.last().cloned().unwrap_or_else(FlagState::new);
                if !next.apply(&arc.input) {
                    continue;
                }
                Some(next)
            } else {
                None
            };
            if self.visits[arc.target] >= self.limit {
                continue;
            }
            let pushed_pair = !arc.is_epsilon();
            if pushed_pair {
                self.pairs.push((arc.input.clone(), arc.output.clone()));
            }
            let pushed_flags = next_flags.is_some();
            flag_stack.extend(next_flags);
            self.enter(arc.target, weight);
            stack.push(Frame::new(arc.target, 0, weight, pushed_pair, pushed_flags));
        }
    }
}

/// Lookup DFS over `(state, input position)`.
struct Lookup<'a> {
    t: &'a Transducer,
    input: &'a [String],
    limit: usize,
    visits: hashbrown::HashMap<(StateId, usize), usize>,
    pairs: Vec<(String, String)>,
    found: Vec<Path>,
    obey_flags: bool,
}

impl<'a> Lookup<'a> {
    /// Count a visit to `(q, pos)` unless the limit is reached; records the
    /// path when the input is consumed at a final state.
    fn enter(&mut self, q: StateId, pos: usize, weight: f32) -> bool {
        let count = self.visits.entry((q, pos)).or_insert(0);
        if *count >= self.limit {
            return false;
        }
        *count += 1;
        if pos == self.input.len() {
            if let Some(f) = self.t.states[q].final_weight {
                self.found.push(Path {
                    pairs: self.pairs.clone(),
                    weight: weight + f,
                });
            }
        }
        true
    }

    fn leave(&mut self, q: StateId, pos: usize) {
        if let Some(count) = self.visits.get_mut(&(q, pos)) {
            *count -= 1;
        }
    }

    /// The pair read by `arc` at `pos`, the position after it, and the flag
    /// row it leaves behind when it changes. `None` when the arc cannot be
    /// taken.
    fn step(
        &self,
        arc: &'a Arc,
        pos: usize,
        flags: Option<&FlagState>,
    ) -> Option<(&'a str, &'a str, usize, Option<FlagState>)> {
        let t = self.t;
        if arc.input == EPSILON {
            return Some((EPSILON, arc.output.as_str(), pos, None));
        }
        if is_flag_diacritic(&arc.input) {
            if !self.obey_flags {
                return Some((arc.input.as_str(), arc.output.as_str(), pos, None));
            }
            let mut next = flags.cloned().unwrap_or_default();
            if !next.apply(&arc.input) {
                return None;
            }
            return Some((arc.input.as_str(), arc.output.as_str(), pos, Some(next)));
        }
        let token: &'a String = self.input.get(pos)?;
        let known = t.alphabet.contains(token);
        let output: &'a str = if arc.input == *token {
            arc.output.as_str()
        } else if !known && arc.input == IDENTITY {
            token.as_str()
        } else if !known && arc.input == UNKNOWN {
            arc.output.as_str()
        } else {
            return None;
        };
        Some((token.as_str(), output, pos + 1, None))
    }

    fn run(&mut self) {
        let t = self.t;
        let mut flag_stack = vec![FlagState::new()];
        let mut stack = Vec::new();
        if self.enter(t.start, 0, 0.0) {
            stack.push(Frame::new(t.start, 0, 0.0, false, false));
        }

        while let Some(frame) = stack.last_mut() {
            let (q, pos) = (frame.state, frame.pos);
            let Some(arc) = t.states[q].arcs.get(frame.next) else {
                self.leave(q, pos);
                if frame.pushed_pair {
                    self.pairs.pop();
                }
                if frame.pushed_flags {
                    flag_stack.pop();
                }
                stack.pop();
                continue;
            };
            frame.next += 1;
            let weight = frame.weight + arc.weight;

            let Some((input, output, next_pos, next_flags)) = self.step(arc, pos, flag_stack.last()) else {
                continue;
            };
            let pushed_pair = !(input == EPSILON && output == EPSILON);
            if pushed_pair {
                self.pairs.push((input.to_string(), output.to_string()));
            }
            if !self.enter(arc.target, next_pos, weight) {
                if pushed_pair {
                    self.pairs.pop();
                }
                continue;
            }
            let pushed_flags = next_flags.is_some();
            flag_stack.extend(next_flags);
            stack.push(Frame::new(arc.target, next_pos, weight, pushed_pair, pushed_flags));
        }
    }
}

impl Transducer {
    /// Enumerate accepted paths, sorted by weight and de-duplicated.
    pub fn extract_paths(&self, opts: &ExtractOptions) -> Result<Vec<Path>, FstError> {
        if opts.cycles.is_none() && self.is_cyclic() {
            return Err(FstError::Cyclic);
        }
        let mut walk = Walk {
            t: self,
            limit: opts.cycles.unwrap_or(0) + 1,
            visits: vec![0; self.states.len()],
            pairs: Vec::new(),
            found: Vec::new(),
            max_paths: opts.max_paths,
            obey_flags: opts.obey_flags,
        };
        walk.run();
        let mut paths = walk.found;
        sort_and_dedup(&mut paths);
        Ok(paths)
    }

    /// Paths whose input side matches `input`. Tokens outside the alphabet
    /// are matched by identity and unknown arcs.
    pub fn lookup(&self, input: &[String], opts: &LookupOptions) -> Vec<Path> {
        let mut search = Lookup {
            t: self,
            input,
            limit: opts.cycles.map_or(1, |c| c + 1),
            visits: hashbrown::HashMap::new(),
            pairs: Vec::new(),
            found: Vec::new(),
            obey_flags: opts.obey_flags,
        };
        search.run();
        let mut paths = search.found;
        if let Some(max) = opts.max_weight {
            paths.retain(|p| p.weight <= max);
        }
        sort_and_dedup(&mut paths);
        paths
    }

    /// A cycle among useful states.
    pub fn is_cyclic(&self) -> bool {
        let mut t = self.clone();
        t.trim();
        t.has_cycle(|_| true)
    }

    /// Some input maps to infinitely many outputs: a useful cycle that
    /// consumes no input.
    pub fn is_infinitely_ambiguous(&self) -> bool {
        let mut t = self.clone();
        t.trim();
        t.has_cycle(|a| a.input == EPSILON || is_flag_diacritic(&a.input))
    }

    /// Cycle detection over the arcs selected by `keep`.
    fn has_cycle(&self, keep: impl Fn(&Arc) -> bool) -> bool {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            Active,
            Done,
        }
        let n = self.states.len();
        let mut mark = vec![Mark::New; n];
        for root in 0..n {
            if mark[root] != Mark::New {
                continue;
            }
            let mut stack: Vec<(StateId, usize)> = vec![(root, 0)];
            mark[root] = Mark::Active;
            while let Some(top) = stack.last_mut() {
                let q = top.0;
                let arcs = &self.states[q].arcs;
                let mut advanced = None;
                while top.1 < arcs.len() {
                    let arc = &arcs[top.1];
                    top.1 += 1;
                    if keep(arc) {
                        advanced = Some(arc.target);
                        break;
                    }
                }
                match advanced {
                    Some(target) => match mark[target] {
                        Mark::Active => return true,
                        Mark::New => {
                            mark[target] = Mark::Active;
                            stack.push((target, 0));
                        }
                        Mark::Done => {}
                    },
                    None => {
                        mark[q] = Mark::Done;
                        stack.pop();
                    }
                }
            }
        }
        false
    }

    /// The path with the fewest symbol pairs, ties broken by weight.
    pub fn shortest_path(&self) -> Option<Path> {
        let n = self.states.len();
        let mut best: Vec<Option<(usize, f32)>> = vec![None; n];
        let mut via: Vec<Option<(StateId, usize)>> = vec![None; n];
        best[self.start] = Some((0, 0.0));
        let better = |a: (usize, f32), b: Option<(usize, f32)>| match b {
            None => true,
            Some(b) => a.0 < b.0 || (a.0 == b.0 && a.1 < b.1 - crate::transducer::WEIGHT_TOLERANCE),
        };
        for _ in 0..n {
            let mut changed = false;
            for q in 0..n {
                let Some((len, w)) = best[q] else { continue };
                for (i, arc) in self.states[q].arcs.iter().enumerate() {
                    let step = usize::from(!arc.is_epsilon());
                    let candidate = (len + step, w + arc.weight);
                    if better(candidate, best[arc.target]) {
                        best[arc.target] = Some(candidate);
                        via[arc.target] = Some((q, i));
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
        let mut end: Option<(StateId, (usize, f32))> = None;
        for (q, state) in self.states.iter().enumerate() {
            if let (Some(f), Some((len, w))) = (state.final_weight, best[q]) {
                let total = (len, w + f);
                if better(total, end.map(|(_, v)| v)) {
                    end = Some((q, total));
                }
            }
        }
        let (q, (_, weight)) = end?;
        Some(Path {
            pairs: self.trace_back(q, &via),
            weight,
        })
    }

    /// The path with the most symbol pairs, ties broken by weight. Cyclic
    /// networks have no longest path.
    pub fn longest_path(&self) -> Result<Option<Path>, FstError> {
        let mut t = self.clone();
        t.trim();
        if t.has_cycle(|_| true) {
            return Err(FstError::Cyclic);
        }
        let order = t.topological_order();
        let n = t.states.len();
        let mut best: Vec<Option<(usize, f32)>> = vec![None; n];
        let mut via: Vec<Option<(StateId, usize)>> = vec![None; n];
        best[t.start] = Some((0, 0.0));
        for &q in &order {
            let Some((len, w)) = best[q] else { continue };
            for (i, arc) in t.states[q].arcs.iter().enumerate() {
                let candidate = (len + usize::from(!arc.is_epsilon()), w + arc.weight);
                let replace = match best[arc.target] {
                    None => true,
                    Some(old) => candidate.0 > old.0 || (candidate.0 == old.0 && candidate.1 < old.1),
                };
                if replace {
                    best[arc.target] = Some(candidate);
                    via[arc.target] = Some((q, i));
                }
            }
        }
        let mut end: Option<(StateId, usize, f32)> = None;
        for (q, state) in t.states.iter().enumerate() {
            if let (Some(f), Some((len, w))) = (state.final_weight, best[q]) {
                let replace = match end {
                    None => true,
                    Some((_, l, ew)) => len > l || (len == l && w + f < ew),
                };
                if replace {
                    end = Some((q, len, w + f));
                }
            }
        }
        Ok(end.map(|(q, _, weight)| Path {
            pairs: t.trace_back(q, &via),
            weight,
        }))
    }

    fn trace_back(&self, mut q: StateId, via: &[Option<(StateId, usize)>]) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        let mut steps = 0;
        while q != self.start && steps <= self.states.len() {
            let Some((p, i)) = via[q] else { break };
            let arc = &self.states[p].arcs[i];
            if !arc.is_epsilon() {
                pairs.push((arc.input.clone(), arc.output.clone()));
            }
            q = p;
            steps += 1;
        }
        pairs.reverse();
        pairs
    }

    /// States ordered so every arc goes forward. Only meaningful for acyclic
    /// machines.
    pub(crate) fn topological_order(&self) -> Vec<StateId> {
        let n = self.states.len();
        let mut indegree = vec![0usize; n];
        for (_, arc) in self.arcs() {
            indegree[arc.target] += 1;
        }
        let mut ready: Vec<StateId> = (0..n).filter(|&q| indegree[q] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(q) = ready.pop() {
            order.push(q);
            for arc in &self.states[q].arcs {
                indegree[arc.target] -= 1;
                if indegree[arc.target] == 0 {
                    ready.push(arc.target);
                }
            }
        }
        order
    }

    /// Number of accepted paths, or `None` when there are infinitely many.
    pub fn path_count(&self) -> Option<u128> {
        let mut t = self.clone();
        t.trim();
        if t.has_cycle(|_| true) {
            return None;
        }
        let mut count = vec![0u128; t.states.len()];
        count[t.start] = 1;
        let mut total: u128 = 0;
        for q in t.topological_order() {
            if t.states[q].final_weight.is_some() {
                total = total.saturating_add(count[q]);
            }
            for arc in &t.states[q].arcs {
                count[arc.target] = count[arc.target].saturating_add(count[q]);
            }
        }
        Some(total)
    }

    /// Random accepted paths: at each state stop (if final) or follow an arc,
    /// uniformly.
    pub fn random_paths(&self, count: usize, rng: &mut impl Rng) -> Vec<Path> {
        const MAX_STEPS: usize = 1000;
        let mut t = self.clone();
        t.trim();
        if t.is_empty_language() {
            return Vec::new();
        }
        let mut paths = Vec::with_capacity(count);
        for _ in 0..count {
            let mut q = t.start;
            let mut pairs = Vec::new();
            let mut weight = 0.0;
            for _ in 0..MAX_STEPS {
                let state = &t.states[q];
                let options = state.arcs.len() + usize::from(state.final_weight.is_some());
                if options == 0 {
                    break;
                }
                let pick = rng.random_range(0..options);
                if pick == state.arcs.len() {
                    weight += state.final_weight.unwrap_or(0.0);
                    paths.push(Path { pairs, weight });
                    break;
                }
                let arc = &state.arcs[pick];
                if !arc.is_epsilon() {
                    pairs.push((arc.input.clone(), arc.output.clone()));
                }
                weight += arc.weight;
                q = arc.target;
            }
        }
        paths
    }
}
