// Engine switches and the traversal state used by compact lookups.

use hashbrown::HashMap;

use crate::flags::FlagSlot;

/// Algorithm selection switches, passed explicitly to every engine call that
/// depends on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Minimize after algebra operations.
    pub minimal: bool,
    /// Partition refinement when on, Brzozowski's algorithm when off.
    pub hopcroft_min: bool,
    /// Treat weights as part of the arc label during minimization instead of
    /// pushing them toward the start state.
    pub encode_weights: bool,
    /// Insert each operand's flags into the other before composition.
    pub harmonize_flags: bool,
    /// Identity and unknown never match flag diacritics during harmonization.
    pub xerox_composition: bool,
    /// Flag diacritics behave as epsilons on the shared tape of a composition.
    pub flag_is_epsilon: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            minimal: true,
            hopcroft_min: true,
            encode_weights: false,
            harmonize_flags: false,
            xerox_composition: true,
            flag_is_epsilon: false,
        }
    }
}

/// Explicit DFS stack for [`CompactTransducer`](crate::compact::CompactTransducer)
/// traversal.
///
/// Flag diacritics use copy-on-push: each accepted flag arc copies the
/// current row of feature slots one level up, so backtracking is a plain
/// decrement of `flag_depth`.
pub struct TraversalConfig {
    pub buffer_size: usize,
    pub stack_depth: usize,
    pub flag_depth: usize,
    pub input_depth: usize,
    pub input_length: usize,
    pub flag_feature_count: u16,
    /// Visits allowed to one `(state, input_depth)` pair on the current path.
    pub visit_limit: u32,
    /// Check flag diacritics; when off they pass like epsilons.
    pub obey_flags: bool,

    /// State index at each stack depth.
    pub state_stack: Vec<u32>,
    /// Next transition index to try at each stack depth.
    pub transition_stack: Vec<u32>,
    /// Transition taken at each stack depth (valid below `stack_depth`).
    pub taken_stack: Vec<u32>,
    /// Accumulated weight at each stack depth.
    pub weight_stack: Vec<f32>,
    /// Pre-mapped input symbol indices.
    pub input_symbols: Vec<u32>,
    /// Flag slots, `flag_feature_count` per flag depth.
    pub flag_stack: Vec<FlagSlot>,
    /// Visit counts on the current path.
    pub visits: HashMap<(u32, usize), u32>,
}

impl TraversalConfig {
    pub fn new(flag_feature_count: u16, buffer_size: usize) -> Self {
        let fc = flag_feature_count as usize;
        Self {
            buffer_size,
            stack_depth: 0,
            flag_depth: 0,
            input_depth: 0,
            input_length: 0,
            flag_feature_count,
            visit_limit: 1,
            obey_flags: true,
            state_stack: vec![0; buffer_size],
            transition_stack: vec![0; buffer_size],
            taken_stack: vec![0; buffer_size],
            weight_stack: vec![0.0; buffer_size],
            input_symbols: Vec::new(),
            flag_stack: vec![FlagSlot::UNBOUND; fc * buffer_size],
            visits: HashMap::new(),
        }
    }

    /// Reset for a new input.
    pub fn reset(&mut self) {
        self.stack_depth = 0;
        self.flag_depth = 0;
        self.input_depth = 0;
        self.input_length = 0;
        self.input_symbols.clear();
        self.visits.clear();
        self.state_stack[0] = 0;
        self.transition_stack[0] = 0;
        self.weight_stack[0] = 0.0;
        let fc = self.flag_feature_count as usize;
        for slot in &mut self.flag_stack[..fc] {
            *slot = FlagSlot::UNBOUND;
        }
    }

    /// Double every per-depth buffer, keeping what is already stacked.
    pub fn grow(&mut self) {
        let size = self.buffer_size * 2;
        let fc = self.flag_feature_count as usize;
        self.state_stack.resize(size, 0);
        self.transition_stack.resize(size, 0);
        self.taken_stack.resize(size, 0);
        self.weight_stack.resize(size, 0.0);
        self.flag_stack.resize(fc * size, FlagSlot::UNBOUND);
        self.buffer_size = size;
    }

    #[inline]
    pub fn current_flags(&self) -> &[FlagSlot] {
        let fc = self.flag_feature_count as usize;
        let start = self.flag_depth * fc;
        &self.flag_stack[start..start + fc]
    }

    #[inline]
    pub fn current_flags_mut(&mut self) -> &mut [FlagSlot] {
        let fc = self.flag_feature_count as usize;
        let start = self.flag_depth * fc;
        &mut self.flag_stack[start..start + fc]
    }

    /// Copy the current flag row forward and step `flag_depth` up.
    #[inline]
    pub fn push_flags(&mut self) {
        let fc = self.flag_feature_count as usize;
        if fc > 0 {
            let src = self.flag_depth * fc;
            self.flag_stack.copy_within(src..src + fc, src + fc);
        }
        self.flag_depth += 1;
    }

    /// Record a visit; returns `false` when the limit is exhausted.
    #[inline]
    pub fn enter(&mut self, state: u32) -> bool {
        let count = self.visits.entry((state, self.input_depth)).or_insert(0);
        if *count >= self.visit_limit {
            return false;
        }
        *count += 1;
        true
    }

    #[inline]
    pub fn leave(&mut self, state: u32, input_depth: usize) {
        if let Some(count) = self.visits.get_mut(&(state, input_depth)) {
            *count = count.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_defaults() {
        let cfg = EngineConfig::default();
        assert!(cfg.minimal);
        assert!(cfg.hopcroft_min);
        assert!(cfg.xerox_composition);
        assert!(!cfg.flag_is_epsilon);
        assert!(!cfg.harmonize_flags);
        assert!(!cfg.encode_weights);
    }

    #[test]
    fn traversal_config_creation() {
        let config = TraversalConfig::new(3, 100);
        assert_eq!(config.buffer_size, 100);
        assert_eq!(config.flag_stack.len(), 300);
        assert_eq!(config.current_flags().len(), 3);
    }

    #[test]
    fn push_flags_copies_row() {
        let mut config = TraversalConfig::new(2, 10);
        config.current_flags_mut()[0] = FlagSlot::bound(5);
        config.current_flags_mut()[1] = FlagSlot::negated(7);
        config.push_flags();
        assert_eq!(config.flag_depth, 1);
        assert_eq!(config.current_flags()[0], FlagSlot::bound(5));
        config.current_flags_mut()[0] = FlagSlot::bound(9);
        config.flag_depth -= 1;
        assert_eq!(config.current_flags()[0], FlagSlot::bound(5));
    }

    #[test]
    fn grow_keeps_stacked_entries() {
        let mut config = TraversalConfig::new(2, 4);
        config.state_stack[3] = 7;
        config.weight_stack[3] = 1.5;
        config.flag_depth = 3;
        config.current_flags_mut()[1] = FlagSlot::bound(4);
        config.grow();
        assert_eq!(config.buffer_size, 8);
        assert_eq!(config.state_stack.len(), 8);
        assert_eq!(config.flag_stack.len(), 16);
        assert_eq!(config.state_stack[3], 7);
        assert_eq!(config.weight_stack[3], 1.5);
        assert_eq!(config.current_flags()[1], FlagSlot::bound(4));
        config.push_flags();
        assert_eq!(config.current_flags()[1], FlagSlot::bound(4));
    }

    #[test]
    fn visit_limit_is_enforced() {
        let mut config = TraversalConfig::new(0, 10);
        config.visit_limit = 2;
        assert!(config.enter(3));
        assert!(config.enter(3));
        assert!(!config.enter(3));
        config.leave(3, 0);
        assert!(config.enter(3));
    }

    #[test]
    fn reset_clears_state() {
        let mut config = TraversalConfig::new(1, 10);
        config.stack_depth = 4;
        config.flag_depth = 2;
        config.flag_stack[0] = FlagSlot::bound(3);
        config.enter(1);
        config.reset();
        assert_eq!(config.stack_depth, 0);
        assert_eq!(config.flag_depth, 0);
        assert_eq!(config.flag_stack[0], FlagSlot::UNBOUND);
        assert!(config.visits.is_empty());
    }
}
