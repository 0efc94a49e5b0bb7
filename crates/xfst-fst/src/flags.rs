// Flag diacritics: parsing, the per-feature check, and path validation.

use crate::FstError;
use hashbrown::HashMap;

/// The six flag diacritic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlagOp {
    /// Positive set: bind feature to value.
    P,
    /// Negative set: bind feature to value and mark the binding negative.
    N,
    /// Require: feature must be bound (to the given value, if any).
    R,
    /// Disallow: feature must not be bound (to the given value, if any).
    D,
    /// Clear: unbind feature.
    C,
    /// Unification: bind if compatible, fail otherwise.
    U,
}

impl FlagOp {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            b'P' => Some(FlagOp::P),
            b'N' => Some(FlagOp::N),
            b'R' => Some(FlagOp::R),
            b'D' => Some(FlagOp::D),
            b'C' => Some(FlagOp::C),
            b'U' => Some(FlagOp::U),
            _ => None,
        }
    }
}

/// Neutral value: feature has not been set.
pub const FLAG_VALUE_NEUTRAL: u16 = 0;

/// Any non-neutral value (wildcard for R/D operations).
pub const FLAG_VALUE_ANY: u16 = 1;

/// A parsed flag diacritic operation with its feature and value indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpFeatureValue {
    pub op: FlagOp,
    pub feature: u16,
    pub value: u16,
}

impl Default for OpFeatureValue {
    fn default() -> Self {
        Self {
            op: FlagOp::P,
            feature: 0,
            value: FLAG_VALUE_NEUTRAL,
        }
    }
}

/// Current binding of one feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FlagSlot {
    pub value: u16,
    /// The binding came from a negative set.
    pub negative: bool,
}

impl FlagSlot {
    pub const UNBOUND: FlagSlot = FlagSlot {
        value: FLAG_VALUE_NEUTRAL,
        negative: false,
    };

    #[inline]
    pub fn bound(value: u16) -> Self {
        Self {
            value,
            negative: false,
        }
    }

    #[inline]
    pub fn negated(value: u16) -> Self {
        Self {
            value,
            negative: true,
        }
    }
}

/// Result of a flag diacritic check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagCheckResult {
    /// Constraint violation.
    Reject,
    /// Allowed; the feature takes the given slot.
    AcceptAndUpdate { feature: u16, slot: FlagSlot },
    /// Allowed; flag state unchanged.
    AcceptNoUpdate { feature: u16 },
}

/// Check whether a flag diacritic is allowed given the current binding of
/// its feature. The caller applies the update.
pub fn check_flag(ofv: &OpFeatureValue, current: FlagSlot) -> FlagCheckResult {
    let feature = ofv.feature;
    match ofv.op {
        FlagOp::P => FlagCheckResult::AcceptAndUpdate {
            feature,
            slot: FlagSlot::bound(ofv.value),
        },
        FlagOp::N => FlagCheckResult::AcceptAndUpdate {
            feature,
            slot: FlagSlot::negated(ofv.value),
        },
        FlagOp::C => FlagCheckResult::AcceptAndUpdate {
            feature,
            slot: FlagSlot::UNBOUND,
        },
        FlagOp::R => {
            if ofv.value == FLAG_VALUE_ANY {
                if current.value == FLAG_VALUE_NEUTRAL {
                    return FlagCheckResult::Reject;
                }
            } else if current.value != ofv.value || current.negative {
                return FlagCheckResult::Reject;
            }
            FlagCheckResult::AcceptNoUpdate { feature }
        }
        FlagOp::D => {
            if ofv.value == FLAG_VALUE_ANY {
                if current.value != FLAG_VALUE_NEUTRAL {
                    return FlagCheckResult::Reject;
                }
            } else if current.value == ofv.value && !current.negative {
                return FlagCheckResult::Reject;
            }
            FlagCheckResult::AcceptNoUpdate { feature }
        }
        FlagOp::U => {
            if current.value == FLAG_VALUE_NEUTRAL
                || (current.negative && current.value != ofv.value)
            {
                FlagCheckResult::AcceptAndUpdate {
                    feature,
                    slot: FlagSlot::bound(ofv.value),
                }
            } else if current.value == ofv.value && !current.negative {
                FlagCheckResult::AcceptNoUpdate { feature }
            } else {
                FlagCheckResult::Reject
            }
        }
    }
}

/// Returns `true` if `symbol` is a well-formed flag diacritic such as
/// `@P.CASE.NOM@` or `@C.CASE@`.
pub fn is_flag_diacritic(symbol: &str) -> bool {
    split_flag(symbol).is_some()
}

/// Split a flag diacritic into operator, feature and value. A missing value
/// is returned as the empty string.
pub fn split_flag(symbol: &str) -> Option<(FlagOp, &str, &str)> {
    let bytes = symbol.as_bytes();
    if bytes.len() < 5 || bytes[0] != b'@' || bytes[bytes.len() - 1] != b'@' || bytes[2] != b'.' {
        return None;
    }
    let op = FlagOp::from_byte(bytes[1])?;
    let inner = &symbol[3..symbol.len() - 1];
    let (feature, value) = match inner.find('.') {
        Some(dot) => (&inner[..dot], &inner[dot + 1..]),
        None => (inner, ""),
    };
    if feature.is_empty() || value.contains('.') || feature.contains('@') {
        return None;
    }
    Some((op, feature, value))
}

/// Feature name of a flag diacritic, if `symbol` is one.
pub fn flag_feature(symbol: &str) -> Option<&str> {
    split_flag(symbol).map(|(_, feature, _)| feature)
}

/// Parser state assigning stable indices to features and values.
#[derive(Debug, Clone)]
pub struct FlagDiacriticParser {
    features: HashMap<String, u16>,
    values: HashMap<String, u16>,
}

impl Default for FlagDiacriticParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FlagDiacriticParser {
    pub fn new() -> Self {
        let mut values = HashMap::new();
        values.insert(String::new(), FLAG_VALUE_NEUTRAL);
        values.insert("@".to_string(), FLAG_VALUE_ANY);
        Self {
            features: HashMap::new(),
            values,
        }
    }

    /// Number of distinct features seen so far.
    pub fn feature_count(&self) -> u16 {
        self.features.len() as u16
    }

    /// Parse a flag diacritic symbol. Features and values get sequential
    /// indices on first sight; a missing value maps to [`FLAG_VALUE_ANY`].
    pub fn parse(&mut self, symbol: &str) -> Result<OpFeatureValue, FstError> {
        let (op, feature_str, value_str) = split_flag(symbol)
            .ok_or_else(|| FstError::InvalidFlagDiacritic(symbol.to_string()))?;
        let value_str = if value_str.is_empty() { "@" } else { value_str };

        let feature = {
            let next_idx = self.features.len() as u16;
            *self.features.entry(feature_str.to_string()).or_insert(next_idx)
        };

        let value = {
            let next_idx = self.values.len() as u16;
            *self.values.entry(value_str.to_string()).or_insert(next_idx)
        };

        Ok(OpFeatureValue { op, feature, value })
    }
}

/// Feature bindings by name, sorted by feature: `(feature, value, negative)`.
/// Two flag states with equal bindings accept the same continuations.
pub type FlagBindings = Vec<(String, String, bool)>;

/// Transient binding state for evaluating one symbol sequence.
///
/// Non-flag symbols pass through untouched. Cloning is cheap enough to take
/// a snapshot at every flag arc during path search.
#[derive(Debug, Clone, Default)]
pub struct FlagState {
    parser: FlagDiacriticParser,
    slots: Vec<FlagSlot>,
}

impl FlagState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one symbol. Returns `false` if it is a flag whose constraint
    /// fails; the state is left unspecified in that case.
    pub fn apply(&mut self, symbol: &str) -> bool {
        if !is_flag_diacritic(symbol) {
            return true;
        }
        let Ok(ofv) = self.parser.parse(symbol) else {
            return true;
        };
        let idx = ofv.feature as usize;
        if idx >= self.slots.len() {
            self.slots.resize(idx + 1, FlagSlot::UNBOUND);
        }
        match check_flag(&ofv, self.slots[idx]) {
            FlagCheckResult::Reject => false,
            FlagCheckResult::AcceptAndUpdate { slot, .. } => {
                self.slots[idx] = slot;
                true
            }
            FlagCheckResult::AcceptNoUpdate { .. } => true,
        }
    }

    /// Bound features by name, independent of the order features were seen.
    pub fn bindings(&self) -> FlagBindings {
        let value_names: HashMap<u16, &str> = self
            .parser
            .values
            .iter()
            .map(|(name, &idx)| (idx, name.as_str()))
            .collect();
        let mut out: FlagBindings = self
            .parser
            .features
            .iter()
            .filter_map(|(name, &idx)| {
                let slot = self.slots.get(idx as usize).copied()?;
                if slot == FlagSlot::UNBOUND {
                    return None;
                }
                let value = value_names.get(&slot.value).copied().unwrap_or("");
                Some((name.clone(), value.to_string(), slot.negative))
            })
            .collect();
        out.sort();
        out
    }
}

/// Evaluate a whole symbol sequence left to right. Any failed check
/// invalidates the sequence.
pub fn is_valid_path<'a>(symbols: impl IntoIterator<Item = &'a str>) -> bool {
    let mut state = FlagState::new();
    symbols.into_iter().all(|s| state.apply(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ofv(op: FlagOp, value: u16) -> OpFeatureValue {
        OpFeatureValue {
            op,
            feature: 0,
            value,
        }
    }

    // --- check_flag tests ---

    #[test]
    fn positive_set_always_updates() {
        let result = check_flag(&ofv(FlagOp::P, 5), FlagSlot::negated(3));
        assert_eq!(
            result,
            FlagCheckResult::AcceptAndUpdate {
                feature: 0,
                slot: FlagSlot::bound(5)
            }
        );
    }

    #[test]
    fn negative_set_marks_binding() {
        let result = check_flag(&ofv(FlagOp::N, 5), FlagSlot::UNBOUND);
        assert_eq!(
            result,
            FlagCheckResult::AcceptAndUpdate {
                feature: 0,
                slot: FlagSlot::negated(5)
            }
        );
    }

    #[test]
    fn clear_resets_to_neutral() {
        let result = check_flag(&ofv(FlagOp::C, FLAG_VALUE_ANY), FlagSlot::negated(4));
        assert_eq!(
            result,
            FlagCheckResult::AcceptAndUpdate {
                feature: 0,
                slot: FlagSlot::UNBOUND
            }
        );
    }

    #[test]
    fn require_rejects_negative_binding_of_same_value() {
        let result = check_flag(&ofv(FlagOp::R, 5), FlagSlot::negated(5));
        assert_eq!(result, FlagCheckResult::Reject);
    }

    #[test]
    fn require_any_accepts_negative_binding() {
        let result = check_flag(&ofv(FlagOp::R, FLAG_VALUE_ANY), FlagSlot::negated(5));
        assert_eq!(result, FlagCheckResult::AcceptNoUpdate { feature: 0 });
    }

    #[test]
    fn disallow_value_passes_when_negatively_bound() {
        let result = check_flag(&ofv(FlagOp::D, 5), FlagSlot::negated(5));
        assert_eq!(result, FlagCheckResult::AcceptNoUpdate { feature: 0 });
    }

    #[test]
    fn disallow_any_rejects_any_binding() {
        let result = check_flag(&ofv(FlagOp::D, FLAG_VALUE_ANY), FlagSlot::bound(2));
        assert_eq!(result, FlagCheckResult::Reject);
    }

    #[test]
    fn unify_over_negative_binding_of_other_value() {
        let result = check_flag(&ofv(FlagOp::U, 5), FlagSlot::negated(3));
        assert_eq!(
            result,
            FlagCheckResult::AcceptAndUpdate {
                feature: 0,
                slot: FlagSlot::bound(5)
            }
        );
    }

    #[test]
    fn unify_rejects_negative_binding_of_same_value() {
        let result = check_flag(&ofv(FlagOp::U, 5), FlagSlot::negated(5));
        assert_eq!(result, FlagCheckResult::Reject);
    }

    #[test]
    fn unify_rejects_different_positive_value() {
        let result = check_flag(&ofv(FlagOp::U, 5), FlagSlot::bound(3));
        assert_eq!(result, FlagCheckResult::Reject);
    }

    // --- parsing ---

    #[test]
    fn split_recognizes_all_operators() {
        for op in ["P", "N", "R", "D", "C", "U"] {
            assert!(is_flag_diacritic(&format!("@{op}.F.v@")), "{op}");
        }
        assert!(is_flag_diacritic("@C.F@"));
        assert!(!is_flag_diacritic("@X.F.v@"));
        assert!(!is_flag_diacritic("@P@"));
        assert!(!is_flag_diacritic("@_EPSILON_SYMBOL_@"));
        assert!(!is_flag_diacritic("P.F.v"));
    }

    #[test]
    fn feature_indices_are_stable() {
        let mut parser = FlagDiacriticParser::new();
        let a = parser.parse("@P.CASE.NOM@").unwrap();
        let b = parser.parse("@P.NUM.SG@").unwrap();
        let c = parser.parse("@R.CASE.GEN@").unwrap();
        assert_eq!(a.feature, 0);
        assert_eq!(b.feature, 1);
        assert_eq!(c.feature, 0);
        assert_eq!(parser.feature_count(), 2);
        assert_eq!(parser.parse("@D.CASE@").unwrap().value, FLAG_VALUE_ANY);
    }

    #[test]
    fn reject_malformed_symbol() {
        let mut parser = FlagDiacriticParser::new();
        let err = parser.parse("@Q.FOO@").unwrap_err();
        assert!(matches!(err, FstError::InvalidFlagDiacritic(_)));
    }

    // --- path validation ---

    #[test]
    fn positive_then_require_is_valid() {
        assert!(is_valid_path(["@P.F.a@", "@R.F.a@"]));
    }

    #[test]
    fn positive_then_disallow_is_invalid() {
        assert!(!is_valid_path(["@P.F.a@", "@D.F.a@"]));
    }

    #[test]
    fn negative_then_require_same_value_is_invalid() {
        assert!(!is_valid_path(["@N.F.a@", "@R.F.a@"]));
    }

    #[test]
    fn clear_then_empty_require_is_invalid() {
        assert!(!is_valid_path(["@P.F.a@", "@C.F@", "@R.F@"]));
    }

    #[test]
    fn empty_disallow_requires_unbound() {
        assert!(is_valid_path(["a", "@D.F@", "b"]));
        assert!(!is_valid_path(["@U.F.x@", "@D.F@"]));
    }

    #[test]
    fn ordinary_symbols_are_ignored() {
        assert!(is_valid_path(["c", "a", "t"]));
        assert!(is_valid_path(std::iter::empty::<&str>()));
    }

    #[test]
    fn bindings_ignore_discovery_order() {
        let mut a = FlagState::new();
        assert!(a.apply("@P.F.x@"));
        assert!(a.apply("@N.G.y@"));
        let mut b = FlagState::new();
        assert!(b.apply("@N.G.y@"));
        assert!(b.apply("@P.F.x@"));
        assert_eq!(a.bindings(), b.bindings());
        assert!(b.apply("@C.F@"));
        assert_eq!(b.bindings(), vec![("G".to_string(), "y".to_string(), true)]);
    }

    #[test]
    fn features_are_independent() {
        assert!(is_valid_path(["@P.F.a@", "@P.G.b@", "@R.F.a@", "@R.G.b@"]));
        assert!(!is_valid_path(["@P.F.a@", "@R.G@"]));
    }
}
