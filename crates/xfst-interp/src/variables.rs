// Session variables: a fixed set of names, each with a value domain, a
// default and an explanation for `show`.

use std::collections::BTreeMap;

use xfst_fst::EngineConfig;

use crate::error::XfstError;

/// Values a variable accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    /// `ON` or `OFF`.
    Switch,
    /// A non-negative integer.
    Count,
    /// A weight, or `OFF` for none.
    WeightOrOff,
    /// One of the listed words.
    Choice(&'static [&'static str]),
    /// `ON` for a fresh seed, or a fixed integer seed.
    Seed,
    /// Any text.
    Text,
}

impl Domain {
    fn describe(self) -> &'static str {
        match self {
            Domain::Switch => "ON or OFF",
            Domain::Count => "a non-negative integer",
            Domain::WeightOrOff => "a number or OFF",
            Domain::Choice(_) => "one of the listed values",
            Domain::Seed => "ON or a non-negative integer",
            Domain::Text => "any text",
        }
    }

    fn normalize(self, value: &str) -> Option<String> {
        match self {
            Domain::Switch => match value.to_ascii_uppercase().as_str() {
                "ON" | "1" | "TRUE" => Some("ON".to_string()),
                "OFF" | "0" | "FALSE" => Some("OFF".to_string()),
                _ => None,
            },
            Domain::Count => value.parse::<usize>().ok().map(|n| n.to_string()),
            Domain::WeightOrOff => {
                if value.eq_ignore_ascii_case("OFF") {
                    Some("OFF".to_string())
                } else {
                    value.parse::<f32>().ok().map(|_| value.to_string())
                }
            }
            Domain::Choice(words) => words
                .iter()
                .find(|w| w.eq_ignore_ascii_case(value))
                .map(|w| w.to_string()),
            Domain::Seed => {
                if value.eq_ignore_ascii_case("ON") {
                    Some("ON".to_string())
                } else {
                    value.parse::<u64>().ok().map(|n| n.to_string())
                }
            }
            Domain::Text => Some(value.to_string()),
        }
    }
}

pub struct Variable {
    pub name: &'static str,
    pub default: &'static str,
    pub domain: Domain,
    pub explanation: &'static str,
}

const fn variable(
    name: &'static str,
    default: &'static str,
    domain: Domain,
    explanation: &'static str,
) -> Variable {
    Variable {
        name,
        default,
        domain,
        explanation,
    }
}

/// Every variable, sorted by name.
pub const VARIABLES: &[Variable] = &[
    variable("assert", "OFF", Domain::Switch, "quit if a test result is 0 and quit-on-fail is ON"),
    variable("att-epsilon", "@0@ | @_EPSILON_SYMBOL_@", Domain::Text, "epsilon spellings accepted when reading AT&T files"),
    variable("char-encoding", "UTF-8", Domain::Choice(&["UTF-8"]), "character encoding used"),
    variable("encode-weights", "OFF", Domain::Switch, "encode weights when minimizing"),
    variable("flag-is-epsilon", "OFF", Domain::Switch, "treat flag diacritics as epsilons in composition"),
    variable("harmonize-flags", "OFF", Domain::Switch, "harmonize flag diacritics before composition"),
    variable("hopcroft-min", "ON", Domain::Switch, "use Hopcroft's minimization algorithm"),
    variable("lexc-minimize-flags", "OFF", Domain::Switch, "if 'lexc-with-flags' is ON, minimize the number of flags"),
    variable("lexc-rename-flags", "OFF", Domain::Switch, "if 'lexc-minimize-flags' is ON, rename flags"),
    variable("lexc-with-flags", "OFF", Domain::Switch, "use flags to hyperminimize lexicon results"),
    variable("lookup-cycle-cutoff", "5", Domain::Count, "cycles followed by apply on infinitely ambiguous networks"),
    variable("maximum-weight", "OFF", Domain::WeightOrOff, "maximum weight of paths printed by apply"),
    variable("minimal", "ON", Domain::Switch, "minimize networks after operations"),
    variable("name-nets", "OFF", Domain::Switch, "store the name of a network when using 'define'"),
    variable("obey-flags", "ON", Domain::Switch, "obey flag diacritic constraints"),
    variable("precision", "5", Domain::Count, "decimals used when printing weights"),
    variable("print-pairs", "OFF", Domain::Switch, "show both sides of labels when printing words"),
    variable("print-sigma", "OFF", Domain::Switch, "show sigma when printing a network"),
    variable("print-space", "OFF", Domain::Switch, "insert a space between symbols when printing words"),
    variable("print-weight", "OFF", Domain::Switch, "show weights when printing words or networks"),
    variable("print-words-cycle-cutoff", "5", Domain::Count, "cycles followed when printing words of a cyclic network"),
    variable("quit-on-fail", "OFF", Domain::Switch, "quit if a command cannot be executed"),
    variable("random-seed", "ON", Domain::Seed, "seed for random paths, ON for a fresh seed"),
    variable("retokenize", "ON", Domain::Switch, "retokenize regular expressions in 'compile-replace'"),
    variable("show-flags", "OFF", Domain::Switch, "show flag diacritics when printing"),
    variable("verbose", "OFF", Domain::Switch, "print more information"),
    variable("xerox-composition", "ON", Domain::Switch, "treat flag diacritics as ordinary symbols in composition"),
];

/// Deprecated spelling still accepted by `set`.
pub const FLAG_AS_SPECIAL: &str = "compose-flag-as-special";

fn lookup_variable(name: &str) -> Option<&'static Variable> {
    VARIABLES.iter().find(|s| s.name == name)
}

/// Current values of all variables.
#[derive(Debug, Clone)]
pub struct Variables {
    values: BTreeMap<&'static str, String>,
}

impl Default for Variables {
    fn default() -> Self {
        Self {
            values: VARIABLES
                .iter()
                .map(|s| (s.name, s.default.to_string()))
                .collect(),
        }
    }
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Validate and store `value`. Returns the stored, normalized value.
    pub fn set(&mut self, name: &str, value: &str) -> Result<&str, XfstError> {
        let var = lookup_variable(name).ok_or_else(|| XfstError::UnknownVariable(name.to_string()))?;
        let normalized = var.domain.normalize(value.trim()).ok_or_else(|| XfstError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
            expected: var.domain.describe(),
        })?;
        let slot = self.values.entry(var.name).or_default();
        *slot = normalized;
        Ok(slot.as_str())
    }

    /// `true` when a switch is ON. Unknown names read as OFF.
    pub fn is_on(&self, name: &str) -> bool {
        self.get(name) == Some("ON")
    }

    pub fn count(&self, name: &str) -> usize {
        self.get(name).and_then(|v| v.parse().ok()).unwrap_or(0)
    }

    pub fn precision(&self) -> usize {
        self.count("precision")
    }

    pub fn max_weight(&self) -> Option<f32> {
        self.get("maximum-weight").and_then(|v| v.parse().ok())
    }

    /// Numeric seed, or `None` when a fresh seed is wanted.
    pub fn random_seed(&self) -> Option<u64> {
        self.get("random-seed").and_then(|v| v.parse().ok())
    }

    /// Epsilon spellings for AT&T input, split on `|`.
    pub fn att_epsilons(&self) -> Vec<String> {
        self.get("att-epsilon")
            .unwrap_or_default()
            .split('|')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Engine switches derived from the current values.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            minimal: self.is_on("minimal"),
            hopcroft_min: self.is_on("hopcroft-min"),
            encode_weights: self.is_on("encode-weights"),
            harmonize_flags: self.is_on("harmonize-flags"),
            xerox_composition: self.is_on("xerox-composition"),
            flag_is_epsilon: self.is_on("flag-is-epsilon"),
        }
    }

    /// `(name, value, explanation)` in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str, &'static str)> {
        VARIABLES.iter().map(move |s| {
            let value = self.values.get(s.name).map_or(s.default, String::as_str);
            (s.name, value, s.explanation)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let vars = Variables::new();
        assert!(vars.is_on("obey-flags"));
        assert!(!vars.is_on("print-weight"));
        assert_eq!(vars.precision(), 5);
        assert_eq!(vars.max_weight(), None);
        assert_eq!(vars.att_epsilons(), vec!["@0@", "@_EPSILON_SYMBOL_@"]);
    }

    #[test]
    fn switches_normalize() {
        let mut vars = Variables::new();
        assert_eq!(vars.set("print-space", "on").unwrap(), "ON");
        assert!(vars.is_on("print-space"));
        assert!(matches!(
            vars.set("print-space", "maybe"),
            Err(XfstError::InvalidValue { .. })
        ));
        assert!(vars.is_on("print-space"));
    }

    #[test]
    fn random_seed_takes_on_or_an_integer() {
        let mut vars = Variables::new();
        assert_eq!(vars.random_seed(), None);
        assert_eq!(vars.set("random-seed", "42").unwrap(), "42");
        assert_eq!(vars.random_seed(), Some(42));
        assert!(matches!(
            vars.set("random-seed", "banana"),
            Err(XfstError::InvalidValue { .. })
        ));
        assert_eq!(vars.random_seed(), Some(42));
        assert_eq!(vars.set("random-seed", "on").unwrap(), "ON");
        assert_eq!(vars.random_seed(), None);
    }

    #[test]
    fn unknown_variable_is_rejected() {
        let mut vars = Variables::new();
        assert!(matches!(vars.set("no-such", "ON"), Err(XfstError::UnknownVariable(_))));
    }

    #[test]
    fn weights_and_counts() {
        let mut vars = Variables::new();
        vars.set("maximum-weight", "2.5").unwrap();
        assert_eq!(vars.max_weight(), Some(2.5));
        vars.set("maximum-weight", "off").unwrap();
        assert_eq!(vars.max_weight(), None);
        assert!(vars.set("lookup-cycle-cutoff", "-1").is_err());
    }

    #[test]
    fn engine_config_follows_switches() {
        let mut vars = Variables::new();
        vars.set("minimal", "OFF").unwrap();
        vars.set("flag-is-epsilon", "ON").unwrap();
        let cfg = vars.engine_config();
        assert!(!cfg.minimal);
        assert!(cfg.flag_is_epsilon);
        assert!(cfg.hopcroft_min);
    }

    #[test]
    fn table_is_sorted() {
        let names: Vec<&str> = VARIABLES.iter().map(|s| s.name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }
}
