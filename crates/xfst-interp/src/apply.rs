// `apply up` and `apply down`: run input lines through the top network.

use std::io::Write;

use tracing::debug;
use xfst_fst::paths::LookupOptions;
use xfst_fst::{CompactTransducer, EngineConfig, Path, Tokenizer, Transducer};

use crate::error::XfstError;
use crate::printer::{NO_RESULT, PrintOptions, Side, write_paths};
use crate::stack::Network;
use crate::variables::Variables;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Lower side to upper side.
    Up,
    /// Upper side to lower side.
    Down,
    /// Minimum edit distance lookup; not available.
    Med,
}

enum Lookup {
    Standard {
        net: Transducer,
        opts: LookupOptions,
    },
    Optimized {
        net: CompactTransducer,
        opts: LookupOptions,
    },
}

/// A network prepared for a run of lookups in one direction.
pub struct Applier {
    lookup: Lookup,
    tokenizer: Tokenizer,
    print: PrintOptions,
}

impl Applier {
    /// Prepare `net` for lookups. Warnings go to `err`.
    pub fn new(
        net: &Network,
        direction: Direction,
        vars: &Variables,
        cfg: &EngineConfig,
        err: &mut dyn Write,
    ) -> Result<Self, XfstError> {
        let verbose = vars.is_on("verbose");
        let cutoff = vars.count("lookup-cycle-cutoff");
        let max_weight = vars.max_weight();
        let print = PrintOptions::from_variables(vars);

        let standard = match (direction, net) {
            (Direction::Med, _) => {
                return Err(XfstError::EngineOperationUnsupported("Missing apply med".to_string()));
            }
            (Direction::Down, Network::Optimized(compact)) => {
                let cycles = if compact.is_infinitely_ambiguous() {
                    if verbose {
                        writeln!(
                            err,
                            "warning: transducer is infinitely ambiguous, limiting number of cycles to {cutoff}"
                        )?;
                    }
                    Some(cutoff)
                } else {
                    None
                };
                let tokenizer = Tokenizer::with_symbols(compact.alphabet().iter().map(String::as_str));
                return Ok(Self {
                    lookup: Lookup::Optimized {
                        net: compact.clone(),
                        opts: LookupOptions {
                            cycles,
                            max_weight,
                            obey_flags: print.obey_flags,
                        },
                    },
                    tokenizer,
                    print,
                });
            }
            (Direction::Down, Network::Standard(t)) => t.clone(),
            (Direction::Up, net) => {
                if verbose {
                    writeln!(
                        err,
                        "warning: apply up not implemented, inverting transducer and performing apply down"
                    )?;
                    writeln!(
                        err,
                        "for faster performance, invert and minimize top network and do apply down instead"
                    )?;
                }
                let mut t = net.to_standard();
                t.invert();
                t.minimize(cfg)?;
                t
            }
        };

        let cycles = if standard.is_infinitely_ambiguous() {
            if verbose {
                writeln!(
                    err,
                    "warning: lookup is infinitely ambiguous, limiting the number of cycles to {cutoff}"
                )?;
            }
            Some(cutoff)
        } else {
            None
        };
        debug!(?direction, ?cycles, states = standard.state_count(), "prepared lookup");
        let tokenizer = Tokenizer::with_symbols(standard.input_symbols().iter().map(String::as_str));
        Ok(Self {
            lookup: Lookup::Standard {
                net: standard,
                opts: LookupOptions {
                    cycles,
                    max_weight,
                    obey_flags: print.obey_flags,
                },
            },
            tokenizer,
            print,
        })
    }

    /// All results for one input line.
    pub fn lookup(&self, line: &str) -> Vec<Path> {
        let input = self.tokenizer.tokenize(line);
        match &self.lookup {
            Lookup::Standard { net, opts } => net.lookup(&input, opts),
            Lookup::Optimized { net, opts } => net.lookup(&input, opts),
        }
    }

    /// Print the output side of every result for `line`, or both sides when
    /// `print-pairs` is ON. Prints [`NO_RESULT`] when nothing matched.
    pub fn apply(&self, line: &str, out: &mut dyn Write) -> Result<(), XfstError> {
        let results = self.lookup(line);
        let side = if self.print.print_pairs { Side::Both } else { Side::Output };
        if !write_paths(out, &results, side, &self.print, None)? {
            writeln!(out, "{NO_RESULT}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(net: &Network, direction: Direction, vars: &Variables, line: &str) -> String {
        let mut err = Vec::new();
        let applier = Applier::new(net, direction, vars, &EngineConfig::default(), &mut err).unwrap();
        let mut out = Vec::new();
        applier.apply(line, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn mapping() -> Transducer {
        let mut t = Transducer::from_pairs([("c", "k"), ("a", "a"), ("t", "t")]);
        t.union(&Transducer::from_pairs([("d", "d"), ("o", "o"), ("g", "g")]));
        t
    }

    #[test]
    fn down_and_up() {
        let net = Network::Standard(mapping());
        let vars = Variables::new();
        assert_eq!(run(&net, Direction::Down, &vars, "cat"), "kat\n");
        assert_eq!(run(&net, Direction::Up, &vars, "kat"), "cat\n");
        assert_eq!(run(&net, Direction::Down, &vars, "cow"), "???\n");
    }

    #[test]
    fn optimized_network_gives_same_results() {
        let compact = CompactTransducer::from_transducer(&mapping()).unwrap();
        let net = Network::Optimized(compact);
        let vars = Variables::new();
        assert_eq!(run(&net, Direction::Down, &vars, "dog"), "dog\n");
    }

    #[test]
    fn med_is_not_available() {
        let net = Network::Standard(mapping());
        let mut err = Vec::new();
        let result = Applier::new(&net, Direction::Med, &Variables::new(), &EngineConfig::default(), &mut err);
        assert!(matches!(result, Err(XfstError::EngineOperationUnsupported(m)) if m == "Missing apply med"));
    }

    #[test]
    fn input_epsilon_loop_is_cut_off() {
        // a:b followed by a loop producing x from nothing.
        let mut t = Transducer::from_pair("a", "b");
        t.add_arc(1, xfst_fst::Arc::new(xfst_fst::symbols::EPSILON, "x", 0.0, 1));
        let net = Network::Standard(t);
        let mut vars = Variables::new();
        vars.set("verbose", "ON").unwrap();
        vars.set("lookup-cycle-cutoff", "2").unwrap();
        let mut err = Vec::new();
        let applier = Applier::new(&net, Direction::Down, &vars, &EngineConfig::default(), &mut err).unwrap();
        let warning = String::from_utf8(err).unwrap();
        assert!(warning.contains("limiting the number of cycles to 2"));
        let results = applier.lookup("a");
        assert!(!results.is_empty());
        assert!(results.len() <= 3);
    }

    #[test]
    fn print_pairs_shows_both_sides() {
        let net = Network::Standard(Transducer::from_pairs([("c", "c"), ("a", "o"), ("t", "t")]));
        let mut vars = Variables::new();
        assert_eq!(run(&net, Direction::Down, &vars, "cat"), "cot\n");
        vars.set("print-pairs", "ON").unwrap();
        assert_eq!(run(&net, Direction::Down, &vars, "cat"), "ca:ot\n");
    }

    #[test]
    fn unobeyed_flags_pass_on_both_forms() {
        let t = Transducer::from_pairs([("@P.F.a@", "@P.F.a@"), ("@D.F.a@", "@D.F.a@"), ("x", "x")]);
        let compact = CompactTransducer::from_transducer(&t).unwrap();
        let standard = Network::Standard(t);
        let optimized = Network::Optimized(compact);
        let mut vars = Variables::new();
        assert_eq!(run(&standard, Direction::Down, &vars, "x"), "???\n");
        assert_eq!(run(&optimized, Direction::Down, &vars, "x"), "???\n");
        vars.set("obey-flags", "OFF").unwrap();
        assert_eq!(run(&standard, Direction::Down, &vars, "x"), "x\n");
        assert_eq!(run(&optimized, Direction::Down, &vars, "x"), "x\n");
    }

    #[test]
    fn long_epsilon_output_survives_optimization() {
        let mut pairs = vec![("a".to_string(), "x".to_string())];
        pairs.extend((0..80).map(|_| (xfst_fst::symbols::EPSILON.to_string(), "y".to_string())));
        let t = Transducer::from_pairs(pairs.iter().map(|(i, o)| (i.as_str(), o.as_str())));
        let expected = format!("x{}\n", "y".repeat(80));
        let vars = Variables::new();
        assert_eq!(run(&Network::Standard(t.clone()), Direction::Down, &vars, "a"), expected);
        let compact = CompactTransducer::from_transducer(&t).unwrap();
        assert_eq!(run(&Network::Optimized(compact), Direction::Down, &vars, "a"), expected);
    }

    #[test]
    fn maximum_weight_prunes() {
        let mut light = Transducer::from_pair("a", "b");
        light.set_final(1, 1.0);
        let mut heavy = Transducer::from_pair("a", "c");
        heavy.set_final(1, 5.0);
        light.union(&heavy);
        let net = Network::Standard(light);
        let mut vars = Variables::new();
        vars.set("maximum-weight", "2").unwrap();
        assert_eq!(run(&net, Direction::Down, &vars, "a"), "b\n");
    }
}
