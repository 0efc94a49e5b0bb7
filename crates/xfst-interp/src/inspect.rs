// `print ...` and `test ...`: read-only views of the stack, the name table
// and the top network.

use std::collections::BTreeMap;

use xfst_fst::paths::ExtractOptions;
use xfst_fst::symbols::{EPSILON, IDENTITY, UNKNOWN, is_special};
use xfst_fst::{FstError, Path, Transducer, listing};

use crate::command::{PrintTarget, TestKind};
use crate::error::XfstError;
use crate::printer::{PrintOptions, Side, write_paths};
use crate::session::{Io, Session};

/// Paths printed by `print random-*` when no count is given.
const RANDOM_WORDS: usize = 15;

fn display_symbol(symbol: &str) -> &str {
    match symbol {
        EPSILON => "0",
        IDENTITY | UNKNOWN => "?",
        _ => symbol,
    }
}

fn display_label(input: &str, output: &str) -> String {
    if input == output {
        display_symbol(input).to_string()
    } else {
        format!("{}:{}", display_symbol(input), display_symbol(output))
    }
}

/// The side of `t` that `side` asks for, as an automaton.
fn projection(t: &Transducer, side: Side, minimize: bool, cfg: &xfst_fst::EngineConfig) -> Result<Transducer, XfstError> {
    let mut t = t.clone();
    match side {
        Side::Input => {
            t.project_input();
        }
        Side::Output => {
            t.project_output();
        }
        Side::Both => return Ok(t),
    }
    if minimize {
        t.minimize(cfg)?;
    }
    Ok(t)
}

/// The longest path of one side, or `None` inside `Ok` when the side is
/// empty. `Err(true)` marks a cyclic side.
fn longest_of_side(t: &Transducer, side: Side) -> Result<Result<Option<Path>, bool>, XfstError> {
    let mut t = t.clone();
    match side {
        Side::Output => t.project_output(),
        _ => t.project_input(),
    };
    t.remove_epsilons();
    match t.longest_path() {
        Ok(path) => Ok(Ok(path)),
        Err(FstError::Cyclic) => Ok(Err(true)),
        Err(e) => Err(e.into()),
    }
}

impl Session {
    pub(crate) fn print(&mut self, target: PrintTarget, io: &mut Io<'_>) -> Result<(), XfstError> {
        let opts = PrintOptions::from_variables(&self.variables);
        match target {
            PrintTarget::Words { side, count } => self.print_words(side, count, &opts, io),
            PrintTarget::RandomWords { side, count } => {
                let cfg = self.engine_config();
                let t = projection(self.stack.top_standard()?, side, false, &cfg)?;
                let paths = t.random_paths(count.unwrap_or(RANDOM_WORDS), &mut self.rng);
                write_paths(io.out, &paths, side, &opts, None)?;
                Ok(())
            }
            PrintTarget::ShortestString => self.print_shortest(false, &opts, io),
            PrintTarget::ShortestStringSize => self.print_shortest(true, &opts, io),
            PrintTarget::LongestString => self.print_longest(false, &opts, io),
            PrintTarget::LongestStringSize => self.print_longest(true, &opts, io),
            PrintTarget::Net => {
                let t = self.stack.top_standard()?;
                if self.variables.is_on("print-sigma") {
                    write!(io.out, "{}", listing::write_sigma(t))?;
                }
                write!(
                    io.out,
                    "{}",
                    listing::write_listing(t, opts.precision, opts.print_weight)
                )?;
                Ok(())
            }
            PrintTarget::Sigma => {
                write!(io.out, "{}", listing::write_sigma(self.stack.top_standard()?))?;
                Ok(())
            }
            PrintTarget::Labels => {
                let labels: Vec<String> = self
                    .stack
                    .top_standard()?
                    .labels()
                    .iter()
                    .map(|(i, o)| display_label(i, o))
                    .collect();
                writeln!(io.out, "Labels: {}", labels.join(", "))?;
                writeln!(io.out, "Size: {}", labels.len())?;
                Ok(())
            }
            PrintTarget::LabelCount => {
                let mut counts: BTreeMap<(&str, &str), usize> = BTreeMap::new();
                let t = self.stack.top_standard()?;
                for (_, arc) in t.arcs() {
                    *counts.entry(arc.label()).or_default() += 1;
                }
                let items: Vec<String> = counts
                    .iter()
                    .enumerate()
                    .map(|(k, ((i, o), n))| format!("{}. {} {n}", k + 1, display_label(i, o)))
                    .collect();
                writeln!(io.out, "{}", items.join("   "))?;
                Ok(())
            }
            PrintTarget::Stack => {
                for (k, net) in self.stack.iter().enumerate() {
                    writeln!(io.out, "{k:>10}: {}", Session::size_line(net))?;
                }
                Ok(())
            }
            PrintTarget::Size => {
                let top = self.stack.top()?;
                match top.name() {
                    Some(name) => writeln!(io.out, "{name:>10}: {}", Session::size_line(top))?,
                    None => writeln!(io.out, "{}", Session::size_line(top))?,
                }
                Ok(())
            }
            PrintTarget::Defined => {
                let mut any = false;
                for (name, _, source) in self.names.definitions() {
                    any = true;
                    writeln!(io.out, "{name:>10} {source}")?;
                }
                if !any {
                    writeln!(io.out, "No defined symbols.")?;
                }
                let mut any = false;
                for (name, arity, display) in self.names.functions() {
                    any = true;
                    writeln!(io.out, "{:>10} {display}", format!("{name}@{arity})"))?;
                }
                if !any {
                    writeln!(io.out, "No function definitions.")?;
                }
                Ok(())
            }
            PrintTarget::Lists => {
                let mut any = false;
                for (name, members) in self.names.lists() {
                    any = true;
                    let members: Vec<&str> = members.iter().map(String::as_str).collect();
                    writeln!(io.out, "{name:>10}: {}", members.join(" "))?;
                }
                if !any {
                    writeln!(io.out, "No lists defined.")?;
                }
                Ok(())
            }
            PrintTarget::List(name) => {
                match xfst_regex::Environment::list(&self.names, &name) {
                    Some(members) => {
                        let members: Vec<&str> = members.iter().map(String::as_str).collect();
                        writeln!(io.out, "{name:>10}: {}", members.join(" "))?;
                    }
                    None => writeln!(io.out, "No such list defined: {name}")?,
                }
                Ok(())
            }
            PrintTarget::Name => {
                match self.stack.top()?.name() {
                    Some(name) => writeln!(io.out, "Name {name}")?,
                    None => writeln!(io.out, "No name.")?,
                }
                Ok(())
            }
            PrintTarget::Flags => {
                let flags = self.stack.top_standard()?.flag_diacritics();
                if flags.is_empty() {
                    writeln!(io.out, "No flag diacritics.")?;
                }
                for flag in flags {
                    writeln!(io.out, "{flag}")?;
                }
                Ok(())
            }
            PrintTarget::Aliases => {
                for (name, body) in self.names.aliases() {
                    writeln!(io.out, "alias {name} {body}")?;
                }
                Ok(())
            }
        }
    }

    fn print_words(
        &mut self,
        side: Side,
        count: Option<usize>,
        opts: &PrintOptions,
        io: &mut Io<'_>,
    ) -> Result<(), XfstError> {
        let cfg = self.engine_config();
        let t = projection(self.stack.top_standard()?, side, true, &cfg)?;
        let cycles = if t.is_cyclic() {
            let cutoff = self.variables.count("print-words-cycle-cutoff");
            writeln!(
                io.err,
                "warning: transducer is cyclic, limiting the number of cycles to {cutoff}"
            )?;
            Some(cutoff)
        } else {
            None
        };
        let paths = t.extract_paths(&ExtractOptions {
            max_paths: None,
            cycles,
            obey_flags: opts.obey_flags,
        })?;
        write_paths(io.out, &paths, side, opts, count)?;
        Ok(())
    }

    fn print_shortest(&self, size: bool, opts: &PrintOptions, io: &mut Io<'_>) -> Result<(), XfstError> {
        match self.stack.top_standard()?.shortest_path() {
            None => writeln!(io.out, "transducer is empty")?,
            Some(path) if size => writeln!(io.out, "{}", path.pairs.len())?,
            Some(path) => {
                write_paths(io.out, &[path], Side::Both, opts, None)?;
            }
        }
        Ok(())
    }

    fn print_longest(&self, size: bool, opts: &PrintOptions, io: &mut Io<'_>) -> Result<(), XfstError> {
        let t = self.stack.top_standard()?;
        let upper = longest_of_side(t, Side::Input)?;
        let lower = longest_of_side(t, Side::Output)?;

        if upper.is_err() && lower.is_err() {
            writeln!(io.out, "transducer is cyclic")?;
            return Ok(());
        }
        if matches!(upper, Ok(None)) || matches!(lower, Ok(None)) {
            writeln!(io.out, "transducer is empty")?;
            return Ok(());
        }
        if !opts.show_flags && t.has_flag_diacritics() {
            writeln!(
                io.err,
                "warning: longest string may have flag diacritics that are not shown"
            )?;
            writeln!(
                io.err,
                "         but are used in calculating its length (use 'eliminate flags')"
            )?;
        }
        for (level, found) in [("Upper", upper), ("Lower", lower)] {
            match found {
                Err(_) => writeln!(io.out, "{level} level is cyclic.")?,
                Ok(Some(path)) if size => writeln!(io.out, "{level}: {}", path.pairs.len())?,
                Ok(Some(path)) => {
                    let symbols: Vec<&str> = path.input().collect();
                    let line = opts.render_one_level(&symbols, path.weight).unwrap_or_default();
                    writeln!(io.out, "{level}: {line}")?;
                }
                Ok(None) => {}
            }
        }
        Ok(())
    }

    pub(crate) fn test(&mut self, kind: TestKind, assert: bool, io: &mut Io<'_>) -> Result<(), XfstError> {
        let value = self.evaluate_test(kind)?;
        writeln!(io.out, "{}, (1 = TRUE, 0 = FALSE)", u8::from(value))?;
        self.check_assertion(value, assert);
        Ok(())
    }

    fn evaluate_test(&self, kind: TestKind) -> Result<bool, XfstError> {
        let cfg = self.engine_config();
        match kind {
            TestKind::Equivalent => {
                self.stack.require(2)?;
                let mut nets = self.stack.iter();
                let (Some(first), Some(second)) = (nets.next(), nets.next()) else {
                    return Err(XfstError::StackUnderflow { needed: 2 });
                };
                Ok(first.as_standard()?.equivalent(second.as_standard()?)?)
            }
            TestKind::Identity => {
                let t = self.stack.top_standard()?;
                let identity = projection(t, Side::Input, false, &cfg)?;
                Ok(identity.equivalent(t)?)
            }
            TestKind::UpperBounded | TestKind::LowerBounded => {
                let side = if kind == TestKind::UpperBounded { Side::Input } else { Side::Output };
                let mut t = projection(self.stack.top_standard()?, side, false, &cfg)?;
                t.remove_epsilons();
                Ok(!t.is_cyclic())
            }
            TestKind::UpperUniversal | TestKind::LowerUniversal => {
                let side = if kind == TestKind::UpperUniversal { Side::Input } else { Side::Output };
                let t = projection(self.stack.top_standard()?, side, false, &cfg)?;
                let universe = Transducer::universal(t.alphabet().iter().filter(|s| !is_special(s)));
                Ok(universe.equivalent(&t)?)
            }
            TestKind::Null => Ok(self.stack.top_standard()?.is_empty_language()),
            TestKind::NonNull => Ok(!self.stack.top_standard()?.is_empty_language()),
            TestKind::Overlap => {
                self.stack.require(2)?;
                let mut nets = self.stack.iter();
                let mut common = match nets.next() {
                    Some(net) => net.as_standard()?.clone(),
                    None => return Err(XfstError::StackUnderflow { needed: 2 }),
                };
                for net in nets {
                    common.intersect(net.as_standard()?);
                    if common.is_empty_language() {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            TestKind::Sublanguage => {
                self.stack.require(2)?;
                let nets = self
                    .stack
                    .iter()
                    .map(|n| n.as_standard())
                    .collect::<Result<Vec<_>, _>>()?;
                for pair in nets.windows(2) {
                    let mut both = pair[0].clone();
                    both.intersect(pair[1]);
                    if !both.equivalent(pair[0])? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            TestKind::InfinitelyAmbiguous => Ok(self.stack.top_standard()?.is_infinitely_ambiguous()),
            TestKind::Functional => {
                let t = self.stack.top_standard()?;
                let mut round_trip = t.clone();
                round_trip.invert();
                round_trip.compose(t, &cfg)?;
                let range = projection(t, Side::Output, false, &cfg)?;
                Ok(round_trip.equivalent(&range)?)
            }
        }
    }
}
