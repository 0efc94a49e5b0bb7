// Path rendering for `apply`, `print words` and the other path listings.

use std::io::{self, Write};

use xfst_fst::Path;
use xfst_fst::flags::{is_flag_diacritic, is_valid_path};
use xfst_fst::symbols::{EPSILON, IDENTITY, UNKNOWN};

use crate::variables::Variables;

/// Printed when a lookup renders nothing.
pub const NO_RESULT: &str = "???";

/// Formatting switches read from the session variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrintOptions {
    pub obey_flags: bool,
    pub show_flags: bool,
    pub print_space: bool,
    pub print_weight: bool,
    pub print_pairs: bool,
    pub precision: usize,
}

impl PrintOptions {
    pub fn from_variables(vars: &Variables) -> Self {
        Self {
            obey_flags: vars.is_on("obey-flags"),
            show_flags: vars.is_on("show-flags"),
            print_space: vars.is_on("print-space"),
            print_weight: vars.is_on("print-weight"),
            print_pairs: vars.is_on("print-pairs"),
            precision: vars.precision(),
        }
    }

    /// How one symbol is shown; empty means not shown at all.
    pub fn render_symbol<'s>(&self, symbol: &'s str) -> &'s str {
        if symbol == EPSILON {
            ""
        } else if symbol == IDENTITY || symbol == UNKNOWN {
            "?"
        } else if is_flag_diacritic(symbol) && !self.show_flags {
            ""
        } else {
            symbol
        }
    }

    pub fn format_weight(&self, weight: f32) -> String {
        format!("{:.*}", self.precision, weight)
    }

    fn join(&self, items: impl Iterator<Item = String>) -> String {
        let mut line = String::new();
        for item in items.filter(|s| !s.is_empty()) {
            if self.print_space && !line.is_empty() {
                line.push(' ');
            }
            line.push_str(&item);
        }
        line
    }

    fn finish(&self, mut line: String, weight: f32) -> String {
        if self.print_weight {
            line.push('\t');
            line.push_str(&self.format_weight(weight));
        }
        line
    }

    /// One side of a path, or `None` when flag filtering rejects it.
    pub fn render_one_level(&self, symbols: &[&str], weight: f32) -> Option<String> {
        if self.obey_flags && !is_valid_path(symbols.iter().copied()) {
            return None;
        }
        let line = self.join(symbols.iter().map(|s| self.render_symbol(s).to_string()));
        Some(self.finish(line, weight))
    }

    /// Both sides of a path as `in:out` pairs, `in` alone where they agree.
    /// Flags are validated on the input side.
    pub fn render_two_level(&self, path: &Path) -> Option<String> {
        if self.obey_flags && !is_valid_path(path.pairs.iter().map(|(i, _)| i.as_str())) {
            return None;
        }
        let line = self.join(path.pairs.iter().map(|(i, o)| {
            let upper = self.render_symbol(i);
            let lower = self.render_symbol(o);
            if lower.is_empty() || upper == lower {
                upper.to_string()
            } else {
                format!("{upper}:{lower}")
            }
        }));
        Some(self.finish(line, path.weight))
    }
}

/// Which side of each path [`write_paths`] shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Input,
    Output,
    /// Pairs when `print-pairs` is ON, the input side otherwise.
    Both,
}

/// Write up to `limit` paths, one per line. Returns whether anything was
/// written.
pub fn write_paths(
    out: &mut dyn Write,
    paths: &[Path],
    side: Side,
    opts: &PrintOptions,
    limit: Option<usize>,
) -> io::Result<bool> {
    let mut written = 0usize;
    for path in paths {
        if limit.is_some_and(|l| written >= l) {
            break;
        }
        let line = match side {
            Side::Both if opts.print_pairs => opts.render_two_level(path),
            Side::Output => opts.render_one_level(&path.output().collect::<Vec<_>>(), path.weight),
            Side::Input | Side::Both => opts.render_one_level(&path.input().collect::<Vec<_>>(), path.weight),
        };
        if let Some(line) = line {
            writeln!(out, "{line}")?;
            written += 1;
        }
    }
    Ok(written > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(pairs: &[(&str, &str)], weight: f32) -> Path {
        Path {
            pairs: pairs.iter().map(|(a, b)| (a.to_string(), b.to_string())).collect(),
            weight,
        }
    }

    fn render(paths: &[Path], side: Side, opts: &PrintOptions) -> String {
        let mut out = Vec::new();
        write_paths(&mut out, paths, side, opts, None).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn flags_hidden_and_epsilon_suppressed() {
        let opts = PrintOptions::default();
        let p = path(&[("c", "c"), ("@P.F.x@", "@P.F.x@"), ("a", EPSILON), ("t", "t")], 0.0);
        assert_eq!(render(&[p.clone()], Side::Input, &opts), "cat\n");
        assert_eq!(render(&[p.clone()], Side::Output, &opts), "ct\n");

        let shown = PrintOptions {
            show_flags: true,
            ..opts
        };
        assert_eq!(render(&[p], Side::Input, &shown), "c@P.F.x@at\n");
    }

    #[test]
    fn spaces_only_between_visible_symbols() {
        let opts = PrintOptions {
            print_space: true,
            ..Default::default()
        };
        let p = path(&[("a", "a"), (EPSILON, EPSILON), ("@C.F@", "@C.F@"), ("b", "b")], 0.0);
        assert_eq!(render(&[p], Side::Input, &opts), "a b\n");
    }

    #[test]
    fn wildcards_render_as_question_mark() {
        let opts = PrintOptions::default();
        let p = path(&[(IDENTITY, IDENTITY), (UNKNOWN, "x")], 0.0);
        assert_eq!(render(&[p], Side::Input, &opts), "??\n");
    }

    #[test]
    fn weights_use_precision() {
        let opts = PrintOptions {
            print_weight: true,
            precision: 2,
            ..Default::default()
        };
        let p = path(&[("a", "a")], 1.5);
        assert_eq!(render(&[p], Side::Input, &opts), "a\t1.50\n");
    }

    #[test]
    fn pairs_show_differing_sides() {
        let opts = PrintOptions {
            print_pairs: true,
            ..Default::default()
        };
        let p = path(&[("c", "c"), ("a", "o"), ("t", EPSILON)], 0.0);
        assert_eq!(render(&[p], Side::Both, &opts), "ca:ot\n");
    }

    #[test]
    fn invalid_flag_paths_are_skipped() {
        let opts = PrintOptions {
            obey_flags: true,
            ..Default::default()
        };
        let bad = path(&[("@P.F.a@", "@P.F.a@"), ("@D.F.a@", "@D.F.a@"), ("x", "x")], 0.0);
        let good = path(&[("@P.F.a@", "@P.F.a@"), ("@R.F.a@", "@R.F.a@"), ("y", "y")], 0.0);
        let mut out = Vec::new();
        assert!(!write_paths(&mut out, &[bad.clone()], Side::Input, &opts, None).unwrap());
        assert!(out.is_empty());
        assert_eq!(render(&[bad, good], Side::Input, &opts), "y\n");
    }

    #[test]
    fn limit_counts_printed_paths() {
        let opts = PrintOptions::default();
        let paths = vec![path(&[("a", "a")], 0.0), path(&[("b", "b")], 0.0)];
        let mut out = Vec::new();
        write_paths(&mut out, &paths, Side::Input, &opts, Some(1)).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a\n");
    }
}
