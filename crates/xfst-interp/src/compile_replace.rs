// compile-replace: spans of one side delimited by `^[` and `^]` are read as
// regular expressions and replaced by the language they denote.
//
// For each state pair joined by a delimited span, the span's symbols on the
// chosen side are compiled into a regex and crossed with the literal
// symbols of the other side. The result is spliced between the two states;
// paths that still carry a marker on the chosen side only are then
// subtracted away.

use tracing::debug;
use xfst_fst::symbols::EPSILON;
use xfst_fst::{EngineConfig, StateId, Transducer};
use xfst_regex::{Environment, NoEnvironment, compile};

use crate::error::XfstError;

pub const OPEN: &str = "^[";
pub const CLOSE: &str = "^]";

/// Stands in for the markers inside a compiled span; becomes epsilon once
/// all spans are spliced.
const EPSILON_MARKER: &str = "@EPSILON_MARKER@";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Upper,
    Lower,
}

impl Level {
    fn side<'a>(self, pair: &'a (String, String)) -> &'a str {
        match self {
            Level::Upper => &pair.0,
            Level::Lower => &pair.1,
        }
    }

    fn other<'a>(self, pair: &'a (String, String)) -> &'a str {
        match self {
            Level::Upper => &pair.1,
            Level::Lower => &pair.0,
        }
    }
}

/// A marker-delimited stretch between two states, markers included.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub start: StateId,
    pub end: StateId,
    pub pairs: Vec<(String, String)>,
}

fn well_formed_regex() -> String {
    let nb = format!("[? - \"{OPEN}\" - \"{CLOSE}\"]*");
    format!("{nb} \"{OPEN}\" {nb} [\"{CLOSE}\" {nb} \"{OPEN}\" {nb}]* \"{CLOSE}\" {nb}")
}

/// Whether every path of `t`'s `level` side that contains a marker pairs
/// its markers properly.
pub fn is_well_formed(t: &Transducer, level: Level, cfg: &EngineConfig) -> Result<bool, XfstError> {
    let mut projection = t.clone();
    match level {
        Level::Upper => projection.project_input(),
        Level::Lower => projection.project_output(),
    };
    let well_formed = compile(&well_formed_regex(), &NoEnvironment, cfg)?;
    let has_marker = compile(&format!("$[\"{OPEN}\" | \"{CLOSE}\"]"), &NoEnvironment, cfg)?;
    projection.subtract(&well_formed)?;
    projection.intersect(&has_marker);
    Ok(projection.is_empty_language())
}

/// Every delimited span on `level`, found by walking forward from each arc
/// that opens one.
pub fn find_spans(t: &Transducer, level: Level) -> Vec<Span> {
    let mut spans = Vec::new();
    for (start, state) in t.states().iter().enumerate() {
        for arc in &state.arcs {
            let pair = (arc.input.clone(), arc.output.clone());
            if level.side(&pair) != OPEN {
                continue;
            }
            walk(t, level, start, arc.target, pair, &mut spans);
        }
    }
    spans
}

/// Follow every simple path from `first` until a closing marker, with an
/// explicit stack of `(state, next arc)` frames. `open` is the pair that
/// entered `first` from `start`.
fn walk(
    t: &Transducer,
    level: Level,
    start: StateId,
    first: StateId,
    open: (String, String),
    spans: &mut Vec<Span>,
) {
    let mut on_path = vec![false; t.state_count()];
    on_path[start] = true;
    if on_path[first] {
        return;
    }
    on_path[first] = true;
    let mut pairs = vec![open];
    let mut stack: Vec<(StateId, usize)> = vec![(first, 0)];

    while let Some(top) = stack.last_mut() {
        let q = top.0;
        let Some(arc) = t.state(q).arcs.get(top.1) else {
            on_path[q] = false;
            stack.pop();
            pairs.pop();
            continue;
        };
        top.1 += 1;
        let pair = (arc.input.clone(), arc.output.clone());
        let symbol = level.side(&pair);
        let (opens, closes) = (symbol == OPEN, symbol == CLOSE);
        if opens {
            continue;
        }
        if closes {
            let mut span = pairs.clone();
            span.push(pair);
            spans.push(Span {
                start,
                end: arc.target,
                pairs: span,
            });
        } else if !on_path[arc.target] {
            on_path[arc.target] = true;
            pairs.push(pair);
            stack.push((arc.target, 0));
        }
    }
}

/// Chosen-side symbols of a span as regex text. Markers become the epsilon
/// placeholder; symbols are joined with spaces unless `retokenize` is on.
fn span_regex(span: &Span, level: Level, retokenize: bool) -> String {
    let mut out = String::new();
    for pair in &span.pairs {
        let symbol = level.side(pair);
        if symbol == EPSILON {
            continue;
        }
        if !retokenize && !out.is_empty() {
            out.push(' ');
        }
        if symbol == OPEN || symbol == CLOSE {
            out.push('"');
            out.push_str(EPSILON_MARKER);
            out.push('"');
        } else {
            out.push_str(symbol);
        }
    }
    if out.is_empty() { "[0]".to_string() } else { out }
}

/// Other-side symbols of a span as a string of quoted literals.
fn span_literal(span: &Span, level: Level) -> String {
    let mut out = String::new();
    for pair in &span.pairs {
        let symbol = level.other(pair);
        if symbol == EPSILON {
            continue;
        }
        out.push('"');
        for c in symbol.chars() {
            if c == '"' || c == '\\' {
                out.push('\\');
            }
            out.push(c);
        }
        out.push_str("\" ");
    }
    if out.is_empty() { "[0]".to_string() } else { out }
}

/// Paths with a marker on `level` paired with something else.
fn one_sided_markers(level: Level) -> String {
    let any = "[?:? | 0:? | ?:0]*";
    let marker = match level {
        Level::Upper => format!("[\"{OPEN}\":? | \"{CLOSE}\":? | \"{OPEN}\":0 | \"{CLOSE}\":0]"),
        Level::Lower => format!("[?:\"{OPEN}\" | ?:\"{CLOSE}\" | 0:\"{OPEN}\" | 0:\"{CLOSE}\"]"),
    };
    format!("{any} {marker} {any}")
}

/// Compile-replace `t` on `level`. Fails without touching `t` on ill-formed
/// markers or a span that does not compile.
pub fn compile_replace(
    t: &Transducer,
    level: Level,
    retokenize: bool,
    env: &dyn Environment,
    cfg: &EngineConfig,
) -> Result<Transducer, XfstError> {
    if !is_well_formed(t, level, cfg)? {
        return Err(XfstError::MalformedInput("Network is not well-formed.".to_string()));
    }

    let spans = find_spans(t, level);
    debug!(spans = spans.len(), ?level, "compile-replace");
    let mut result = t.clone();
    for span in &spans {
        let regex = span_regex(span, level, retokenize);
        let literal = span_literal(span, level);
        let cross = match level {
            Level::Upper => format!("[ {regex} ] .x. [ {literal} ]"),
            Level::Lower => format!("[ {literal} ] .x. [ {regex} ]"),
        };
        let mut replacement = compile(&cross, env, cfg).map_err(|_| {
            XfstError::MalformedInput(format!(
                "Could not compile regular expression in compile-replace: {cross}."
            ))
        })?;
        replacement.minimize(cfg)?;
        result.insert_transducer(span.start, span.end, &replacement);
    }

    let leftovers = compile(&one_sided_markers(level), &NoEnvironment, cfg)?;
    result.subtract(&leftovers)?;
    result.substitute_symbol(EPSILON_MARKER, EPSILON);
    result.prune_alphabet();
    if cfg.minimal {
        result.minimize(cfg)?;
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use xfst_fst::Arc;
    use xfst_fst::paths::ExtractOptions;

    use super::*;

    fn re(text: &str) -> Transducer {
        compile(text, &NoEnvironment, &EngineConfig::default()).unwrap()
    }

    fn words(t: &Transducer) -> Vec<String> {
        let mut found: Vec<String> = t
            .extract_paths(&ExtractOptions::default())
            .unwrap()
            .iter()
            .map(|p| format!("{}/{}", p.input().collect::<String>(), p.output().collect::<String>()))
            .collect();
        found.sort();
        found
    }

    /// Upper `x`, lower `^[ {ab}^2 ^]` spelled one character per symbol.
    fn doubling() -> Transducer {
        re("x:\"^[\" 0:\"{\" 0:a 0:b 0:\"}\" 0:\"^\" 0:2 0:\"^]\"")
    }

    #[test]
    fn well_formedness() {
        let cfg = EngineConfig::default();
        assert!(is_well_formed(&doubling(), Level::Lower, &cfg).unwrap());
        assert!(is_well_formed(&re("a b"), Level::Lower, &cfg).unwrap());
        assert!(!is_well_formed(&re("a \"^[\" b"), Level::Lower, &cfg).unwrap());
        assert!(!is_well_formed(&re("\"^]\" a \"^[\""), Level::Upper, &cfg).unwrap());
    }

    #[test]
    fn spans_are_found() {
        let spans = find_spans(&doubling(), Level::Lower);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].pairs.len(), 8);
        assert_eq!(span_regex(&spans[0], Level::Lower, true), "\"@EPSILON_MARKER@\"{ab}^2\"@EPSILON_MARKER@\"");
        assert_eq!(span_literal(&spans[0], Level::Lower), "\"x\" ");
    }

    #[test]
    fn long_spans_are_walked_without_recursion() {
        let mut symbols = vec![OPEN];
        symbols.extend(std::iter::repeat_n("a", 100_000));
        symbols.push(CLOSE);
        let t = Transducer::from_symbols(&symbols);
        let spans = find_spans(&t, Level::Lower);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].pairs.len(), 100_002);
        assert_eq!((spans[0].start, spans[0].end), (0, 100_001));
    }

    #[test]
    fn lower_side_is_replaced() {
        let cfg = EngineConfig::default();
        let t = compile_replace(&doubling(), Level::Lower, true, &NoEnvironment, &cfg).unwrap();
        assert_eq!(words(&t), vec!["x/abab"]);
    }

    #[test]
    fn replaced_sides_match_the_spliced_span() {
        let cfg = EngineConfig::default();
        let t = compile_replace(&doubling(), Level::Lower, true, &NoEnvironment, &cfg).unwrap();
        let mut upper = t.clone();
        upper.project_input();
        let mut lower = t;
        lower.project_output();
        assert!(upper.equivalent(&re("x")).unwrap());
        assert!(lower.equivalent(&re("a b a b")).unwrap());
    }

    #[test]
    fn result_equals_the_cross_product_spliced_by_hand() {
        let cfg = EngineConfig::default();
        let marked = re("c x:\"^[\" 0:\"{\" 0:a 0:b 0:\"}\" 0:\"^\" 0:2 0:\"^]\" d");
        let replaced = compile_replace(&marked, Level::Lower, true, &NoEnvironment, &cfg).unwrap();

        // `c` into state 1, `d` out of state 2, nothing in between yet.
        let mut expected = Transducer::empty();
        let s1 = expected.add_state();
        let s2 = expected.add_state();
        let s3 = expected.add_state();
        expected.add_arc(0, Arc::new("c", "c", 0.0, s1));
        expected.add_arc(s2, Arc::new("d", "d", 0.0, s3));
        expected.set_final(s3, 0.0);
        let mut cross = re("[ \"x\" ] .x. [ \"@EPSILON_MARKER@\"{ab}^2\"@EPSILON_MARKER@\" ]");
        cross.minimize(&cfg).unwrap();
        expected.insert_transducer(s1, s2, &cross);
        expected.substitute_symbol(EPSILON_MARKER, EPSILON);

        assert!(replaced.equivalent(&expected).unwrap());
        assert_eq!(words(&replaced), vec!["cxd/cababd"]);
    }

    #[test]
    fn retokenize_off_keeps_symbols_apart() {
        let cfg = EngineConfig::default();
        let marked = re("x:\"^[\" 0:a 0:b 0:\"^]\"");
        let outputs = |retokenize: bool| -> Vec<String> {
            let t = compile_replace(&marked, Level::Lower, retokenize, &NoEnvironment, &cfg).unwrap();
            let paths = t.extract_paths(&ExtractOptions::default()).unwrap();
            assert_eq!(paths.len(), 1);
            paths[0].output().map(str::to_string).collect()
        };
        assert_eq!(outputs(true), vec!["ab"]);
        assert_eq!(outputs(false), vec!["a", "b"]);
    }

    #[test]
    fn ill_formed_input_is_rejected() {
        let cfg = EngineConfig::default();
        let t = re("a:\"^[\" b");
        let err = compile_replace(&t, Level::Lower, true, &NoEnvironment, &cfg).unwrap_err();
        assert!(matches!(err, XfstError::MalformedInput(m) if m == "Network is not well-formed."));
    }

    #[test]
    fn unmarked_paths_survive() {
        let cfg = EngineConfig::default();
        let mut t = doubling();
        t.union(&re("c a t"));
        let t = compile_replace(&t, Level::Lower, true, &NoEnvironment, &cfg).unwrap();
        assert_eq!(words(&t), vec!["cat/cat", "x/abab"]);
    }
}
