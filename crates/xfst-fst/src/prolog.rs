// Prolog fact format:
//
//   network(NAME).
//   symbol(NAME, "x").
//   arc(NAME, 0, 1, "a":"b").
//   arc(NAME, 1, 2, "c", 0.5).
//   final(NAME, 2).
//
// Epsilon is written as "0", a literal zero as "%0". Identity is "?" and
// unknown:unknown is "?":"?".

use crate::symbols::{EPSILON, IDENTITY, UNKNOWN};
use crate::transducer::{Arc, Transducer};
use crate::FstError;

const DEFAULT_NAME: &str = "NO_NAME";

fn quote(symbol: &str) -> String {
    let body = match symbol {
        EPSILON => "0".to_string(),
        "0" => "%0".to_string(),
        IDENTITY | UNKNOWN => "?".to_string(),
        s => s.replace('\\', "\\\\").replace('"', "\\\""),
    };
    format!("\"{body}\"")
}

fn label(input: &str, output: &str) -> String {
    if input == output && input != UNKNOWN {
        quote(input)
    } else {
        format!("{}:{}", quote(input), quote(output))
    }
}

/// Render one transducer as prolog facts.
pub fn write_prolog(t: &Transducer, precision: usize, weighted: bool) -> String {
    let mut t = t.clone();
    let keep = vec![true; t.states.len()];
    t.retain_states(&keep);
    let name = t.name.clone().unwrap_or_else(|| DEFAULT_NAME.to_string());
    let mut out = format!("network({name}).\n");
    let on_arcs: std::collections::BTreeSet<&str> = t
        .arcs()
        .flat_map(|(_, a)| [a.input.as_str(), a.output.as_str()])
        .collect();
    for s in t.alphabet.iter().filter(|s| !on_arcs.contains(s.as_str())) {
        out.push_str(&format!("symbol({name}, {}).\n", quote(s)));
    }
    for (q, state) in t.states.iter().enumerate() {
        for arc in &state.arcs {
            out.push_str(&format!("arc({name}, {q}, {}, {}", arc.target, label(&arc.input, &arc.output)));
            if weighted {
                out.push_str(&format!(", {:.*}", precision, arc.weight));
            }
            out.push_str(").\n");
        }
    }
    for (q, state) in t.states.iter().enumerate() {
        if let Some(w) = state.final_weight {
            if weighted {
                out.push_str(&format!("final({name}, {q}, {:.*}).\n", precision, w));
            } else {
                out.push_str(&format!("final({name}, {q}).\n"));
            }
        }
    }
    out
}

/// Split the argument list of a fact, respecting quoted strings.
fn split_args(args: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    let mut escaped = false;
    for c in args.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quote => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                in_quote = !in_quote;
                current.push(c);
            }
            ',' if !in_quote => out.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    out.push(current.trim().to_string());
    out
}

/// Parse one quoted symbol. `wildcard` is what a bare `?` stands for.
fn unquote(field: &str, wildcard: &str) -> Option<String> {
    let inner = field.strip_prefix('"')?.strip_suffix('"')?;
    Some(match inner {
        "0" => EPSILON.to_string(),
        "%0" => "0".to_string(),
        "?" => wildcard.to_string(),
        s => s.replace("\\\"", "\"").replace("\\\\", "\\"),
    })
}

/// Split `"a":"b"` into its two quoted halves.
fn split_label(field: &str) -> Option<(String, String)> {
    let mut in_quote = false;
    let mut escaped = false;
    for (i, c) in field.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quote => escaped = true,
            '"' => in_quote = !in_quote,
            ':' if !in_quote => {
                let input = unquote(&field[..i], UNKNOWN)?;
                let output = unquote(&field[i + 1..], UNKNOWN)?;
                return Some((input, output));
            }
            _ => {}
        }
    }
    let s = unquote(field, IDENTITY)?;
    Some((s.clone(), s))
}

/// Parse every network in `text`.
pub fn read_prolog(text: &str) -> Result<Vec<Transducer>, FstError> {
    let mut nets: Vec<Transducer> = Vec::new();
    let mut current: Option<Transducer> = None;
    for (n, raw) in text.lines().enumerate() {
        let line = n + 1;
        let raw = raw.trim();
        if raw.is_empty() || raw.starts_with('%') {
            continue;
        }
        let err = |message: &str| FstError::Parse {
            line,
            message: message.to_string(),
        };
        let body = raw
            .strip_suffix(").")
            .ok_or_else(|| err("fact must end with ')."))?;
        let (head, args) = body.split_once('(').ok_or_else(|| err("missing '('"))?;
        let args = split_args(args);
        match head {
            "network" => {
                if let Some(t) = current.take() {
                    nets.push(t);
                }
                let mut t = Transducer::empty();
                if args[0] != DEFAULT_NAME {
                    t.set_name(args[0].as_str());
                }
                current = Some(t);
            }
            "symbol" | "arc" | "final" => {
                let t = current.as_mut().ok_or_else(|| err("fact before network(...)"))?;
                let number = |s: &str| -> Result<usize, FstError> {
                    s.parse().map_err(|_| err(&format!("invalid state number '{s}'")))
                };
                let weight = |s: Option<&String>| -> Result<f32, FstError> {
                    match s {
                        Some(s) => s.parse().map_err(|_| err(&format!("invalid weight '{s}'"))),
                        None => Ok(0.0),
                    }
                };
                match head {
                    "symbol" => {
                        let s = args.get(1).and_then(|f| unquote(f, IDENTITY)).ok_or_else(|| err("bad symbol"))?;
                        t.add_symbol(&s);
                    }
                    "arc" => {
                        if args.len() < 4 {
                            return Err(err("arc needs source, target and label"));
                        }
                        let src = number(&args[1])?;
                        let dst = number(&args[2])?;
                        let (input, output) = split_label(&args[3]).ok_or_else(|| err("bad label"))?;
                        let w = weight(args.get(4))?;
                        while t.state_count() <= src.max(dst) {
                            t.add_state();
                        }
                        t.add_arc(src, Arc::new(input, output, w, dst));
                    }
                    _ => {
                        let q = number(args.get(1).map(String::as_str).unwrap_or(""))?;
                        let w = weight(args.get(2))?;
                        while t.state_count() <= q {
                            t.add_state();
                        }
                        t.set_final(q, w);
                    }
                }
            }
            other => return Err(err(&format!("unknown fact '{other}'"))),
        }
    }
    if let Some(t) = current {
        nets.push(t);
    }
    Ok(nets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_facts() {
        let mut t = Transducer::from_pairs([("a", "b"), ("c", "c")]);
        t.set_name("TEST");
        let text = write_prolog(&t, 5, false);
        assert_eq!(
            text,
            "network(TEST).\narc(TEST, 0, 1, \"a\":\"b\").\narc(TEST, 1, 2, \"c\").\nfinal(TEST, 2).\n"
        );
    }

    #[test]
    fn special_symbols() {
        let t = Transducer::from_pairs([(EPSILON, "0"), (IDENTITY, IDENTITY), (UNKNOWN, UNKNOWN)]);
        let text = write_prolog(&t, 5, false);
        assert!(text.contains("\"0\":\"%0\""));
        assert!(text.contains("arc(NO_NAME, 1, 2, \"?\")"));
        assert!(text.contains("\"?\":\"?\""));
        let back = read_prolog(&text).unwrap();
        let arcs: Vec<(String, String)> = back[0]
            .arcs()
            .map(|(_, a)| (a.input.clone(), a.output.clone()))
            .collect();
        assert!(arcs.contains(&(EPSILON.to_string(), "0".to_string())));
        assert!(arcs.contains(&(IDENTITY.to_string(), IDENTITY.to_string())));
        assert!(arcs.contains(&(UNKNOWN.to_string(), UNKNOWN.to_string())));
    }

    #[test]
    fn round_trip_weights_and_symbols() {
        let mut t = Transducer::from_symbols(["x"]);
        t.set_final(1, 0.25);
        t.add_symbol("unused");
        let back = &read_prolog(&write_prolog(&t, 5, true)).unwrap()[0];
        assert!(back.alphabet().contains("unused"));
        assert_eq!(back.state(1).final_weight, Some(0.25));
    }

    #[test]
    fn quoted_comma_and_colon() {
        let t = Transducer::from_pairs([(",", ":")]);
        let back = &read_prolog(&write_prolog(&t, 5, false)).unwrap()[0];
        assert_eq!(back.state(0).arcs[0].label(), (",", ":"));
    }

    #[test]
    fn several_networks() {
        let text = "network(A).\nfinal(A, 0).\n\nnetwork(B).\narc(B, 0, 1, \"b\").\nfinal(B, 1).\n";
        let nets = read_prolog(text).unwrap();
        assert_eq!(nets.len(), 2);
        assert_eq!(nets[0].name(), Some("A"));
        assert_eq!(nets[1].arc_count(), 1);
    }

    #[test]
    fn malformed_fact() {
        let err = read_prolog("network(A).\narc(A, 0, 1\n").unwrap_err();
        assert!(matches!(err, FstError::Parse { line: 2, .. }));
    }
}
