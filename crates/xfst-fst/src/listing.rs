// Human-readable listings: the sigma summary and the state-by-state net
// listing used by `print net`.
//
//   Ss0:	a -> s1, <b:0> -> fs2.
//   s1:	c -> fs2.
//   fs2:	(no arcs)
//
// `S` marks the start state and `f` final states.

use crate::symbols::{EPSILON, IDENTITY, UNKNOWN};
use crate::transducer::Transducer;

fn show(symbol: &str) -> &str {
    match symbol {
        EPSILON => "0",
        IDENTITY | UNKNOWN => "?",
        "?" => "\"?\"",
        "0" => "%0",
        s => s,
    }
}

/// `Sigma: ...` and `Size: N.` lines. A leading `?` means unknown or
/// identity occurs on some arc.
pub fn write_sigma(t: &Transducer) -> String {
    let (unknown, identity) = t.uses_wildcards();
    let mut items: Vec<&str> = Vec::new();
    if unknown || identity {
        items.push("?");
    }
    let symbols: Vec<&str> = t.alphabet().iter().map(|s| show(s)).collect();
    let size = symbols.len();
    items.extend(symbols);
    format!("Sigma: {}\nSize: {size}.\n", items.join(", "))
}

fn state_name(t: &Transducer, q: usize) -> String {
    let mut name = String::new();
    if q == 0 {
        name.push('S');
    }
    if t.is_final(q) {
        name.push('f');
    }
    name.push_str(&format!("s{q}"));
    name
}

/// Per-state listing. Weights are appended as `/w` when `weighted`.
pub fn write_listing(t: &Transducer, precision: usize, weighted: bool) -> String {
    let mut t = t.clone();
    let keep = vec![true; t.states.len()];
    t.retain_states(&keep);

    let mut out = String::new();
    for (q, state) in t.states.iter().enumerate() {
        out.push_str(&state_name(&t, q));
        if let (true, Some(w)) = (weighted, state.final_weight) {
            out.push_str(&format!("/{:.*}", precision, w));
        }
        out.push_str(":\t");
        if state.arcs.is_empty() {
            out.push_str("(no arcs)\n");
            continue;
        }
        let arcs: Vec<String> = state
            .arcs
            .iter()
            .map(|arc| {
                let mut label = if arc.input == arc.output && arc.input != UNKNOWN {
                    show(&arc.input).to_string()
                } else {
                    format!("<{}:{}>", show(&arc.input), show(&arc.output))
                };
                if weighted {
                    label.push_str(&format!("/{:.*}", precision, arc.weight));
                }
                format!("{label} -> {}", state_name(&t, arc.target))
            })
            .collect();
        out.push_str(&arcs.join(", "));
        out.push_str(".\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigma_lists_alphabet() {
        let t = Transducer::from_symbols(["b", "a"]);
        assert_eq!(write_sigma(&t), "Sigma: a, b\nSize: 2.\n");
    }

    #[test]
    fn sigma_marks_wildcards() {
        let mut t = Transducer::from_symbol(IDENTITY);
        t.add_symbol("?");
        assert_eq!(write_sigma(&t), "Sigma: ?, \"?\"\nSize: 1.\n");
    }

    #[test]
    fn empty_sigma() {
        assert_eq!(write_sigma(&Transducer::empty()), "Sigma: \nSize: 0.\n");
    }

    #[test]
    fn listing_marks_start_and_finals() {
        let t = Transducer::from_pairs([("a", "a"), ("b", EPSILON)]);
        assert_eq!(
            write_listing(&t, 3, false),
            "Ss0:\ta -> s1.\ns1:\t<b:0> -> fs2.\nfs2:\t(no arcs)\n"
        );
    }

    #[test]
    fn listing_with_weights() {
        let mut t = Transducer::from_symbol("a");
        t.set_final(1, 0.5);
        t.set_final(0, 0.0);
        assert_eq!(
            write_listing(&t, 1, true),
            "Sfs0/0.0:\ta/0.0 -> fs1.\nfs1/0.5:\t(no arcs)\n"
        );
    }
}
