// Graphviz rendering. Arcs between the same pair of states share one edge
// whose label lists every symbol pair.

use std::collections::BTreeMap;

use crate::symbols::{EPSILON, IDENTITY, UNKNOWN};
use crate::transducer::Transducer;

fn display_symbol(symbol: &str) -> String {
    match symbol {
        EPSILON => "@0@".to_string(),
        IDENTITY => "@_IDENTITY_@".to_string(),
        UNKNOWN => "?".to_string(),
        s => s.replace('\\', "\\\\").replace('"', "\\\""),
    }
}

/// Render `t` as a Graphviz digraph.
pub fn write_dot(t: &Transducer, precision: usize, weighted: bool) -> String {
    let mut t = t.clone();
    let keep = vec![true; t.states.len()];
    t.retain_states(&keep);

    let name = t.name.as_deref().unwrap_or("");
    let mut out = String::new();
    out.push_str(&format!("digraph \"{}\" {{\n", display_symbol(name)));
    out.push_str("charset = UTF8;\n");
    out.push_str("rankdir = LR;\n");
    out.push_str("node [shape=circle,style=filled,fillcolor=yellow]\n");

    for (q, state) in t.states.iter().enumerate() {
        let mut label = format!("q{q}");
        if let (true, Some(w)) = (weighted, state.final_weight) {
            label.push_str(&format!("/{:.*}", precision, w));
        }
        let mut attrs = vec![format!("label=\"{label}\"")];
        if state.final_weight.is_some() {
            attrs.push("shape=doublecircle".to_string());
        }
        if q == 0 {
            attrs.push("fillcolor=\"lightgreen\"".to_string());
        }
        out.push_str(&format!("q{q} [{}];\n", attrs.join(",")));
    }

    for (q, state) in t.states.iter().enumerate() {
        let mut edges: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for arc in &state.arcs {
            let mut label = if arc.input == arc.output {
                display_symbol(&arc.input)
            } else {
                format!("{}:{}", display_symbol(&arc.input), display_symbol(&arc.output))
            };
            if weighted {
                label.push_str(&format!("/{:.*}", precision, arc.weight));
            }
            edges.entry(arc.target).or_default().push(label);
        }
        for (target, labels) in edges {
            out.push_str(&format!("q{q} -> q{target} [label=\"{}\"];\n", labels.join(", ")));
        }
    }
    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nodes_and_edges() {
        let t = Transducer::from_pairs([("a", "b")]);
        let dot = write_dot(&t, 3, false);
        assert!(dot.starts_with("digraph \"\" {\n"));
        assert!(dot.contains("q0 [label=\"q0\",fillcolor=\"lightgreen\"];"));
        assert!(dot.contains("q1 [label=\"q1\",shape=doublecircle];"));
        assert!(dot.contains("q0 -> q1 [label=\"a:b\"];"));
        assert!(dot.ends_with("}\n"));
    }

    #[test]
    fn parallel_arcs_share_an_edge() {
        let mut a = Transducer::from_symbols(["a"]);
        a.union(&Transducer::from_symbols(["b"]));
        a.minimize(&crate::EngineConfig::default()).unwrap();
        let dot = write_dot(&a, 3, false);
        assert!(dot.contains("q0 -> q1 [label=\"a, b\"];"));
    }

    #[test]
    fn weights_and_quotes() {
        let mut t = Transducer::from_pair("\"", EPSILON);
        t.set_final(1, 2.0);
        let dot = write_dot(&t, 1, true);
        assert!(dot.contains("label=\"\\\":@0@/0.0\""));
        assert!(dot.contains("label=\"q1/2.0\""));
    }
}
