// AT&T tabular format: one arc per line (`src dst in out [weight]`), final
// states as `state [weight]`, transducers separated by `--`.

use crate::symbols::{ATT_EPSILON, ATT_SPACE, ATT_TAB, EPSILON};
use crate::transducer::{Arc, Transducer};
use crate::FstError;

/// Separator line between transducers.
pub const SEPARATOR: &str = "--";

fn escape(symbol: &str) -> String {
    if symbol == EPSILON {
        return ATT_EPSILON.to_string();
    }
    symbol.replace(' ', ATT_SPACE).replace('\t', ATT_TAB)
}

fn unescape(field: &str, epsilons: &[&str]) -> String {
    if field == EPSILON || epsilons.contains(&field) {
        return EPSILON.to_string();
    }
    field.replace(ATT_SPACE, " ").replace(ATT_TAB, "\t")
}

/// Render one transducer. The start state is written as state 0; weights
/// are written with `precision` decimals when `weighted` is set.
pub fn write_att(t: &Transducer, precision: usize, weighted: bool) -> String {
    let mut t = t.clone();
    let keep = vec![true; t.states.len()];
    t.retain_states(&keep);
    let mut out = String::new();
    for (q, state) in t.states.iter().enumerate() {
        for arc in &state.arcs {
            out.push_str(&format!(
                "{}\t{}\t{}\t{}",
                q,
                arc.target,
                escape(&arc.input),
                escape(&arc.output)
            ));
            if weighted {
                out.push_str(&format!("\t{:.*}", precision, arc.weight));
            }
            out.push('\n');
        }
        if let Some(w) = state.final_weight {
            if weighted {
                out.push_str(&format!("{}\t{:.*}\n", q, precision, w));
            } else {
                out.push_str(&format!("{q}\n"));
            }
        }
    }
    out
}

/// Render several transducers separated by `--` lines.
pub fn write_att_many<'a>(
    nets: impl IntoIterator<Item = &'a Transducer>,
    precision: usize,
    weighted: bool,
) -> String {
    nets.into_iter()
        .map(|t| write_att(t, precision, weighted))
        .collect::<Vec<_>>()
        .join(&format!("{SEPARATOR}\n"))
}

/// Parse every transducer in `text`. Any spelling in `epsilons` reads as
/// epsilon, as does the internal epsilon symbol.
pub fn read_att(text: &str, epsilons: &[&str]) -> Result<Vec<Transducer>, FstError> {
    let mut nets = Vec::new();
    let mut current = Transducer::empty();
    let mut seen_any = false;

    let state = |t: &mut Transducer, field: &str, line: usize| -> Result<usize, FstError> {
        let id: usize = field.parse().map_err(|_| FstError::Parse {
            line,
            message: format!("invalid state number '{field}'"),
        })?;
        while t.state_count() <= id {
            t.add_state();
        }
        Ok(id)
    };
    let weight = |field: &str, line: usize| -> Result<f32, FstError> {
        field.parse().map_err(|_| FstError::Parse {
            line,
            message: format!("invalid weight '{field}'"),
        })
    };

    for (n, raw) in text.lines().enumerate() {
        let line = n + 1;
        let raw = raw.trim_end_matches('\r');
        if raw.trim() == SEPARATOR {
            nets.push(std::mem::take(&mut current));
            seen_any = false;
            continue;
        }
        if raw.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = if raw.contains('\t') {
            raw.split('\t').collect()
        } else {
            raw.split_whitespace().collect()
        };
        seen_any = true;
        match fields.len() {
            1 | 2 => {
                let q = state(&mut current, fields[0], line)?;
                let w = match fields.get(1) {
                    Some(f) => weight(f, line)?,
                    None => 0.0,
                };
                current.set_final(q, w);
            }
            4 | 5 => {
                let src = state(&mut current, fields[0], line)?;
                let dst = state(&mut current, fields[1], line)?;
                let w = match fields.get(4) {
                    Some(f) => weight(f, line)?,
                    None => 0.0,
                };
                current.add_arc(
                    src,
                    Arc::new(unescape(fields[2], epsilons), unescape(fields[3], epsilons), w, dst),
                );
            }
            k => {
                return Err(FstError::Parse {
                    line,
                    message: format!("expected 1, 2, 4 or 5 fields, found {k}"),
                });
            }
        }
    }
    if seen_any || !nets.is_empty() {
        nets.push(current);
    }
    Ok(nets)
}
