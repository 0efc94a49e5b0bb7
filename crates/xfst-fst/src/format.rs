// Native binary container: a sequence of length-prefixed network blocks.
//
// Block layout (little-endian):
//   header (16 bytes) | name | symbol list | alphabet | states | arcs
//
// The header is cookie1, cookie2, a kind byte (0 ordinary, 1 lookup
// optimized) and reserved zero bytes. The name is a u32 length followed by
// UTF-8 bytes. The alphabet is a u32 count of symbol-list indices. States
// and arcs are stored as `StoredState`/`StoredArc` records preceded by a u32
// count each, with the start state at index 0.

use tracing::debug;

use crate::symbols::parse_symbol_list;
use crate::transducer::{Arc, Transducer};
use crate::transition::{StoredArc, StoredState, read_records};
use crate::FstError;

const COOKIE1: u32 = 0x0003_5846;
const COOKIE2: u32 = 0x0001_A7E5;

/// Size of the block header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Parsed block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkHeader {
    /// The network was saved in lookup-optimized form.
    pub optimized: bool,
}

/// A network as stored in a container.
#[derive(Debug, Clone)]
pub struct StoredNetwork {
    pub transducer: Transducer,
    pub optimized: bool,
}

pub fn parse_header(data: &[u8]) -> Result<NetworkHeader, FstError> {
    if data.len() < HEADER_SIZE {
        return Err(FstError::TooShort {
            expected: HEADER_SIZE,
            actual: data.len(),
        });
    }
    let cookie1 = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let cookie2 = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    if cookie1 != COOKIE1 || cookie2 != COOKIE2 {
        return Err(FstError::InvalidMagic);
    }
    Ok(NetworkHeader {
        optimized: data[8] == 0x01,
    })
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32, FstError> {
    data.get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(FstError::TooShort {
            expected: offset + 4,
            actual: data.len(),
        })
}

/// Serialize one network block, without the length prefix.
pub fn write_network(t: &Transducer, optimized: bool) -> Vec<u8> {
    let mut t = t.clone();
    // Start state first so that readers can assume index 0.
    let keep = vec![true; t.states.len()];
    t.retain_states(&keep);

    let mut buf = vec![0u8; HEADER_SIZE];
    buf[..4].copy_from_slice(&COOKIE1.to_le_bytes());
    buf[4..8].copy_from_slice(&COOKIE2.to_le_bytes());
    buf[8] = u8::from(optimized);

    let name = t.name.as_deref().unwrap_or("");
    buf.extend_from_slice(&(name.len() as u32).to_le_bytes());
    buf.extend_from_slice(name.as_bytes());

    let mut symbols: Vec<&str> = vec![crate::symbols::EPSILON];
    let mut index = hashbrown::HashMap::new();
    index.insert(crate::symbols::EPSILON, 0u32);
    let all = t
        .alphabet
        .iter()
        .map(String::as_str)
        .chain(t.arcs().flat_map(|(_, a)| [a.input.as_str(), a.output.as_str()]));
    for s in all {
        if !index.contains_key(s) {
            index.insert(s, symbols.len() as u32);
            symbols.push(s);
        }
    }
    buf.extend_from_slice(&(symbols.len() as u32).to_le_bytes());
    for s in &symbols {
        buf.extend_from_slice(s.as_bytes());
        buf.push(0);
    }

    buf.extend_from_slice(&(t.alphabet.len() as u32).to_le_bytes());
    for s in &t.alphabet {
        buf.extend_from_slice(&index[s.as_str()].to_le_bytes());
    }

    let mut stored_states = Vec::with_capacity(t.states.len());
    let mut stored_arcs = Vec::with_capacity(t.arc_count());
    for state in &t.states {
        stored_states.push(StoredState {
            first_arc: stored_arcs.len() as u32,
            arc_count: state.arcs.len() as u32,
            final_weight: state.final_weight.unwrap_or(0.0),
            is_final: u32::from(state.final_weight.is_some()),
        });
        for arc in &state.arcs {
            stored_arcs.push(StoredArc {
                input: index[arc.input.as_str()],
                output: index[arc.output.as_str()],
                target: arc.target as u32,
                weight: arc.weight,
            });
        }
    }
    buf.extend_from_slice(&(stored_states.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytemuck::cast_slice(&stored_states));
    buf.extend_from_slice(&(stored_arcs.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytemuck::cast_slice(&stored_arcs));
    buf
}

/// Parse one network block. Returns the network and the bytes consumed.
pub fn read_network(data: &[u8]) -> Result<(StoredNetwork, usize), FstError> {
    let header = parse_header(data)?;
    let mut pos = HEADER_SIZE;

    let name_len = read_u32(data, pos)? as usize;
    pos += 4;
    let name_bytes = data.get(pos..pos + name_len).ok_or(FstError::TooShort {
        expected: pos + name_len,
        actual: data.len(),
    })?;
    let name = std::str::from_utf8(name_bytes)
        .map_err(|_| FstError::InvalidSymbolTable("invalid UTF-8 in network name".to_string()))?
        .to_string();
    pos += name_len;

    let (symbols, after) = parse_symbol_list(data, pos)?;
    pos = after;
    let symbol = |i: u32| {
        symbols
            .get(i as usize)
            .ok_or_else(|| FstError::InvalidSymbolTable(format!("symbol index {i} out of range")))
    };

    let alphabet_len = read_u32(data, pos)? as usize;
    pos += 4;
    let mut t = Transducer::empty();
    for k in 0..alphabet_len {
        let s = symbol(read_u32(data, pos + 4 * k)?)?;
        t.add_symbol(s);
    }
    pos += 4 * alphabet_len;

    let state_count = read_u32(data, pos)? as usize;
    pos += 4;
    let too_short = |expected: usize| FstError::TooShort {
        expected,
        actual: data.len(),
    };
    let states: Vec<StoredState> =
        read_records(data, pos, state_count).ok_or_else(|| too_short(pos + state_count * 16))?;
    pos += state_count * size_of::<StoredState>();
    let arc_count = read_u32(data, pos)? as usize;
    pos += 4;
    let arcs: Vec<StoredArc> =
        read_records(data, pos, arc_count).ok_or_else(|| too_short(pos + arc_count * 16))?;
    pos += arc_count * size_of::<StoredArc>();

    for _ in 1..state_count {
        t.add_state();
    }
    for (q, stored) in states.iter().enumerate() {
        if stored.is_final != 0 {
            t.set_final(q, stored.final_weight);
        }
        let first = stored.first_arc as usize;
        let range = arcs
            .get(first..first + stored.arc_count as usize)
            .ok_or_else(|| FstError::InvalidSymbolTable(format!("arc range of state {q} out of bounds")))?;
        for a in range {
            if a.target as usize >= state_count.max(1) {
                return Err(FstError::InvalidSymbolTable(format!(
                    "arc target {} out of range",
                    a.target
                )));
            }
            t.add_arc(
                q,
                Arc::new(symbol(a.input)?.as_str(), symbol(a.output)?.as_str(), a.weight, a.target as usize),
            );
        }
    }
    if !name.is_empty() {
        t.set_name(name);
    }
    Ok((
        StoredNetwork {
            transducer: t,
            optimized: header.optimized,
        },
        pos,
    ))
}

/// Serialize several networks as length-prefixed blocks.
pub fn write_container(networks: &[StoredNetwork]) -> Vec<u8> {
    let mut out = Vec::new();
    for net in networks {
        let block = write_network(&net.transducer, net.optimized);
        out.extend_from_slice(&(block.len() as u64).to_le_bytes());
        out.extend_from_slice(&block);
    }
    out
}

/// Parse every block of a container, in file order.
pub fn read_container(data: &[u8]) -> Result<Vec<StoredNetwork>, FstError> {
    let mut pos = 0;
    let mut networks = Vec::new();
    while pos < data.len() {
        let len_bytes = data.get(pos..pos + 8).ok_or(FstError::TooShort {
            expected: pos + 8,
            actual: data.len(),
        })?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(len_bytes);
        let len = u64::from_le_bytes(raw) as usize;
        pos += 8;
        let block = data.get(pos..pos + len).ok_or(FstError::TooShort {
            expected: pos + len,
            actual: data.len(),
        })?;
        let (net, _) = read_network(block)?;
        networks.push(net);
        pos += len;
    }
    debug!(count = networks.len(), "read network container");
    Ok(networks)
}
