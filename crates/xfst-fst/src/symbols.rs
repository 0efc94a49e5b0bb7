// Special symbols, symbol classification and the indexed symbol table used by
// the compact lookup form and the binary container.

use std::collections::BTreeSet;

use hashbrown::HashMap;

use crate::FstError;
use crate::flags::{FlagDiacriticParser, OpFeatureValue};

/// The empty string.
pub const EPSILON: &str = "@_EPSILON_SYMBOL_@";
/// Any symbol outside the alphabet, not necessarily the same on both sides.
pub const UNKNOWN: &str = "@_UNKNOWN_SYMBOL_@";
/// Any symbol outside the alphabet, mapped to itself.
pub const IDENTITY: &str = "@_IDENTITY_SYMBOL_@";

/// Default epsilon spelling in the tabular transition format.
pub const ATT_EPSILON: &str = "@0@";
/// Tabular-format escape for a literal space.
pub const ATT_SPACE: &str = "@_SPACE_@";
/// Tabular-format escape for a literal tab.
pub const ATT_TAB: &str = "@_TAB_@";

/// Returns `true` for epsilon, unknown and identity.
#[inline]
pub fn is_special(symbol: &str) -> bool {
    symbol == EPSILON || symbol == UNKNOWN || symbol == IDENTITY
}

#[inline]
pub fn is_epsilon(symbol: &str) -> bool {
    symbol == EPSILON
}

/// Unknown or identity: symbols that stand for "anything else".
#[inline]
pub fn is_wildcard(symbol: &str) -> bool {
    symbol == UNKNOWN || symbol == IDENTITY
}

/// A symbol pair `input:output` as carried by an arc or a path.
pub type SymbolPair = (String, String);

/// Indexed symbol table.
///
/// Symbols are ordered as:
/// 1. Epsilon (index 0)
/// 2. Flag diacritics (`@P.FEAT.VAL@` and friends)
/// 3. Unknown and identity, when used
/// 4. Every other symbol, in sorted order
///
/// Transitions sorted by input index therefore list epsilons and flags
/// before anything that consumes input.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    /// Maps symbol index to its string representation.
    pub symbol_strings: Vec<String>,
    /// Maps a symbol string to its index.
    pub symbol_to_index: HashMap<String, u32>,
    /// Parsed flag operation for indices `1..first_normal`.
    pub symbol_to_diacritic: Vec<OpFeatureValue>,
    /// Index of the first symbol that is neither epsilon nor a flag.
    pub first_normal: u32,
    /// Number of distinct flag diacritic features.
    pub flag_feature_count: u16,
}

impl SymbolTable {
    /// Build a table from an arbitrary set of symbols.
    pub fn build<'a>(symbols: impl IntoIterator<Item = &'a str>) -> Result<Self, FstError> {
        let mut flags = BTreeSet::new();
        let mut wildcards = BTreeSet::new();
        let mut normal = BTreeSet::new();
        for symbol in symbols {
            if symbol == EPSILON {
                continue;
            }
            if crate::flags::is_flag_diacritic(symbol) {
                flags.insert(symbol);
            } else if is_wildcard(symbol) {
                wildcards.insert(symbol);
            } else {
                normal.insert(symbol);
            }
        }

        let mut symbol_strings = vec![EPSILON.to_string()];
        let mut symbol_to_diacritic = vec![OpFeatureValue::default()];
        let mut parser = FlagDiacriticParser::new();
        for flag in &flags {
            symbol_to_diacritic.push(parser.parse(flag)?);
            symbol_strings.push((*flag).to_string());
        }
        let first_normal = symbol_strings.len() as u32;
        symbol_strings.extend(wildcards.into_iter().map(str::to_string));
        symbol_strings.extend(normal.into_iter().map(str::to_string));

        let symbol_to_index = symbol_strings
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i as u32))
            .collect();

        Ok(Self {
            symbol_strings,
            symbol_to_index,
            symbol_to_diacritic,
            first_normal,
            flag_feature_count: parser.feature_count(),
        })
    }

    #[inline]
    pub fn index_of(&self, symbol: &str) -> Option<u32> {
        self.symbol_to_index.get(symbol).copied()
    }

    #[inline]
    pub fn symbol(&self, index: u32) -> &str {
        &self.symbol_strings[index as usize]
    }

    #[inline]
    pub fn is_flag_index(&self, index: u32) -> bool {
        index > 0 && index < self.first_normal
    }

    pub fn len(&self) -> usize {
        self.symbol_strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbol_strings.is_empty()
    }

    /// Serialize as a count followed by NUL-terminated strings.
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&(self.symbol_strings.len() as u32).to_le_bytes());
        for s in &self.symbol_strings {
            buf.extend_from_slice(s.as_bytes());
            buf.push(0);
        }
    }
}

/// Parse a symbol list written by [`SymbolTable::write_to`].
///
/// Returns the symbols in stored order and the offset just past them.
pub fn parse_symbol_list(data: &[u8], offset: usize) -> Result<(Vec<String>, usize), FstError> {
    if offset + 4 > data.len() {
        return Err(FstError::TooShort {
            expected: offset + 4,
            actual: data.len(),
        });
    }
    let count = u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ]);
    let mut pos = offset + 4;
    let mut symbols = Vec::with_capacity(count as usize);

    for i in 0..count {
        let start = pos;
        while pos < data.len() && data[pos] != 0 {
            pos += 1;
        }
        if pos >= data.len() {
            return Err(FstError::InvalidSymbolTable(
                "unterminated symbol string".to_string(),
            ));
        }
        let symbol = std::str::from_utf8(&data[start..pos]).map_err(|_| {
            FstError::InvalidSymbolTable(format!("invalid UTF-8 in symbol {i}"))
        })?;
        symbols.push(symbol.to_string());
        pos += 1;
    }

    Ok((symbols, pos))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_orders_epsilon_flags_then_normal() {
        let table = SymbolTable::build(["b", "@P.X.a@", "a", EPSILON, IDENTITY]).unwrap();
        assert_eq!(table.symbol(0), EPSILON);
        assert_eq!(table.symbol(1), "@P.X.a@");
        assert_eq!(table.first_normal, 2);
        assert_eq!(table.symbol(2), IDENTITY);
        assert_eq!(table.symbol(3), "a");
        assert_eq!(table.symbol(4), "b");
        assert_eq!(table.flag_feature_count, 1);
        assert!(table.is_flag_index(1));
        assert!(!table.is_flag_index(0));
        assert!(!table.is_flag_index(3));
    }

    #[test]
    fn index_lookup() {
        let table = SymbolTable::build(["cat", "dog"]).unwrap();
        assert_eq!(table.index_of("cat"), Some(1));
        assert_eq!(table.index_of("dog"), Some(2));
        assert_eq!(table.index_of("cow"), None);
    }

    #[test]
    fn symbol_list_roundtrip_through_bytes() {
        let table = SymbolTable::build(["a", "@C.F@", "xy"]).unwrap();
        let mut buf = vec![0xAA];
        table.write_to(&mut buf);
        let (symbols, end) = parse_symbol_list(&buf, 1).unwrap();
        assert_eq!(symbols, table.symbol_strings);
        assert_eq!(end, buf.len());
    }

    #[test]
    fn reject_unterminated_symbol() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(b"abc");
        let err = parse_symbol_list(&buf, 0).unwrap_err();
        assert!(matches!(err, FstError::InvalidSymbolTable(_)));
    }

    #[test]
    fn special_symbol_classification() {
        assert!(is_special(EPSILON));
        assert!(is_wildcard(UNKNOWN));
        assert!(is_wildcard(IDENTITY));
        assert!(!is_wildcard(EPSILON));
        assert!(!is_special("a"));
    }
}
