// Longest-match tokenizer over a set of multicharacter symbols.

use hashbrown::HashSet;

/// Splits text into symbols. At every position the longest known
/// multicharacter symbol wins; otherwise a single character is taken.
#[derive(Debug, Clone, Default)]
pub struct Tokenizer {
    multichar: HashSet<String>,
    max_chars: usize,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tokenizer knowing every multicharacter symbol in `symbols`.
    pub fn with_symbols<'a>(symbols: impl IntoIterator<Item = &'a str>) -> Self {
        let mut tok = Self::new();
        for s in symbols {
            tok.add_multichar_symbol(s);
        }
        tok
    }

    /// Register a symbol. Single characters need no registration and are
    /// ignored.
    pub fn add_multichar_symbol(&mut self, symbol: &str) {
        let len = symbol.chars().count();
        if len > 1 {
            self.max_chars = self.max_chars.max(len);
            self.multichar.insert(symbol.to_string());
        }
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let mut out = Vec::new();
        let mut i = 0;
        while i < chars.len() {
            let start = chars[i].0;
            let mut taken = 1;
            let longest = self.max_chars.min(chars.len() - i);
            for len in (2..=longest).rev() {
                let end = chars.get(i + len).map_or(text.len(), |&(pos, _)| pos);
                if self.multichar.contains(&text[start..end]) {
                    taken = len;
                    break;
                }
            }
            let end = chars.get(i + taken).map_or(text.len(), |&(pos, _)| pos);
            out.push(text[start..end].to_string());
            i += taken;
        }
        out
    }
}
