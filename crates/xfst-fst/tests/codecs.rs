//! Integration tests: algebra results moved through every codec and the
//! compact lookup form.

use std::io::Write;

use xfst_fst::att::{read_att, write_att_many};
use xfst_fst::format::{StoredNetwork, read_container, write_container};
use xfst_fst::paths::{ExtractOptions, LookupOptions};
use xfst_fst::prolog::{read_prolog, write_prolog};
use xfst_fst::symbols::ATT_EPSILON;
use xfst_fst::{CompactTransducer, EngineConfig, Transducer};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn tokens(text: &str) -> Vec<String> {
    text.chars().map(String::from).collect()
}

/// cat:chat | dog:chien | do:faire, minimized.
fn lexicon() -> Transducer {
    let cfg = EngineConfig::default();
    let pair = |a: &str, b: &str| {
        let a: Vec<String> = tokens(a);
        let mut b: Vec<String> = tokens(b);
        while b.len() < a.len() {
            b.push(xfst_fst::symbols::EPSILON.to_string());
        }
        let mut a = a;
        while a.len() < b.len() {
            a.push(xfst_fst::symbols::EPSILON.to_string());
        }
        Transducer::from_pairs(a.into_iter().zip(b))
    };
    let mut t = pair("cat", "chat");
    t.union(&pair("dog", "chien"));
    t.union(&pair("do", "faire"));
    t.minimize(&cfg).unwrap();
    t
}

fn outputs(paths: &[xfst_fst::Path]) -> Vec<String> {
    let mut out: Vec<String> = paths.iter().map(|p| p.output().collect()).collect();
    out.sort();
    out
}

// ---------------------------------------------------------------------------
// Native container
// ---------------------------------------------------------------------------

#[test]
fn container_file_round_trip() {
    let t = lexicon();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&write_container(&[StoredNetwork {
        transducer: t.clone(),
        optimized: false,
    }]))
    .unwrap();

    let data = std::fs::read(file.path()).unwrap();
    let nets = read_container(&data).unwrap();
    assert_eq!(nets.len(), 1);
    assert!(nets[0].transducer.equivalent(&t).unwrap());
}

#[test]
fn garbage_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garbage.fst");
    std::fs::write(&path, b"definitely not a network").unwrap();
    let data = std::fs::read(&path).unwrap();
    assert!(read_container(&data).is_err());
}

// ---------------------------------------------------------------------------
// Text formats
// ---------------------------------------------------------------------------

#[test]
fn att_preserves_language() {
    let t = lexicon();
    let other = Transducer::from_symbols(["x", "y"]);
    let text = write_att_many([&t, &other], 5, true);
    let nets = read_att(&text, &[ATT_EPSILON]).unwrap();
    assert_eq!(nets.len(), 2);
    assert!(nets[0].equivalent(&t).unwrap());
    assert!(nets[1].equivalent(&other).unwrap());
}

#[test]
fn weighted_att_keeps_shape_and_weights() {
    let mut t = Transducer::empty();
    let s1 = t.add_state();
    let s2 = t.add_state();
    t.add_arc(0, xfst_fst::Arc::new("a", "b", 0.123456, s1));
    t.add_arc(0, xfst_fst::Arc::new("c", "c", 1.5, s2));
    t.add_arc(s1, xfst_fst::Arc::new("d", "e", 0.25, s2));
    t.set_final(s2, 0.75);

    let precision = 3;
    let back = read_att(&write_att_many([&t], precision, true), &[ATT_EPSILON])
        .unwrap()
        .remove(0);
    assert_eq!(back.state_count(), t.state_count());
    assert_eq!(back.arc_count(), t.arc_count());
    let tolerance = 10f32.powi(-(precision as i32));
    for ((_, a), (_, b)) in t.arcs().zip(back.arcs()) {
        assert_eq!((&a.input, &a.output, a.target), (&b.input, &b.output, b.target));
        assert!((a.weight - b.weight).abs() <= tolerance, "{} vs {}", a.weight, b.weight);
    }
    let final_weight = back.state(s2).final_weight.unwrap();
    assert!((final_weight - 0.75).abs() <= tolerance);
}

#[test]
fn prolog_preserves_language() {
    let mut t = lexicon();
    t.set_name("lexicon");
    let nets = read_prolog(&write_prolog(&t, 5, false)).unwrap();
    assert_eq!(nets[0].name(), Some("lexicon"));
    assert!(nets[0].equivalent(&t).unwrap());
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

#[test]
fn compact_lookup_agrees_with_standard() {
    let t = lexicon();
    let compact = CompactTransducer::from_transducer(&t).unwrap();
    for word in ["cat", "dog", "do", "cow"] {
        let input = tokens(word);
        let standard = t.lookup(&input, &LookupOptions::default());
        let fast = compact.lookup(&input, &LookupOptions::default());
        assert_eq!(outputs(&standard), outputs(&fast), "word {word}");
    }
}

#[test]
fn compact_round_trip_keeps_paths() {
    let t = lexicon();
    let back = CompactTransducer::from_transducer(&t).unwrap().to_transducer();
    let opts = ExtractOptions::default();
    assert_eq!(
        outputs(&t.extract_paths(&opts).unwrap()),
        outputs(&back.extract_paths(&opts).unwrap())
    );
}

#[test]
fn inverted_lexicon_generates() {
    let mut t = lexicon();
    t.invert();
    let found = t.lookup(&tokens("chien"), &LookupOptions::default());
    assert_eq!(outputs(&found), vec!["dog".to_string()]);
}
