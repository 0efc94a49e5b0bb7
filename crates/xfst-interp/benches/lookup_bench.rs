// Criterion benchmarks for lookup through the interpreter.
//
// Run:
//   cargo bench -p xfst-interp

use criterion::{Criterion, criterion_group, criterion_main};
use xfst_fst::{CompactTransducer, EngineConfig};
use xfst_interp::apply::{Applier, Direction};
use xfst_interp::{Io, Network, Session, Variables};

const LEXICON: &str = "define Stem {kala} | {talo} | {kissa} | {koira} | {auto};\n\
    define Case 0 | [\"+Gen\" .x. n] | [\"+Ine\" .x. {ssa}] | [\"+Ela\" .x. {sta}];\n\
    regex Stem Case;\n";

const WORDS: &[&str] = &["kala", "talon", "kissassa", "koirasta", "auto", "xyz"];

fn lexicon() -> xfst_fst::Transducer {
    let mut session = Session::new();
    let mut out = Vec::new();
    let mut err = Vec::new();
    session.run_script(LEXICON, &mut Io::new(&mut out, &mut err));
    session
        .stack()
        .top_standard()
        .expect("lexicon compiles")
        .clone()
}

fn bench_apply_up(c: &mut Criterion) {
    let net = Network::Standard(lexicon());
    let vars = Variables::new();
    let mut err = Vec::new();
    let applier = Applier::new(&net, Direction::Up, &vars, &EngineConfig::default(), &mut err).expect("applier");

    c.bench_function("apply_up_standard", |b| {
        b.iter(|| {
            for word in WORDS {
                std::hint::black_box(applier.lookup(word));
            }
        });
    });
}

fn bench_apply_down_optimized(c: &mut Criterion) {
    let mut t = lexicon();
    t.invert();
    let net = Network::Optimized(CompactTransducer::from_transducer(&t).expect("compact form"));
    let vars = Variables::new();
    let mut err = Vec::new();
    let applier = Applier::new(&net, Direction::Down, &vars, &EngineConfig::default(), &mut err).expect("applier");

    c.bench_function("apply_down_optimized", |b| {
        b.iter(|| {
            for word in WORDS {
                std::hint::black_box(applier.lookup(word));
            }
        });
    });
}

fn bench_script(c: &mut Criterion) {
    let script = format!("{LEXICON}apply up\n{}\nEND;\n", WORDS.join("\n"));
    c.bench_function("script_compile_and_apply", |b| {
        b.iter(|| {
            let mut session = Session::new();
            let mut out = Vec::new();
            let mut err = Vec::new();
            session.run_script(&script, &mut Io::new(&mut out, &mut err));
            std::hint::black_box(out.len())
        });
    });
}

criterion_group!(benches, bench_apply_up, bench_apply_down_optimized, bench_script);
criterion_main!(benches);
