// Regex tree to transducer.

use hashbrown::HashMap;
use tracing::trace;
use xfst_fst::symbols::{EPSILON, IDENTITY, UNKNOWN};
use xfst_fst::{Arc, EngineConfig, Transducer};

use crate::parser::{BinaryOp, Regex, UnaryOp, parse};
use crate::{Environment, RegexError, argument_marker, lexer};

/// Function calls nested deeper than this are assumed to be runaway
/// recursion.
const MAX_CALL_DEPTH: usize = 64;

pub(crate) struct Compiler<'e> {
    env: &'e dyn Environment,
    cfg: &'e EngineConfig,
    /// Argument markers of the function body being compiled.
    args: HashMap<String, Transducer>,
    depth: usize,
}

impl<'e> Compiler<'e> {
    pub(crate) fn new(env: &'e dyn Environment, cfg: &'e EngineConfig) -> Self {
        Self {
            env,
            cfg,
            args: HashMap::new(),
            depth: 0,
        }
    }

    /// The plain symbol a simple pair side stands for, if it is one.
    fn pair_side(&self, side: &Regex) -> Option<&'static str> {
        match side {
            Regex::Epsilon => Some(EPSILON),
            Regex::Any => Some(UNKNOWN),
            _ => None,
        }
    }

    fn plain_symbol(&self, side: &Regex) -> Option<String> {
        match side {
            Regex::Symbol(s)
                if !self.args.contains_key(s)
                    && self.env.definition(s).is_none()
                    && self.env.list(s).is_none() =>
            {
                Some(s.clone())
            }
            Regex::Literal(s) if !self.args.contains_key(s) => Some(s.clone()),
            _ => self.pair_side(side).map(str::to_string),
        }
    }

    fn symbol(&self, name: &str) -> Transducer {
        if let Some(t) = self.args.get(name) {
            return t.clone();
        }
        if let Some(t) = self.env.definition(name) {
            return t.clone();
        }
        if let Some(members) = self.env.list(name) {
            let mut t = Transducer::empty();
            for m in members {
                t.union(&Transducer::from_symbol(m));
            }
            return t;
        }
        Transducer::from_symbol(name)
    }

    fn call(&mut self, name: &str, args: &[Regex]) -> Result<Transducer, RegexError> {
        let env = self.env;
        let (arity, body) = env
            .function(name)
            .ok_or_else(|| RegexError::UnknownFunction(name.to_string()))?;
        if arity != args.len() {
            return Err(RegexError::Arity {
                name: name.to_string(),
                expected: arity,
                found: args.len(),
            });
        }
        if self.depth >= MAX_CALL_DEPTH {
            return Err(RegexError::Recursion(name.to_string()));
        }
        let mut bound = HashMap::new();
        for (i, arg) in args.iter().enumerate() {
            bound.insert(argument_marker(name, i + 1), self.compile(arg)?);
        }
        let tree = parse(&lexer::tokenize(body)?)?;
        let mut inner = Compiler {
            env,
            cfg: self.cfg,
            args: bound,
            depth: self.depth + 1,
        };
        inner.compile(&tree)
    }

    pub(crate) fn compile(&mut self, regex: &Regex) -> Result<Transducer, RegexError> {
        let t = match regex {
            Regex::Symbol(s) => self.symbol(s),
            Regex::Literal(s) => match self.args.get(s) {
                Some(t) => t.clone(),
                None => Transducer::from_symbol(s),
            },
            Regex::Chars(s) => Transducer::from_symbols(s.chars().map(String::from)),
            Regex::Epsilon => Transducer::epsilon(),
            Regex::Any => Transducer::from_symbol(IDENTITY),
            Regex::Pair(upper, lower) => {
                match (self.plain_symbol(upper), self.plain_symbol(lower)) {
                    (Some(u), Some(l)) => {
                        let mut t = Transducer::from_pair(&u, &l);
                        if u == UNKNOWN && l == UNKNOWN {
                            t.add_arc(0, Arc::new(IDENTITY, IDENTITY, 0.0, 1));
                        }
                        t
                    }
                    _ => {
                        let mut u = self.compile(upper)?;
                        let l = self.compile(lower)?;
                        u.cross_product(&l)?;
                        u
                    }
                }
            }
            Regex::Call(name, args) => self.call(name, args)?,
            Regex::Unary(op, inner) => {
                let mut t = self.compile(inner)?;
                match op {
                    UnaryOp::Star => {
                        t.repeat_star();
                    }
                    UnaryOp::Plus => {
                        t.repeat_plus();
                    }
                    UnaryOp::Optional => {
                        t.optionalize();
                    }
                    UnaryOp::Invert => {
                        t.invert();
                    }
                    UnaryOp::Upper => {
                        t.project_input();
                    }
                    UnaryOp::Lower => {
                        t.project_output();
                    }
                    UnaryOp::Reverse => {
                        t.reverse();
                    }
                    UnaryOp::Complement => {
                        t.negate()?;
                    }
                    UnaryOp::TermComplement => {
                        let mut any = Transducer::from_symbol(IDENTITY);
                        any.subtract(&t)?;
                        t = any;
                    }
                    UnaryOp::Contains => {
                        let around = Transducer::universal(t.alphabet());
                        let mut c = around.clone();
                        c.concatenate(&t).concatenate(&around);
                        t = c;
                    }
                }
                t
            }
            Regex::Binary(op, left, right) => {
                let mut a = self.compile(left)?;
                let b = self.compile(right)?;
                match op {
                    BinaryOp::Union => {
                        a.union(&b);
                    }
                    BinaryOp::Intersect => {
                        a.intersect(&b);
                    }
                    BinaryOp::Minus => {
                        a.subtract(&b)?;
                    }
                    BinaryOp::Ignore => {
                        a.insert_freely(&b);
                    }
                    BinaryOp::Cross => {
                        a.cross_product(&b)?;
                    }
                    BinaryOp::Compose => {
                        a.compose(&b, self.cfg)?;
                    }
                }
                a
            }
            Regex::Concat(items) => {
                let mut t = Transducer::epsilon();
                for item in items {
                    let next = self.compile(item)?;
                    t.concatenate(&next);
                }
                t
            }
            Regex::Repeat(inner, min, max) => {
                let mut t = self.compile(inner)?;
                match max {
                    Some(max) => t.repeat_n_to_k(*min, *max),
                    None => t.repeat_n_plus(*min),
                };
                t
            }
            Regex::Weighted(inner, w) => {
                let mut t = self.compile(inner)?;
                for q in 0..t.state_count() {
                    if let Some(fw) = t.state(q).final_weight {
                        t.set_final(q, fw + w);
                    }
                }
                t
            }
        };
        trace!(states = t.state_count(), arcs = t.arc_count(), "compiled regex node");
        Ok(t)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use xfst_fst::paths::ExtractOptions;

    use super::*;
    use crate::{NoEnvironment, compile};

    fn words(t: &Transducer) -> Vec<String> {
        let opts = ExtractOptions {
            max_paths: None,
            cycles: Some(1),
            obey_flags: false,
        };
        let mut out: Vec<String> = t
            .extract_paths(&opts)
            .unwrap()
            .iter()
            .map(|p| p.render_pairs())
            .collect();
        out.sort();
        out
    }

    fn re(text: &str) -> Transducer {
        compile(text, &NoEnvironment, &EngineConfig::default()).unwrap()
    }

    struct Env {
        defs: HashMap<String, Transducer>,
        lists: HashMap<String, BTreeSet<String>>,
        functions: HashMap<String, (usize, String)>,
    }

    impl Environment for Env {
        fn definition(&self, name: &str) -> Option<&Transducer> {
            self.defs.get(name)
        }
        fn list(&self, name: &str) -> Option<&BTreeSet<String>> {
            self.lists.get(name)
        }
        fn function(&self, name: &str) -> Option<(usize, &str)> {
            self.functions.get(name).map(|(n, b)| (*n, b.as_str()))
        }
    }

    #[test]
    fn union_and_concatenation() {
        assert_eq!(words(&re("a b | c;")), vec!["ab", "c"]);
    }

    #[test]
    fn strings_and_pairs() {
        assert_eq!(words(&re("{ca}:0 t")), vec!["c:0a:0t"]);
        assert_eq!(words(&re("a:b")), vec!["a:b"]);
    }

    #[test]
    fn optional_and_repeat() {
        assert_eq!(words(&re("(a) b")), vec!["ab", "b"]);
        assert_eq!(words(&re("a^{1,2}")), vec!["a", "aa"]);
    }

    #[test]
    fn subtraction_and_intersection() {
        assert_eq!(words(&re("[a | b | c] - b")), vec!["a", "c"]);
        assert_eq!(words(&re("[a | b] & [b | c]")), vec!["b"]);
    }

    #[test]
    fn composition_chains_mappings() {
        assert_eq!(words(&re("a:b .o. b:c")), vec!["a:c"]);
    }

    #[test]
    fn weights_add_to_paths() {
        let t = re("a::2.5");
        let paths = t.extract_paths(&ExtractOptions::default()).unwrap();
        assert!((paths[0].weight - 2.5).abs() < 1e-4);
    }

    #[test]
    fn definitions_and_lists() {
        let mut defs = HashMap::new();
        defs.insert("Vowel".to_string(), re("a | e"));
        let mut lists = HashMap::new();
        lists.insert("Cons".to_string(), ["k", "t"].iter().map(|s| s.to_string()).collect());
        let env = Env {
            defs,
            lists,
            functions: HashMap::new(),
        };
        let t = compile("Cons Vowel;", &env, &EngineConfig::default()).unwrap();
        assert_eq!(words(&t), vec!["ka", "ke", "ta", "te"]);
    }

    #[test]
    fn function_arguments_are_positional() {
        let body = format!("\"{}\" \"{}\"", argument_marker("F(", 1), argument_marker("F(", 2));
        let mut functions = HashMap::new();
        functions.insert("F(".to_string(), (2, body));
        let env = Env {
            defs: HashMap::new(),
            lists: HashMap::new(),
            functions,
        };
        let t = compile("F(x, y z)", &env, &EngineConfig::default()).unwrap();
        assert_eq!(words(&t), vec!["xyz"]);
        let err = compile("F(x)", &env, &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, RegexError::Arity { expected: 2, found: 1, .. }));
    }

    #[test]
    fn recursive_function_is_cut_off() {
        let mut functions = HashMap::new();
        functions.insert("R(".to_string(), (1, "R(a)".to_string()));
        let env = Env {
            defs: HashMap::new(),
            lists: HashMap::new(),
            functions,
        };
        let err = compile("R(b)", &env, &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, RegexError::Recursion(_)));
    }

    #[test]
    fn unknown_function() {
        let err = compile("G(a)", &NoEnvironment, &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, RegexError::UnknownFunction(ref n) if n == "G("));
    }

    #[test]
    fn any_symbol_complement() {
        let t = re("\\a");
        assert!(t.lookup(&["a".to_string()], &Default::default()).is_empty());
        assert_eq!(t.lookup(&["b".to_string()], &Default::default()).len(), 1);
    }
}
