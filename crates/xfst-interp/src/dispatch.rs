// Command dispatch: one decoded command against the session.
//
// Every handler either completes its documented mutation or returns an
// error with the stack and name table as they were before the command,
// except for the stack folds, which consume operands as they go.

use std::path::Path;

use tracing::{debug, trace};
use xfst_fst::flags::is_flag_diacritic;
use xfst_fst::symbols::{EPSILON, IDENTITY, UNKNOWN, is_special};
use xfst_fst::{CompactTransducer, EngineConfig, FstError, Transducer};
use xfst_regex::Environment;

use crate::apply::{Applier, Direction};
use crate::command::{BinaryOp, Command, FoldOp, UnaryOp, apropos_lines, help_lines};
use crate::compile_replace::{Level, compile_replace};
use crate::error::XfstError;
use crate::function;
use crate::session::{Io, Session};
use crate::stack::Network;
use crate::variables::FLAG_AS_SPECIAL;

const NEGATION_ON_TRANSDUCER: &str = "Error: Negation is defined only for automata.\n\
     Use expression [[?:?]* - A] instead where A is the transducer to be negated.";

const FLAGS_NOT_IDENTITIES: &str = "Error: flag diacritics must be identities in composition if flag-is-epsilon is ON.\n\
     I.e. only FLAG:FLAG is allowed, not FLAG1:FLAG2, FLAG:bar or foo:FLAG\n\
     Apply twosided flag-diacritics (tfd) before composition.";

const TYPES_DIFFER: &str = "Stack contains transducers whose type differs.";

/// Source text recorded for definitions popped from the stack.
const FROM_STACK: &str = "<net taken from stack>";

impl Session {
    /// Execute one command. Failures are written to `io.err` and escalated
    /// to the sticky failure flag according to their severity.
    pub fn dispatch(&mut self, command: Command, io: &mut Io<'_>) {
        trace!(command = command.name(), depth = self.stack.len(), "dispatch");
        if let Err(e) = self.execute(command, io) {
            self.report(&e, io);
        }
    }

    fn execute(&mut self, command: Command, io: &mut Io<'_>) -> Result<(), XfstError> {
        match command {
            Command::DefineRegex { name, regex } => self.define_regex(&name, &regex, io),
            Command::DefineFromStack { name } => self.define_from_stack(&name, io),
            Command::DefineFunction { prototype, body } => self.define_function(&prototype, &body, io),
            Command::Undefine(names) => {
                for name in &names {
                    if let Err(e) = self.names.undefine(name) {
                        self.report(&e, io);
                    }
                }
                Ok(())
            }
            Command::DefineList { name, members } => {
                self.names.define_list(&name, members.into_iter().collect())?;
                Ok(())
            }
            Command::DefineListRange { name, start, end } => {
                if start > end {
                    return Err(XfstError::MalformedInput(format!(
                        "list '{name}': empty range from '{start}' to '{end}'"
                    )));
                }
                self.names
                    .define_list(&name, (start..=end).map(|c| c.to_string()).collect())?;
                Ok(())
            }
            Command::Unlist(name) => self.names.unlist(&name),
            Command::Alias { name, body } => {
                self.names.define_alias(&name, body)?;
                Ok(())
            }
            Command::NameNet(name) => {
                self.stack.top_mut()?.set_name(&name);
                self.print_info(io)
            }
            Command::Invoke(name) => self.invoke_alias(&name, io),

            Command::Regex(text) => {
                let t = xfst_regex::compile(&text, &self.names, &self.engine_config())?;
                self.stack.push_transducer(t);
                self.print_info(io)
            }
            Command::Push(name) => self.push_defined(name.as_deref(), io),
            Command::Pop => self.stack.pop().map(|_| ()),
            Command::Clear => {
                self.stack.clear();
                Ok(())
            }
            Command::Turn => {
                self.stack.turn();
                Ok(())
            }
            Command::Rotate => {
                self.stack.rotate();
                Ok(())
            }
            Command::LoadStack(path) => self.load_stack(&path, io),
            Command::SaveStack(path) => self.save_stack(&path),
            Command::LoadDefined(path) => self.load_defined(&path, io),
            Command::SaveDefined(path) | Command::WriteDefinitions(path) => self.save_defined(&path),
            Command::Read(format, path) => self.read_file(format, &path, io),
            Command::Write(format, path) => self.write_file(format, path.as_deref(), io),
            Command::WriteDefinition { name, path } => self.write_definition(&name, &path),

            Command::Apply { direction, inputs } => self.apply(direction, &inputs, io),
            Command::Print(target) => self.print(target, io),
            Command::Test { kind, assert } => self.test(kind, assert, io),

            Command::Unary(op) => self.unary(op, io),
            Command::Binary(op) => self.binary(op, io),
            Command::Fold(op) => self.fold(op, io),
            Command::SigmaNet => self.sigma_net(io),
            Command::SubstituteSymbol { replacement, target } => {
                self.substitute_symbol(&replacement, &target, io)
            }
            Command::SubstituteLabel { replacement, target } => {
                self.substitute_label(&replacement, &target, io)
            }
            Command::SubstituteDefined { name, label } => self.substitute_defined(&name, &label, io),
            Command::EliminateFlag(name) => self.eliminate_flag(name.as_deref(), io),
            Command::CompileReplace(level) => self.compile_replace(level, io),
            Command::LookupOptimize => self.lookup_optimize(io),
            Command::RemoveOptimization => self.remove_optimization(io),

            Command::Echo(text) => {
                writeln!(io.out, "{text}")?;
                Ok(())
            }
            Command::Quit => {
                self.request_quit();
                Ok(())
            }
            Command::Set { name, value } => self.set_variable(&name, &value, io),
            Command::Show(name) => self.show(name.as_deref(), io),
            Command::Apropos(text) => {
                let lines = apropos_lines(&text);
                if lines.is_empty() {
                    writeln!(io.out, "nothing found for '{text}'")?;
                }
                for line in lines {
                    writeln!(io.out, "{line}")?;
                }
                Ok(())
            }
            Command::Help(name) => {
                let lines = help_lines(name.as_deref());
                if lines.is_empty() {
                    writeln!(io.out, "no help found for '{}'", name.unwrap_or_default())?;
                }
                for line in lines {
                    writeln!(io.out, "{line}")?;
                }
                Ok(())
            }
            Command::System(text) => self.system(&text, io),
        }
    }

    // =========================================================================
    // Names
    // =========================================================================

    fn report_definition(&self, name: &str, replaced: bool, io: &mut Io<'_>) -> Result<(), XfstError> {
        if self.verbose() {
            let verb = if replaced { "Redefined" } else { "Defined" };
            writeln!(io.out, "{verb} '{name}'")?;
        }
        Ok(())
    }

    fn define_regex(&mut self, name: &str, regex: &str, io: &mut Io<'_>) -> Result<(), XfstError> {
        self.names.check_kind(name, "transducer")?;
        let mut t = match xfst_regex::compile(regex, &self.names, &self.engine_config()) {
            Ok(t) => t,
            Err(e) => {
                writeln!(io.err, "Could not define variable '{name}'")?;
                return Err(e.into());
            }
        };
        if self.variables.is_on("name-nets") {
            t.set_name(name);
        }
        let replaced = self.names.define(name, t, regex.trim().trim_end_matches(';').trim_end())?;
        self.report_definition(name, replaced, io)
    }

    fn define_from_stack(&mut self, name: &str, io: &mut Io<'_>) -> Result<(), XfstError> {
        self.names.check_kind(name, "transducer")?;
        let mut t = self.stack.pop_standard()?;
        if self.variables.is_on("name-nets") {
            t.set_name(name);
        }
        let replaced = self.names.define(name, t, FROM_STACK)?;
        self.report_definition(name, replaced, io)
    }

    fn define_function(&mut self, prototype: &str, body: &str, io: &mut Io<'_>) -> Result<(), XfstError> {
        let def = function::define_function(prototype, body)?;
        let replaced = self
            .names
            .define_function(&def.name, def.arity, def.body, def.display)?;
        if self.verbose() {
            let verb = if replaced { "Redefined" } else { "Defined" };
            writeln!(io.out, "{verb} function '{}@{})'", def.name, def.arity)?;
        }
        Ok(())
    }

    fn push_defined(&mut self, name: Option<&str>, io: &mut Io<'_>) -> Result<(), XfstError> {
        match name {
            Some(name) => {
                let t = self
                    .names
                    .definition(name)
                    .cloned()
                    .ok_or_else(|| XfstError::undefined("defined network", name))?;
                self.stack.push_transducer(t);
            }
            None => {
                let all: Vec<Transducer> = self.names.definitions().map(|(_, t, _)| t.clone()).collect();
                for t in all {
                    self.stack.push_transducer(t);
                }
            }
        }
        self.print_info(io)
    }

    // =========================================================================
    // Algebra
    // =========================================================================

    fn replace_top(&mut self, t: Transducer) -> Result<(), XfstError> {
        *self.stack.top_standard_mut()? = t;
        Ok(())
    }

    fn unary(&mut self, op: UnaryOp, io: &mut Io<'_>) -> Result<(), XfstError> {
        let cfg = self.engine_config();
        let mut t = self.stack.top_standard()?.clone();
        match op {
            UnaryOp::Determinize => {
                t.determinize()?;
            }
            UnaryOp::EpsilonRemove => {
                t.remove_epsilons();
            }
            UnaryOp::Minimize => {
                t.minimize(&cfg)?;
            }
            UnaryOp::Invert => {
                t.invert();
            }
            UnaryOp::UpperSide => {
                t.project_input();
            }
            UnaryOp::LowerSide => {
                t.project_output();
            }
            UnaryOp::Reverse => {
                t.reverse();
            }
            UnaryOp::ZeroPlus => {
                t.repeat_star();
            }
            UnaryOp::OnePlus => {
                t.repeat_plus();
            }
            UnaryOp::Optionalize => {
                t.optionalize();
            }
            UnaryOp::Negate => {
                t.negate()
                    .map_err(|_| XfstError::EngineOperationUnsupported(NEGATION_ON_TRANSDUCER.to_string()))?;
            }
            UnaryOp::Complete => {
                t.complete();
            }
            UnaryOp::Prune => {
                t.trim();
            }
            UnaryOp::CompactSigma => {
                t.prune_alphabet();
            }
            UnaryOp::TwosidedFlags => {
                t.twosided_flags();
            }
            UnaryOp::Label => {
                let mut labels = Transducer::empty();
                for (i, o) in t.labels() {
                    if i == EPSILON && o == EPSILON {
                        continue;
                    }
                    labels.union(&Transducer::from_pair(&i, &o));
                }
                if let Some(name) = t.name() {
                    labels.set_name(name);
                }
                t = labels;
            }
            UnaryOp::Cleanup => {
                t.remove_epsilons();
                t.trim();
            }
        }
        // Minimization would drop the sink of a completed net.
        let reminimize = cfg.minimal
            && !op.is_canonical()
            && !matches!(op, UnaryOp::Complete | UnaryOp::TwosidedFlags);
        if reminimize {
            t.minimize(&cfg)?;
        }
        debug!(?op, states = t.state_count(), arcs = t.arc_count(), "unary");
        self.replace_top(t)?;
        self.print_info(io)
    }

    fn binary(&mut self, op: BinaryOp, io: &mut Io<'_>) -> Result<(), XfstError> {
        self.stack.require(2)?;
        let right = self.stack.pop_standard()?;
        let left = match self.stack.pop_standard() {
            Ok(t) => t,
            Err(e) => {
                self.stack.push_transducer(right);
                return Err(e);
            }
        };
        let cfg = self.engine_config();
        match combine_binary(op, &left, &right, &cfg) {
            Ok(result) => {
                self.stack.push_transducer(result);
                self.print_info(io)
            }
            Err(e) => {
                self.stack.push_transducer(left);
                self.stack.push_transducer(right);
                Err(e)
            }
        }
    }

    /// Reduce the whole stack: the top is the first accumulated result, and
    /// each step computes `next OP result`.
    fn fold(&mut self, op: FoldOp, io: &mut Io<'_>) -> Result<(), XfstError> {
        self.stack.require(2)?;
        let cfg = self.engine_config();
        let mut result = self.stack.pop_standard()?;
        while !self.stack.is_empty() {
            if self.stack.top()?.is_optimized() {
                self.stack.push_transducer(result);
                return Err(XfstError::EngineOperationUnsupported(TYPES_DIFFER.to_string()));
            }
            let mut next = self.stack.pop_standard()?;
            match op {
                FoldOp::Intersect => {
                    next.intersect(&result);
                }
                FoldOp::Concatenate => {
                    next.concatenate(&result);
                }
                FoldOp::Union => {
                    next.union(&result);
                }
                FoldOp::Shuffle => {
                    next.shuffle(&result);
                }
                FoldOp::Compose => {
                    let mut composed = next.clone();
                    if let Err(e) = self.compose_step(&mut composed, &result, &cfg, io) {
                        self.stack.push_transducer(next);
                        self.stack.push_transducer(result);
                        return Err(e);
                    }
                    next = composed;
                }
            }
            result = next;
        }
        if cfg.minimal {
            result.minimize(&cfg)?;
        }
        debug!(?op, states = result.state_count(), arcs = result.arc_count(), "fold");
        self.stack.push_transducer(result);
        self.print_info(io)
    }

    fn compose_step(
        &self,
        left: &mut Transducer,
        right: &Transducer,
        cfg: &EngineConfig,
        io: &mut Io<'_>,
    ) -> Result<(), XfstError> {
        if left.has_flag_diacritics() && right.has_flag_diacritics() && !cfg.harmonize_flags {
            if cfg.flag_is_epsilon && !(flags_are_identities(left) && flags_are_identities(right)) {
                return Err(XfstError::EngineOperationUnsupported(FLAGS_NOT_IDENTITIES.to_string()));
            }
            if self.verbose() {
                writeln!(
                    io.err,
                    "Both composition arguments contain flag diacritics. Set harmonize-flags ON to harmonize them."
                )?;
            }
        }
        left.compose(right, cfg).map_err(|e| match e {
            FstError::FlagsNotIdentities => XfstError::EngineOperationUnsupported(FLAGS_NOT_IDENTITIES.to_string()),
            e => e.into(),
        })?;
        Ok(())
    }

    fn sigma_net(&mut self, io: &mut Io<'_>) -> Result<(), XfstError> {
        let cfg = self.engine_config();
        let mut sigma = Transducer::empty();
        for symbol in self.stack.top_standard()?.alphabet() {
            if !is_special(symbol) {
                sigma.union(&Transducer::from_symbol(symbol));
            }
        }
        if cfg.minimal {
            sigma.minimize(&cfg)?;
        }
        self.stack.push_transducer(sigma);
        self.print_info(io)
    }

    // =========================================================================
    // Substitution
    // =========================================================================

    fn substitute_symbol(&mut self, replacement: &[String], target: &str, io: &mut Io<'_>) -> Result<(), XfstError> {
        let cfg = self.engine_config();
        let mut t = self.stack.top_standard()?.clone();
        if !t.labels().iter().any(|(i, o)| i == target || o == target) && !t.alphabet().contains(target) {
            return Err(XfstError::MalformedInput(format!(
                "no occurrences of symbol '{target}', cannot substitute"
            )));
        }
        let symbols: Vec<String> = replacement
            .iter()
            .filter(|s| s.as_str() != "NOTHING")
            .map(|s| label_symbol(s, true))
            .collect();

        for (i, o) in t.labels() {
            if i != target && o != target {
                continue;
            }
            let mut copies = Transducer::empty();
            for s in &symbols {
                let input = if i == target { s.as_str() } else { i.as_str() };
                let output = if o == target { s.as_str() } else { o.as_str() };
                copies.union(&Transducer::from_pair(input, output));
            }
            t.substitute_label_with_transducer((i.as_str(), o.as_str()), &copies);
        }
        if !symbols.iter().any(|s| s == target) {
            t.remove_symbol(target);
        }
        for s in &symbols {
            t.add_symbol(s);
        }
        if cfg.minimal {
            t.minimize(&cfg)?;
        }
        self.replace_top(t)?;
        self.print_info(io)
    }

    fn substitute_label(&mut self, replacement: &[String], target: &str, io: &mut Io<'_>) -> Result<(), XfstError> {
        let cfg = self.engine_config();
        let label = parse_label(target)?;
        let mut copies = Transducer::empty();
        for text in replacement.iter().filter(|s| s.as_str() != "NOTHING") {
            let (i, o) = parse_label(text)
                .map_err(|_| XfstError::MalformedInput(format!("error: could not substitute with '{text}'")))?;
            copies.union(&Transducer::from_pair(&i, &o));
        }

        let mut t = self.stack.top_standard()?.clone();
        if !t.labels().contains(&label) {
            return Err(XfstError::MalformedInput(format!(
                "no occurrences of '{target}', cannot substitute"
            )));
        }
        t.substitute_label_with_transducer((label.0.as_str(), label.1.as_str()), &copies);
        if cfg.minimal {
            t.minimize(&cfg)?;
        }
        self.replace_top(t)?;
        self.print_info(io)
    }

    fn substitute_defined(&mut self, name: &str, label: &str, io: &mut Io<'_>) -> Result<(), XfstError> {
        let cfg = self.engine_config();
        let replacement = self
            .names
            .definition(name)
            .cloned()
            .ok_or_else(|| XfstError::undefined("definition", name))?;
        let symbol = label_symbol(label, true);

        let mut t = self.stack.top_standard()?.clone();
        let labels = t.labels();
        if !labels.contains(&(symbol.clone(), symbol.clone())) {
            return Err(XfstError::MalformedInput(format!(
                "no occurrences of label '{label}', cannot substitute"
            )));
        }
        if labels.iter().any(|(i, o)| i != o && (*i == symbol || *o == symbol)) {
            return Err(XfstError::MalformedInput(format!(
                "label '{label}' is used as a symbol on one side of an arc, cannot substitute"
            )));
        }
        t.substitute_label_with_transducer((symbol.as_str(), symbol.as_str()), &replacement);
        if !is_special(&symbol) && !replacement.alphabet().contains(&symbol) {
            t.remove_symbol(&symbol);
        }
        if cfg.minimal {
            t.minimize(&cfg)?;
        }
        self.replace_top(t)?;
        self.print_info(io)
    }

    // =========================================================================
    // Flags, compile-replace and representation
    // =========================================================================

    fn eliminate_flag(&mut self, feature: Option<&str>, io: &mut Io<'_>) -> Result<(), XfstError> {
        let mut t = self.stack.top_standard()?.clone();
        t.eliminate_flags(feature).map_err(|e| match feature {
            Some(name) => XfstError::EngineOperationUnsupported(format!(
                "error: could not eliminate flag '{name}': {e}"
            )),
            None => e.into(),
        })?;
        self.replace_top(t)?;
        self.print_info(io)
    }

    fn compile_replace(&mut self, level: Level, io: &mut Io<'_>) -> Result<(), XfstError> {
        let cfg = self.engine_config();
        let retokenize = self.variables.is_on("retokenize");
        let t = compile_replace(self.stack.top_standard()?, level, retokenize, &self.names, &cfg)?;
        if self.verbose() {
            writeln!(io.out, "Network is well-formed.")?;
        }
        self.replace_top(t)?;
        self.print_info(io)
    }

    fn lookup_optimize(&mut self, io: &mut Io<'_>) -> Result<(), XfstError> {
        if self.stack.top()?.is_optimized() {
            writeln!(io.err, "Network is already optimized for lookup.")?;
            return Ok(());
        }
        if self.verbose() {
            writeln!(
                io.err,
                "converting the stack to lookup-optimized form, this might take a while..."
            )?;
        }
        let converted = self
            .stack
            .iter()
            .rev()
            .map(|net| match net {
                Network::Standard(t) => CompactTransducer::from_transducer(t).map(Network::Optimized),
                Network::Optimized(c) => Ok(Network::Optimized(c.clone())),
            })
            .collect::<Result<Vec<_>, FstError>>()?;
        self.stack.clear();
        for net in converted {
            self.stack.push(net);
        }
        Ok(())
    }

    fn remove_optimization(&mut self, io: &mut Io<'_>) -> Result<(), XfstError> {
        if !self.stack.top()?.is_optimized() {
            writeln!(io.err, "Network is already in ordinary format.")?;
            return Ok(());
        }
        for net in self.stack.take_all() {
            self.stack.push_transducer(net.to_standard());
        }
        Ok(())
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    fn apply(&mut self, direction: Direction, inputs: &[String], io: &mut Io<'_>) -> Result<(), XfstError> {
        let cfg = self.engine_config();
        let applier = Applier::new(self.stack.top()?, direction, &self.variables, &cfg, io.err)?;
        for line in inputs {
            applier.apply(line, io.out)?;
        }
        Ok(())
    }

    // =========================================================================
    // Variables and environment
    // =========================================================================

    fn set_variable(&mut self, name: &str, value: &str, io: &mut Io<'_>) -> Result<(), XfstError> {
        let name = if name == FLAG_AS_SPECIAL {
            writeln!(
                io.err,
                "variable {FLAG_AS_SPECIAL} not found, using flag-is-epsilon instead"
            )?;
            "flag-is-epsilon"
        } else {
            name
        };
        let value = self.variables.set(name, value)?.to_string();
        if name == "random-seed" {
            self.reseed();
        }
        if self.verbose() {
            writeln!(io.out, "variable {name} = {value}")?;
        }
        Ok(())
    }

    fn show(&mut self, name: Option<&str>, io: &mut Io<'_>) -> Result<(), XfstError> {
        match name {
            Some(name) if name != "all" => {
                let value = self
                    .variables
                    .get(name)
                    .ok_or_else(|| XfstError::UnknownVariable(name.to_string()))?;
                writeln!(io.out, "variable {name} = {value}")?;
            }
            _ => {
                for (name, value, explanation) in self.variables.iter() {
                    writeln!(io.out, "{name:>20}: {value:>6}: {explanation}")?;
                }
            }
        }
        Ok(())
    }

    fn system(&mut self, command: &str, io: &mut Io<'_>) -> Result<(), XfstError> {
        if self.is_restricted() {
            return Err(XfstError::EngineOperationUnsupported(
                "Restricted mode (--restricted-mode) is in use, system calls are disabled".to_string(),
            ));
        }
        let output = std::process::Command::new("sh").arg("-c").arg(command).output()?;
        io.out.write_all(&output.stdout)?;
        io.err.write_all(&output.stderr)?;
        if !output.status.success() {
            writeln!(io.err, "system {command} returned {}", output.status.code().unwrap_or(-1))?;
        }
        Ok(())
    }

    /// Reject paths outside the current directory in restricted mode.
    pub(crate) fn check_filename(&self, path: &Path) -> Result<(), XfstError> {
        let text = path.to_string_lossy();
        if self.is_restricted() && (text.contains('/') || text.contains('\\')) {
            return Err(XfstError::ResourceFailure(
                "Restricted mode (--restricted-mode) is in use, write and read operations are allowed\n\
                 only in current directory (i.e. filenames cannot contain '/' or '\\')"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

fn combine_binary(op: BinaryOp, left: &Transducer, right: &Transducer, cfg: &EngineConfig) -> Result<Transducer, XfstError> {
    let mut result = left.clone();
    match op {
        BinaryOp::Ignore => {
            result.insert_freely(right);
        }
        BinaryOp::Minus => {
            result.subtract(right)?;
        }
        BinaryOp::CrossProduct => {
            result.cross_product(right).map_err(|e| match e {
                FstError::NotAutomaton(_) => {
                    XfstError::EngineOperationUnsupported("transducers are not automata".to_string())
                }
                e => e.into(),
            })?;
        }
    }
    if cfg.minimal {
        result.minimize(cfg)?;
    }
    debug!(?op, states = result.state_count(), arcs = result.arc_count(), "binary");
    Ok(result)
}

fn flags_are_identities(t: &Transducer) -> bool {
    t.arcs()
        .all(|(_, a)| !(is_flag_diacritic(&a.input) || is_flag_diacritic(&a.output)) || a.input == a.output)
}

/// A label symbol as typed by the user: `0` is epsilon, `?` is identity
/// when it stands alone and unknown inside a pair.
fn label_symbol(text: &str, alone: bool) -> String {
    match text {
        "0" => EPSILON.to_string(),
        "?" if alone => IDENTITY.to_string(),
        "?" => UNKNOWN.to_string(),
        _ => text.to_string(),
    }
}

/// `a` or `a:b`.
fn parse_label(text: &str) -> Result<(String, String), XfstError> {
    let parts: Vec<&str> = match text.split_once(':') {
        Some((i, o)) if !i.is_empty() && !o.is_empty() => vec![i, o],
        None if !text.is_empty() => vec![text],
        _ => return Err(XfstError::MalformedInput(format!("error: could not substitute '{text}'"))),
    };
    match parts.as_slice() {
        [s] => {
            let s = label_symbol(s, true);
            Ok((s.clone(), s))
        }
        [i, o] => Ok((label_symbol(i, false), label_symbol(o, false))),
        _ => Err(XfstError::MalformedInput(format!("error: could not substitute '{text}'"))),
    }
}

#[cfg(test)]
mod tests {
    use xfst_fst::paths::ExtractOptions;

    use super::*;

    fn run(session: &mut Session, script: &str) -> (String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        session.run_script(script, &mut Io::new(&mut out, &mut err));
        (String::from_utf8(out).unwrap(), String::from_utf8(err).unwrap())
    }

    fn top_words(session: &Session) -> Vec<String> {
        let mut words: Vec<String> = session
            .stack()
            .top_standard()
            .unwrap()
            .extract_paths(&ExtractOptions::default())
            .unwrap()
            .iter()
            .map(|p| format!("{}:{}", p.input().collect::<String>(), p.output().collect::<String>()))
            .collect();
        words.sort();
        words
    }

    #[test]
    fn label_parsing() {
        assert_eq!(parse_label("a").unwrap(), ("a".into(), "a".into()));
        assert_eq!(parse_label("a:0").unwrap(), ("a".into(), EPSILON.into()));
        assert_eq!(parse_label("?").unwrap(), (IDENTITY.into(), IDENTITY.into()));
        assert!(parse_label("a:").is_err());
    }

    #[test]
    fn binary_underflow_leaves_stack() {
        let mut session = Session::new();
        let (_, err) = run(&mut session, "regex a;\nminus net\n");
        assert!(err.contains("Not enough networks on stack. Operation requires at least 2."));
        assert_eq!(session.stack().len(), 1);
    }

    #[test]
    fn minus_uses_top_as_right_operand() {
        let mut session = Session::new();
        run(&mut session, "regex a | b;\nregex a;\nminus net\n");
        assert_eq!(session.stack().len(), 1);
        assert_eq!(top_words(&session), vec!["b:b"]);
    }

    #[test]
    fn fold_follows_stack_order() {
        let mut session = Session::new();
        run(&mut session, "regex a;\nregex b;\nregex c;\nconcatenate net\n");
        assert_eq!(top_words(&session), vec!["abc:abc"]);
    }

    #[test]
    fn compose_follows_stack_order() {
        let mut session = Session::new();
        run(&mut session, "regex a:b;\nregex b:c;\ncompose net\n");
        assert_eq!(top_words(&session), vec!["a:c"]);
    }

    #[test]
    fn fold_stops_at_optimized_network() {
        let mut session = Session::new();
        let (_, err) = run(&mut session, "regex a;\nlookup-optimize\nregex b;\nregex c;\nunion net\n");
        assert!(err.contains(TYPES_DIFFER));
        assert_eq!(session.stack().len(), 2);
        assert!(!session.stack().top().unwrap().is_optimized());
        assert!(session.stack().iter().nth(1).unwrap().is_optimized());
    }

    #[test]
    fn negating_a_transducer_fails_without_change() {
        let mut session = Session::new();
        let (_, err) = run(&mut session, "regex a:b;\nnegate net\n");
        assert!(err.starts_with("Error: Negation is defined only for automata."));
        assert_eq!(top_words(&session), vec!["a:b"]);
    }

    #[test]
    fn define_push_and_undefine() {
        let mut session = Session::new();
        let (out, err) = run(
            &mut session,
            "set verbose ON\ndefine A a b;\ndefine A c;\npush defined A\nundefine A B\n",
        );
        assert!(out.contains("Defined 'A'"));
        assert!(out.contains("Redefined 'A'"));
        assert!(err.contains("no such definition: 'B'"));
        assert_eq!(top_words(&session), vec!["c:c"]);
        assert_eq!(session.names().definitions().count(), 0);
    }

    #[test]
    fn define_from_stack_pops() {
        let mut session = Session::new();
        run(&mut session, "regex x;\ndefine X\n");
        assert!(session.stack().is_empty());
        assert!(session.names().definition("X").is_some());
    }

    #[test]
    fn list_and_definition_do_not_mix() {
        let mut session = Session::new();
        let (_, err) = run(&mut session, "list V a e i;\ndefine V x;\n");
        assert!(err.contains("has already been defined as a list variable"));
        assert_eq!(session.names().list("V").map(|l| l.len()), Some(3));
    }

    #[test]
    fn substitute_symbol_and_label() {
        let mut session = Session::new();
        run(&mut session, "regex a b;\nsubstitute symbol x y for b\n");
        assert_eq!(top_words(&session), vec!["ax:ax", "ay:ay"]);

        run(&mut session, "regex c:d;\nsubstitute label e:f for c:d\n");
        assert_eq!(top_words(&session), vec!["e:f"]);

        let (_, err) = run(&mut session, "substitute label g for q:r\n");
        assert!(err.contains("no occurrences of 'q:r', cannot substitute"));
    }

    #[test]
    fn substitute_defined_splices_network() {
        let mut session = Session::new();
        run(&mut session, "define D x y;\nregex a L b;\nsubstitute defined D for L\n");
        assert_eq!(top_words(&session), vec!["axyb:axyb"]);
    }

    #[test]
    fn optimization_round_trip() {
        let mut session = Session::new();
        let (_, err) = run(&mut session, "regex a;\nregex b;\nlookup-optimize\nlookup-optimize\n");
        assert!(err.contains("Network is already optimized for lookup."));
        assert!(session.stack().iter().all(Network::is_optimized));
        run(&mut session, "remove-optimization\n");
        assert!(!session.stack().iter().any(Network::is_optimized));
        assert_eq!(top_words(&session), vec!["b:b"]);
    }

    #[test]
    fn deprecated_flag_variable_is_mapped() {
        let mut session = Session::new();
        let (_, err) = run(&mut session, "set compose-flag-as-special ON\n");
        assert!(err.contains("using flag-is-epsilon instead"));
        assert!(session.variables().is_on("flag-is-epsilon"));
    }

    #[test]
    fn restricted_mode_refuses_system_and_paths() {
        let mut session = Session::new().with_restricted(true);
        let (_, err) = run(&mut session, "system echo hi\nregex a;\nsave stack ../out.fst\n");
        assert!(err.contains("system calls are disabled"));
        assert!(err.contains("filenames cannot contain"));
    }

    #[test]
    fn sigma_net_keeps_top() {
        let mut session = Session::new();
        run(&mut session, "regex a b:c;\nsigma net\n");
        assert_eq!(session.stack().len(), 2);
        assert_eq!(top_words(&session), vec!["a:a", "b:b", "c:c"]);
    }

    #[test]
    fn compile_replace_on_unmatched_marker_leaves_stack() {
        let mut session = Session::new();
        let (_, err) = run(&mut session, "regex b;\nregex a:\"^[\" c;\ncompile-replace lower\n");
        assert!(err.contains("Network is not well-formed."));
        assert_eq!(session.stack().len(), 2);
        assert_eq!(top_words(&session), vec!["ac:^[c"]);
    }

    #[test]
    fn unary_ops_replace_top() {
        let mut session = Session::new();
        run(&mut session, "regex a:b;\ninvert net\n");
        assert_eq!(top_words(&session), vec!["b:a"]);
        run(&mut session, "upper-side net\n");
        assert_eq!(top_words(&session), vec!["b:b"]);
        run(&mut session, "regex c:d;\nlabel net\n");
        assert_eq!(top_words(&session), vec!["c:d"]);
    }
}
