// Session state: the stack, the name table, the variables and the sticky
// failure flag. Commands reach it through `Session::dispatch`.

use std::io::Write;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;
use xfst_fst::EngineConfig;

use crate::command::Command;
use crate::error::{Severity, XfstError};
use crate::names::NameTable;
use crate::script::ScriptReader;
use crate::stack::{Network, Stack};
use crate::variables::Variables;

/// Output and diagnostic sinks for one dispatch.
pub struct Io<'a> {
    pub out: &'a mut dyn Write,
    pub err: &'a mut dyn Write,
}

impl<'a> Io<'a> {
    pub fn new(out: &'a mut dyn Write, err: &'a mut dyn Write) -> Self {
        Self { out, err }
    }
}

/// Nesting limit for aliases that call aliases.
const MAX_ALIAS_DEPTH: usize = 32;

pub struct Session {
    pub(crate) stack: Stack,
    pub(crate) names: NameTable,
    pub(crate) variables: Variables,
    pub(crate) rng: StdRng,
    interactive: bool,
    restricted: bool,
    failed: bool,
    quit: bool,
    alias_depth: usize,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            stack: Stack::new(),
            names: NameTable::new(),
            variables: Variables::new(),
            rng: StdRng::from_os_rng(),
            interactive: false,
            restricted: false,
            failed: false,
            quit: false,
            alias_depth: 0,
        }
    }

    /// Commands come from a live input stream; lesser failures never stop
    /// the session.
    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Refuse `system` and file names outside the current directory.
    pub fn with_restricted(mut self, restricted: bool) -> Self {
        self.restricted = restricted;
        self
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut Stack {
        &mut self.stack
    }

    pub fn names(&self) -> &NameTable {
        &self.names
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn is_restricted(&self) -> bool {
        self.restricted
    }

    /// The sticky failure flag. Never cleared once set.
    pub fn has_failed(&self) -> bool {
        self.failed
    }

    pub fn quit_requested(&self) -> bool {
        self.quit
    }

    /// Whether the driving loop should stop reading commands.
    pub fn should_stop(&self) -> bool {
        self.failed || self.quit
    }

    pub(crate) fn request_quit(&mut self) {
        self.quit = true;
    }

    pub fn engine_config(&self) -> EngineConfig {
        self.variables.engine_config()
    }

    pub(crate) fn verbose(&self) -> bool {
        self.variables.is_on("verbose")
    }

    /// Reseed the random generator from the `random-seed` variable.
    pub(crate) fn reseed(&mut self) {
        self.rng = match self.variables.random_seed() {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
    }

    /// Escalate a failure of `severity` to the sticky flag when
    /// `quit-on-fail` is ON.
    pub(crate) fn escalate(&mut self, severity: Severity) {
        if !self.variables.is_on("quit-on-fail") {
            return;
        }
        match severity {
            Severity::Fail => self.failed = true,
            Severity::LesserFail => {
                if !self.interactive {
                    self.failed = true;
                }
            }
        }
    }

    /// A false test result stops the session when asserted and
    /// `quit-on-fail` is ON, interactive or not.
    pub(crate) fn check_assertion(&mut self, value: bool, asserted: bool) {
        let asserted = asserted || self.variables.is_on("assert");
        if !value && asserted && self.variables.is_on("quit-on-fail") {
            self.failed = true;
        }
    }

    /// Write `err` to the diagnostic sink and escalate it.
    pub fn report(&mut self, err: &XfstError, io: &mut Io<'_>) {
        debug!(error = %err, severity = ?err.severity(), "command failed");
        // A broken diagnostic sink leaves nothing else to report to.
        let _ = writeln!(io.err, "{err}");
        self.escalate(err.severity());
    }

    /// Dispatch every command from `commands` until the session stops.
    /// Reader errors are reported like failed commands.
    pub fn run<I>(&mut self, commands: I, io: &mut Io<'_>)
    where
        I: IntoIterator<Item = Result<Command, XfstError>>,
    {
        for command in commands {
            match command {
                Ok(command) => self.dispatch(command, io),
                Err(e) => self.report(&e, io),
            }
            if self.should_stop() {
                break;
            }
        }
    }

    /// Parse and run a whole script.
    pub fn run_script(&mut self, text: &str, io: &mut Io<'_>) {
        self.run(ScriptReader::from_text(text), io);
    }

    /// Replay the body of the alias `name`.
    pub(crate) fn invoke_alias(&mut self, name: &str, io: &mut Io<'_>) -> Result<(), XfstError> {
        let body = match self.names.alias(name) {
            Some(body) => body.to_string(),
            None => return Err(XfstError::MalformedInput(format!("unknown command: '{name}'"))),
        };
        if self.alias_depth >= MAX_ALIAS_DEPTH {
            return Err(XfstError::MalformedInput(format!(
                "alias '{name}' nested too deeply"
            )));
        }
        self.alias_depth += 1;
        self.run(ScriptReader::from_text(&body), io);
        self.alias_depth -= 1;
        Ok(())
    }

    /// `? bytes. N states, M arcs, P paths.` for one network.
    pub(crate) fn size_line(net: &Network) -> String {
        match net {
            Network::Standard(t) => {
                let paths = match t.path_count() {
                    Some(n) => n.to_string(),
                    None => "Circular".to_string(),
                };
                format!(
                    "? bytes. {} states, {} arcs, {paths} paths.",
                    t.state_count(),
                    t.arc_count()
                )
            }
            Network::Optimized(c) => format!(
                "? bytes. {} states, {} arcs, ? paths.",
                c.state_count(),
                c.transition_count()
            ),
        }
    }

    /// In verbose mode, describe the top network after a change.
    pub(crate) fn print_info(&self, io: &mut Io<'_>) -> Result<(), XfstError> {
        if !self.verbose() {
            return Ok(());
        }
        if let Ok(top) = self.stack.top() {
            writeln!(io.out, "{}", Self::size_line(top))?;
            if self.variables.is_on("print-sigma") {
                if let Network::Standard(t) = top {
                    write!(io.out, "{}", xfst_fst::listing::write_sigma(t))?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(session: &mut Session, script: &str) -> (String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        session.run_script(script, &mut Io::new(&mut out, &mut err));
        (String::from_utf8(out).unwrap(), String::from_utf8(err).unwrap())
    }

    #[test]
    fn lesser_failures_stop_batch_sessions_only() {
        let mut batch = Session::new();
        let (_, err) = run(&mut batch, "set quit-on-fail ON\npop\necho after\n");
        assert!(err.contains("Stack is empty."));
        assert!(batch.has_failed());

        let mut interactive = Session::new().with_interactive(true);
        let (out, _) = run(&mut interactive, "set quit-on-fail ON\npop\necho after\n");
        assert!(!interactive.has_failed());
        assert_eq!(out, "after\n");
    }

    #[test]
    fn failures_without_quit_on_fail_continue() {
        let mut session = Session::new();
        let (out, _) = run(&mut session, "pop\necho still here\n");
        assert!(!session.has_failed());
        assert_eq!(out, "still here\n");
    }

    #[test]
    fn asserted_tests_stop_interactive_sessions() {
        let mut session = Session::new().with_interactive(true);
        let (out, _) = run(
            &mut session,
            "set quit-on-fail ON\nregex a;\nassert null\necho unreachable\n",
        );
        assert_eq!(out, "0, (1 = TRUE, 0 = FALSE)\n");
        assert!(session.has_failed());
    }

    #[test]
    fn aliases_replay_commands() {
        let mut session = Session::new();
        let (out, _) = run(&mut session, "alias twice echo one\nalias twice echo two\ntwice\n");
        assert_eq!(out, "two\n");
    }

    #[test]
    fn recursive_alias_is_cut_off() {
        let mut session = Session::new();
        let (_, err) = run(&mut session, "alias loop loop\nloop\n");
        assert!(err.contains("nested too deeply"));
    }

    #[test]
    fn size_line_counts_paths() {
        let net = Network::Standard(xfst_fst::Transducer::from_symbols(["c", "a", "t"]));
        assert_eq!(Session::size_line(&net), "? bytes. 4 states, 3 arcs, 1 paths.");
    }
}
