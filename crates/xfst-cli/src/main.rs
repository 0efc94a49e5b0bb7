// xfst: run transducer scripts.
//
// Commands come from `-e` arguments, a script file, or standard input. When
// standard input is a terminal the session is interactive: a prompt shows
// the stack depth and lesser failures never end the session.
//
// Usage:
//   xfst [-e COMMAND]... [-F SCRIPT] [-l STACK] [-r] [-p]
//
// The exit status is 1 when the session failed with quit-on-fail ON.

use std::fs;
use std::io::{self, BufWriter, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use xfst_interp::{Command, Io, ScriptReader, Session};

#[derive(Parser)]
#[command(name = "xfst")]
#[command(about = "Stack-based interpreter for xfst-style transducer scripts")]
#[command(version)]
struct Args {
    /// Run COMMAND before anything else (repeatable)
    #[arg(short = 'e', long = "execute", value_name = "COMMAND")]
    execute: Vec<String>,

    /// Read commands from SCRIPT instead of standard input
    #[arg(short = 'F', long = "scriptfile", value_name = "SCRIPT")]
    script: Option<PathBuf>,

    /// Push the networks of a saved stack before running commands
    #[arg(short = 'l', long = "load-stack", value_name = "STACK")]
    load_stack: Option<PathBuf>,

    /// Refuse `system` and file names outside the current directory
    #[arg(short = 'r', long = "restricted-mode")]
    restricted: bool,

    /// Treat standard input as a script even when it is a terminal
    #[arg(short = 'p', long = "pipe-mode")]
    pipe: bool,

    /// Log filter, e.g. `debug` or `xfst_fst=trace` (overrides RUST_LOG)
    #[arg(long, value_name = "FILTER")]
    log_level: Option<String>,
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.log_level.as_deref());

    let interactive = args.script.is_none() && args.execute.is_empty() && !args.pipe && io::stdin().is_terminal();
    let mut session = Session::new()
        .with_interactive(interactive)
        .with_restricted(args.restricted);
    debug!(interactive, restricted = args.restricted, "starting session");

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut err = io::stderr();

    if let Some(path) = &args.load_stack {
        session.dispatch(Command::LoadStack(path.clone()), &mut Io::new(&mut out, &mut err));
    }
    for command in &args.execute {
        if session.should_stop() {
            break;
        }
        session.run_script(command, &mut Io::new(&mut out, &mut err));
    }

    if !session.should_stop() {
        if let Some(path) = &args.script {
            let text = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
            session.run_script(&text, &mut Io::new(&mut out, &mut err));
        } else if args.execute.is_empty() {
            let stdin = io::stdin();
            let reader = ScriptReader::from_reader(stdin.lock());
            if interactive {
                run_interactive(&mut session, reader, &mut out, &mut err)?;
            } else {
                session.run(reader, &mut Io::new(&mut out, &mut err));
            }
        }
    }

    out.flush().context("failed to flush output")?;
    Ok(if session.has_failed() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Prompt before each command and flush results as they come.
fn run_interactive<L>(
    session: &mut Session,
    mut reader: ScriptReader<L>,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<()>
where
    L: Iterator<Item = io::Result<String>>,
{
    loop {
        out.flush()?;
        write!(err, "xfst[{}]: ", session.stack().len())?;
        err.flush()?;
        let Some(command) = reader.next() else {
            writeln!(err)?;
            break;
        };
        let mut io = Io::new(&mut *out, &mut *err);
        match command {
            Ok(command) => session.dispatch(command, &mut io),
            Err(e) => session.report(&e, &mut io),
        }
        if session.should_stop() {
            break;
        }
    }
    Ok(())
}
