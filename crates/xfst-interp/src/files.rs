// Reading and writing networks: the native container for stacks and
// definitions, and the text codecs.

use std::fs;
use std::path::Path;

use tracing::debug;
use xfst_fst::format::{StoredNetwork, read_container, write_container};
use xfst_fst::{CompactTransducer, Transducer, att, dot, prolog};

use crate::command::{ReadFormat, WriteFormat};
use crate::error::XfstError;
use crate::session::{Io, Session};
use crate::stack::Network;

fn read_bytes(path: &Path) -> Result<Vec<u8>, XfstError> {
    fs::read(path).map_err(|e| XfstError::ResourceFailure(format!("could not read '{}': {e}", path.display())))
}

fn read_text(path: &Path) -> Result<String, XfstError> {
    fs::read_to_string(path)
        .map_err(|e| XfstError::ResourceFailure(format!("could not read '{}': {e}", path.display())))
}

fn write_bytes(path: &Path, data: &[u8]) -> Result<(), XfstError> {
    fs::write(path, data)
        .map_err(|e| XfstError::ResourceFailure(format!("could not write '{}': {e}", path.display())))
}

fn stored(net: &Network) -> StoredNetwork {
    StoredNetwork {
        transducer: net.to_standard(),
        optimized: net.is_optimized(),
    }
}

fn restored(entry: StoredNetwork) -> Result<Network, XfstError> {
    if entry.optimized {
        Ok(Network::Optimized(CompactTransducer::from_transducer(&entry.transducer)?))
    } else {
        Ok(Network::Standard(entry.transducer))
    }
}

/// Union of one path per line. `spaced` lines hold whitespace-separated
/// symbols or `a:b` pairs; other lines are read one character per symbol.
fn words_network(text: &str, spaced: bool) -> Transducer {
    let mut t = Transducer::empty();
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if spaced {
            if line.trim().is_empty() {
                continue;
            }
            let pairs = line.split_whitespace().map(|token| match token.split_once(':') {
                Some((i, o)) if !i.is_empty() && !o.is_empty() => (symbol(i), symbol(o)),
                _ => (symbol(token), symbol(token)),
            });
            t.union(&Transducer::from_pairs(pairs));
        } else {
            if line.is_empty() {
                continue;
            }
            t.union(&Transducer::from_symbols(line.chars().map(String::from)));
        }
    }
    t
}

fn symbol(text: &str) -> String {
    match text {
        "0" => xfst_fst::symbols::EPSILON.to_string(),
        _ => text.to_string(),
    }
}

impl Session {
    /// Push every network of a native container, in file order.
    pub(crate) fn load_stack(&mut self, path: &Path, io: &mut Io<'_>) -> Result<(), XfstError> {
        self.check_filename(path)?;
        let entries = read_container(&read_bytes(path)?)?;
        let nets = entries.into_iter().map(restored).collect::<Result<Vec<_>, _>>()?;
        debug!(path = %path.display(), count = nets.len(), "load stack");
        for net in nets {
            self.stack.push(net);
        }
        self.print_info(io)
    }

    /// Write the stack bottom first, so that `load stack` restores it.
    pub(crate) fn save_stack(&mut self, path: &Path) -> Result<(), XfstError> {
        self.check_filename(path)?;
        self.stack.require(1)?;
        let entries: Vec<StoredNetwork> = self.stack.iter().rev().map(stored).collect();
        write_bytes(path, &write_container(&entries))
    }

    /// Bind every named network of a container as a definition.
    pub(crate) fn load_defined(&mut self, path: &Path, io: &mut Io<'_>) -> Result<(), XfstError> {
        self.check_filename(path)?;
        let entries = read_container(&read_bytes(path)?)?;
        if entries.iter().any(|e| e.optimized) {
            return Err(XfstError::EngineOperationUnsupported(
                "cannot load optimized lookup transducers as definitions".to_string(),
            ));
        }
        for entry in entries {
            let Some(name) = entry.transducer.name().map(str::to_string) else {
                writeln!(io.err, "warning: loaded transducer definition has no name, skipping it")?;
                continue;
            };
            if xfst_regex::Environment::definition(&self.names, &name).is_some() {
                writeln!(
                    io.err,
                    "warning: a definition named '{name}' already exists, overwriting it"
                )?;
            }
            self.names.define(&name, entry.transducer, format!("<loaded from {}>", path.display()))?;
        }
        Ok(())
    }

    /// Write every definition, each named after its binding.
    pub(crate) fn save_defined(&mut self, path: &Path) -> Result<(), XfstError> {
        self.check_filename(path)?;
        let entries: Vec<StoredNetwork> = self
            .names
            .definitions()
            .map(|(name, t, _)| {
                let mut t = t.clone();
                t.set_name(name);
                StoredNetwork {
                    transducer: t,
                    optimized: false,
                }
            })
            .collect();
        write_bytes(path, &write_container(&entries))
    }

    pub(crate) fn write_definition(&mut self, name: &str, path: &Path) -> Result<(), XfstError> {
        self.check_filename(path)?;
        let mut t = xfst_regex::Environment::definition(&self.names, name)
            .cloned()
            .ok_or_else(|| XfstError::undefined("definition", name))?;
        t.set_name(name);
        write_bytes(
            path,
            &write_container(&[StoredNetwork {
                transducer: t,
                optimized: false,
            }]),
        )
    }

    pub(crate) fn read_file(&mut self, format: ReadFormat, path: &Path, io: &mut Io<'_>) -> Result<(), XfstError> {
        self.check_filename(path)?;
        let text = read_text(path)?;
        let nets = match format {
            ReadFormat::Att => {
                let epsilons = self.variables.att_epsilons();
                let epsilons: Vec<&str> = epsilons.iter().map(String::as_str).collect();
                att::read_att(&text, &epsilons)?
            }
            ReadFormat::Prolog => prolog::read_prolog(&text)?,
            ReadFormat::Text | ReadFormat::Spaced => {
                let cfg = self.engine_config();
                let mut t = words_network(&text, format == ReadFormat::Spaced);
                if cfg.minimal {
                    t.minimize(&cfg)?;
                }
                vec![t]
            }
        };
        debug!(path = %path.display(), ?format, count = nets.len(), "read");
        for t in nets {
            self.stack.push_transducer(t);
        }
        self.print_info(io)
    }

    /// Write the stack bottom first in a text format, to `path` or the
    /// output sink. Dot shows the top network only.
    pub(crate) fn write_file(&mut self, format: WriteFormat, path: Option<&Path>, io: &mut Io<'_>) -> Result<(), XfstError> {
        if let Some(path) = path {
            self.check_filename(path)?;
        }
        self.stack.require(1)?;
        let precision = self.variables.precision();
        let text = match format {
            WriteFormat::Att => {
                let nets: Vec<Transducer> = self.stack.iter().rev().map(Network::to_standard).collect();
                att::write_att_many(&nets, precision, true)
            }
            WriteFormat::Prolog => self
                .stack
                .iter()
                .rev()
                .map(|net| prolog::write_prolog(&net.to_standard(), precision, true))
                .collect::<Vec<_>>()
                .join("\n"),
            WriteFormat::Dot => dot::write_dot(
                &self.stack.top()?.to_standard(),
                precision,
                self.variables.is_on("print-weight"),
            ),
        };
        match path {
            Some(path) => write_bytes(path, text.as_bytes()),
            None => {
                io.out.write_all(text.as_bytes())?;
                Ok(())
            }
        }
    }
}
