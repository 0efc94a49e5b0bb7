// Script reader: turns command text into decoded `Command` values.
//
// One command per line, except that commands ending in a regular
// expression run until the terminating `;`, and `apply` or `alias` with no
// inline argument take the following lines up to `END;`. A `#` outside
// quotes and not escaped with `%` starts a comment.

use std::io::{self, BufRead};
use std::path::PathBuf;

use tracing::trace;

use crate::apply::Direction;
use crate::command::{BinaryOp, Command, FoldOp, PrintTarget, ReadFormat, TestKind, UnaryOp, WriteFormat};
use crate::compile_replace::Level;
use crate::error::XfstError;
use crate::printer::Side;

/// Lines of an in-memory script.
pub type TextLines = std::vec::IntoIter<io::Result<String>>;

/// Terminates a multi-line `apply` or `alias` block.
const BLOCK_END: &str = "END;";

pub struct ScriptReader<L> {
    lines: L,
    /// Text left over after a `;` on the same line.
    pending: Option<String>,
    line: usize,
}

impl ScriptReader<TextLines> {
    pub fn from_text(text: &str) -> Self {
        let lines: Vec<io::Result<String>> = text.lines().map(|l| Ok(l.to_string())).collect();
        Self::new(lines.into_iter())
    }
}

impl<R: BufRead> ScriptReader<io::Lines<R>> {
    pub fn from_reader(reader: R) -> Self {
        Self::new(reader.lines())
    }
}

impl<L> ScriptReader<L>
where
    L: Iterator<Item = io::Result<String>>,
{
    pub fn new(lines: L) -> Self {
        Self {
            lines,
            pending: None,
            line: 0,
        }
    }

    /// Number of lines read so far.
    pub fn line(&self) -> usize {
        self.line
    }

    fn next_line(&mut self) -> Option<Result<String, XfstError>> {
        if let Some(rest) = self.pending.take() {
            return Some(Ok(rest));
        }
        let line = self.lines.next()?;
        self.line += 1;
        Some(line.map(|l| l.trim_end_matches('\r').to_string()).map_err(XfstError::from))
    }

    /// Text up to the first unquoted `;`, reading more lines as needed. Text
    /// after the `;` is kept for the next command.
    fn regex_body(&mut self, first: &str) -> Result<String, XfstError> {
        let mut text = first.to_string();
        loop {
            if let Some(end) = find_unquoted(&text, ';') {
                let rest = text[end + 1..].trim();
                if !rest.is_empty() {
                    self.pending = Some(rest.to_string());
                }
                text.truncate(end);
                return Ok(text.trim().to_string());
            }
            match self.next_line() {
                Some(line) => {
                    let line = line?;
                    text.push('\n');
                    text.push_str(strip_comment(&line));
                }
                None => {
                    return Err(XfstError::MalformedInput(format!(
                        "missing ';' at the end of regular expression '{}'",
                        text.trim()
                    )));
                }
            }
        }
    }

    /// Lines up to `END;` or the end of input.
    fn block(&mut self) -> Result<Vec<String>, XfstError> {
        let mut lines = Vec::new();
        while let Some(line) = self.next_line() {
            let line = line?;
            if line.trim() == BLOCK_END {
                break;
            }
            lines.push(line);
        }
        Ok(lines)
    }

    fn parse(&mut self, text: &str) -> Result<Command, XfstError> {
        let words: Vec<&str> = text.split_whitespace().collect();
        match words.as_slice() {
            ["regex", ..] => return Ok(Command::Regex(self.regex_body(after_words(text, 1))?)),
            ["read", "regex", ..] => return Ok(Command::Regex(self.regex_body(after_words(text, 2))?)),
            ["define", ..] => return self.define(after_words(text, 1)),
            ["list", name, "from", start, "to", end] => {
                if let (Some(start), Some(end)) = (single_char(start), single_char(end.trim_end_matches(';'))) {
                    return Ok(Command::DefineListRange {
                        name: name.to_string(),
                        start,
                        end,
                    });
                }
                let members = self.regex_body(after_words(text, 2))?;
                return Ok(Command::DefineList {
                    name: name.to_string(),
                    members: members.split_whitespace().map(str::to_string).collect(),
                });
            }
            ["list", name, ..] => {
                let members = self.regex_body(after_words(text, 2))?;
                return Ok(Command::DefineList {
                    name: name.trim_end_matches(';').to_string(),
                    members: members.split_whitespace().map(str::to_string).collect(),
                });
            }
            ["echo", ..] => return Ok(Command::Echo(after_words(text, 1).to_string())),
            ["system", ..] => return Ok(Command::System(after_words(text, 1).to_string())),
            ["alias", name, ..] => {
                let inline = after_words(text, 2);
                let body = if inline.is_empty() {
                    self.block()?.join("\n")
                } else {
                    inline.to_string()
                };
                return Ok(Command::Alias {
                    name: name.to_string(),
                    body,
                });
            }
            ["apply", direction, ..] => {
                if let Some(direction) = direction_word(direction) {
                    return self.apply(direction, after_words(text, 2));
                }
            }
            [direction, ..] => {
                if let Some(direction) = direction_word(direction) {
                    return self.apply(direction, after_words(text, 1));
                }
            }
            _ => {}
        }

        // The remaining commands take no regex; a trailing `;` is ignored.
        let text = text.strip_suffix(';').unwrap_or(text).trim_end();
        let words: Vec<&str> = text.split_whitespace().collect();
        let path = |n: usize| -> Result<PathBuf, XfstError> {
            let rest = after_words(text, n);
            if rest.is_empty() {
                Err(XfstError::MalformedInput(format!(
                    "'{}' requires a file name",
                    words[..n.min(words.len())].join(" ")
                )))
            } else {
                Ok(PathBuf::from(rest))
            }
        };
        let optional_path = |n: usize| {
            let rest = after_words(text, n);
            (!rest.is_empty()).then(|| PathBuf::from(rest))
        };

        let command = match words.as_slice() {
            ["undefine", names @ ..] if !names.is_empty() => {
                Command::Undefine(names.iter().map(|s| s.to_string()).collect())
            }
            ["unlist", name] => Command::Unlist(name.to_string()),
            ["name", "net", name] | ["name", name] => Command::NameNet(name.to_string()),

            ["push"] | ["push", "defined"] => Command::Push(None),
            ["push", "defined", name] | ["push", name] => Command::Push(Some(name.to_string())),
            ["pop"] | ["pop", "stack"] => Command::Pop,
            ["clear"] | ["clear", "stack"] => Command::Clear,
            ["turn"] | ["turn", "stack"] => Command::Turn,
            ["rotate"] | ["rotate", "stack"] => Command::Rotate,
            ["load", "defined", ..] => Command::LoadDefined(path(2)?),
            ["load", "stack", ..] => Command::LoadStack(path(2)?),
            ["load", ..] => Command::LoadStack(path(1)?),
            ["save", "defined", ..] => Command::SaveDefined(path(2)?),
            ["save", "stack", ..] => Command::SaveStack(path(2)?),
            ["save", ..] => Command::SaveStack(path(1)?),
            ["read", "att", ..] => Command::Read(ReadFormat::Att, path(2)?),
            ["read", "prolog", ..] => Command::Read(ReadFormat::Prolog, path(2)?),
            ["read", "text", ..] => Command::Read(ReadFormat::Text, path(2)?),
            ["read", "spaced-text" | "spaced", ..] => Command::Read(ReadFormat::Spaced, path(2)?),
            ["write", "att", ..] => Command::Write(WriteFormat::Att, optional_path(2)),
            ["write", "prolog", ..] => Command::Write(WriteFormat::Prolog, optional_path(2)),
            ["write", "dot", ..] => Command::Write(WriteFormat::Dot, optional_path(2)),
            ["write", "definition", name, ..] => Command::WriteDefinition {
                name: name.to_string(),
                path: path(3)?,
            },
            ["write", "definitions", ..] => Command::WriteDefinitions(path(2)?),

            ["print", target @ ..] => Command::Print(print_target(target)?),
            [first, ..] if PRINT_SHORTCUTS.contains(first) => Command::Print(print_target(&words)?),
            ["test", kind] => Command::Test {
                kind: test_kind(kind)?,
                assert: false,
            },
            ["assert", kind] => Command::Test {
                kind: test_kind(kind)?,
                assert: true,
            },

            ["sigma", "net"] => Command::SigmaNet,
            ["compact", "sigma"] => Command::Unary(UnaryOp::CompactSigma),
            ["twosided", "flag-diacritics"] | ["twosided", "flags"] | ["tfd"] => {
                Command::Unary(UnaryOp::TwosidedFlags)
            }
            ["optional-net"] => Command::Unary(UnaryOp::Optionalize),
            ["substitute", "symbol", rest @ ..] => {
                let (replacement, target) = substitution(rest, text)?;
                Command::SubstituteSymbol { replacement, target }
            }
            ["substitute", "label", rest @ ..] => {
                let (replacement, target) = substitution(rest, text)?;
                Command::SubstituteLabel { replacement, target }
            }
            ["substitute", "defined", name, "for", label] => Command::SubstituteDefined {
                name: name.to_string(),
                label: label.to_string(),
            },
            ["eliminate", "flag", name] => Command::EliminateFlag(Some(name.to_string())),
            ["eliminate", "flags"] => Command::EliminateFlag(None),
            ["compile-replace", "upper"] => Command::CompileReplace(Level::Upper),
            ["compile-replace", "lower"] => Command::CompileReplace(Level::Lower),
            ["lookup-optimize"] | ["lookup-optimise"] => Command::LookupOptimize,
            ["remove-optimization"] | ["remove-optimisation"] => Command::RemoveOptimization,
            [op] | [op, "net"] if unary_op(op).is_some() => match unary_op(op) {
                Some(op) => Command::Unary(op),
                None => return Err(unknown(text)),
            },
            [op] | [op, "net"] if binary_op(op).is_some() => match binary_op(op) {
                Some(op) => Command::Binary(op),
                None => return Err(unknown(text)),
            },
            [op] | [op, "net"] if fold_op(op).is_some() => match fold_op(op) {
                Some(op) => Command::Fold(op),
                None => return Err(unknown(text)),
            },

            ["quit"] | ["exit"] | ["bye"] => Command::Quit,
            ["set", name, ..] => Command::Set {
                name: name.to_string(),
                value: after_words(text, 2).to_string(),
            },
            ["show"] => Command::Show(None),
            ["show", name] => Command::Show(Some(name.to_string())),
            ["apropos", ..] => Command::Apropos(after_words(text, 1).to_string()),
            ["help"] => Command::Help(None),
            ["help", ..] => Command::Help(Some(after_words(text, 1).to_string())),

            [name] => Command::Invoke(name.to_string()),
            _ => return Err(unknown(text)),
        };
        Ok(command)
    }

    /// `define NAME regex;`, `define NAME(args) body;` or `define NAME`.
    fn define(&mut self, rest: &str) -> Result<Command, XfstError> {
        let name_end = rest
            .find(|c: char| c.is_whitespace() || c == '(' || c == ';')
            .unwrap_or(rest.len());
        if name_end == 0 {
            return Err(XfstError::MalformedInput("'define' requires a name".to_string()));
        }
        if rest[name_end..].starts_with('(') {
            let close = rest.find(')').ok_or_else(|| {
                XfstError::MalformedInput(format!(
                    "Error extracting function arguments from prototype '{}'",
                    rest.trim()
                ))
            })?;
            let prototype = rest[..=close].to_string();
            let body = self.regex_body(&rest[close + 1..])?;
            return Ok(Command::DefineFunction { prototype, body });
        }
        let name = rest[..name_end].to_string();
        let after = rest[name_end..].trim();
        if after.is_empty() || after == ";" {
            return Ok(Command::DefineFromStack { name });
        }
        let regex = self.regex_body(after)?;
        Ok(Command::DefineRegex { name, regex })
    }

    fn apply(&mut self, direction: Direction, inline: &str) -> Result<Command, XfstError> {
        let inputs = if inline.is_empty() {
            self.block()?.into_iter().filter(|l| !l.trim().is_empty()).collect()
        } else {
            vec![inline.to_string()]
        };
        Ok(Command::Apply { direction, inputs })
    }
}

impl<L> Iterator for ScriptReader<L>
where
    L: Iterator<Item = io::Result<String>>,
{
    type Item = Result<Command, XfstError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let raw = match self.next_line()? {
                Ok(raw) => raw,
                Err(e) => return Some(Err(e)),
            };
            let text = strip_comment(&raw).trim();
            if text.is_empty() {
                continue;
            }
            trace!(line = self.line, text, "read command");
            return Some(self.parse(text));
        }
    }
}

/// Print targets that may be used without the `print` keyword.
const PRINT_SHORTCUTS: &[&str] = &[
    "words",
    "upper-words",
    "lower-words",
    "random-words",
    "random-upper",
    "random-lower",
    "shortest-string",
    "shortest-string-size",
    "longest-string",
    "longest-string-size",
    "labels",
    "label-count",
];

fn unknown(text: &str) -> XfstError {
    XfstError::MalformedInput(format!("unknown command: '{text}'"))
}

/// Byte offset of the first `target` outside double quotes and not escaped
/// with `%`.
fn find_unquoted(text: &str, target: char) -> Option<usize> {
    let mut quoted = false;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '%' {
            escaped = true;
        } else if c == '"' {
            quoted = !quoted;
        } else if c == target && !quoted {
            return Some(i);
        }
    }
    None
}

fn strip_comment(line: &str) -> &str {
    match find_unquoted(line, '#') {
        Some(start) => &line[..start],
        None => line,
    }
}

/// `text` without its first `n` whitespace-separated words.
fn after_words(text: &str, n: usize) -> &str {
    let mut rest = text.trim_start();
    for _ in 0..n {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        rest = rest[end..].trim_start();
    }
    rest.trim_end()
}

fn single_char(text: &str) -> Option<char> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

fn direction_word(word: &str) -> Option<Direction> {
    match word {
        "up" => Some(Direction::Up),
        "down" => Some(Direction::Down),
        "med" => Some(Direction::Med),
        _ => None,
    }
}

/// `A B for X`: the replacement list and the target.
fn substitution(words: &[&str], text: &str) -> Result<(Vec<String>, String), XfstError> {
    match words.iter().position(|w| *w == "for") {
        Some(at) if at + 2 == words.len() => Ok((
            words[..at].iter().map(|s| s.to_string()).collect(),
            words[at + 1].to_string(),
        )),
        _ => Err(XfstError::MalformedInput(format!(
            "expected '... for TARGET' in '{text}'"
        ))),
    }
}

fn count(words: &[&str]) -> Result<Option<usize>, XfstError> {
    match words {
        [] => Ok(None),
        [n] => n
            .parse()
            .map(Some)
            .map_err(|_| XfstError::MalformedInput(format!("expected a number, got '{n}'"))),
        _ => Err(XfstError::MalformedInput(format!(
            "unexpected arguments: '{}'",
            words.join(" ")
        ))),
    }
}

fn print_target(words: &[&str]) -> Result<PrintTarget, XfstError> {
    let target = match words {
        ["words", n @ ..] => PrintTarget::Words {
            side: Side::Both,
            count: count(n)?,
        },
        ["upper-words", n @ ..] => PrintTarget::Words {
            side: Side::Input,
            count: count(n)?,
        },
        ["lower-words", n @ ..] => PrintTarget::Words {
            side: Side::Output,
            count: count(n)?,
        },
        ["random-words", n @ ..] => PrintTarget::RandomWords {
            side: Side::Both,
            count: count(n)?,
        },
        ["random-upper", n @ ..] => PrintTarget::RandomWords {
            side: Side::Input,
            count: count(n)?,
        },
        ["random-lower", n @ ..] => PrintTarget::RandomWords {
            side: Side::Output,
            count: count(n)?,
        },
        ["shortest-string"] => PrintTarget::ShortestString,
        ["shortest-string-size"] => PrintTarget::ShortestStringSize,
        ["longest-string"] => PrintTarget::LongestString,
        ["longest-string-size"] => PrintTarget::LongestStringSize,
        ["net"] => PrintTarget::Net,
        ["sigma"] => PrintTarget::Sigma,
        ["labels"] => PrintTarget::Labels,
        ["label-count"] => PrintTarget::LabelCount,
        ["stack"] => PrintTarget::Stack,
        ["size"] => PrintTarget::Size,
        ["defined"] => PrintTarget::Defined,
        ["lists"] => PrintTarget::Lists,
        ["list", name] => PrintTarget::List(name.to_string()),
        ["name"] => PrintTarget::Name,
        ["flags"] => PrintTarget::Flags,
        ["aliases"] => PrintTarget::Aliases,
        _ => {
            return Err(XfstError::MalformedInput(format!(
                "unknown print target: '{}'",
                words.join(" ")
            )));
        }
    };
    Ok(target)
}

fn test_kind(word: &str) -> Result<TestKind, XfstError> {
    let kind = match word {
        "equivalent" | "eq" => TestKind::Equivalent,
        "identity" | "id" => TestKind::Identity,
        "upper-bounded" | "ub" => TestKind::UpperBounded,
        "lower-bounded" | "lb" => TestKind::LowerBounded,
        "upper-universal" | "uu" => TestKind::UpperUniversal,
        "lower-universal" | "lu" => TestKind::LowerUniversal,
        "null" => TestKind::Null,
        "non-null" | "nn" => TestKind::NonNull,
        "overlap" => TestKind::Overlap,
        "sublanguage" | "sl" => TestKind::Sublanguage,
        "infinitely-ambiguous" => TestKind::InfinitelyAmbiguous,
        "functional" => TestKind::Functional,
        _ => return Err(XfstError::MalformedInput(format!("unknown test: '{word}'"))),
    };
    Ok(kind)
}

fn unary_op(word: &str) -> Option<UnaryOp> {
    let op = match word {
        "determinize" | "determinise" => UnaryOp::Determinize,
        "epsilon-remove" => UnaryOp::EpsilonRemove,
        "minimize" | "minimise" => UnaryOp::Minimize,
        "invert" => UnaryOp::Invert,
        "upper-side" => UnaryOp::UpperSide,
        "lower-side" => UnaryOp::LowerSide,
        "reverse" => UnaryOp::Reverse,
        "zero-plus" => UnaryOp::ZeroPlus,
        "one-plus" => UnaryOp::OnePlus,
        "optional" => UnaryOp::Optionalize,
        "negate" => UnaryOp::Negate,
        "complete" => UnaryOp::Complete,
        "prune" => UnaryOp::Prune,
        "label" => UnaryOp::Label,
        "cleanup" => UnaryOp::Cleanup,
        _ => return None,
    };
    Some(op)
}

fn binary_op(word: &str) -> Option<BinaryOp> {
    match word {
        "ignore" => Some(BinaryOp::Ignore),
        "minus" | "subtract" => Some(BinaryOp::Minus),
        "crossproduct" | "cross-product" => Some(BinaryOp::CrossProduct),
        _ => None,
    }
}

fn fold_op(word: &str) -> Option<FoldOp> {
    match word {
        "intersect" | "conjunct" => Some(FoldOp::Intersect),
        "compose" => Some(FoldOp::Compose),
        "concatenate" => Some(FoldOp::Concatenate),
        "union" | "disjunct" => Some(FoldOp::Union),
        "shuffle" => Some(FoldOp::Shuffle),
        _ => None,
    }
}
