// Decoded commands, as produced by the script reader and consumed by the
// dispatcher.

use std::fmt;
use std::path::PathBuf;

use crate::apply::Direction;
use crate::compile_replace::Level;
use crate::printer::Side;

/// One-operand algebra on the top network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Determinize,
    EpsilonRemove,
    Minimize,
    Invert,
    UpperSide,
    LowerSide,
    Reverse,
    ZeroPlus,
    OnePlus,
    Optionalize,
    Negate,
    Complete,
    Prune,
    CompactSigma,
    TwosidedFlags,
    /// The union of the network's arc labels.
    Label,
    /// Epsilon removal followed by trimming.
    Cleanup,
}

impl UnaryOp {
    /// Operations whose result is already in canonical form.
    pub fn is_canonical(self) -> bool {
        matches!(self, UnaryOp::Determinize | UnaryOp::Minimize | UnaryOp::EpsilonRemove)
    }
}

/// Two-operand algebra; the top network is the right operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Ignore,
    Minus,
    CrossProduct,
}

/// Algebra folded over the whole stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldOp {
    Intersect,
    Compose,
    Concatenate,
    Union,
    Shuffle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestKind {
    Equivalent,
    Identity,
    UpperBounded,
    LowerBounded,
    UpperUniversal,
    LowerUniversal,
    Null,
    NonNull,
    Overlap,
    Sublanguage,
    InfinitelyAmbiguous,
    Functional,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintTarget {
    /// `print words`, `print upper-words`, `print lower-words`.
    Words { side: Side, count: Option<usize> },
    /// `print random-words`, `print random-upper`, `print random-lower`.
    RandomWords { side: Side, count: Option<usize> },
    ShortestString,
    ShortestStringSize,
    LongestString,
    LongestStringSize,
    Net,
    Sigma,
    Labels,
    LabelCount,
    Stack,
    Size,
    Defined,
    Lists,
    List(String),
    Name,
    Flags,
    Aliases,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadFormat {
    Att,
    Prolog,
    /// One word per line, one symbol per character.
    Text,
    /// Space-separated symbols per line, `a:b` pairs allowed.
    Spaced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteFormat {
    Att,
    Prolog,
    Dot,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    DefineRegex { name: String, regex: String },
    /// `define NAME` with no regex: the top network is popped into `NAME`.
    DefineFromStack { name: String },
    DefineFunction { prototype: String, body: String },
    Undefine(Vec<String>),
    DefineList { name: String, members: Vec<String> },
    /// `list NAME from A to B`: every character from `start` to `end`.
    DefineListRange { name: String, start: char, end: char },
    Unlist(String),
    Alias { name: String, body: String },
    NameNet(String),
    /// Replay the alias `NAME`.
    Invoke(String),

    /// `regex` / `read regex`: compile and push.
    Regex(String),
    /// `push defined NAME`, or every definition when no name is given.
    Push(Option<String>),
    Pop,
    Clear,
    Turn,
    Rotate,
    LoadStack(PathBuf),
    SaveStack(PathBuf),
    LoadDefined(PathBuf),
    SaveDefined(PathBuf),
    Read(ReadFormat, PathBuf),
    Write(WriteFormat, Option<PathBuf>),
    WriteDefinition { name: String, path: PathBuf },
    WriteDefinitions(PathBuf),

    Apply { direction: Direction, inputs: Vec<String> },
    Print(PrintTarget),
    Test { kind: TestKind, assert: bool },

    Unary(UnaryOp),
    Binary(BinaryOp),
    Fold(FoldOp),
    SigmaNet,
    /// `substitute symbol A B for X`; an empty list deletes `X`.
    SubstituteSymbol { replacement: Vec<String>, target: String },
    /// `substitute label A B:C for X:Y`; an empty list deletes the label.
    SubstituteLabel { replacement: Vec<String>, target: String },
    /// `substitute defined NAME for LABEL`.
    SubstituteDefined { name: String, label: String },
    /// `eliminate flag NAME`, or every flag when no name is given.
    EliminateFlag(Option<String>),
    CompileReplace(Level),
    LookupOptimize,
    RemoveOptimization,

    Echo(String),
    Quit,
    Set { name: String, value: String },
    /// `show NAME`, or every variable.
    Show(Option<String>),
    Apropos(String),
    Help(Option<String>),
    System(String),
}

impl Command {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::DefineRegex { .. } | Command::DefineFromStack { .. } => "define",
            Command::DefineFunction { .. } => "define function",
            Command::Undefine(_) => "undefine",
            Command::DefineList { .. } | Command::DefineListRange { .. } => "list",
            Command::Unlist(_) => "unlist",
            Command::Alias { .. } => "alias",
            Command::NameNet(_) => "name net",
            Command::Invoke(_) => "alias call",
            Command::Regex(_) => "regex",
            Command::Push(_) => "push",
            Command::Pop => "pop",
            Command::Clear => "clear",
            Command::Turn => "turn",
            Command::Rotate => "rotate",
            Command::LoadStack(_) => "load stack",
            Command::SaveStack(_) => "save stack",
            Command::LoadDefined(_) => "load defined",
            Command::SaveDefined(_) => "save defined",
            Command::Read(..) => "read",
            Command::Write(..) => "write",
            Command::WriteDefinition { .. } => "write definition",
            Command::WriteDefinitions(_) => "write definitions",
            Command::Apply { .. } => "apply",
            Command::Print(_) => "print",
            Command::Test { .. } => "test",
            Command::Unary(_) => "unary",
            Command::Binary(_) => "binary",
            Command::Fold(_) => "fold",
            Command::SigmaNet => "sigma net",
            Command::SubstituteSymbol { .. } => "substitute symbol",
            Command::SubstituteLabel { .. } => "substitute label",
            Command::SubstituteDefined { .. } => "substitute defined",
            Command::EliminateFlag(_) => "eliminate flag",
            Command::CompileReplace(_) => "compile-replace",
            Command::LookupOptimize => "lookup-optimize",
            Command::RemoveOptimization => "remove-optimization",
            Command::Echo(_) => "echo",
            Command::Quit => "quit",
            Command::Set { .. } => "set",
            Command::Show(_) => "show",
            Command::Apropos(_) => "apropos",
            Command::Help(_) => "help",
            Command::System(_) => "system",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `(command, description)` for `help` and `apropos`.
pub const HELP: &[(&str, &str)] = &[
    ("alias <name> <commands>", "define an alias for a sequence of commands"),
    ("apply down <string>", "look up a string from the upper side of the top network"),
    ("apply up <string>", "look up a string from the lower side of the top network"),
    ("apropos <text>", "search the help messages for text"),
    ("cleanup net", "remove epsilons and useless states from the top network"),
    ("clear stack", "remove every network from the stack"),
    ("compact sigma", "remove unused symbols from the sigma of the top network"),
    ("compile-replace lower", "compile the regular expressions on the lower side of the top network"),
    ("compile-replace upper", "compile the regular expressions on the upper side of the top network"),
    ("complete net", "make the top network complete"),
    ("compose net", "compose the networks on the stack"),
    ("concatenate net", "concatenate the networks on the stack"),
    ("crossproduct net", "cross product of the top two networks"),
    ("define <name> <regex>;", "bind a regular expression to a name"),
    ("define <name>", "pop the top network into a definition"),
    ("define <name>(<args>) <regex>;", "define a regular expression function"),
    ("determinize net", "determinize the top network"),
    ("echo <text>", "print text"),
    ("eliminate flag <name>", "compile away the flag diacritics of one feature"),
    ("eliminate flags", "compile away every flag diacritic"),
    ("epsilon-remove net", "remove epsilon arcs from the top network"),
    ("help <command>", "describe a command"),
    ("ignore net", "let the top network be ignored anywhere in the next one"),
    ("intersect net", "intersect the networks on the stack"),
    ("invert net", "swap the upper and lower sides of the top network"),
    ("label net", "replace the top network with the union of its labels"),
    ("list <name> <symbols>;", "define a list of symbols"),
    ("load defined <file>", "read definitions from a file"),
    ("load stack <file>", "push the networks of a file"),
    ("lookup-optimize", "convert the stack to lookup-optimized form"),
    ("lower-side net", "project the lower side of the top network"),
    ("minimize net", "minimize the top network"),
    ("minus net", "subtract the top network from the next one"),
    ("name net <name>", "name the top network"),
    ("negate net", "complement the top network"),
    ("one-plus net", "Kleene plus of the top network"),
    ("optional-net", "make the top network optional"),
    ("pop stack", "remove the top network"),
    ("print aliases", "list the aliases"),
    ("print defined", "list the definitions and functions"),
    ("print flags", "list the flag diacritics of the top network"),
    ("print label-count", "count the arcs of every label"),
    ("print labels", "list the labels of the top network"),
    ("print list <name>", "print one list"),
    ("print lists", "print every list"),
    ("print longest-string", "print a longest path of the top network"),
    ("print lower-words", "print the lower-side strings of the top network"),
    ("print name", "print the name of the top network"),
    ("print net", "list the states and arcs of the top network"),
    ("print random-words", "print random paths of the top network"),
    ("print shortest-string", "print a shortest path of the top network"),
    ("print sigma", "print the sigma of the top network"),
    ("print size", "print the size of the top network"),
    ("print stack", "print the size of every network on the stack"),
    ("print upper-words", "print the upper-side strings of the top network"),
    ("print words", "print the paths of the top network"),
    ("prune net", "remove useless states from the top network"),
    ("push defined <name>", "push a copy of a definition"),
    ("quit", "exit the interpreter"),
    ("read att <file>", "push the networks of an AT&T file"),
    ("read prolog <file>", "push the networks of a prolog file"),
    ("read regex <regex>;", "compile a regular expression and push it"),
    ("read spaced-text <file>", "push the union of the space-separated paths of a file"),
    ("read text <file>", "push the union of the words of a file"),
    ("remove-optimization", "convert the stack back to ordinary form"),
    ("reverse net", "reverse the top network"),
    ("rotate stack", "move the top network to the bottom"),
    ("save defined <file>", "write every definition to a file"),
    ("save stack <file>", "write the stack to a file"),
    ("set <variable> <value>", "change a variable"),
    ("show <variable>", "print a variable"),
    ("shuffle net", "shuffle the networks on the stack"),
    ("sigma net", "push the sigma of the top network as a network"),
    ("substitute defined <name> for <label>", "replace a label with a definition"),
    ("substitute label <labels> for <label>", "replace a label with a list of labels"),
    ("substitute symbol <symbols> for <symbol>", "replace a symbol with a list of symbols"),
    ("system <command>", "run a shell command"),
    ("test equivalent", "whether the top two networks are equivalent"),
    ("test functional", "whether the top network maps each input to at most one output"),
    ("test identity", "whether the top network maps each string to itself"),
    ("test infinitely-ambiguous", "whether some input has infinitely many outputs"),
    ("test lower-bounded", "whether the lower side has no epsilon cycles"),
    ("test lower-universal", "whether the lower side is the universal language"),
    ("test non-null", "whether the top network is not empty"),
    ("test null", "whether the top network is empty"),
    ("test overlap", "whether the networks on the stack share a path"),
    ("test sublanguage", "whether each network is a sublanguage of the next"),
    ("test upper-bounded", "whether the upper side has no epsilon cycles"),
    ("test upper-universal", "whether the upper side is the universal language"),
    ("turn stack", "reverse the order of the stack"),
    ("twosided flag-diacritics", "make every flag diacritic arc two-sided"),
    ("undefine <names>", "remove definitions"),
    ("union net", "union of the networks on the stack"),
    ("unlist <name>", "remove a list"),
    ("upper-side net", "project the upper side of the top network"),
    ("write att <file>", "write the stack in AT&T format"),
    ("write definition <name> <file>", "write one definition to a file"),
    ("write definitions <file>", "write every definition to a file"),
    ("write dot <file>", "write the top network in dot format"),
    ("write prolog <file>", "write the stack in prolog format"),
    ("zero-plus net", "Kleene star of the top network"),
];

/// Help lines for the commands starting with `name`, or every command.
pub fn help_lines(name: Option<&str>) -> Vec<String> {
    HELP.iter()
        .filter(|(cmd, _)| name.is_none_or(|n| cmd.starts_with(n)))
        .map(|(cmd, text)| format!("{cmd:<40} {text}"))
        .collect()
}

/// Help lines whose command or description contains `text`.
pub fn apropos_lines(text: &str) -> Vec<String> {
    HELP.iter()
        .filter(|(cmd, desc)| cmd.contains(text) || desc.contains(text))
        .map(|(cmd, desc)| format!("{cmd:<40} {desc}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_unary_ops() {
        assert!(UnaryOp::Minimize.is_canonical());
        assert!(UnaryOp::Determinize.is_canonical());
        assert!(!UnaryOp::Invert.is_canonical());
    }

    #[test]
    fn help_and_apropos() {
        assert_eq!(help_lines(Some("print net")).len(), 1);
        assert!(help_lines(Some("no such command")).is_empty());
        assert!(apropos_lines("Kleene").len() >= 2);
        assert!(help_lines(None).len() == HELP.len());
    }
}
