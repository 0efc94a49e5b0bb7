// Regex function definitions: `define Name(x, y) body;`.
//
// Argument names in the body are rewritten to positional markers so a call
// can bind its arguments by index. The rewrite works on the body's tokens,
// so an argument `a` never matches inside a longer symbol such as `ab`.

use xfst_regex::argument_marker;
use xfst_regex::lexer::{Token, tokenize};

use crate::error::XfstError;

/// A parsed function, ready for the name table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDefinition {
    /// Function name including the opening parenthesis.
    pub name: String,
    pub arity: usize,
    /// Body with arguments replaced by quoted positional markers.
    pub body: String,
    /// Body with arguments shown as `ARGUMENT<N>`.
    pub display: String,
}

/// `Foo(` from `Foo(x, y)`.
fn prototype_name(prototype: &str) -> Option<&str> {
    let open = prototype.find('(')?;
    let name = prototype[..=open].trim_start();
    if name.len() < 2 {
        return None;
    }
    Some(name)
}

/// `["x", "y"]` from `Foo(x, y)`.
fn prototype_arguments(prototype: &str) -> Option<Vec<String>> {
    let open = prototype.find('(')?;
    let close = open + prototype[open..].find(')')?;
    let args: Vec<String> = prototype[open + 1..close]
        .split(',')
        .map(|a| a.chars().filter(|c| !c.is_whitespace()).collect::<String>())
        .collect();
    if args.iter().any(String::is_empty) {
        return None;
    }
    Some(args)
}

fn quote(symbol: &str) -> String {
    let mut out = String::with_capacity(symbol.len() + 2);
    out.push('"');
    for c in symbol.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Parse `prototype` and rewrite `body` into its marker and display forms.
/// Nothing is produced unless every step succeeds.
pub fn define_function(prototype: &str, body: &str) -> Result<FunctionDefinition, XfstError> {
    let name = prototype_name(prototype).ok_or_else(|| {
        XfstError::MalformedInput(format!("Error extracting function name from prototype '{prototype}'"))
    })?;
    let args = prototype_arguments(prototype).ok_or_else(|| {
        XfstError::MalformedInput(format!("Error extracting function arguments from prototype '{prototype}'"))
    })?;
    let body = body.trim().trim_end_matches(';').trim_end();
    let tokens = tokenize(body)
        .ok()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| XfstError::MalformedInput(format!("Error parsing function definition '{body}'")))?;

    let mut marked = String::with_capacity(body.len());
    let mut display = String::with_capacity(body.len());
    let mut copied = 0;
    for spanned in &tokens {
        let Token::Symbol(symbol) = &spanned.token else {
            continue;
        };
        let Some(index) = args.iter().position(|a| a == symbol) else {
            continue;
        };
        let between = &body[copied..spanned.span.start];
        marked.push_str(between);
        display.push_str(between);
        marked.push_str(&quote(&argument_marker(name, index + 1)));
        display.push_str(&format!("ARGUMENT{}", index + 1));
        copied = spanned.span.end;
    }
    marked.push_str(&body[copied..]);
    display.push_str(&body[copied..]);

    Ok(FunctionDefinition {
        name: name.to_string(),
        arity: args.len(),
        body: marked,
        display,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_become_markers() {
        let f = define_function("Double(x)", "x x;").unwrap();
        assert_eq!(f.name, "Double(");
        assert_eq!(f.arity, 1);
        assert_eq!(f.body, "\"@Double(1@\" \"@Double(1@\"");
        assert_eq!(f.display, "ARGUMENT1 ARGUMENT1");
    }

    #[test]
    fn argument_order_matters() {
        let xy = define_function("Foo(x, y)", "x y").unwrap();
        let yx = define_function("Foo(y, x)", "x y").unwrap();
        assert_ne!(xy.body, yx.body);
        assert_eq!(xy.display, "ARGUMENT1 ARGUMENT2");
        assert_eq!(yx.display, "ARGUMENT2 ARGUMENT1");
    }

    #[test]
    fn longer_symbols_are_untouched() {
        let f = define_function("F(a)", "ab a [a | b]").unwrap();
        assert_eq!(f.display, "ab ARGUMENT1 [ARGUMENT1 | b]");
    }

    #[test]
    fn quoted_symbols_are_not_arguments() {
        let f = define_function("F(a)", "\"a\" a").unwrap();
        assert_eq!(f.display, "\"a\" ARGUMENT1");
    }

    #[test]
    fn malformed_prototypes() {
        assert!(matches!(
            define_function("Foo", "a"),
            Err(XfstError::MalformedInput(m)) if m.contains("function name")
        ));
        assert!(matches!(
            define_function("Foo(x", "x"),
            Err(XfstError::MalformedInput(m)) if m.contains("function arguments")
        ));
        assert!(matches!(
            define_function("Foo(x,)", "x"),
            Err(XfstError::MalformedInput(_))
        ));
        assert!(matches!(
            define_function("Foo(x)", "\"unterminated"),
            Err(XfstError::MalformedInput(m)) if m.contains("function definition")
        ));
    }
}
