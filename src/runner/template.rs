//! Command templates
//!
//! A template is a list of literal fragments interleaved with argument values.
//! Compiling it concatenates everything in positional order. Arguments are
//! inserted verbatim: nothing is quoted or escaped, so callers own the shell
//! safety of whatever they interpolate.

use std::fmt;

/// Placeholder used by [`CommandTemplate::from_format`] and the `cmd!` macro
const PLACEHOLDER: &str = "{}";

/// Literal fragments plus the arguments that go between them.
///
/// There is always exactly one more fragment than there are arguments.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandTemplate {
    fragments: Vec<String>,
    args: Vec<String>,
}

impl CommandTemplate {
    /// Build a template from its parts.
    ///
    /// A fragment count other than `args.len() + 1` is a caller bug.
    pub fn new<F, A>(fragments: Vec<F>, args: Vec<A>) -> Self
    where
        F: Into<String>,
        A: ToString,
    {
        debug_assert_eq!(
            fragments.len(),
            args.len() + 1,
            "a command template needs one more fragment than arguments"
        );
        CommandTemplate {
            fragments: fragments.into_iter().map(Into::into).collect(),
            args: args.iter().map(ToString::to_string).collect(),
        }
    }

    /// A template with no arguments
    pub fn literal(command: impl Into<String>) -> Self {
        CommandTemplate {
            fragments: vec![command.into()],
            args: Vec::new(),
        }
    }

    /// Split `format` at every `{}` and pair the pieces with `args`
    pub fn from_format(format: &str, args: Vec<String>) -> Self {
        let fragments: Vec<&str> = format.split(PLACEHOLDER).collect();
        Self::new(fragments, args)
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Concatenate fragments and arguments into one command line
    pub fn compile(&self) -> String {
        compile(&self.fragments, &self.args)
    }
}

impl fmt::Display for CommandTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.compile())
    }
}

impl From<&str> for CommandTemplate {
    fn from(command: &str) -> Self {
        CommandTemplate::literal(command)
    }
}

impl From<String> for CommandTemplate {
    fn from(command: String) -> Self {
        CommandTemplate::literal(command)
    }
}

/// `fragments[0] + args[0] + fragments[1] + ... + fragments[n]`
pub fn compile<F, A>(fragments: &[F], args: &[A]) -> String
where
    F: AsRef<str>,
    A: fmt::Display,
{
    let mut compiled = String::new();
    let mut fragments = fragments.iter();

    if let Some(first) = fragments.next() {
        compiled.push_str(first.as_ref());
    }
    for (arg, fragment) in args.iter().zip(fragments) {
        compiled.push_str(&arg.to_string());
        compiled.push_str(fragment.as_ref());
    }

    compiled
}

/// Build a [`CommandTemplate`] from a format literal with `{}` placeholders.
///
/// ```
/// let name = "world";
/// let template = dx::cmd!("echo hello {}", name);
/// assert_eq!(template.compile(), "echo hello world");
/// ```
#[macro_export]
macro_rules! cmd {
    ($format:literal $(, $arg:expr)* $(,)?) => {
        $crate::runner::CommandTemplate::from_format(
            $format,
            vec![$(::std::string::ToString::to_string(&$arg)),*],
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_interleaves_fragments_and_args() {
        let compiled = compile(&["echo ", " ", ""], &["a", "b"]);
        assert_eq!(compiled, "echo a b");
    }

    #[test]
    fn test_compile_literal() {
        assert_eq!(CommandTemplate::literal("ls -1").compile(), "ls -1");
    }

    #[test]
    fn test_compile_numbers() {
        let template = CommandTemplate::new(vec!["exit ", ""], vec![3]);
        assert_eq!(template.compile(), "exit 3");
    }

    #[test]
    fn test_args_are_not_escaped() {
        let template = CommandTemplate::new(vec!["echo ", ""], vec!["$(whoami); rm -i x"]);
        assert_eq!(template.compile(), "echo $(whoami); rm -i x");
    }

    #[test]
    fn test_from_format_splits_on_placeholders() {
        let template = CommandTemplate::from_format("cp {} {}", vec!["a".into(), "b".into()]);
        assert_eq!(template.fragments(), &["cp ", " ", ""]);
        assert_eq!(template.args(), &["a", "b"]);
        assert_eq!(template.compile(), "cp a b");
    }

    #[test]
    fn test_cmd_macro() {
        let count = 2;
        let template = crate::cmd!("head -n {} {}", count, "README.md");
        assert_eq!(template.compile(), "head -n 2 README.md");
        assert_eq!(crate::cmd!("pwd").compile(), "pwd");
    }
}
