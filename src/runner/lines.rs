//! Line-by-line access to command output

use crate::error::Result;
use crate::runner::{CommandTemplate, ExecutionContext, Invocation, Output, OutputMode};
use std::iter::FusedIterator;

/// Forward-only sequence of the trimmed, non-empty lines of some output.
///
/// Lines are split on `\r` and `\n`. The iterator is consumed as it goes and
/// cannot be restarted; run the command again for a fresh sequence.
#[derive(Debug)]
pub struct Lines {
    output: String,
    pos: usize,
}

impl Lines {
    pub fn new(output: impl Into<String>) -> Self {
        Lines {
            output: output.into(),
            pos: 0,
        }
    }
}

impl Iterator for Lines {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        while self.pos < self.output.len() {
            let rest = &self.output[self.pos..];
            let end = rest.find(['\r', '\n']).unwrap_or(rest.len());
            let line = rest[..end].trim();
            // skip the line and its terminator, if any
            self.pos += end + usize::from(end < rest.len());
            if !line.is_empty() {
                return Some(line.to_string());
            }
        }
        None
    }
}

impl FusedIterator for Lines {}

/// Run a command to completion and iterate over its output lines
pub async fn stream_lines(ctx: &ExecutionContext, template: &CommandTemplate) -> Result<Lines> {
    let output = Invocation::new(ctx, template.compile())
        .run(OutputMode::Lines)
        .await?;
    Ok(match output {
        Output::Captured { stdout, .. } => Lines::new(stdout),
        Output::Inherited => Lines::new(String::new()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd;

    #[test]
    fn test_splits_and_drops_empty_lines() {
        let lines: Vec<String> = Lines::new("a\nb\n\nc\r\n").collect();
        assert_eq!(lines, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_trims_whitespace() {
        let lines: Vec<String> = Lines::new("  first  \n\t\n second").collect();
        assert_eq!(lines, vec!["first", "second"]);
    }

    #[test]
    fn test_empty_output() {
        assert_eq!(Lines::new("").next(), None);
        assert_eq!(Lines::new("\r\n\n").next(), None);
    }

    #[test]
    fn test_is_one_shot() {
        let mut lines = Lines::new("x\ny");
        assert_eq!(lines.next().as_deref(), Some("x"));
        assert_eq!(lines.next().as_deref(), Some("y"));
        assert_eq!(lines.next(), None);
        assert_eq!(lines.next(), None);
    }

    #[tokio::test]
    async fn test_stream_lines_from_command() {
        let ctx = ExecutionContext::new();
        let lines: Vec<String> = stream_lines(&ctx, &cmd!("printf 'one\\n\\ntwo\\r\\n'"))
            .await
            .unwrap()
            .collect();
        assert_eq!(lines, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_stream_lines_failure() {
        let ctx = ExecutionContext::new();
        let err = stream_lines(&ctx, &cmd!("echo one; exit 7")).await.unwrap_err();
        assert_eq!(err.as_process_failure().map(|f| f.exit_code), Some(7));
    }
}
