//! Variable interpolation for step text
//!
//! `${name}` references become template arguments, everything around them
//! becomes literal fragments. Unknown names are left in the text untouched so
//! the shell can still expand them itself.

use crate::runner::CommandTemplate;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("variable pattern is valid"));

/// Build a command template out of `s`, resolving `${name}` from `vars`
pub fn template_from(s: &str, vars: &HashMap<String, String>) -> CommandTemplate {
    let mut fragments = Vec::new();
    let mut args = Vec::new();
    let mut literal = String::new();
    let mut last = 0;

    for caps in VARIABLE.captures_iter(s) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        literal.push_str(&s[last..whole.start()]);
        match vars.get(name.as_str()) {
            Some(value) => {
                fragments.push(std::mem::take(&mut literal));
                args.push(value.clone());
            }
            None => literal.push_str(whole.as_str()),
        }
        last = whole.end();
    }
    literal.push_str(&s[last..]);
    fragments.push(literal);

    CommandTemplate::new(fragments, args)
}

/// Interpolate variables in a string
pub fn interpolate(s: &str, vars: &HashMap<String, String>) -> String {
    template_from(s, vars).compile()
}

/// Interpolate the values of name/value pairs, keeping the names as is
pub fn interpolate_map<I, K, V>(entries: I, vars: &HashMap<String, String>) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    entries
        .into_iter()
        .map(|(key, value)| (key.as_ref().to_string(), interpolate(value.as_ref(), vars)))
        .collect()
}
