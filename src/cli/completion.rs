//! Shell completion scripts

/// Zsh completion built from the output of `dx --tasks`
const ZSH_COMPLETION: &str = r#"#compdef dx
#autoload

local -a tasks
local name desc

dx --tasks 2>/dev/null | while read -r line; do
  [[ $line == Available* || -z $line ]] && continue
  name=${line%% *}
  desc=${line#*\# }
  [[ $desc == $line ]] && desc=""
  tasks+=("${name}:${desc}")
done

_describe 'task' tasks"#;

/// Completion script for `shell`, or a notice when it is unsupported
pub fn completion_script(shell: &str) -> String {
    match shell {
        "zsh" => ZSH_COMPLETION.to_string(),
        other => format!("Not available now for {}", other),
    }
}
