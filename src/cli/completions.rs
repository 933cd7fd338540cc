use crate::cli::args::{Cli, CompletionCommands, CompletionHelperCommands};
use crate::registry::{default_registry, CapabilityKind};
use crate::utils::errors::Result;
use crate::utils::output::OutputFormat;
use clap::CommandFactory;
use clap_complete::{generate, Shell};
use std::io;

pub fn handle_completion_command(command: &CompletionCommands) -> Result<()> {
    let shell = command.shell();
    let mut cmd = Cli::command();
    let app_name = "certimate-rs";

    // Bash gets provider-id completion for `notify --provider`
    if matches!(shell, Shell::Bash) {
        println!("# Enhanced completion for certimate-rs notifier providers");
        print!(
            r#"
_certimate_rs_complete_notifiers() {{
    local providers
    providers=$(certimate-rs completion-helper notifiers 2>/dev/null)
    COMPREPLY=($(compgen -W "$providers" -- "${{cur}}"))
}}

_certimate_rs_override() {{
    local cur prev words cword
    _init_completion || return

    case "${{words[*]}}" in
        *" notify"*)
            if [[ "$prev" == "--provider" ]]; then
                _certimate_rs_complete_notifiers
                return 0
            fi
            ;;
    esac

    _certimate-rs "$@"
}}

"#
        );

        generate(shell, &mut cmd, app_name, &mut io::stdout());

        println!();
        println!("complete -F _certimate_rs_override certimate-rs");
    } else {
        generate(shell, &mut cmd, app_name, &mut io::stdout());
    }

    Ok(())
}

pub fn handle_completion_helper_command(
    command: &CompletionHelperCommands,
    output: &OutputFormat,
) -> Result<()> {
    match command {
        CompletionHelperCommands::Notifiers => {
            // Completion must stay silent on failure
            if let Ok(registry) = default_registry() {
                let ids: Vec<String> = registry
                    .providers()
                    .into_iter()
                    .filter(|(kind, _)| *kind == CapabilityKind::Notifier)
                    .map(|(_, id)| id)
                    .collect();
                output.print_list(&ids);
            }
        }
    }
    Ok(())
}
