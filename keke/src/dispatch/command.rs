use crate::core::action::ActionError;
use crate::io::config::KekeConfig;
use crate::io::process::{run_command_with_timeout, shell_command};
use crate::io::project::ProjectContext;

/// Run `command` through the host shell in the project root.
///
/// The output text is all of stdout followed by all of stderr, not
/// interleaved in write order. Spawn failures, non-zero exits and timeouts all
/// come back as [`ActionError::CommandFailed`] carrying whatever was captured.
pub(super) fn execute(
    project: &ProjectContext,
    config: &KekeConfig,
    command: &str,
) -> Result<String, ActionError> {
    let timeout = config.command_timeout();
    let output = run_command_with_timeout(
        shell_command(command, &project.root),
        timeout,
        config.command_output_limit_bytes,
    )
    .map_err(|err| ActionError::CommandFailed {
        reason: format!("{err:#}"),
        output: String::new(),
    })?;

    let text = output.combined_text();
    match output.failure_reason(timeout) {
        None => Ok(text),
        Some(reason) => Err(ActionError::CommandFailed {
            reason,
            output: text,
        }),
    }
}
