// General-purpose helpers shared by the commands: PHP-style truthiness,
// user path expansion, and a thin wrapper for capturing subprocess output.

use crate::log_debug;
use std::path::PathBuf;
use std::process::Command;

/// PHP-style truthiness, as used by `php -i` output ("Thread Safety => enabled")
/// and the DD_TEST_EXECUTION environment hook.
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "enabled"
    )
}

/// Expands `~` in a user-supplied path (--install-dir, --extension-dir, --ini).
pub fn expand_user_path(input: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(input).into_owned())
}

/// Runs a command and returns its stdout as a string.
///
/// A non-zero exit status is an `Err` carrying the command line and the
/// captured stderr, so callers can surface it verbatim.
pub fn command_stdout(program: &str, args: &[&str]) -> Result<String, String> {
    log_debug!("Running: {} {}", program, args.join(" "));
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| format!("Cannot run '{program}': {e}"))?;
    if !output.status.success() {
        return Err(format!(
            "Command '{} {}' failed ({}):\n{}",
            program,
            args.join(" "),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
