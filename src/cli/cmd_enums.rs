use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Defines the command-line interface for 'dd-php-setup'.
/// `#[derive(Parser)]` automatically generates argument parsing code via `clap`.
///
/// Running with no subcommand behaves as `install`, so the historical
/// one-liner `dd-php-setup --php-bin all` keeps working.
#[derive(Parser)]
#[command(name = "dd-php-setup")]
#[command(about = "Installs and configures the Datadog tracing library for PHP.")]
pub struct Cli {
    /// Enables detailed debug output for troubleshooting and development.
    /// No short form; -d belongs to the setting definitions.
    #[arg(long, global = true)]
    pub(crate) debug: bool,

    #[command(flatten)]
    pub(crate) install: InstallArgs,

    /// Defines available subcommands for 'dd-php-setup'.
    #[command(subcommand)]
    pub(crate) command: Option<Commands>,
}

/// Enumerates all supported subcommands with their specific arguments.
#[derive(Subcommand)]
pub enum Commands {
    /// Installs the tracing library for the selected PHP binaries.
    /// This is also what runs when no subcommand is given.
    Install(InstallArgs),
    /// Disables the installed extensions without removing any files.
    Uninstall {
        /// PHP binaries to uninstall from ('all', a command name, or a path); repeatable.
        #[arg(long = "php-bin")]
        php_bin: Vec<String>,
    },
    /// Reads or writes individual tracer settings in the INI files.
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

/// Arguments shared by the bare invocation and the explicit `install` subcommand.
#[derive(Args, Clone)]
pub struct InstallArgs {
    /// PHP binaries to install for ('all', a command name, or a path); repeatable.
    /// Without it, discovered binaries are offered interactively.
    #[arg(long = "php-bin")]
    pub(crate) php_bin: Vec<String>,

    /// Root directory the library sources are installed under.
    #[arg(long = "install-dir", default_value = "/opt/datadog")]
    pub(crate) install_dir: String,

    /// Overrides the extension directory reported by the PHP binary.
    #[arg(long = "extension-dir")]
    pub(crate) extension_dir: Option<String>,

    /// Writes settings to this INI file instead of the detected one.
    #[arg(long)]
    pub(crate) ini: Option<String>,

    /// Installs from a local release archive instead of downloading one.
    #[arg(long)]
    pub(crate) file: Option<PathBuf>,

    /// Also activates the application security extension.
    #[arg(long = "enable-appsec")]
    pub(crate) enable_appsec: bool,

    /// Also activates the continuous profiler.
    #[arg(long = "enable-profiling")]
    pub(crate) enable_profiling: bool,

    /// Sets an INI value during install, as name[=value]; a bare name
    /// means 1, like PHP's own -d flag. Repeatable.
    #[arg(short = 'd', value_name = "NAME[=VALUE]")]
    pub(crate) define: Vec<String>,
}

/// Read/write access to individual settings after installation.
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Prints the current value of the named settings for each selected binary.
    Get {
        /// Setting name, or a DD_* environment variable name; repeatable.
        #[arg(short = 'd', value_name = "NAME", required = true)]
        name: Vec<String>,
        /// PHP binaries to inspect; repeatable.
        #[arg(long = "php-bin")]
        php_bin: Vec<String>,
    },
    /// Writes settings for each selected binary.
    Set {
        /// Setting as name[=value]; a bare name writes the catalog default.
        /// Repeatable.
        #[arg(short = 'd', value_name = "NAME[=VALUE]", required = true)]
        define: Vec<String>,
        /// PHP binaries to update; repeatable.
        #[arg(long = "php-bin")]
        php_bin: Vec<String>,
    },
    /// Lists every known setting with its current value per binary.
    List {
        /// PHP binaries to inspect; repeatable.
        #[arg(long = "php-bin")]
        php_bin: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        // Catches duplicate flag names across the flattened args, the
        // global --debug flag, and every subcommand.
        Cli::command().debug_assert();
    }

    #[test]
    fn short_d_defines_settings_at_the_top_level() {
        let cli = Cli::try_parse_from(["dd-php-setup", "-d", "datadog.env=prod", "--debug"])
            .unwrap();
        assert_eq!(cli.install.define, vec!["datadog.env=prod".to_string()]);
        assert!(cli.debug);
    }

    #[test]
    fn short_d_defines_settings_inside_subcommands() {
        let cli = Cli::try_parse_from([
            "dd-php-setup",
            "config",
            "set",
            "-d",
            "DD_ENV=prod",
            "--php-bin",
            "php",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Config { action: ConfigCommands::Set { define, php_bin } }) => {
                assert_eq!(define, vec!["DD_ENV=prod".to_string()]);
                assert_eq!(php_bin, vec!["php".to_string()]);
            }
            _ => panic!("expected config set"),
        }
    }
}
