// Register application subcommands.
// Each module corresponds to a specific `dd-php-setup` command-line action.

// Reads and writes individual tracer settings.
pub mod config;
// Orchestrates the main download-and-configure process.
pub mod install;
// Disables the installed extensions without removing files.
pub mod uninstall;
