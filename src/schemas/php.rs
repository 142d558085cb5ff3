// Data carried between discovery and installation: the PHP binaries found on
// the system and the configuration properties read from `php -i`.

use std::fmt;
use std::path::{Path, PathBuf};

/// A PHP executable discovered on this system.
///
/// `command` is the identifier the binary was found under (a command name from
/// `$PATH` such as `php8.1`, or an absolute path when found by scanning the
/// well-known install locations). `path` is the symlink-resolved real file,
/// which is also the deduplication key: two commands resolving to the same
/// real file produce a single entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhpBinary {
    pub command: String,
    pub path: PathBuf,
    /// True when the file starts with `#!` (a wrapper script, not an ELF/PE
    /// binary). Such entries are still installable but worth flagging in logs.
    pub is_script: bool,
}

impl fmt::Display for PhpBinary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self.path.display();
        if Path::new(&self.command) == self.path {
            write!(f, "{path}")
        } else {
            write!(f, "{} ({path})", self.command)
        }
    }
}

/// Configuration properties extracted from one run of `<binary> -i`.
///
/// Every field is derived output; nothing here outlives the current run.
/// A missing scan dir AND a missing loaded configuration file means the
/// installation has nowhere to write settings, which callers treat as fatal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhpProperties {
    /// "Scan this dir for additional .ini files", absent when `(none)`.
    pub scan_dir: Option<String>,
    /// `extension_dir`, normalized to an absolute path.
    pub extension_dir: Option<PathBuf>,
    /// "Thread Safety" (ZTS build).
    pub thread_safety: bool,
    /// "PHP API" version number, names the extension subdirectory in bundles.
    pub api_version: Option<String>,
    /// "Debug Build".
    pub is_debug: bool,
    /// "PHP Version", e.g. "8.1.2".
    pub php_version: Option<String>,
    /// "Loaded Configuration File", absent when `(none)`.
    pub main_ini: Option<PathBuf>,
}

impl PhpProperties {
    /// "8.1.2" -> "8.1". None when the version property was not found.
    pub fn major_minor(&self) -> Option<String> {
        let version = self.php_version.as_deref()?;
        let mut parts = version.split('.');
        let major = parts.next()?;
        let minor = parts.next()?;
        Some(format!("{major}.{minor}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_shows_command_and_path_when_distinct() {
        let b = PhpBinary {
            command: "php8.1".into(),
            path: PathBuf::from("/usr/bin/php8.1.2-real"),
            is_script: false,
        };
        assert_eq!(b.to_string(), "php8.1 (/usr/bin/php8.1.2-real)");
    }

    #[test]
    fn display_collapses_when_command_is_the_path() {
        let b = PhpBinary {
            command: "/usr/bin/php".into(),
            path: PathBuf::from("/usr/bin/php"),
            is_script: false,
        };
        assert_eq!(b.to_string(), "/usr/bin/php");
    }

    #[test]
    fn major_minor_takes_two_components() {
        let props = PhpProperties {
            php_version: Some("7.4.33".into()),
            ..Default::default()
        };
        assert_eq!(props.major_minor().as_deref(), Some("7.4"));
        assert_eq!(PhpProperties::default().major_minor(), None);
    }
}
