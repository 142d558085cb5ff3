// Reads the configuration properties of a PHP binary by parsing `php -i`
// output. Only a fixed allow-list of keys is retained; everything else in the
// (large) info dump is ignored.

use crate::schemas::php::{PhpBinary, PhpProperties};
use crate::utils::is_truthy;
use crate::{log_debug, log_warn};
use std::path::{Path, PathBuf};
use std::process::Command;

const INI_SCAN_DIR: &str = "Scan this dir for additional .ini files";
const EXTENSION_DIR: &str = "extension_dir";
const THREAD_SAFETY: &str = "Thread Safety";
const PHP_API: &str = "PHP API";
const IS_DEBUG: &str = "Debug Build";
const PHP_VERSION: &str = "PHP Version";
const LOADED_INI: &str = "Loaded Configuration File";

/// Runs `<binary> -d date.timezone=UTC -i` and extracts the properties the
/// installer cares about.
///
/// The timezone define silences the missing-timezone warning older PHP
/// versions print on stderr. A binary that cannot be executed is an error;
/// individual missing properties are not (callers decide which ones are
/// required for their operation).
pub fn read_php_properties(binary: &PhpBinary) -> Result<PhpProperties, String> {
    let output = Command::new(&binary.path)
        .args(["-d", "date.timezone=UTC", "-i"])
        .output()
        .map_err(|e| format!("Cannot run '{} -i': {e}", binary.path.display()))?;
    if !output.status.success() {
        return Err(format!(
            "'{} -i' exited with {}",
            binary.path.display(),
            output.status
        ));
    }
    let info = String::from_utf8_lossy(&output.stdout);
    let binary_dir = binary.path.parent().unwrap_or(Path::new("/"));
    let props = parse_php_info(&info, binary_dir);
    log_debug!("Properties for {}: {:?}", binary, props);
    Ok(props)
}

/// Parses the `key => value` lines of a `php -i` dump.
///
/// Lines come in a two-column form (`key => value`) and a three-column form
/// (`key => local => master`); the last column wins. `(none)` and `no value`
/// mean the property is unset.
pub fn parse_php_info(info: &str, binary_dir: &Path) -> PhpProperties {
    let mut props = PhpProperties::default();

    for line in info.lines() {
        let parts: Vec<&str> = line.split("=>").collect();
        if parts.len() != 2 && parts.len() != 3 {
            continue;
        }
        let key = parts[0].trim();
        let raw = parts[parts.len() - 1].trim();
        if raw == "(none)" || raw == "no value" {
            continue;
        }
        match key {
            INI_SCAN_DIR => props.scan_dir = Some(first_scan_dir(raw)),
            EXTENSION_DIR => props.extension_dir = Some(absolutize(raw, binary_dir)),
            THREAD_SAFETY => props.thread_safety = is_truthy(raw),
            PHP_API => props.api_version = Some(raw.to_string()),
            IS_DEBUG => props.is_debug = is_truthy(raw),
            PHP_VERSION => {
                // `php -i` repeats "PHP Version" in a second section; first wins.
                if props.php_version.is_none() {
                    props.php_version = Some(raw.to_string());
                }
            }
            LOADED_INI => props.main_ini = Some(PathBuf::from(raw)),
            _ => {}
        }
    }

    props
}

/// PHP_INI_SCAN_DIR may hold a `:`-separated list; only the first directory
/// is used for writing. A single-character prefix is a Windows drive letter,
/// not a list separator.
fn first_scan_dir(raw: &str) -> String {
    match raw.split_once(':') {
        Some((first, _)) if first.len() > 1 => {
            log_warn!("More than one ini scan directory found. Taking the first: {first}");
            first.to_string()
        }
        _ => raw.to_string(),
    }
}

/// A relative extension_dir is resolved against the binary's own directory,
/// matching how the PHP engine itself resolves it at dlopen time.
fn absolutize(raw: &str, binary_dir: &Path) -> PathBuf {
    let path = Path::new(raw);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        binary_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
phpinfo()
PHP Version => 8.1.2

Configuration File (php.ini) Path => /etc/php/8.1/cli
Loaded Configuration File => /etc/php/8.1/cli/php.ini
Scan this dir for additional .ini files => /etc/php/8.1/cli/conf.d
extension_dir => /usr/lib/php/20210902 => /usr/lib/php/20210902
Thread Safety => disabled
Debug Build => no
PHP API => 20210902
date.timezone => UTC => UTC
";

    #[test]
    fn parses_two_and_three_column_lines() {
        let props = parse_php_info(SAMPLE, Path::new("/usr/bin"));
        assert_eq!(props.scan_dir.as_deref(), Some("/etc/php/8.1/cli/conf.d"));
        assert_eq!(
            props.extension_dir.as_deref(),
            Some(Path::new("/usr/lib/php/20210902"))
        );
        assert_eq!(props.api_version.as_deref(), Some("20210902"));
        assert_eq!(props.php_version.as_deref(), Some("8.1.2"));
        assert_eq!(
            props.main_ini.as_deref(),
            Some(Path::new("/etc/php/8.1/cli/php.ini"))
        );
        assert!(!props.thread_safety);
        assert!(!props.is_debug);
    }

    #[test]
    fn none_values_leave_properties_unset() {
        let info = "Scan this dir for additional .ini files => (none)\n\
                    Loaded Configuration File => (none)\n";
        let props = parse_php_info(info, Path::new("/usr/bin"));
        assert_eq!(props.scan_dir, None);
        assert_eq!(props.main_ini, None);
    }

    #[test]
    fn relative_extension_dir_is_resolved_against_the_binary() {
        let info = "extension_dir => ext => ext\n";
        let props = parse_php_info(info, Path::new("/opt/php/bin"));
        assert_eq!(
            props.extension_dir.as_deref(),
            Some(Path::new("/opt/php/bin/ext"))
        );
    }

    #[test]
    fn zts_debug_flags_use_php_truthiness() {
        let info = "Thread Safety => enabled\nDebug Build => yes\n";
        let props = parse_php_info(info, Path::new("/usr/bin"));
        assert!(props.thread_safety);
        assert!(props.is_debug);
    }
}
