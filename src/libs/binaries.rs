// Discovery of PHP executables: $PATH lookup for every known command-name
// shape, a sweep of well-known install locations, symlink resolution, and
// deduplication by resolved real path.

use crate::schemas::php::PhpBinary;
use crate::{log_debug, log_error, log_info, log_warn};
use std::collections::BTreeMap;
use std::collections::HashSet;
use std::env;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// PHP versions the installer ships extension builds for.
pub const SUPPORTED_PHP_VERSIONS: &[&str] =
    &["5.4", "5.5", "5.6", "7.0", "7.1", "7.2", "7.3", "7.4", "8.0", "8.1"];

const INTERACTIVE_RETRY_LIMIT: usize = 3;

/// Every command name a PHP binary may be installed under: `php`, `php-fpm`,
/// and the version-suffixed shapes (`php8`, `php81`, `php8.1`, `php8.1-fpm`,
/// `php-fpm8.1`, ...) for each supported version.
pub fn command_name_matrix() -> Vec<String> {
    let mut names = vec!["php".to_string(), "php-fpm".to_string()];
    for version in SUPPORTED_PHP_VERSIONS {
        let (major, minor) = version.split_once('.').unwrap_or((version, ""));
        for candidate in [
            format!("php{major}"),
            format!("php{major}{minor}"),
            format!("php{major}.{minor}"),
            format!("php{major}-fpm"),
            format!("php{major}{minor}-fpm"),
            format!("php{major}.{minor}-fpm"),
            format!("php-fpm{major}"),
            format!("php-fpm{major}{minor}"),
            format!("php-fpm{major}.{minor}"),
        ] {
            // The bare major forms (php5, php5-fpm, ...) recur once per
            // minor version.
            if !names.contains(&candidate) {
                names.push(candidate);
            }
        }
    }
    names
}

/// Install locations searched in addition to $PATH.
#[cfg(unix)]
fn well_known_locations() -> Vec<PathBuf> {
    let mut locations = vec![
        PathBuf::from("/usr/bin"),
        PathBuf::from("/usr/sbin"),
        PathBuf::from("/usr/local/bin"),
        PathBuf::from("/usr/local/sbin"),
    ];
    // remi RPM packages put php-fpm under a per-version root.
    for version in SUPPORTED_PHP_VERSIONS {
        let squashed = version.replace('.', "");
        locations.push(PathBuf::from(format!("/opt/remi/php{squashed}/root/usr/sbin")));
    }
    // Plesk bundles its own per-version PHP trees.
    for version in SUPPORTED_PHP_VERSIONS {
        locations.push(PathBuf::from(format!("/opt/plesk/php/{version}/bin")));
        locations.push(PathBuf::from(format!("/opt/plesk/php/{version}/sbin")));
    }
    locations
}

#[cfg(windows)]
fn well_known_locations() -> Vec<PathBuf> {
    vec![
        PathBuf::from("C:\\php"),
        PathBuf::from("C:\\Program Files\\PHP"),
        PathBuf::from("C:\\Program Files (x86)\\PHP"),
        PathBuf::from("C:\\tools"), // Chocolatey layout
    ]
}

/// Searches $PATH and the well-known locations for PHP binaries.
///
/// The result maps the discovered command identifier (command name for $PATH
/// hits, absolute path for location hits) to the binary with its resolved
/// real path. Two identifiers resolving to the same real file yield one entry.
pub fn search_php_binaries() -> BTreeMap<String, PhpBinary> {
    log_info!("Searching for available php binaries, this operation might take a while.");

    let mut results: BTreeMap<String, PhpBinary> = BTreeMap::new();
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let names = command_name_matrix();

    // $PATH first, so `php` and friends keep their short identifiers.
    for name in &names {
        if let Some(resolved) = resolve_command(name) {
            if seen.insert(resolved.clone()) {
                results.insert(name.clone(), make_binary(name.clone(), resolved));
            }
        }
    }

    // Then the well-known install locations; `find`-style, following symlinks.
    let wanted: HashSet<&str> = names.iter().map(String::as_str).collect();
    for location in well_known_locations() {
        if !location.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&location)
            .follow_links(true)
            .max_depth(2)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() || !is_executable(path) {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !wanted.contains(file_name) {
                continue;
            }
            let Ok(resolved) = fs::canonicalize(path) else {
                continue;
            };
            if seen.insert(resolved.clone()) {
                let identifier = path.display().to_string();
                results.insert(identifier.clone(), make_binary(identifier, resolved));
            }
        }
    }

    log_debug!("Discovered {} php binaries", results.len());
    results
}

/// Resolves a command name through $PATH to its canonical path.
///
/// Absolute or relative paths are accepted as-is (still canonicalized), so
/// `--php-bin /usr/local/sbin/php-fpm` works without a $PATH entry.
pub fn resolve_command(command: &str) -> Option<PathBuf> {
    let direct = Path::new(command);
    if direct.components().count() > 1 {
        return fs::canonicalize(direct).ok().filter(|p| is_executable(p));
    }
    let path_var = env::var_os("PATH")?;
    for dir in env::split_paths(&path_var) {
        let candidate = dir.join(command);
        if candidate.is_file() && is_executable(&candidate) {
            return fs::canonicalize(&candidate).ok();
        }
    }
    None
}

/// Returns the binaries an operation should target, honoring `--php-bin`.
///
/// No `--php-bin` degrades to the interactive picker; `--php-bin all` takes
/// every discovered binary; anything else must resolve or the whole run fails.
/// Zero selected binaries is always an error.
pub fn require_binaries(php_bin: &[String]) -> Result<Vec<PhpBinary>, String> {
    let mut selected: Vec<PhpBinary> = Vec::new();
    let mut seen: HashSet<PathBuf> = HashSet::new();

    if php_bin.is_empty() {
        selected = pick_binaries_interactive(search_php_binaries())?;
    } else {
        for command in php_bin {
            if command == "all" {
                for (_, binary) in search_php_binaries() {
                    if seen.insert(binary.path.clone()) {
                        selected.push(binary);
                    }
                }
            } else if let Some(resolved) = resolve_command(command) {
                if seen.insert(resolved.clone()) {
                    selected.push(make_binary(command.clone(), resolved));
                }
            } else {
                return Err(format!("Provided PHP binary '{command}' was not found."));
            }
        }
    }

    if selected.is_empty() {
        return Err("At least one binary must be specified".to_string());
    }
    Ok(selected)
}

/// Lets the user pick target binaries from a numbered list.
///
/// An empty selection re-prompts up to a fixed retry cap, then fails; this
/// keeps invalid input from looping forever on a non-interactive stdin.
fn pick_binaries_interactive(
    found: BTreeMap<String, PhpBinary>,
) -> Result<Vec<PhpBinary>, String> {
    if found.is_empty() {
        return Err("No PHP binaries were found on this system.".to_string());
    }
    let binaries: Vec<PhpBinary> = found.into_values().collect();
    let labels: Vec<String> = binaries
        .iter()
        .map(|b| format!("{} --> {}", b.command, b.path.display()))
        .collect();

    log_info!("Multiple PHP binaries detected. Select the binaries to operate on:");
    for attempt in 1..=INTERACTIVE_RETRY_LIMIT {
        let picked = dialoguer::MultiSelect::new()
            .with_prompt("Select binaries (space to toggle, enter to confirm)")
            .items(&labels)
            .interact()
            .map_err(|e| format!("Interactive selection failed: {e}"))?;
        if !picked.is_empty() {
            return Ok(picked.into_iter().map(|i| binaries[i].clone()).collect());
        }
        if attempt < INTERACTIVE_RETRY_LIMIT {
            log_error!("Nothing selected, try again.");
        }
    }
    Err("No binaries selected.".to_string())
}

fn make_binary(command: String, resolved: PathBuf) -> PhpBinary {
    let is_script = is_shebang_script(&resolved);
    if is_script {
        log_warn!("'{}' is a script wrapper, not a native binary", resolved.display());
    }
    PhpBinary { command, path: resolved, is_script }
}

/// True when the file starts with `#!`.
fn is_shebang_script(path: &Path) -> bool {
    let mut magic = [0u8; 2];
    match fs::File::open(path).and_then(|mut f| f.read_exact(&mut magic)) {
        Ok(()) => &magic == b"#!",
        Err(_) => false,
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(windows)]
fn is_executable(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("exe") | Some("bat") | Some("cmd")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_covers_all_name_shapes() {
        let names = command_name_matrix();
        for expected in ["php", "php-fpm", "php8", "php81", "php8.1", "php8.1-fpm", "php-fpm7.4"] {
            assert!(names.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[cfg(unix)]
    #[test]
    fn shebang_files_are_flagged() {
        use std::io::Write;
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("php-wrapper");
        fs::File::create(&script)
            .unwrap()
            .write_all(b"#!/bin/sh\nexec php \"$@\"\n")
            .unwrap();
        assert!(is_shebang_script(&script));

        let binary = dir.path().join("php");
        fs::File::create(&binary).unwrap().write_all(b"\x7fELF").unwrap();
        assert!(!is_shebang_script(&binary));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_commands_deduplicate_by_real_path() {
        use std::os::unix::fs::symlink;
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("php8.1");
        fs::write(&real, b"\x7fELF").unwrap();
        let mut perms = fs::metadata(&real).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&real, perms).unwrap();
        let link = dir.path().join("php");
        symlink(&real, &link).unwrap();

        // Absolute inputs resolve without consulting PATH.
        let a = resolve_command(&link.display().to_string()).unwrap();
        let b = resolve_command(&real.display().to_string()).unwrap();
        assert_eq!(a, b, "symlink and target must resolve to the same real path");
    }
}
