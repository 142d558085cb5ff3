// Locating the INI files a PHP binary reads, and choosing which ones the
// installer writes its own settings into.

use crate::schemas::php::PhpProperties;
use crate::{log_debug, log_warn};
use std::fs;
use std::path::{Path, PathBuf};

/// The file the installer creates its settings in when the scan dir has no
/// existing ddtrace configuration. The numeric prefix keeps it late in PHP's
/// alphabetical scan order so it wins over distro defaults.
pub const PRIORITY_INI_NAME: &str = "98-ddtrace.ini";

/// INI files carrying this marker belong to the sibling host-injection
/// packaging and must never be edited by this installer.
const SIBLING_PACKAGE_MARKER: &str = "dd-library-php-ssi";

/// All INI files relevant to a binary: every `.ini` in the scan dir (plus the
/// Debian apache2 sibling of a cli conf.d scan dir), or the main php.ini when
/// no scan dir is configured.
///
/// The priority file is moved to the front so settings land there first; the
/// remaining files keep directory order. Files owned by the sibling packaging
/// are filtered out.
pub fn all_ini_files(properties: &PhpProperties) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();

    if let Some(scan_dir) = &properties.scan_dir {
        collect_ini_files(Path::new(scan_dir), &mut files);
        if let Some(apache_dir) = apache_sibling_dir(scan_dir) {
            collect_ini_files(&apache_dir, &mut files);
        }
    }

    if files.is_empty() {
        if let Some(main_ini) = &properties.main_ini {
            files.push(main_ini.clone());
        }
    }

    files.retain(|f| !is_sibling_package_file(f));

    // Unshift the priority file to the front.
    if let Some(pos) = files
        .iter()
        .position(|f| f.file_name().map(|n| n == PRIORITY_INI_NAME).unwrap_or(false))
    {
        let priority = files.remove(pos);
        files.insert(0, priority);
    }

    log_debug!("INI files for reconciliation: {:?}", files);
    files
}

/// The file(s) the installer creates or extends with its full settings block.
///
/// Resolution order:
///   1. an explicit `--ini` override (used verbatim, created if missing);
///   2. an existing scan-dir file that already activates the tracer;
///   3. the priority file in the scan dir (plus its Debian apache2 sibling);
///   4. the main php.ini reported by the binary.
pub fn main_ini_files(
    properties: &PhpProperties,
    ini_override: Option<&Path>,
) -> Result<Vec<PathBuf>, String> {
    if let Some(path) = ini_override {
        return Ok(vec![path.to_path_buf()]);
    }

    if let Some(scan_dir) = &properties.scan_dir {
        let mut candidates: Vec<PathBuf> = Vec::new();

        // Prefer a file that already loads the extension, so re-runs keep
        // updating the file the user (or a previous run) chose.
        for file in all_ini_files(properties) {
            if file.exists() && has_active_ddtrace_line(&file) {
                log_debug!("Reusing existing tracer configuration in {}", file.display());
                return Ok(vec![file]);
            }
        }

        candidates.push(Path::new(scan_dir).join(PRIORITY_INI_NAME));
        if let Some(apache_dir) = apache_sibling_dir(scan_dir) {
            candidates.push(apache_dir.join(PRIORITY_INI_NAME));
        }
        return Ok(candidates);
    }

    if let Some(main_ini) = &properties.main_ini {
        return Ok(vec![main_ini.clone()]);
    }

    Err(
        "The PHP configuration does not report an additional .ini scan directory nor a \
         loaded php.ini. Set PHP_INI_SCAN_DIR to a writable directory and retry."
            .to_string(),
    )
}

/// Debian/Ubuntu packaging keeps parallel conf.d trees for the cli and apache2
/// SAPIs. When the binary scans the cli tree, the apache2 sibling gets the
/// same settings so mod_php picks them up too.
fn apache_sibling_dir(scan_dir: &str) -> Option<PathBuf> {
    if scan_dir.contains("/cli/conf.d") {
        let sibling = scan_dir.replace("/cli/conf.d", "/apache2/conf.d");
        let path = PathBuf::from(sibling);
        if path.is_dir() {
            return Some(path);
        }
    }
    None
}

fn collect_ini_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    let mut found: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().map(|e| e == "ini").unwrap_or(false))
        .collect();
    found.sort();
    out.append(&mut found);
}

fn is_sibling_package_file(path: &Path) -> bool {
    match fs::read_to_string(path) {
        Ok(content) if content.contains(SIBLING_PACKAGE_MARKER) => {
            log_warn!(
                "Skipping {} (owned by the host-injection packaging)",
                path.display()
            );
            true
        }
        _ => false,
    }
}

fn has_active_ddtrace_line(path: &Path) -> bool {
    let Ok(content) = fs::read_to_string(path) else {
        return false;
    };
    content.lines().any(|line| {
        let trimmed = line.trim_start();
        if trimmed.starts_with(';') || trimmed.starts_with('#') {
            return false;
        }
        match trimmed.strip_prefix("extension") {
            Some(rest) => rest.trim_start().starts_with('=') && rest.contains("ddtrace"),
            None => false,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn props_with_scan_dir(dir: &Path) -> PhpProperties {
        PhpProperties {
            scan_dir: Some(dir.display().to_string()),
            ..PhpProperties::default()
        }
    }

    #[test]
    fn priority_file_is_listed_first() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("10-opcache.ini"), "zend_extension=opcache\n").unwrap();
        fs::write(dir.path().join("98-ddtrace.ini"), "extension = ddtrace.so\n").unwrap();
        fs::write(dir.path().join("99-custom.ini"), "memory_limit = 1G\n").unwrap();

        let files = all_ini_files(&props_with_scan_dir(dir.path()));
        assert_eq!(files[0].file_name().unwrap(), PRIORITY_INI_NAME);
        assert_eq!(files.len(), 3);
    }

    #[test]
    fn sibling_package_files_are_filtered() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("97-ssi.ini"),
            "; installed by dd-library-php-ssi\nextension = ddtrace.so\n",
        )
        .unwrap();
        fs::write(dir.path().join("20-mysqli.ini"), "extension=mysqli\n").unwrap();

        let files = all_ini_files(&props_with_scan_dir(dir.path()));
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("20-mysqli.ini"));
    }

    #[test]
    fn falls_back_to_main_ini_without_scan_dir() {
        let dir = tempfile::tempdir().unwrap();
        let php_ini = dir.path().join("php.ini");
        fs::write(&php_ini, "memory_limit = 128M\n").unwrap();
        let props = PhpProperties {
            main_ini: Some(php_ini.clone()),
            ..PhpProperties::default()
        };
        assert_eq!(all_ini_files(&props), vec![php_ini.clone()]);
        assert_eq!(main_ini_files(&props, None).unwrap(), vec![php_ini]);
    }

    #[test]
    fn main_ini_prefers_file_with_active_tracer_line() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("40-mystuff.ini");
        fs::write(&existing, "extension = ddtrace.so\n").unwrap();

        let chosen = main_ini_files(&props_with_scan_dir(dir.path()), None).unwrap();
        assert_eq!(chosen, vec![existing]);
    }

    #[test]
    fn commented_tracer_line_does_not_claim_the_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("40-old.ini"), ";extension = ddtrace.so\n").unwrap();

        let chosen = main_ini_files(&props_with_scan_dir(dir.path()), None).unwrap();
        assert_eq!(chosen, vec![dir.path().join(PRIORITY_INI_NAME)]);
    }

    #[test]
    fn ini_override_wins() {
        let dir = tempfile::tempdir().unwrap();
        let custom = dir.path().join("custom.ini");
        let chosen = main_ini_files(&props_with_scan_dir(dir.path()), Some(&custom)).unwrap();
        assert_eq!(chosen, vec![custom]);
    }

    #[test]
    fn errors_without_scan_dir_or_main_ini() {
        let err = main_ini_files(&PhpProperties::default(), None).unwrap_err();
        assert!(err.contains("PHP_INI_SCAN_DIR"));
    }
}
