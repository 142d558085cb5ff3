// Pre-flight checks run before touching any PHP installation.

use crate::log_debug;
use crate::schemas::php::PhpBinary;
use crate::utils::command_stdout;
use std::path::Path;
use walkdir::WalkDir;

/// Verifies a shared library is resolvable by the dynamic linker.
///
/// Regular glibc systems are checked through `ldconfig -p`; Alpine has no
/// usable ldconfig cache, so its standard library directories are scanned
/// for a matching `.so` instead.
pub fn check_library_prerequisite(library: &str) -> Result<(), String> {
    if cfg!(not(target_os = "linux")) {
        return Ok(());
    }

    if let Ok(output) = command_stdout("ldconfig", &["-p"]) {
        if output.contains(library) {
            log_debug!("Found {} via ldconfig", library);
            return Ok(());
        }
    }

    for dir in ["/usr/local/lib", "/usr/lib", "/lib"] {
        if !Path::new(dir).is_dir() {
            continue;
        }
        let found = WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .any(|e| {
                e.file_name()
                    .to_str()
                    .map(|n| n.contains(library) && n.contains(".so"))
                    .unwrap_or(false)
            });
        if found {
            log_debug!("Found {} under {}", library, dir);
            return Ok(());
        }
    }

    Err(format!(
        "The '{library}' shared library is required and was not found on this system. \
         Install it with your package manager and retry."
    ))
}

/// Verifies a PHP extension is compiled in or loaded for a binary, via its
/// `-m` module listing.
pub fn check_php_ext_prerequisite(binary: &PhpBinary, extension: &str) -> Result<(), String> {
    let output = command_stdout(&binary.path.display().to_string(), &["-m"])?;
    if output.lines().any(|line| line.trim() == extension) {
        return Ok(());
    }
    Err(format!(
        "The PHP binary '{}' is missing the required '{extension}' extension. \
         Enable it and retry.",
        binary
    ))
}
