// Logic for `dd-php-setup uninstall`: disables the tracer, profiler and
// appsec extensions for the selected binaries and removes the module files
// from the extension directories. Installed sources under the install dir
// are left in place so other binaries keep working.

use crate::libs::{binaries, ini_files, properties, reconciler};
use crate::{log_info, log_warn};
use std::fs;

const MODULES: &[&str] = &["ddtrace.so", "datadog-profiling.so", "ddappsec.so"];

pub fn run(php_bin: &[String]) -> Result<(), String> {
    let binaries = binaries::require_binaries(php_bin)?;

    for binary in &binaries {
        log_info!("Uninstalling from {}", binary);
        let props = properties::read_php_properties(binary)?;

        let mut disabled = 0usize;
        for file in ini_files::all_ini_files(&props) {
            match reconciler::comment_out_module_lines(&file, MODULES) {
                Ok(n) => disabled += n,
                Err(e) => log_warn!("{}", e),
            }
        }
        if disabled == 0 {
            log_warn!("No active extension lines were found for '{}'.", binary);
        }

        if let Some(extension_dir) = &props.extension_dir {
            for module in MODULES {
                let path = extension_dir.join(module);
                if !path.exists() {
                    continue;
                }
                match fs::remove_file(&path) {
                    Ok(()) => log_info!("Removed {}", path.display()),
                    Err(e) => log_warn!("Cannot remove {}: {e}", path.display()),
                }
            }
        }
        log_info!("'{}' uninstalled. Restart PHP-FPM or the web server to unload.", binary);
    }
    Ok(())
}
