// Logic for `dd-php-setup config`: post-install access to individual tracer
// settings in the INI files, per binary.

use crate::cli::cmd_enums::ConfigCommands;
use crate::commands::install::validate_setting_name;
use crate::libs::{binaries, ini_files, properties, reconciler};
use crate::{log_info, log_warn};
use crate::schemas::catalog::{self, IniRecord};
use crate::schemas::php::PhpBinary;
use prettytable::{row, Table};
use regex::Regex;
use std::fs;
use std::path::PathBuf;

pub fn run(action: &ConfigCommands) -> Result<(), String> {
    match action {
        ConfigCommands::Get { name, php_bin } => get(name, php_bin),
        ConfigCommands::Set { define, php_bin } => set(define, php_bin),
        ConfigCommands::List { php_bin } => list(php_bin),
    }
}

fn get(names: &[String], php_bin: &[String]) -> Result<(), String> {
    for binary in binaries::require_binaries(php_bin)? {
        for name in names {
            let name = catalog::normalize_setting_name(name);
            // Unknown names are reported per record, not fatal.
            if validate_setting_name(&name).is_err() {
                log_warn!("{}: '{}' is not a known tracer setting.", binary, name);
                continue;
            }
            let record = read_record(&binary, &name)?;
            match (&record.value, &record.source) {
                (Some(value), Some(source)) => {
                    log_info!("{}: {} = {} ({})", binary, name, value, source.display());
                }
                _ => {
                    let default = record
                        .default
                        .map(|d| format!(" (default: {d})"))
                        .unwrap_or_default();
                    log_info!("{}: {} is not set{}", binary, name, default);
                }
            }
        }
    }
    Ok(())
}

fn set(definitions: &[String], php_bin: &[String]) -> Result<(), String> {
    let mut settings: Vec<(String, String)> = Vec::new();
    for definition in definitions {
        let (name, value) = match definition.split_once('=') {
            Some((name, value)) => (name.trim().to_string(), value.trim().to_string()),
            None => {
                // A bare name writes the catalog default.
                let name = catalog::normalize_setting_name(definition.trim());
                let spec = catalog::find_setting(&name).ok_or_else(|| {
                    format!("'{name}' has no catalog default; pass an explicit value.")
                })?;
                (name, spec.default)
            }
        };
        let name = catalog::normalize_setting_name(&name);
        validate_setting_name(&name)?;
        settings.push((name, value));
    }

    for binary in binaries::require_binaries(php_bin)? {
        let props = properties::read_php_properties(&binary)?;
        let all_files = ini_files::all_ini_files(&props);
        let main_files = ini_files::main_ini_files(&props, None)?;
        for (name, value) in &settings {
            reconciler::apply_setting(name, value, &all_files, &main_files)?;
            log_info!("{}: {} = {}", binary, name, value);
        }
    }
    Ok(())
}

fn list(php_bin: &[String]) -> Result<(), String> {
    let specs = catalog::ini_settings("", "", "");
    for binary in binaries::require_binaries(php_bin)? {
        let props = properties::read_php_properties(&binary)?;
        let files = ini_files::all_ini_files(&props);

        let mut table = Table::new();
        table.add_row(row!["SETTING", "VALUE", "DEFAULT", "SOURCE"]);
        for spec in &specs {
            // extension load lines are not value settings; skip them here.
            if spec.name == "extension" || spec.name == "zend_extension" {
                continue;
            }
            let (value, source) = find_value(&files, spec.name);
            table.add_row(row![
                spec.name,
                value.unwrap_or_else(|| "-".to_string()),
                spec.default,
                source
                    .map(|s| s.display().to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ]);
        }
        log_info!("Settings for {}:", binary);
        table.printstd();
    }
    Ok(())
}

fn read_record(binary: &PhpBinary, name: &str) -> Result<IniRecord, String> {
    let props = properties::read_php_properties(binary)?;
    let files = ini_files::all_ini_files(&props);
    let (value, source) = find_value(&files, name);
    Ok(IniRecord {
        name: name.to_string(),
        value,
        default: catalog::find_setting(name).map(|s| s.default),
        source,
        binary: binary.to_string(),
    })
}

/// First active `name = value` occurrence across the files, in scan order.
fn find_value(files: &[PathBuf], name: &str) -> (Option<String>, Option<PathBuf>) {
    let Ok(re) = Regex::new(&format!(r"(?m)^[ \t]*{}\s*=\s*(.*)$", regex::escape(name))) else {
        return (None, None);
    };
    for file in files {
        let Ok(content) = fs::read_to_string(file) else {
            continue;
        };
        if let Some(captures) = re.captures(&content) {
            let value = captures
                .get(1)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();
            return (Some(value), Some(file.clone()));
        }
    }
    (None, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn write_ini(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn find_value_returns_first_active_match_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_ini(dir.path(), "a.ini", ";datadog.env = commented\n");
        let b = write_ini(dir.path(), "b.ini", "datadog.env = staging\n");
        let c = write_ini(dir.path(), "c.ini", "datadog.env = prod\n");

        let (value, source) = find_value(&[a, b.clone(), c], "datadog.env");
        assert_eq!(value.as_deref(), Some("staging"));
        assert_eq!(source, Some(b));
    }

    #[test]
    fn find_value_ignores_longer_setting_names() {
        let dir = tempfile::tempdir().unwrap();
        let ini = write_ini(dir.path(), "a.ini", "datadog.trace.enabled_on_cli = On\n");
        let (value, _) = find_value(&[ini], "datadog.trace.enabled");
        // "enabled_on_cli" must not satisfy a lookup for "enabled".
        assert_eq!(value, None);
    }
}
