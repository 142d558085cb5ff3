// This file contains the primary logic for the `dd-php-setup install` command.
// It orchestrates release archive acquisition, extension file installation,
// and INI reconciliation for every selected PHP binary.

use crate::cli::cmd_enums::InstallArgs;
use crate::libs::{archive, binaries, ini_files, prereq, properties, reconciler};
use crate::schemas::catalog;
use crate::schemas::php::{PhpBinary, PhpProperties};
use crate::utils::expand_user_path;
use crate::{log_debug, log_info, log_warn};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// PHP versions a profiler build is shipped for (NTS, non-debug only).
const PROFILING_VERSIONS: &[&str] = &["7.1", "7.2", "7.3", "7.4", "8.0"];

/// Main entry point for the `install` command.
///
/// 1. Verifies system prerequisites and resolves the target binaries.
/// 2. Obtains a release bundle (local `--file` or downloaded) into a
///    temporary staging directory.
/// 3. Installs the bundle under `<install-dir>/dd-library/<version>`.
/// 4. For each binary: copies the extension modules into its extension
///    directory and reconciles its INI files.
pub fn run(args: &InstallArgs) -> Result<(), String> {
    prereq::check_library_prerequisite("libcurl")?;
    if Path::new("/etc/alpine-release").exists() {
        // musl builds of the tracer additionally link libexecinfo.
        prereq::check_library_prerequisite("libexecinfo")?;
    }
    let binaries = binaries::require_binaries(&args.php_bin)?;

    // Staging space for the archive; dropped (and deleted) on every exit path.
    let staging = tempfile::tempdir()
        .map_err(|e| format!("Cannot create a temporary directory: {e}"))?;

    let bundle_root = obtain_bundle(args, staging.path())?;
    let version = archive::bundled_version(&bundle_root);
    log_info!("Installing dd-library-php version {}", version);

    let install_root = expand_user_path(&args.install_dir)
        .join("dd-library")
        .join(&version);
    archive::copy_tree(&bundle_root, &install_root)?;
    log_debug!("Sources installed under {}", install_root.display());

    let paths = BundlePaths::new(&install_root);
    for binary in &binaries {
        install_for_binary(binary, args, &paths)?;
    }

    log_info!("Installation finished for {} binaries.", binaries.len());
    if args.php_bin.is_empty() {
        log_info!(
            "Hint: pass --php-bin to skip the interactive picker in scripted runs, e.g. \
             --php-bin all"
        );
    }
    Ok(())
}

/// Install-time locations inside the installed bundle.
struct BundlePaths {
    root: PathBuf,
    request_init_hook: PathBuf,
    appsec_helper: PathBuf,
    appsec_rules: PathBuf,
}

impl BundlePaths {
    fn new(install_root: &Path) -> Self {
        Self {
            root: install_root.to_path_buf(),
            request_init_hook: install_root
                .join("dd-trace-sources/bridge/dd_wrap_autoloader.php"),
            appsec_helper: install_root.join("appsec/lib/libddappsec-helper.so"),
            appsec_rules: install_root.join("appsec/etc/recommended.json"),
        }
    }
}

/// Produces an extracted bundle root inside the staging directory, either
/// from a local archive or by downloading the latest release.
fn obtain_bundle(args: &InstallArgs, staging: &Path) -> Result<PathBuf, String> {
    let archive_path = match &args.file {
        Some(file) => {
            if !file.is_file() {
                return Err(format!("Archive '{}' does not exist.", file.display()));
            }
            file.clone()
        }
        None => {
            let version = archive::latest_release_version()?;
            let origin = env::var("DD_TEST_INSTALLER_REPO").ok();
            let url = archive::resolve_release_url(&version, origin.as_deref());
            let target = staging.join("dd-library-php.tar.gz");
            archive::download(&url, &target)?;
            target
        }
    };

    let extracted = staging.join("extracted");
    archive::extract_tarball(&archive_path, &extracted)?;

    // Release archives wrap their content in a single top-level directory.
    let root = extracted.join("dd-library-php");
    if root.is_dir() {
        Ok(root)
    } else {
        Ok(extracted)
    }
}

fn install_for_binary(
    binary: &PhpBinary,
    args: &InstallArgs,
    paths: &BundlePaths,
) -> Result<(), String> {
    log_info!("Configuring {}", binary);
    prereq::check_php_ext_prerequisite(binary, "json")?;
    let props = properties::read_php_properties(binary)?;

    if props.thread_safety && props.is_debug {
        return Err(format!(
            "'{binary}' is a thread-safe debug build; no extension builds exist for that \
             combination."
        ));
    }
    if args.enable_appsec && props.is_debug {
        return Err(format!(
            "'{binary}' is a debug build; no appsec build exists for it. Drop --enable-appsec \
             or use a non-debug PHP."
        ));
    }
    let api = props
        .api_version
        .clone()
        .ok_or_else(|| format!("'{binary}' does not report a PHP API version."))?;
    let suffix = if props.is_debug {
        "-debug"
    } else if props.thread_safety {
        "-zts"
    } else {
        ""
    };

    let extension_dir_overridden = args.extension_dir.is_some();
    let extension_dir = match &args.extension_dir {
        Some(dir) => expand_user_path(dir),
        None => props
            .extension_dir
            .clone()
            .ok_or_else(|| format!("'{binary}' does not report an extension directory."))?,
    };

    // The tracer module itself.
    let tracer_module = paths
        .root
        .join("trace/ext")
        .join(&api)
        .join(format!("ddtrace{suffix}.so"));
    if !tracer_module.is_file() {
        return Err(format!(
            "This release ships no tracer build for PHP API {api}{suffix}."
        ));
    }
    archive::safe_copy_extension(&tracer_module, &extension_dir.join("ddtrace.so"))?;

    // Profiler and appsec modules, where a build exists for this binary.
    let profiling_available = install_profiler(&props, paths, &api, suffix, &extension_dir)?;
    let appsec_available = install_appsec(paths, &api, suffix, &extension_dir)?;

    // PHP resolves bare module names against its own extension_dir setting,
    // so an overridden directory needs absolute paths in the load lines.
    let modules = ModuleLines::new(extension_dir_overridden.then_some(extension_dir.as_path()));
    reconcile_ini(binary, args, &props, paths, &modules, profiling_available, appsec_available)?;
    log_info!("'{}' configured successfully.", binary);
    Ok(())
}

/// Copies the profiler module when this binary is eligible for one.
fn install_profiler(
    props: &PhpProperties,
    paths: &BundlePaths,
    api: &str,
    suffix: &str,
    extension_dir: &Path,
) -> Result<bool, String> {
    let eligible = suffix.is_empty()
        && props
            .major_minor()
            .map(|v| PROFILING_VERSIONS.contains(&v.as_str()))
            .unwrap_or(false);
    if !eligible {
        return Ok(false);
    }
    let module = paths
        .root
        .join("profiling/ext")
        .join(api)
        .join("datadog-profiling.so");
    if !module.is_file() {
        return Ok(false);
    }
    archive::safe_copy_extension(&module, &extension_dir.join("datadog-profiling.so"))?;
    Ok(true)
}

/// Copies the appsec module when the release ships one for this API.
fn install_appsec(
    paths: &BundlePaths,
    api: &str,
    suffix: &str,
    extension_dir: &Path,
) -> Result<bool, String> {
    let module = paths
        .root
        .join("appsec/ext")
        .join(api)
        .join(format!("ddappsec{suffix}.so"));
    if !module.is_file() {
        return Ok(false);
    }
    archive::safe_copy_extension(&module, &extension_dir.join("ddappsec.so"))?;
    Ok(true)
}

/// The values written into `extension`/`zend_extension` load lines.
struct ModuleLines {
    tracer: String,
    profiler: String,
    appsec: String,
}

impl ModuleLines {
    fn new(custom_extension_dir: Option<&Path>) -> Self {
        let module = |name: &str| match custom_extension_dir {
            Some(dir) => dir.join(name).display().to_string(),
            None => name.to_string(),
        };
        Self {
            tracer: module("ddtrace.so"),
            profiler: module("datadog-profiling.so"),
            appsec: module("ddappsec.so"),
        }
    }
}

/// Brings a binary's INI files in line with this installation: legacy
/// directive rewrites, module activation, the settings backfill, then any
/// `-d` overrides.
fn reconcile_ini(
    binary: &PhpBinary,
    args: &InstallArgs,
    props: &PhpProperties,
    paths: &BundlePaths,
    modules: &ModuleLines,
    profiling_available: bool,
    appsec_available: bool,
) -> Result<(), String> {
    let ini_override = args.ini.as_deref().map(expand_user_path);
    let main_files = ini_files::main_ini_files(props, ini_override.as_deref())?;
    for file in &main_files {
        ensure_file(file)?;
    }
    let all_files = ini_files::all_ini_files(props);
    // An --ini override may live outside the scan dir.
    let all_files: Vec<PathBuf> = main_files
        .iter()
        .chain(all_files.iter())
        .cloned()
        .fold(Vec::new(), |mut acc, f| {
            if !acc.contains(&f) {
                acc.push(f);
            }
            acc
        });

    let hook = paths.request_init_hook.display().to_string();
    for file in &all_files {
        reconciler::apply_legacy_replacements(file, &hook)?;
    }

    let specs = catalog::ini_settings(
        &hook,
        &paths.appsec_helper.display().to_string(),
        &paths.appsec_rules.display().to_string(),
    );
    for file in &main_files {
        reconciler::backfill_missing_settings(file, &specs)?;
    }

    // A reinstall after `uninstall` finds the load lines commented out.
    for file in &main_files {
        reconciler::enable_module_line(file, "extension", "ddtrace", &modules.tracer)?;
    }
    reconciler::apply_setting(
        "datadog.trace.request_init_hook",
        &hook,
        &all_files,
        &main_files,
    )?;

    if args.enable_profiling {
        if profiling_available {
            for file in &main_files {
                reconciler::enable_module_line(
                    file,
                    "zend_extension",
                    "datadog-profiling",
                    &modules.profiler,
                )?;
            }
        } else {
            log_warn!(
                "--enable-profiling was given but no profiler build exists for '{}'; skipping.",
                binary
            );
        }
    }
    if args.enable_appsec {
        if appsec_available {
            for file in &main_files {
                reconciler::enable_module_line(file, "extension", "ddappsec", &modules.appsec)?;
            }
            reconciler::apply_setting("ddappsec.enabled", "On", &all_files, &main_files)?;
            reconciler::apply_setting(
                "ddappsec.helper_path",
                &paths.appsec_helper.display().to_string(),
                &all_files,
                &main_files,
            )?;
            reconciler::apply_setting(
                "ddappsec.rules_path",
                &paths.appsec_rules.display().to_string(),
                &all_files,
                &main_files,
            )?;
        } else {
            log_warn!(
                "--enable-appsec was given but no appsec build exists for '{}'; skipping.",
                binary
            );
        }
    }

    for definition in &args.define {
        // PHP's own -d treats a bare name as setting it to 1.
        let (name, value) = definition
            .split_once('=')
            .unwrap_or((definition.as_str(), "1"));
        let name = catalog::normalize_setting_name(name.trim());
        validate_setting_name(&name)?;
        reconciler::apply_setting(&name, value.trim(), &all_files, &main_files)?;
    }
    Ok(())
}

/// A setting may be written when the catalog knows it, or when it lives in
/// the tracer's own namespace.
pub fn validate_setting_name(name: &str) -> Result<(), String> {
    if catalog::find_setting(name).is_some()
        || name.starts_with("datadog.")
        || name.starts_with("ddappsec.")
    {
        Ok(())
    } else {
        Err(format!("'{name}' is not a known tracer setting."))
    }
}

fn ensure_file(path: &Path) -> Result<(), String> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Cannot create {}: {e}", parent.display()))?;
    }
    fs::write(path, "").map_err(|e| format!("Cannot create {}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setting_names_are_validated_against_catalog_and_namespaces() {
        assert!(validate_setting_name("datadog.service").is_ok());
        assert!(validate_setting_name("datadog.custom.anything").is_ok());
        assert!(validate_setting_name("ddappsec.enabled").is_ok());
        assert!(validate_setting_name("memory_limit").is_err());
    }

    #[test]
    fn ensure_file_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("conf.d/98-ddtrace.ini");
        ensure_file(&nested).unwrap();
        assert!(nested.is_file());
    }
}
