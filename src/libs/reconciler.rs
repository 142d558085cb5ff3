// Three-pass reconciliation of a setting against a binary's INI files:
// replace active lines, else promote a commented line, else append to the
// main file(s). All edits are whole-line and regex-anchored.

use crate::schemas::catalog::IniSettingSpec;
use crate::{log_debug, log_error, log_info, log_warn};
use regex::{NoExpand, Regex};
use std::fs;
use std::path::{Path, PathBuf};

/// Where a setting ended up after reconciliation.
#[derive(Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Active lines were rewritten in-place; carries the number of files touched.
    Replaced(usize),
    /// A commented-out line was uncommented and rewritten in this file.
    Promoted(PathBuf),
    /// No line existed anywhere; the setting was appended to these files.
    Appended(Vec<PathBuf>),
}

/// Writes `name = value` across a binary's INI files.
///
/// Pass 1 replaces every active occurrence, in every file that has one. Pass 2
/// runs only when pass 1 matched nothing: the first commented occurrence in
/// the first file holding one is promoted to an active line. Pass 3 appends
/// the setting to each of `main_files` when no occurrence existed at all;
/// it succeeds if at least one file could be written.
pub fn apply_setting(
    name: &str,
    value: &str,
    all_files: &[PathBuf],
    main_files: &[PathBuf],
) -> Result<ApplyOutcome, String> {
    let replacement = format!("{name} = {value}");

    // Leading whitespace is spaces and tabs only; \s would let a match
    // anchored at a blank line cross into the next one.
    let Some(active_re) = compile_setting_regex(&format!(
        r"(?m)^[ \t]*{}\s*=\s*.*$",
        regex::escape(name)
    )) else {
        return Err(format!("Internal pattern error for setting '{name}'"));
    };

    let mut replaced: Vec<PathBuf> = Vec::new();
    for file in all_files {
        let Ok(content) = fs::read_to_string(file) else {
            continue;
        };
        if !active_re.is_match(&content) {
            continue;
        }
        let updated = active_re.replace_all(&content, NoExpand(&replacement));
        fs::write(file, updated.as_ref())
            .map_err(|e| format!("Cannot update {}: {e}", file.display()))?;
        replaced.push(file.clone());
    }
    if !replaced.is_empty() {
        if spans_unexpected_files(&replaced, main_files) {
            log_warn!(
                "Setting '{}' was active in {} files; all of them were updated.",
                name,
                replaced.len()
            );
        }
        return Ok(ApplyOutcome::Replaced(replaced.len()));
    }

    // Pass 2: promote a commented occurrence. The character class is
    // deliberately spaces, tabs and ';' only; \s would let the match cross
    // a newline and swallow the preceding line.
    let Some(commented_re) = compile_setting_regex(&format!(
        r"(?m)^[ \t;]*{}\s*=\s*.*$",
        regex::escape(name)
    )) else {
        return Err(format!("Internal pattern error for setting '{name}'"));
    };
    for file in all_files {
        let Ok(content) = fs::read_to_string(file) else {
            continue;
        };
        if !commented_re.is_match(&content) {
            continue;
        }
        let updated = commented_re.replace(&content, NoExpand(&replacement));
        fs::write(file, updated.as_ref())
            .map_err(|e| format!("Cannot update {}: {e}", file.display()))?;
        return Ok(ApplyOutcome::Promoted(file.clone()));
    }

    // Pass 3: append to the main file(s).
    let mut appended: Vec<PathBuf> = Vec::new();
    for file in main_files {
        match append_line(file, &replacement) {
            Ok(()) => appended.push(file.clone()),
            Err(e) => log_warn!("Cannot append to {}: {e}", file.display()),
        }
    }
    if appended.is_empty() {
        return Err(format!(
            "Setting '{name}' could not be written to any configuration file."
        ));
    }
    Ok(ApplyOutcome::Appended(appended))
}

/// Multiple active occurrences are only worth a warning when they reach
/// beyond the main-file set: the installer itself seeds every main candidate
/// (on Debian, the cli file plus its apache2 sibling), and rewriting those
/// is the expected path, not a duplication.
fn spans_unexpected_files(replaced: &[PathBuf], main_files: &[PathBuf]) -> bool {
    replaced.len() > 1 && replaced.iter().any(|f| !main_files.contains(f))
}

/// Appends a line, creating the file (and parent directory) if needed and
/// making sure the existing content ends with a newline first.
fn append_line(file: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut content = match fs::read_to_string(file) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e),
    };
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    content.push_str(line);
    content.push('\n');
    fs::write(file, content)
}

/// Adds every catalog setting that is absent from `file`, with its
/// description rendered as `; ` comment lines above the setting.
///
/// Settings already present in any form, active or commented, are left alone.
pub fn backfill_missing_settings(
    file: &Path,
    specs: &[IniSettingSpec],
) -> Result<usize, String> {
    let mut content = fs::read_to_string(file)
        .map_err(|e| format!("Cannot read {}: {e}", file.display()))?;
    let mut added = 0usize;

    for spec in specs {
        if setting_present(&content, spec) {
            continue;
        }
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push('\n');
        for line in spec.description {
            content.push_str("; ");
            content.push_str(line);
            content.push('\n');
        }
        if spec.commented {
            content.push(';');
        }
        content.push_str(spec.name);
        content.push_str(" = ");
        content.push_str(&spec.default);
        content.push('\n');
        added += 1;
    }

    if added > 0 {
        fs::write(file, &content)
            .map_err(|e| format!("Cannot update {}: {e}", file.display()))?;
        log_debug!("Backfilled {} settings into {}", added, file.display());
    }
    Ok(added)
}

/// Whether a setting already occurs in the content, commented or not.
///
/// `extension` and `zend_extension` are repeatable directives, so presence
/// additionally requires the line to mention this entry's module file.
fn setting_present(content: &str, spec: &IniSettingSpec) -> bool {
    let Some(re) = compile_setting_regex(&format!(
        r"(?m)^[ \t;]*{}\s*=\s*(.*)$",
        regex::escape(spec.name)
    )) else {
        // An uncompilable name can never be matched, so claim presence and
        // leave the file untouched.
        return true;
    };
    if spec.name == "extension" || spec.name == "zend_extension" {
        re.captures_iter(content)
            .any(|c| c.get(1).map(|m| m.as_str().contains(spec.default.as_str())).unwrap_or(false))
    } else {
        re.is_match(content)
    }
}

/// Comments out every line loading one of the given extension modules.
/// Returns the number of lines disabled in the file.
pub fn comment_out_module_lines(file: &Path, modules: &[&str]) -> Result<usize, String> {
    let content = fs::read_to_string(file)
        .map_err(|e| format!("Cannot read {}: {e}", file.display()))?;
    let mut disabled = 0usize;
    let mut out = String::with_capacity(content.len() + 16);

    for line in content.split_inclusive('\n') {
        let body = line.trim_end_matches(['\n', '\r']);
        let trimmed = body.trim_start();
        let is_active_load = !trimmed.starts_with(';')
            && (trimmed.starts_with("extension") || trimmed.starts_with("zend_extension"))
            && modules.iter().any(|m| trimmed.contains(m));
        if is_active_load {
            out.push(';');
            disabled += 1;
        }
        out.push_str(line);
    }

    if disabled > 0 {
        fs::write(file, &out).map_err(|e| format!("Cannot update {}: {e}", file.display()))?;
    }
    Ok(disabled)
}

/// Rewrites directives left behind by pre-0.47 releases:
///   - `ddtrace.request_init_hook` becomes `datadog.trace.request_init_hook`,
///     repointed at the current bridge location;
///   - `extension = ...ddtrace...` lines with a path or version-suffixed
///     module become plain `extension = ddtrace.so`, keeping a leading `;`.
pub fn apply_legacy_replacements(file: &Path, request_init_hook: &str) -> Result<(), String> {
    let Ok(content) = fs::read_to_string(file) else {
        return Ok(());
    };
    let mut updated = content.clone();

    if let Some(re) =
        compile_setting_regex(r"(?m)^([ \t;]*)(?:ddtrace|datadog)\.(?:trace\.)?request_init_hook\s*=\s*.*$")
    {
        let replacement = format!("datadog.trace.request_init_hook = {request_init_hook}");
        updated = re
            .replace_all(&updated, |caps: &regex::Captures| {
                format!("{}{}", &caps[1], replacement)
            })
            .into_owned();
    }

    if let Some(re) = compile_setting_regex(r"(?m)^([ \t;]*)extension\s*=\s*[^\r\n]*ddtrace[^\r\n]*$") {
        updated = re
            .replace_all(&updated, |caps: &regex::Captures| {
                let prefix = if caps[1].contains(';') { ";" } else { "" };
                format!("{prefix}extension = ddtrace.so")
            })
            .into_owned();
    }

    if updated != content {
        log_info!("Rewriting legacy tracer directives in {}", file.display());
        fs::write(file, updated).map_err(|e| format!("Cannot update {}: {e}", file.display()))?;
    }
    Ok(())
}

/// Activates an `extension`/`zend_extension` line loading the module whose
/// name contains `needle`, appending one when the file has no occurrence.
///
/// `module` is what the line is rewritten to; it differs from the needle when
/// a custom extension directory forces an absolute module path.
pub fn enable_module_line(
    file: &Path,
    directive: &str,
    needle: &str,
    module: &str,
) -> Result<(), String> {
    let mut content = fs::read_to_string(file)
        .map_err(|e| format!("Cannot read {}: {e}", file.display()))?;
    let Some(re) = compile_setting_regex(&format!(
        r"(?m)^[ \t;]*{}\s*=\s*[^\r\n]*{}[^\r\n]*$",
        regex::escape(directive),
        regex::escape(needle)
    )) else {
        return Err(format!("Internal pattern error for directive '{directive}'"));
    };
    let replacement = format!("{directive} = {module}");
    if re.is_match(&content) {
        content = re.replace_all(&content, NoExpand(&replacement)).into_owned();
        fs::write(file, content).map_err(|e| format!("Cannot update {}: {e}", file.display()))?;
        return Ok(());
    }
    append_line(file, &replacement).map_err(|e| format!("Cannot append to {}: {e}", file.display()))
}

/// Compiles a pattern, degrading to a warning on failure so a single bad
/// setting name cannot abort a whole install run.
fn compile_setting_regex(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            log_error!("Invalid setting pattern '{}': {}", pattern, e);
            None
        }
    }
}
