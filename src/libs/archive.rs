// Release archive handling: resolving the download URL for the running
// platform, fetching it with a fallback transport chain, and unpacking and
// installing the bundle contents.

use crate::{log_debug, log_info, log_warn};
use flate2::read::GzDecoder;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use walkdir::WalkDir;

const DEFAULT_ORIGIN: &str = "https://github.com/DataDog/dd-trace-php";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// The target triple baked into release artifact names. Linux builds come in
/// a gnu and a musl flavor; Alpine needs the musl one.
pub fn platform_triple() -> String {
    if cfg!(target_os = "macos") {
        return "x86_64-apple-darwin".to_string();
    }
    if cfg!(windows) {
        return "x86_64-pc-windows-msvc".to_string();
    }
    let libc = if is_alpine() { "musl" } else { "gnu" };
    format!("x86_64-linux-{libc}")
}

fn is_alpine() -> bool {
    fs::read_to_string("/etc/os-release")
        .map(|c| c.to_lowercase().contains("alpine"))
        .unwrap_or(false)
}

/// The archive URL for a release version. `origin` defaults to the upstream
/// GitHub repository and can be redirected for testing via
/// DD_TEST_INSTALLER_REPO (the caller reads that variable).
pub fn resolve_release_url(version: &str, origin: Option<&str>) -> String {
    let origin = origin.unwrap_or(DEFAULT_ORIGIN).trim_end_matches('/');
    format!(
        "{origin}/releases/download/{version}/dd-library-php-{version}-{}.tar.gz",
        platform_triple()
    )
}

/// Asks the GitHub API for the name of the latest release, without the
/// leading 'v' some releases carry.
pub fn latest_release_version() -> Result<String, String> {
    let url = "https://api.github.com/repos/DataDog/dd-trace-php/releases/latest";
    log_debug!("Resolving latest release from {}", url);
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build();
    let response: serde_json::Value = agent
        .get(url)
        .set("User-Agent", "dd-php-setup")
        .call()
        .map_err(|e| format!("Cannot query the latest release: {e}"))?
        .into_json()
        .map_err(|e| format!("Malformed release metadata: {e}"))?;
    let name = response
        .get("name")
        .and_then(|n| n.as_str())
        .ok_or_else(|| "Release metadata carries no name".to_string())?;
    Ok(name.trim_start_matches('v').to_string())
}

/// Downloads `url` to `destination`, trying transports in order: the native
/// HTTP client, the curl CLI, then wget (PowerShell on Windows). Each
/// transport's failure is logged and the next one tried.
pub fn download(url: &str, destination: &Path) -> Result<(), String> {
    log_info!("Downloading {}", url);

    match download_ureq(url, destination) {
        Ok(()) => return Ok(()),
        Err(e) => log_warn!("Native download failed ({}), falling back to curl", e),
    }
    match download_cli("curl", &["-Lf", "--output"], destination, url) {
        Ok(()) => return Ok(()),
        Err(e) => log_warn!("curl failed ({}), trying the last fallback", e),
    }
    let last = if cfg!(windows) {
        let script = format!(
            "Invoke-WebRequest -Uri '{url}' -OutFile '{}'",
            destination.display()
        );
        run_transport("powershell", &["-Command".to_string(), script])
    } else {
        download_cli("wget", &["-O"], destination, url)
    };
    last.map_err(|e| {
        format!("Every download method failed for {url}; last error: {e}")
    })
}

fn download_ureq(url: &str, destination: &Path) -> Result<(), String> {
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build();
    let response = agent
        .get(url)
        .set("User-Agent", "dd-php-setup")
        .call()
        .map_err(|e| e.to_string())?;
    let total = response
        .header("Content-Length")
        .and_then(|v| v.parse::<u64>().ok());

    let mut reader = response.into_reader();
    let mut file = fs::File::create(destination).map_err(|e| e.to_string())?;
    let mut progress = DownloadProgress::new(total);
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = reader.read(&mut buffer).map_err(|e| e.to_string())?;
        if read == 0 {
            break;
        }
        file.write_all(&buffer[..read]).map_err(|e| e.to_string())?;
        progress.advance(read as u64);
    }
    progress.finish();
    Ok(())
}

fn download_cli(program: &str, args: &[&str], destination: &Path, url: &str) -> Result<(), String> {
    let mut full: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    full.push(destination.display().to_string());
    full.push(url.to_string());
    run_transport(program, &full)
}

fn run_transport(program: &str, args: &[String]) -> Result<(), String> {
    let status = Command::new(program)
        .args(args)
        .status()
        .map_err(|e| format!("cannot launch {program}: {e}"))?;
    if status.success() {
        Ok(())
    } else {
        Err(format!("{program} exited with {status}"))
    }
}

/// Coarse textual progress: roughly twenty dots across the whole transfer,
/// so a slow download still shows life without flooding the output.
struct DownloadProgress {
    total: Option<u64>,
    received: u64,
    dots: u64,
}

impl DownloadProgress {
    fn new(total: Option<u64>) -> Self {
        Self { total, received: 0, dots: 0 }
    }

    fn advance(&mut self, bytes: u64) {
        self.received += bytes;
        let Some(total) = self.total.filter(|t| *t > 0) else {
            return;
        };
        let due = self.received * 20 / total;
        while self.dots < due {
            print!(".");
            let _ = std::io::stdout().flush();
            self.dots += 1;
        }
    }

    fn finish(&mut self) {
        if self.dots > 0 {
            println!();
        }
        log_debug!("Downloaded {} bytes", self.received);
    }
}

/// Unpacks a gzip-compressed tarball into `destination`.
pub fn extract_tarball(archive: &Path, destination: &Path) -> Result<(), String> {
    log_debug!("Extracting {} into {}", archive.display(), destination.display());
    let file = fs::File::open(archive)
        .map_err(|e| format!("Cannot open {}: {e}", archive.display()))?;
    fs::create_dir_all(destination)
        .map_err(|e| format!("Cannot create {}: {e}", destination.display()))?;
    tar::Archive::new(GzDecoder::new(file))
        .unpack(destination)
        .map_err(|e| format!("Cannot extract {}: {e}", archive.display()))
}

/// Reads the VERSION file a release bundle ships at its root. Offline
/// archives without one get a timestamp-derived pseudo version so each
/// install lands in its own directory.
pub fn bundled_version(bundle_root: &Path) -> String {
    match fs::read_to_string(bundle_root.join("VERSION")) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => {
            let pseudo = chrono::Local::now().format("%Y.%m.%d-%H.%M").to_string();
            log_warn!("Bundle carries no VERSION file; using '{}'", pseudo);
            pseudo
        }
    }
}

/// Copies an extension module into place without ever truncating the live
/// file: the copy goes to a `.tmp` sibling first and is renamed over the
/// target, so a PHP worker dlopen()ing mid-install sees old or new, never
/// a half-written module.
pub fn safe_copy_extension(source: &Path, target: &Path) -> Result<(), String> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Cannot create {}: {e}", parent.display()))?;
    }
    let staging = target.with_extension("so.tmp");
    fs::copy(source, &staging)
        .map_err(|e| format!("Cannot copy {} to {}: {e}", source.display(), staging.display()))?;
    fs::rename(&staging, target)
        .map_err(|e| format!("Cannot move {} into place: {e}", target.display()))?;
    log_debug!("Installed {}", target.display());
    Ok(())
}

/// Recursively copies a directory tree, preserving the relative layout.
pub fn copy_tree(source: &Path, destination: &Path) -> Result<(), String> {
    for entry in WalkDir::new(source).into_iter().filter_map(|e| e.ok()) {
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| format!("Path outside the source tree: {e}"))?;
        let target = destination.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .map_err(|e| format!("Cannot create {}: {e}", target.display()))?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| format!("Cannot create {}: {e}", parent.display()))?;
            }
            fs::copy(entry.path(), &target)
                .map_err(|e| format!("Cannot copy {}: {e}", entry.path().display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    #[test]
    fn release_url_embeds_version_and_platform() {
        let url = resolve_release_url("0.99.0", None);
        assert!(url.starts_with("https://github.com/DataDog/dd-trace-php/releases/download/0.99.0/"));
        assert!(url.contains("dd-library-php-0.99.0-"));
        assert!(url.ends_with(".tar.gz"));
    }

    #[test]
    fn release_url_honors_test_origin() {
        let url = resolve_release_url("1.0.0", Some("http://localhost:8000/repo/"));
        assert!(url.starts_with("http://localhost:8000/repo/releases/download/1.0.0/"));
    }

    #[test]
    fn tarball_round_trips_through_extract() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("bundle.tar.gz");

        let encoder = GzEncoder::new(fs::File::create(&archive_path).unwrap(), Compression::fast());
        let mut builder = tar::Builder::new(encoder);
        let payload = b"0.99.0\n";
        let mut header = tar::Header::new_gnu();
        header.set_size(payload.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "dd-library-php/VERSION", payload.as_slice())
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap();

        let out = dir.path().join("out");
        extract_tarball(&archive_path, &out).unwrap();
        assert_eq!(bundled_version(&out.join("dd-library-php")), "0.99.0");
    }

    #[test]
    fn missing_version_file_yields_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let version = bundled_version(dir.path());
        // %Y.%m.%d-%H.%M
        assert_eq!(version.len(), "2026.08.30-12.00".len());
    }

    #[test]
    fn safe_copy_replaces_without_truncation() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("new-ddtrace.so");
        let target = dir.path().join("ext").join("ddtrace.so");
        fs::write(&source, b"new module").unwrap();
        safe_copy_extension(&source, &target).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"new module");
        assert!(!target.with_extension("so.tmp").exists());
    }

    #[test]
    fn copy_tree_preserves_layout() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("bridge")).unwrap();
        fs::write(src.join("bridge").join("autoload.php"), "<?php\n").unwrap();
        let dst = dir.path().join("dst");
        copy_tree(&src, &dst).unwrap();
        assert!(dst.join("bridge").join("autoload.php").is_file());
    }
}
