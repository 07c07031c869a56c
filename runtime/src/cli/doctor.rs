//! Environment readiness check.
//!
//! Verifies that a browser can be found and launched with the effective
//! configuration, that the output directory is writable, and that the
//! selector table and detail-URL pattern are usable. Every failure comes with
//! a fix hint.

use crate::cli::output::{self, Styled};
use crate::config::CrawlConfig;
use crate::renderer::chromium::{find_chromium, ChromiumLauncher};
use crate::renderer::Launcher;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

pub async fn run(config: &CrawlConfig) -> Result<()> {
    let chromium = config.browser.chromium_path.clone().or_else(find_chromium);
    let version = chromium.as_deref().and_then(chromium_version);
    let launch = match &chromium {
        Some(_) => Some(headless_launch(config).await),
        None => None,
    };
    let writable = output_dir_writable(&config.output_dir);
    let pattern_ok = config.site.detail_regex().is_ok();

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "chromium_path": chromium.as_ref().map(|p| p.display().to_string()),
            "chromium_version": version,
            "launch_ms": launch.as_ref().and_then(|r| r.as_ref().ok()),
            "launch_error": launch.as_ref().and_then(|r| r.as_ref().err()),
            "headless": config.browser.headless,
            "no_sandbox": config.browser.no_sandbox,
            "output_dir": config.output_dir.display().to_string(),
            "output_writable": writable.is_ok(),
            "selectors_version": config.site.selectors.version,
            "detail_pattern_valid": pattern_ok,
        }));
        return Ok(());
    }

    let s = Styled::new();
    let mut ready = true;
    output::print_header(&s);

    output::print_section(&s, "Browser");
    match &chromium {
        Some(path) => {
            output::print_check(
                s.ok_sym(),
                "Chromium:",
                &format!(
                    "{} at {}",
                    version.as_deref().unwrap_or("unknown version"),
                    path.display()
                ),
            );
            match launch {
                Some(Ok(ms)) => output::print_check(
                    s.ok_sym(),
                    "Launch test:",
                    &format!("launched and closed in {ms}ms"),
                ),
                Some(Err(msg)) => {
                    output::print_check(s.fail_sym(), "Launch test:", &format!("FAILED: {msg}"));
                    if msg.contains("shared librar") || msg.contains("libnss") {
                        output::print_detail(
                            "Fix (Ubuntu/Debian): sudo apt install libnss3 libatk1.0-0 libatk-bridge2.0-0",
                        );
                    }
                    if is_docker() && !config.browser.no_sandbox {
                        output::print_detail("Running in Docker? Try HARVEST_CHROMIUM_NO_SANDBOX=1");
                    }
                    ready = false;
                }
                None => {}
            }
        }
        None => {
            output::print_check(s.fail_sym(), "Chromium:", "NOT FOUND");
            output::print_detail("Install Google Chrome or Chromium,");
            output::print_detail("or set HARVEST_CHROMIUM_PATH=/path/to/chrome");
            ready = false;
        }
    }
    let mode = if config.browser.headless { "headless" } else { "headful" };
    output::print_check(s.info_sym(), "Mode:", mode);
    eprintln!();

    output::print_section(&s, "Config");
    let shown = if config.output_dir.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        config.output_dir.clone()
    };
    match writable {
        Ok(()) => output::print_check(s.ok_sym(), "Output dir:", &format!("{} (writable)", shown.display())),
        Err(e) => {
            output::print_check(s.fail_sym(), "Output dir:", &format!("{}: {e}", shown.display()));
            output::print_detail("Fix: pass --output-dir or set HARVEST_OUTPUT_DIR");
            ready = false;
        }
    }
    output::print_check(
        s.info_sym(),
        "Selectors:",
        &format!("version {}", config.site.selectors.version),
    );
    if pattern_ok {
        output::print_check(s.ok_sym(), "Detail URL:", &config.site.detail_url_pattern);
    } else {
        output::print_check(
            s.fail_sym(),
            "Detail URL:",
            &format!("invalid pattern {}", config.site.detail_url_pattern),
        );
        ready = false;
    }

    if ready {
        output::print_status(&s, &s.green("READY"), "start with 'harvest list <query>'");
    } else {
        output::print_status(&s, &s.red("NOT READY"), "fix issues above");
    }
    Ok(())
}

/// Get Chromium version string.
fn chromium_version(path: &Path) -> Option<String> {
    let output = Command::new(path).arg("--version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let raw = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Some(raw.replace("Google Chrome ", "").replace("Chromium ", ""))
}

/// Launch and close a browser with the run's own options. Returns milliseconds.
async fn headless_launch(config: &CrawlConfig) -> std::result::Result<u64, String> {
    let start = Instant::now();
    let launcher = ChromiumLauncher::new(config.browser.clone());
    let context = launcher.launch().await.map_err(|e| e.to_string())?;
    context.close().await.map_err(|e| e.to_string())?;
    Ok(start.elapsed().as_millis() as u64)
}

fn output_dir_writable(dir: &Path) -> std::io::Result<()> {
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    std::fs::create_dir_all(dir)?;
    let probe = dir.join(".harvest-doctor");
    std::fs::write(&probe, b"ok")?;
    std::fs::remove_file(&probe)
}

/// Check if running inside Docker.
fn is_docker() -> bool {
    Path::new("/.dockerenv").exists()
        || std::fs::read_to_string("/proc/1/cgroup")
            .map(|s| s.contains("docker") || s.contains("containerd"))
            .unwrap_or(false)
}
