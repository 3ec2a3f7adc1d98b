use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::ffi::OsStr;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use url::Url;

use crate::DebateError;

/// Turn a debate title into a URL/filename-safe slug
pub fn slugify(title: &str) -> String {
    title.trim().to_lowercase().replace(' ', "-")
}

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Extract domain from URL for display purposes
pub fn extract_domain(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .host_str()
        .map(|host| host.strip_prefix("www.").unwrap_or(host).to_string())
}

/// Spinner shown while an external tool runs; hidden when `enabled` is false
pub fn spinner(message: impl Into<String>, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }

    let progress = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        progress.set_style(style);
    }
    progress.set_message(message.into());
    progress.enable_steady_tick(Duration::from_millis(120));
    progress
}

/// Run an external program to completion, failing with its stderr on a
/// non-zero exit status
pub async fn run_tool<I, S>(program: &str, args: I) -> Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    tracing::debug!("Running {}", program);

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| DebateError::ExternalTool {
            tool: program.to_string(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DebateError::ExternalTool {
            tool: program.to_string(),
            message: format!("{} ({})", stderr.trim(), output.status),
        }
        .into());
    }

    Ok(output)
}

/// Check if the current environment has required tools
pub async fn check_dependencies(tools: &[(&str, &str, &str)]) -> Vec<String> {
    let mut missing = Vec::new();

    for (program, version_flag, purpose) in tools {
        if !check_command_available(program, version_flag).await {
            missing.push(format!("{} - {}", program, purpose));
        }
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str, version_flag: &str) -> bool {
    Command::new(command)
        .arg(version_flag)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}
