//! # Tool Path Resolver
//!
//! Finds the external `ffmpeg` / `ffprobe` binaries the pipeline drives.
//!
//! Resolution order for a tool:
//! 1. `MEDIA_NORMALIZER_<TOOL>` environment variable (full path)
//! 2. `MEDIA_NORMALIZER_TOOLS_DIR/<tool>` (bundled tools)
//! 3. System `PATH`

use crate::error::OptimizeError;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Tools every normalization run needs
pub const REQUIRED_TOOLS: [&str; 2] = ["ffmpeg", "ffprobe"];

const TOOLS_DIR_VAR: &str = "MEDIA_NORMALIZER_TOOLS_DIR";
const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Tool path resolver for different deployment environments
pub struct ToolPathResolver {
    /// Directory holding bundled tools, if any
    tools_dir: Option<PathBuf>,
}

impl ToolPathResolver {
    /// Create a resolver from the process environment
    pub fn new() -> Self {
        let tools_dir = env::var_os(TOOLS_DIR_VAR)
            .map(PathBuf::from)
            .filter(|dir| dir.is_dir());

        if let Some(ref dir) = tools_dir {
            debug!("Bundled tools directory: {}", dir.display());
        }

        Self { tools_dir }
    }

    /// Resolver that only looks in `tools_dir` and `PATH`
    pub fn with_tools_dir(tools_dir: Option<PathBuf>) -> Self {
        Self { tools_dir }
    }

    /// Resolve the path to a specific tool
    pub fn resolve_tool(&self, tool_name: &str) -> Option<PathBuf> {
        let override_var = format!("MEDIA_NORMALIZER_{}", tool_name.to_uppercase());
        if let Some(path) = env::var_os(&override_var).map(PathBuf::from) {
            if path.is_file() {
                debug!("Using {} from {}: {}", tool_name, override_var, path.display());
                return Some(path);
            }
            warn!("{} points to a missing file: {}", override_var, path.display());
        }

        if let Some(ref tools_dir) = self.tools_dir {
            let bundled = tools_dir.join(executable_name(tool_name));
            if bundled.is_file() {
                debug!("Using bundled tool: {} -> {}", tool_name, bundled.display());
                return Some(bundled);
            }
        }

        let found = find_in_path(tool_name);
        if found.is_none() {
            debug!("Tool not found: {}", tool_name);
        }
        found
    }

    /// Check if a tool is available and provide installation instructions if not
    pub fn check_tool_with_instructions(&self, tool_name: &str) -> Result<PathBuf, String> {
        self.resolve_tool(tool_name).ok_or_else(|| {
            format!(
                "Tool '{}' not found in PATH.\nInstall it with:\n  {}",
                tool_name,
                install_instructions(tool_name)
            )
        })
    }

    /// Resolve every required tool and make sure each one actually runs.
    pub async fn verify(&self) -> Result<ExternalTools, OptimizeError> {
        let mut missing = Vec::new();
        let mut resolved = Vec::new();

        for tool in REQUIRED_TOOLS {
            match self.check_tool_with_instructions(tool) {
                Ok(path) => {
                    if responds_to_version(&path).await {
                        resolved.push(path);
                    } else {
                        missing.push(format!("Tool '{}' at {} did not run", tool, path.display()));
                    }
                }
                Err(msg) => missing.push(msg),
            }
        }

        if !missing.is_empty() {
            return Err(OptimizeError::MissingDependency(missing.join("\n\n")));
        }

        let ffprobe = resolved.pop().unwrap_or_else(|| PathBuf::from("ffprobe"));
        let ffmpeg = resolved.pop().unwrap_or_else(|| PathBuf::from("ffmpeg"));
        Ok(ExternalTools { ffmpeg, ffprobe })
    }

    /// Get a report of tool availability
    pub fn get_tools_report(&self) -> String {
        let mut report = String::from("External tools:\n");
        for tool in REQUIRED_TOOLS {
            match self.resolve_tool(tool) {
                Some(path) => report.push_str(&format!("  [ok] {} -> {}\n", tool, path.display())),
                None => report.push_str(&format!(
                    "  [missing] {} (install with: {})\n",
                    tool,
                    install_instructions(tool)
                )),
            }
        }
        if let Some(ref dir) = self.tools_dir {
            report.push_str(&format!("Bundled tools dir: {}\n", dir.display()));
        }
        report
    }
}

impl Default for ToolPathResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolved external tool paths
#[derive(Debug, Clone)]
pub struct ExternalTools {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

fn executable_name(tool_name: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", tool_name)
    } else {
        tool_name.to_string()
    }
}

fn find_in_path(tool_name: &str) -> Option<PathBuf> {
    let file_name = executable_name(tool_name);
    let path_var = env::var_os("PATH")?;
    env::split_paths(&path_var)
        .map(|dir| dir.join(&file_name))
        .find(|candidate| candidate.is_file())
}

async fn responds_to_version(path: &Path) -> bool {
    let run = Command::new(path)
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .kill_on_drop(true)
        .status();

    match tokio::time::timeout(VERSION_CHECK_TIMEOUT, run).await {
        Ok(Ok(status)) => status.success(),
        Ok(Err(e)) => {
            debug!("Failed to run {}: {}", path.display(), e);
            false
        }
        Err(_) => {
            debug!("{} -version timed out", path.display());
            false
        }
    }
}

fn install_instructions(tool_name: &str) -> &'static str {
    match tool_name {
        "ffmpeg" | "ffprobe" => {
            if cfg!(target_os = "macos") {
                "brew install ffmpeg"
            } else if cfg!(windows) {
                "winget install ffmpeg  # or https://ffmpeg.org/download.html"
            } else {
                "sudo apt-get install ffmpeg"
            }
        }
        _ => "see https://ffmpeg.org/download.html",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_bundled_tool_is_found() {
        let dir = TempDir::new().unwrap();
        let tool = dir.path().join(executable_name("mn-fake-tool"));
        std::fs::write(&tool, b"").unwrap();

        let resolver = ToolPathResolver::with_tools_dir(Some(dir.path().to_path_buf()));
        assert_eq!(resolver.resolve_tool("mn-fake-tool"), Some(tool));
    }

    #[test]
    fn test_missing_tool_has_instructions() {
        let resolver = ToolPathResolver::with_tools_dir(None);
        let err = resolver
            .check_tool_with_instructions("mn-definitely-not-installed")
            .unwrap_err();
        assert!(err.contains("mn-definitely-not-installed"));
    }

    #[test]
    fn test_report_lists_required_tools() {
        let report = ToolPathResolver::with_tools_dir(None).get_tools_report();
        for tool in REQUIRED_TOOLS {
            assert!(report.contains(tool));
        }
    }
}
