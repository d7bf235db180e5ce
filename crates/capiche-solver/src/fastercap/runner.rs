//! FasterCap process runner.
//!
//! This module handles invoking FasterCap as a subprocess on a list file.

use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Duration;

use crate::error::{Error, Result};

/// Configuration for the FasterCap runner.
#[derive(Debug, Clone)]
pub struct FasterCapConfig {
    /// Path to the FasterCap executable (default: "FasterCap" in PATH).
    pub executable: String,
    /// Timeout for one FasterCap run in seconds.
    pub timeout_secs: u64,
    /// Largest tolerance tried after timeouts.
    pub max_tolerance: f64,
    /// Tolerances above this are reported as a warning.
    pub warn_tolerance: f64,
    /// Relative asymmetry of the matrix reported as a warning.
    pub reciprocity_tolerance: f64,
}

impl Default for FasterCapConfig {
    fn default() -> Self {
        Self {
            executable: "FasterCap".to_string(),
            timeout_secs: 30,
            max_tolerance: 0.1,
            warn_tolerance: 0.01,
            reciprocity_tolerance: 0.05,
        }
    }
}

impl FasterCapConfig {
    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_max_tolerance(mut self, tolerance: f64) -> Self {
        self.max_tolerance = tolerance;
        self
    }

    pub fn with_reciprocity_tolerance(mut self, tolerance: f64) -> Self {
        self.reciprocity_tolerance = tolerance;
        self
    }
}

/// Output of a successful run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub stdout: String,
    /// Tolerance the run finally succeeded with.
    pub tolerance: f64,
}

/// Check if the FasterCap executable can be started.
pub fn is_fastercap_available(config: &FasterCapConfig) -> bool {
    Command::new(&config.executable)
        .arg("-h")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .and_then(|mut child| {
            let _ = child.kill();
            child.wait()
        })
        .is_ok()
}

/// Run a list file through FasterCap, relaxing the tolerance on timeout.
///
/// Each timeout doubles the tolerance; once the next tolerance would exceed
/// `max_tolerance` the run fails with [`Error::SolverTimeout`].
pub fn run_fastercap(list_file: &str, tolerance: f64, config: &FasterCapConfig) -> Result<RunOutput> {
    let mut file = tempfile::Builder::new()
        .prefix("capiche")
        .suffix(".lst")
        .tempfile()
        .map_err(|e| Error::TempFile(e.to_string()))?;
    file.write_all(list_file.as_bytes())
        .and_then(|_| file.flush())
        .map_err(|e| Error::TempFile(e.to_string()))?;

    let mut tolerance = tolerance;
    loop {
        match run_once(file.path(), tolerance, config) {
            Ok(stdout) => {
                if tolerance > config.warn_tolerance {
                    log::warn!("FasterCap needed a relaxed tolerance of {:.3}", tolerance);
                }
                return Ok(RunOutput { stdout, tolerance });
            }
            Err(Error::SolverTimeout { .. }) if tolerance * 2.0 <= config.max_tolerance => {
                tolerance *= 2.0;
                log::info!("FasterCap timed out; retrying with tolerance {:.3}", tolerance);
            }
            Err(e) => return Err(e),
        }
    }
}

fn run_once(path: &std::path::Path, tolerance: f64, config: &FasterCapConfig) -> Result<String> {
    // -b: batch mode, no GUI
    // -a<tol>: automatic refinement to the given relative tolerance
    let mut cmd = Command::new(&config.executable);
    cmd.arg("-b")
        .arg(path)
        .arg(format!("-a{}", tolerance))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    log::debug!("running {:?}", cmd);
    let child = cmd.spawn().map_err(|e| {
        Error::SolverNotFound(format!("{}: {}", config.executable, e))
    })?;

    let output = wait_with_timeout(child, Duration::from_secs(config.timeout_secs)).map_err(|e| match e {
        Error::SolverTimeout { secs, .. } => Error::SolverTimeout { secs, tolerance },
        other => other,
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        log::warn!("FasterCap stderr: {}", stderr.trim());
    }

    if !output.status.success() {
        return Err(Error::SolverInvocation(format!(
            "FasterCap exited with {}\nstderr: {}\nstdout: {}",
            output.status,
            stderr.trim(),
            stdout.trim()
        )));
    }

    Ok(stdout)
}

/// Wait for a child process with timeout.
///
/// Output pipes are drained on background threads so a chatty solver cannot
/// block on a full pipe while we poll.
fn wait_with_timeout(mut child: std::process::Child, timeout: Duration) -> Result<std::process::Output> {
    use std::io::Read;
    use std::thread;

    let drain = |pipe: Option<Box<dyn Read + Send>>| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(mut pipe) = pipe {
                let _ = pipe.read_to_end(&mut buf);
            }
            buf
        })
    };
    let stdout = drain(child.stdout.take().map(|s| Box::new(s) as Box<dyn Read + Send>));
    let stderr = drain(child.stderr.take().map(|s| Box::new(s) as Box<dyn Read + Send>));

    let start = std::time::Instant::now();
    let poll_interval = Duration::from_millis(100);

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(Error::SolverTimeout {
                        secs: timeout.as_secs(),
                        tolerance: 0.0,
                    });
                }
                thread::sleep(poll_interval);
            }
            Err(e) => {
                return Err(Error::SolverInvocation(e.to_string()));
            }
        }
    };

    Ok(std::process::Output {
        status,
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FasterCapConfig::default();
        assert_eq!(config.executable, "FasterCap");
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.max_tolerance, 0.1);
    }

    #[test]
    fn test_missing_executable() {
        let config = FasterCapConfig::default().with_executable("/nonexistent/FasterCap");
        assert!(!is_fastercap_available(&config));
        let result = run_fastercap("* empty\n", 0.01, &config);
        assert!(matches!(result, Err(Error::SolverNotFound(_))));
    }

    #[test]
    #[ignore] // Requires FasterCap to be installed
    fn test_fastercap_available() {
        let config = FasterCapConfig::default();
        assert!(is_fastercap_available(&config));
    }
}
