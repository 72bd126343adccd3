//! Untrusted analysis execution
//!
//! Code generated by the LLM runs here and nowhere else. Each run gets its own
//! directory, a cleared environment (only `PATH`, `DATASET_PATH` and
//! `OUTPUT_DIR`), a wall-clock limit and truncated output. The child process
//! is killed when the limit expires.
//!
//! This is process isolation, not a security boundary against a hostile
//! model: the interpreter can still read anything the service user can. It is
//! only enabled when the operator sets `ALLOW_CODE_EXECUTION=true`.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::SandboxConfig;
use crate::types::{AppError, AppResult};

const SCRIPT_NAME: &str = "analysis_script";

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutput {
    pub stdout: String,
    pub stderr: String,
    /// Files the script wrote into `OUTPUT_DIR`
    pub artifacts: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AnalysisSandbox {
    config: SandboxConfig,
}

impl AnalysisSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    pub async fn run(
        &self,
        code: &str,
        dataset_path: &Path,
        work_root: &Path,
    ) -> AppResult<ExecutionOutput> {
        let run_dir = work_root.join("runs").join(Uuid::new_v4().to_string());
        let output_dir = run_dir.join("output");
        fs::create_dir_all(&output_dir).await?;
        let script = run_dir.join(SCRIPT_NAME);
        fs::write(&script, code).await?;

        let mut parts = self.config.interpreter.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| AppError::AnalysisExecution("no interpreter configured".to_string()))?;

        let mut command = Command::new(program);
        command
            .args(parts)
            .arg(&script)
            .current_dir(&run_dir)
            .env_clear()
            .env("PATH", std::env::var("PATH").unwrap_or_default())
            .env("DATASET_PATH", dataset_path)
            .env("OUTPUT_DIR", &output_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(interpreter = %self.config.interpreter, dir = %run_dir.display(), "Running analysis code");

        let mut child = command.spawn().map_err(|e| {
            AppError::AnalysisExecution(format!(
                "could not start {}: {}",
                self.config.interpreter, e
            ))
        })?;
        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(AppError::Internal("child output pipes missing".to_string()));
        };

        let limit = self.config.max_output_bytes;
        let finished = async {
            let (stdout, stderr, status) = tokio::join!(
                read_capped(stdout, limit),
                read_capped(stderr, limit),
                child.wait()
            );
            Ok::<_, std::io::Error>((stdout?, stderr?, status?))
        };

        // On timeout the child is dropped, and kill_on_drop ends it
        let (stdout, stderr, status) = match tokio::time::timeout(self.config.timeout(), finished).await {
            Ok(result) => result.map_err(|e| AppError::AnalysisExecution(e.to_string()))?,
            Err(_) => {
                warn!(timeout_secs = self.config.timeout_secs, "Analysis code timed out");
                return Err(AppError::AnalysisExecution(format!(
                    "timed out after {}s",
                    self.config.timeout_secs
                )));
            }
        };

        let stdout = truncate(&String::from_utf8_lossy(&stdout), limit);
        let stderr = truncate(&String::from_utf8_lossy(&stderr), limit);

        if !status.success() {
            let code = status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Err(AppError::AnalysisExecution(format!(
                "exit status {}: {}",
                code,
                stderr.trim()
            )));
        }

        Ok(ExecutionOutput {
            stdout,
            stderr,
            artifacts: list_artifacts(&output_dir).await?,
        })
    }
}

async fn list_artifacts(dir: &Path) -> AppResult<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Keep at most `limit + 1` bytes (enough to tell that output was cut) and
/// discard the rest while the child keeps writing.
async fn read_capped<R>(reader: R, limit: usize) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut kept = Vec::new();
    let mut capped = reader.take(limit as u64 + 1);
    capped.read_to_end(&mut kept).await?;
    tokio::io::copy(&mut capped.into_inner(), &mut tokio::io::sink()).await?;
    Ok(kept)
}

fn truncate(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\n...[output truncated]", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sandbox(timeout_secs: u64) -> AnalysisSandbox {
        AnalysisSandbox::new(SandboxConfig {
            allow_code_execution: true,
            interpreter: "sh".to_string(),
            timeout_secs,
            max_output_bytes: 64,
            max_steps: 3,
        })
    }

    #[tokio::test]
    async fn test_runs_with_dataset_env() {
        let dir = TempDir::new().unwrap();
        let dataset = dir.path().join("data.csv");
        std::fs::write(&dataset, "id,amount\n1,10.5\n2,20.0\n").unwrap();

        let output = sandbox(10)
            .run(
                "tail -n +2 \"$DATASET_PATH\" | wc -l\necho chart > \"$OUTPUT_DIR/plot.png\"\n",
                &dataset,
                dir.path(),
            )
            .await
            .unwrap();

        assert_eq!(output.stdout.trim(), "2");
        assert_eq!(output.artifacts.len(), 1);
        assert!(output.artifacts[0].ends_with("plot.png"));
    }

    #[tokio::test]
    async fn test_failure_is_analysis_error() {
        let dir = TempDir::new().unwrap();
        let err = sandbox(10)
            .run("echo boom >&2\nexit 3\n", Path::new("/nonexistent.csv"), dir.path())
            .await
            .unwrap_err();
        match err {
            AppError::AnalysisExecution(msg) => {
                assert!(msg.contains("exit status 3"));
                assert!(msg.contains("boom"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout() {
        let dir = TempDir::new().unwrap();
        let err = sandbox(1)
            .run("sleep 5\n", Path::new("/nonexistent.csv"), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AnalysisExecution(msg) if msg.contains("timed out")));
    }

    #[tokio::test]
    async fn test_environment_is_cleared() {
        let dir = TempDir::new().unwrap();
        std::env::set_var("TABULAR_CHAT_SECRET_VALUE", "leak");
        let output = sandbox(10)
            .run(
                "echo \"[${TABULAR_CHAT_SECRET_VALUE}]\"\n",
                Path::new("/nonexistent.csv"),
                dir.path(),
            )
            .await
            .unwrap();
        assert_eq!(output.stdout.trim(), "[]");
    }

    #[tokio::test]
    async fn test_endless_output_is_capped() {
        let dir = TempDir::new().unwrap();
        // Far more than the 64-byte cap, written until the script exits
        let output = sandbox(10)
            .run(
                "i=0\nwhile [ $i -lt 20000 ]; do echo line-$i; i=$((i+1)); done\necho done >&2\n",
                Path::new("/nonexistent.csv"),
                dir.path(),
            )
            .await
            .unwrap();
        assert!(output.stdout.starts_with("line-0\n"));
        assert!(output.stdout.ends_with("[output truncated]"));
        assert!(output.stdout.len() < 64 + 64);
        assert_eq!(output.stderr.trim(), "done");
    }

    #[tokio::test]
    async fn test_read_capped_keeps_one_extra_byte() {
        let data = vec![b'x'; 1000];
        let kept = read_capped(&data[..], 10).await.unwrap();
        assert_eq!(kept.len(), 11);
        let short = read_capped(&b"abc"[..], 10).await.unwrap();
        assert_eq!(short, b"abc");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "ééééé";
        let out = truncate(text, 3);
        assert!(out.starts_with("é"));
        assert!(out.ends_with("[output truncated]"));
        assert_eq!(truncate("short", 10), "short");
    }
}
