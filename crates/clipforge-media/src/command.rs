//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path
    input: PathBuf,
    /// Output file path
    output: PathBuf,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add an input argument (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add an output argument (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set seek position (before input, fast seek).
    pub fn seek(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format!("{:.3}", seconds))
    }

    /// Set output duration.
    pub fn duration(self, seconds: f64) -> Self {
        self.output_arg("-t").output_arg(format!("{:.3}", seconds))
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Copy both streams without re-encoding.
    pub fn stream_copy(self) -> Self {
        self.output_arg("-c").output_arg("copy")
    }

    /// Drop the video stream.
    pub fn no_video(self) -> Self {
        self.output_arg("-vn")
    }

    /// Build the full argument vector.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }
        args.push("-hide_banner".to_string());
        args.push("-loglevel".to_string());
        args.push(self.log_level.clone());

        args.extend(self.input_args.clone());
        args.push("-i".to_string());
        args.push(self.input.display().to_string());
        args.extend(self.output_args.clone());
        args.push(self.output.display().to_string());

        args
    }

    /// Run the command, failing after `timeout` if set.
    ///
    /// On timeout the child is killed; partially written output is left
    /// for the caller's cleanup pass.
    pub async fn run(&self, timeout: Option<Duration>) -> MediaResult<()> {
        if !self.input.exists() {
            return Err(MediaError::FileNotFound(self.input.clone()));
        }
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        if let Some(parent) = self.output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let args = self.build_args();
        debug!(input = %self.input.display(), output = %self.output.display(), "Running ffmpeg");

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child.stderr.take();

        let output_status = match timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status?,
                Err(_) => {
                    warn!(output = %self.output.display(), "FFmpeg timed out, killing");
                    child.kill().await.ok();
                    return Err(MediaError::Timeout(limit.as_secs()));
                }
            },
            None => child.wait().await?,
        };

        if !output_status.success() {
            let stderr_text = match stderr {
                Some(mut pipe) => {
                    use tokio::io::AsyncReadExt;
                    let mut buf = String::new();
                    pipe.read_to_string(&mut buf).await.ok();
                    Some(truncate_stderr(buf))
                }
                None => None,
            };
            return Err(MediaError::ffmpeg_failed(
                format!("encoding {} failed", self.output.display()),
                stderr_text,
                output_status.code(),
            ));
        }

        Ok(())
    }
}

/// Keep the tail of FFmpeg's stderr; the useful error is at the end.
fn truncate_stderr(stderr: String) -> String {
    const MAX: usize = 2048;
    if stderr.len() <= MAX {
        return stderr;
    }
    let start = stderr.len() - MAX;
    let boundary = stderr
        .char_indices()
        .map(|(i, _)| i)
        .find(|&i| i >= start)
        .unwrap_or(start);
    format!("...{}", &stderr[boundary..])
}
