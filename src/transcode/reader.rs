use std::path::Path;
use std::process::Stdio;

use anyhow::Context;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};

use crate::config::CONFIG;
use crate::error::Error;
use crate::transcode::FrameBuffer;

/// Streams decoded RGB24 frames out of an ffmpeg child process.
pub struct FrameReader {
    child: Child,
    stdout: ChildStdout,
    frame_len: usize,
}

impl FrameReader {
    pub fn spawn(input: &Path, width: u32, height: u32) -> Result<Self, anyhow::Error> {
        let mut child = Command::new(&CONFIG.ffmpeg)
            .arg("-i")
            .arg(input)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:"])
            .args(["-loglevel", "warning"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .context("failed to spawn ffmpeg decoder")?;
        let stdout = child.stdout.take().expect("decoder stdout is piped");
        Ok(Self {
            child,
            stdout,
            frame_len: width as usize * height as usize * 3,
        })
    }

    /// Next decoded frame, or `None` once the stream is exhausted. A
    /// partial frame at EOF ends the stream; it never surfaces as data.
    pub async fn next_frame(&mut self) -> Result<Option<FrameBuffer>, Error> {
        let mut frame = vec![0u8; self.frame_len];
        let mut filled = 0;
        while filled < self.frame_len {
            let read = self
                .stdout
                .read(&mut frame[filled..])
                .await
                .map_err(|err| Error::Decode(err.to_string()))?;
            if read == 0 {
                return Ok(None);
            }
            filled += read;
        }
        Ok(Some(frame))
    }

    /// Tear the decoder down: kill it if it is still running, surface its
    /// stderr into the log and reap it. An early non-zero exit means the
    /// frame stream was truncated and the whole file must be aborted.
    pub async fn finish(mut self) -> Result<(), Error> {
        let early_exit = self.child.try_wait()?;
        if early_exit.is_none() {
            let _ = self.child.start_kill();
        }
        let mut stderr_buf = Vec::new();
        if let Some(mut stderr) = self.child.stderr.take() {
            let _ = stderr.read_to_end(&mut stderr_buf).await;
        }
        if !stderr_buf.is_empty() {
            tracing::info!(
                "ffmpeg decoder: {}",
                String::from_utf8_lossy(&stderr_buf).trim()
            );
        }
        let _ = self.child.wait().await?;
        match early_exit {
            Some(status) if !status.success() => {
                Err(Error::Decode(format!("decoder exited with {status}")))
            }
            _ => Ok(()),
        }
    }
}
