use std::path::Path;
use std::process::Stdio;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};

use crate::config::CONFIG;
use crate::error::Error;
use crate::stream_select::VideoInfo;
use crate::utils;

/// The original container is staged under this name inside the scratch
/// directory so the subtitle burn-in filter can reference it by a path
/// with no characters that need escaping.
const STAGED_INPUT: &str = "input.mkv";

/// Feeds upscaled frames into an encoding ffmpeg child that burns
/// subtitles, pads to the target rectangle, remuxes the chosen audio and
/// compresses to HEVC.
pub struct FrameWriter {
    child: Child,
    stdin: Option<ChildStdin>,
    progress: ProgressBar,
    /// Holds the staged copy of the source container alive for the run.
    _scratch: TempDir,
}

impl FrameWriter {
    #[allow(clippy::too_many_arguments)]
    pub async fn spawn(
        input: &Path,
        output: &Path,
        video_info: &VideoInfo,
        upscale_width: u32,
        upscale_height: u32,
        target_width: u32,
        target_height: u32,
    ) -> Result<Self, anyhow::Error> {
        let scratch = tempfile::tempdir().context("failed to create scratch directory")?;
        utils::link_or_copy(input, &scratch.path().join(STAGED_INPUT))
            .await
            .context("failed to stage input container")?;

        let filter = filter_chain(video_info.subtitle_index, target_width, target_height);
        let size = format!("{upscale_width}x{upscale_height}");
        let audio_map = format!("1:{}", video_info.audio_index);
        let mut child = Command::new(&CONFIG.ffmpeg)
            .current_dir(scratch.path())
            .args(["-f", "rawvideo", "-framerate", &video_info.fps])
            .args(["-pix_fmt", "rgb24", "-s", &size, "-i", "pipe:"])
            .args(["-i", STAGED_INPUT])
            .args(["-map", "0", "-map", &audio_map])
            .args(["-vf", &filter])
            .args(["-vcodec", "libx265", "-pix_fmt", "yuv420p"])
            .arg(output)
            .args(["-loglevel", "warning", "-y"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .context("failed to spawn ffmpeg encoder")?;

        let stdin = child.stdin.take();
        Ok(Self {
            child,
            stdin,
            progress: make_progress_bar(video_info.frames),
            _scratch: scratch,
        })
    }

    /// Pipe one frame to the encoder. The flush is what propagates the
    /// encoder's backpressure up through the queue to the reader.
    pub async fn write_frame(&mut self, frame: &[u8]) -> Result<(), Error> {
        let stdin = self.stdin.as_mut().expect("stdin is open until finish");
        stdin
            .write_all(frame)
            .await
            .map_err(|err| Error::Encode(format!("frame pipe closed: {err}")))?;
        stdin
            .flush()
            .await
            .map_err(|err| Error::Encode(format!("frame pipe closed: {err}")))?;
        self.progress.inc(1);
        Ok(())
    }

    /// Close the frame pipe, collect the encoder's output and reap it.
    pub async fn finish(mut self) -> Result<(), Error> {
        drop(self.stdin.take());
        self.drain_logs().await;
        let status = self.child.wait().await?;
        self.progress.finish_and_clear();
        if !status.success() {
            return Err(Error::Encode(format!("encoder exited with {status}")));
        }
        Ok(())
    }

    /// Failure path: terminate the encoder, keep its stderr in the log
    /// and reap it. The partial output file is the caller's problem.
    pub async fn abort(mut self) {
        self.progress.abandon();
        drop(self.stdin.take());
        let _ = self.child.start_kill();
        self.drain_logs().await;
        let _ = self.child.wait().await;
    }

    async fn drain_logs(&mut self) {
        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();
        if let Some(mut stdout) = self.child.stdout.take() {
            let _ = stdout.read_to_end(&mut stdout_buf).await;
        }
        if let Some(mut stderr) = self.child.stderr.take() {
            let _ = stderr.read_to_end(&mut stderr_buf).await;
        }
        if !stdout_buf.is_empty() || !stderr_buf.is_empty() {
            tracing::info!(
                "ffmpeg encoder: {}{}",
                String::from_utf8_lossy(&stdout_buf),
                String::from_utf8_lossy(&stderr_buf).trim()
            );
        }
    }
}

/// Burn the selected subtitle track (when there is one) and center the
/// aspect-fit frame inside the target rectangle with black bars.
fn filter_chain(subtitle_index: Option<usize>, target_width: u32, target_height: u32) -> String {
    let pad = format!("pad={target_width}:{target_height}:(ow-iw)/2:(oh-ih)/2:black");
    match subtitle_index {
        Some(index) => format!("subtitles={STAGED_INPUT}:si={index}, {pad}"),
        None => pad,
    }
}

fn make_progress_bar(frames: u64) -> ProgressBar {
    if frames == 0 {
        return ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {pos} frames ({per_sec})")
                .expect("progress template is valid"),
        );
    }
    ProgressBar::new(frames).with_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] {wide_bar} {pos}/{len} frames ({per_sec}, eta {eta})",
        )
        .expect("progress template is valid"),
    )
}

#[cfg(test)]
mod tests {
    use super::filter_chain;

    #[test]
    fn filter_chain_burns_subtitles_then_pads() {
        assert_eq!(
            filter_chain(Some(1), 3840, 2160),
            "subtitles=input.mkv:si=1, pad=3840:2160:(ow-iw)/2:(oh-ih)/2:black"
        );
        assert_eq!(
            filter_chain(None, 3840, 2160),
            "pad=3840:2160:(ow-iw)/2:(oh-ih)/2:black"
        );
    }
}
