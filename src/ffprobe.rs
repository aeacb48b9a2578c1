use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::config::CONFIG;

/// General track stream provided by FFprobe
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FFprobeStream {
    pub index: i64,
    pub codec_type: String,
    pub codec_name: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub r_frame_rate: Option<String>,
    #[serde(default)]
    pub disposition: FFprobeDisposition,
    #[serde(default)]
    pub tags: FFprobeTags,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct FFprobeDisposition {
    #[serde(default)]
    pub default: i32,
    #[serde(default)]
    pub dub: i32,
    #[serde(default)]
    pub original: i32,
    #[serde(default)]
    pub comment: i32,
    #[serde(default)]
    pub forced: i32,
    #[serde(default)]
    pub hearing_impaired: i32,
    #[serde(default)]
    pub visual_impaired: i32,
}

/// Matroska track tags. The `NUMBER_OF_*` statistics tags are written by
/// mkvmerge and carry per-track sizes the subtitle selection relies on.
#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct FFprobeTags {
    pub language: Option<String>,
    pub title: Option<String>,
    #[serde(rename = "NUMBER_OF_FRAMES")]
    pub number_of_frames: Option<String>,
    #[serde(rename = "NUMBER_OF_FRAMES-eng")]
    pub number_of_frames_eng: Option<String>,
    #[serde(rename = "NUMBER_OF_BYTES-eng")]
    pub number_of_bytes_eng: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FFprobeOutput {
    pub streams: Vec<FFprobeStream>,
}

impl FFprobeOutput {
    pub fn video_streams(&self) -> Vec<&FFprobeStream> {
        self.streams
            .iter()
            .filter(|s| s.codec_type == "video")
            .collect()
    }

    pub fn audio_streams(&self) -> Vec<&FFprobeStream> {
        self.streams
            .iter()
            .filter(|s| s.codec_type == "audio")
            .collect()
    }

    pub fn subtitle_streams(&self) -> Vec<&FFprobeStream> {
        self.streams
            .iter()
            .filter(|s| s.codec_type == "subtitle")
            .collect()
    }
}

pub async fn get_metadata(path: impl AsRef<Path>) -> Result<FFprobeOutput, anyhow::Error> {
    let path = path.as_ref();
    tracing::trace!("Getting metadata for a file: {}", path.display());
    let output = Command::new(&CONFIG.ffprobe)
        .args(["-show_format", "-show_streams", "-of", "json"])
        .arg(path)
        .output()
        .await
        .context("failed to run ffprobe")?;
    if !output.status.success() {
        anyhow::bail!(
            "ffprobe exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    let metadata: FFprobeOutput =
        serde_json::from_slice(&output.stdout).context("malformed ffprobe json")?;
    Ok(metadata)
}
