//! Per-file orchestration: classify, route, probe, lock, transcode.

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::config::CONFIG;
use crate::ffprobe;
use crate::naming::{self, ParsedName};
use crate::stream_select;
use crate::transcode::Transcoder;

pub const TARGET_WIDTH: u32 = 3840;
pub const TARGET_HEIGHT: u32 = 2160;

/// Lock name shared by every instance of the tool; two processes
/// upscaling at once would fight over the GPU.
const UPSCALE_MUTEX_NAME: &str = "anime4kconvert";

/// Where a classified input lands in the output library.
pub fn output_path_for(parsed: &ParsedName) -> PathBuf {
    match parsed {
        ParsedName::TvShow {
            name,
            season,
            episode,
        } => CONFIG
            .output_dir
            .join("TV Shows")
            .join(name)
            .join(format!("{name} S{season:02}E{episode:02}.mkv")),
        ParsedName::Movie { name } => CONFIG.output_dir.join("Movies").join(format!("{name}.mkv")),
    }
}

/// Block until no other instance is upscaling, then hold the lock until
/// the returned file is dropped.
fn lock_upscale_mutex() -> Result<std::fs::File, std::io::Error> {
    let path = std::env::temp_dir().join(format!("{UPSCALE_MUTEX_NAME}.lock"));
    let file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .open(path)?;
    fs2::FileExt::lock_exclusive(&file)?;
    Ok(file)
}

/// Transcode a single file into its place in the output hierarchy.
/// Non-matroska files are skipped silently so directory walks can feed
/// everything through.
pub async fn process_file(input_path: &Path, accept_no_subtitles: bool) -> Result<(), anyhow::Error> {
    if input_path.extension().map_or(true, |ext| ext != "mkv") {
        return Ok(());
    }

    tracing::info!("Converting {}", input_path.display());

    let parsed = naming::parse_filename(&input_path.to_string_lossy());
    let output_path = std::path::absolute(output_path_for(&parsed))
        .context("failed to resolve output path")?;
    if let Some(parent) = output_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .context("failed to create output directory")?;
    }
    tracing::info!("Output is {}", output_path.display());

    let metadata = ffprobe::get_metadata(input_path).await?;
    let video_info = stream_select::parse_streams(&metadata, accept_no_subtitles)?;
    tracing::debug!("Selected streams: {video_info:?}");

    let gpu_claim = tokio::task::spawn_blocking(lock_upscale_mutex)
        .await
        .context("lock task failed")?
        .context("failed to take the upscale lock")?;

    tracing::info!("Running upscaler");
    let transcoder = Transcoder::new(
        input_path,
        &output_path,
        video_info,
        TARGET_WIDTH,
        TARGET_HEIGHT,
    );
    let result = transcoder.run().await;
    drop(gpu_claim);

    if let Err(err) = result {
        tracing::warn!(
            "Upscaler for {} failed, deleting output {}",
            input_path.display(),
            output_path.display()
        );
        let _ = tokio::fs::remove_file(&output_path).await;
        return Err(err);
    }
    tracing::info!("Upscaler for {} finished", input_path.display());
    Ok(())
}

/// Every matroska file under `root`, however deep the release nests them.
fn collect_mkv_files(root: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut pending = vec![root.to_path_buf()];
    let mut found = Vec::new();
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().map_or(false, |ext| ext == "mkv") {
                found.push(path);
            }
        }
    }
    Ok(found)
}

/// Process a file, or walk a directory and process every `.mkv` in it.
/// During a walk a failed file is logged and skipped, not fatal.
pub async fn process_path(input_path: &Path, accept_no_subtitles: bool) -> Result<(), anyhow::Error> {
    if input_path.is_dir() {
        let files = collect_mkv_files(input_path).context("failed to walk input directory")?;
        for file in files {
            if let Err(err) = process_file(&file, accept_no_subtitles).await {
                tracing::error!("Failed to convert {}: {err:#}", file.display());
            }
        }
        Ok(())
    } else {
        process_file(input_path, accept_no_subtitles).await
    }
}

#[cfg(test)]
mod tests {
    use super::{collect_mkv_files, output_path_for};
    use crate::naming::ParsedName;

    #[test]
    fn walk_only_surfaces_matroska_files() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("Season 1").join("Extras");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("a.mkv"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        std::fs::write(nested.join("b.mkv"), b"").unwrap();

        let found = collect_mkv_files(dir.path()).unwrap();
        let mut names: Vec<_> = found
            .iter()
            .map(|path| path.file_name().unwrap().to_str().unwrap())
            .collect();
        names.sort();
        assert_eq!(names, ["a.mkv", "b.mkv"]);
    }

    #[test]
    fn show_and_movie_layout() {
        let show = ParsedName::TvShow {
            name: "K ON!!".to_string(),
            season: 2,
            episode: 5,
        };
        assert!(output_path_for(&show).ends_with("TV Shows/K ON!!/K ON!! S02E05.mkv"));

        let special = ParsedName::TvShow {
            name: "Kurenai".to_string(),
            season: 0,
            episode: 1,
        };
        assert!(output_path_for(&special).ends_with("TV Shows/Kurenai/Kurenai S00E01.mkv"));

        let movie = ParsedName::Movie {
            name: "Akira".to_string(),
        };
        assert!(output_path_for(&movie).ends_with("Movies/Akira.mkv"));
    }
}
