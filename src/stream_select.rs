//! Track selection policy over an ffprobe description.

use crate::error::Error;
use crate::ffprobe::{FFprobeOutput, FFprobeStream};

pub const SUPPORTED_SUBTITLE_CODECS: [&str; 2] = ["ass", "subrip"];

/// Title markers of subtitle tracks that only carry signs, songs or
/// forced translations; the dialog track never advertises these.
const NON_DIALOG_MARKERS: [&str; 3] = ["S&S", "SIGNS", "FORCED"];

/// Everything the pipeline needs to know about the chosen input tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoInfo {
    /// Global ffmpeg stream index of the chosen audio track.
    pub audio_index: i64,
    /// Position of the chosen track among the subtitle streams, which is
    /// what the `subtitles=...:si=` burn-in filter expects. Not a global
    /// stream index.
    pub subtitle_index: Option<usize>,
    pub width: u32,
    pub height: u32,
    /// Frame rate as the rational string ffprobe reports, e.g. "24000/1001".
    pub fps: String,
    /// Frame count from the matroska statistics tags; 0 when untagged.
    /// Only used for progress display.
    pub frames: u64,
}

/// Pick the default video track, the Japanese audio track and the English
/// dialog subtitle track.
pub fn parse_streams(
    metadata: &FFprobeOutput,
    accept_no_subtitles: bool,
) -> Result<VideoInfo, Error> {
    let video = select_video(metadata)?;
    let audio = select_audio(metadata)?;
    let subtitle_index = match select_subtitle(metadata) {
        Ok(position) => Some(position),
        Err(Error::NoEnglishSubtitle) if accept_no_subtitles => {
            tracing::warn!("No English subtitle stream found, transcoding without subtitles");
            None
        }
        Err(err) => return Err(err),
    };

    let frames = [
        video.tags.number_of_frames.as_deref(),
        video.tags.number_of_frames_eng.as_deref(),
    ]
    .into_iter()
    .flatten()
    .filter_map(|count| count.parse::<u64>().ok())
    .max()
    .unwrap_or(0);

    Ok(VideoInfo {
        audio_index: audio.index,
        subtitle_index,
        width: required(video.width, "video width")?,
        height: required(video.height, "video height")?,
        fps: required(video.r_frame_rate.clone(), "video frame rate")?,
        frames,
    })
}

fn required<T>(field: Option<T>, what: &str) -> Result<T, Error> {
    field.ok_or_else(|| Error::Metadata(format!("{what} is absent")))
}

fn select_video(metadata: &FFprobeOutput) -> Result<&FFprobeStream, Error> {
    let videos = metadata.video_streams();
    if let [single] = videos.as_slice() {
        return Ok(single);
    }
    videos
        .into_iter()
        .find(|stream| stream.disposition.default == 1)
        .ok_or(Error::NoDefaultVideo)
}

fn select_audio(metadata: &FFprobeOutput) -> Result<&FFprobeStream, Error> {
    let audios = metadata.audio_streams();
    if let Some(japanese) = audios
        .iter()
        .find(|stream| stream.tags.language.as_deref() == Some("jpn"))
    {
        return Ok(japanese);
    }
    match audios.as_slice() {
        [single] => Ok(single),
        _ => Err(Error::NoJapaneseAudio),
    }
}

fn select_subtitle(metadata: &FFprobeOutput) -> Result<usize, Error> {
    let subtitles = metadata.subtitle_streams();
    let mut relevant = Vec::new();
    for (position, stream) in subtitles.iter().enumerate() {
        if !matches!(stream.tags.language.as_deref(), Some("en") | Some("eng")) {
            continue;
        }
        let title = stream.tags.title.as_deref().unwrap_or("").to_uppercase();
        if NON_DIALOG_MARKERS.iter().any(|marker| title.contains(marker)) {
            continue;
        }
        let codec = stream.codec_name.as_deref().unwrap_or("").to_lowercase();
        if !SUPPORTED_SUBTITLE_CODECS.contains(&codec.as_str()) {
            continue;
        }
        relevant.push((position, *stream));
    }

    match relevant.as_slice() {
        // A lone untagged subtitle track is still worth burning.
        [] if subtitles.len() == 1 => Ok(0),
        [] => Err(Error::NoEnglishSubtitle),
        [(position, _)] => Ok(*position),
        // Several dialog candidates: the real dialog track dwarfs signs
        // and songs tracks, so the biggest one wins. First wins on a tie.
        candidates => {
            let mut best = &candidates[0];
            for candidate in &candidates[1..] {
                if tagged_bytes(candidate.1) > tagged_bytes(best.1) {
                    best = candidate;
                }
            }
            Ok(best.0)
        }
    }
}

fn tagged_bytes(stream: &FFprobeStream) -> u64 {
    stream
        .tags
        .number_of_bytes_eng
        .as_deref()
        .and_then(|bytes| bytes.parse().ok())
        .unwrap_or(0)
}
