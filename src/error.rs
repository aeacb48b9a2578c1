/// Failures that abort processing of a single input file.
///
/// Stream-selection failures are typed so the driver can demote
/// [`Error::NoEnglishSubtitle`] to a warning when the user passed
/// `--accept-no-subtitles`. Everything else is fatal for the file.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no default video stream found")]
    NoDefaultVideo,
    #[error("no Japanese audio stream found")]
    NoJapaneseAudio,
    #[error("no English subtitle stream found")]
    NoEnglishSubtitle,
    #[error("malformed stream metadata: {0}")]
    Metadata(String),
    #[error("video decoder: {0}")]
    Decode(String),
    #[error("video encoder: {0}")]
    Encode(String),
    #[error("model inference failed after {attempts} attempts: {message}")]
    Gpu { attempts: u32, message: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
