use std::path::PathBuf;
use std::sync::LazyLock;

pub static CONFIG: LazyLock<Config> = LazyLock::new(Config::from_env);

/// Process-wide configuration, resolved from the environment once.
#[derive(Debug)]
pub struct Config {
    /// Root directory the `TV Shows/` and `Movies/` trees are created under.
    pub output_dir: PathBuf,
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Config {
    pub const OUTPUT_DIR_ENV: &'static str = "BUGANIME_OUTPUT_DIR";
    pub const FFMPEG_ENV: &'static str = "FFMPEG_PATH";
    pub const FFPROBE_ENV: &'static str = "FFPROBE_PATH";

    fn from_env() -> Self {
        let path_var = |key: &str, default: &str| {
            std::env::var_os(key)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(default))
        };
        Self {
            output_dir: path_var(Self::OUTPUT_DIR_ENV, ""),
            ffmpeg: path_var(Self::FFMPEG_ENV, "ffmpeg"),
            ffprobe: path_var(Self::FFPROBE_ENV, "ffprobe"),
        }
    }
}
