pub mod config;
pub mod driver;
pub mod error;
pub mod ffprobe;
pub mod logging;
pub mod naming;
pub mod stream_select;
pub mod transcode;
pub mod upscale;
pub mod utils;

pub use driver::{process_file, process_path};
pub use error::Error;
pub use ffprobe::get_metadata;
pub use naming::ParsedName;
pub use stream_select::VideoInfo;
