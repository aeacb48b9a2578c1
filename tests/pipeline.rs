//! End-to-end transcode scenarios. They shell out to ffmpeg/ffprobe,
//! download the model on first use and grind the CNN over every frame,
//! so they only run on request: `cargo test -- --ignored`.

use std::path::Path;
use std::process::Command;

use buganime::driver::{TARGET_HEIGHT, TARGET_WIDTH};

fn synthesize_white_source(path: &Path, width: u32, height: u32) {
    let size = format!("color=white:s={width}x{height}:r=24000/1001");
    let status = Command::new("ffmpeg")
        .args(["-f", "lavfi", "-i", &size])
        .args(["-f", "lavfi", "-i", "anullsrc=r=48000"])
        .args(["-t", "1", "-c:v", "libx264", "-c:a", "aac"])
        .arg(path)
        .args(["-loglevel", "error", "-y"])
        .status()
        .expect("ffmpeg runs");
    assert!(status.success(), "failed to synthesize {}", path.display());
}

fn probe_first_stream(path: &Path) -> serde_json::Value {
    let output = Command::new("ffprobe")
        .args(["-show_format", "-show_streams", "-of", "json"])
        .arg(path)
        .output()
        .expect("ffprobe runs");
    assert!(output.status.success());
    let probed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    probed["streams"][0].clone()
}

fn first_frame_rgb(path: &Path) -> Vec<u8> {
    let output = Command::new("ffmpeg")
        .arg("-i")
        .arg(path)
        .args(["-frames:v", "1", "-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:"])
        .args(["-loglevel", "error"])
        .output()
        .expect("ffmpeg runs");
    assert!(output.status.success());
    let frame_len = TARGET_WIDTH as usize * TARGET_HEIGHT as usize * 3;
    assert_eq!(output.stdout.len(), frame_len);
    output.stdout
}

fn column_band_mean(frame: &[u8], x_from: u32, x_to: u32) -> f64 {
    let mut sum = 0u64;
    let mut count = 0u64;
    for y in 0..TARGET_HEIGHT {
        for x in x_from..x_to {
            let at = ((y * TARGET_WIDTH + x) * 3) as usize;
            sum += u64::from(frame[at]) + u64::from(frame[at + 1]) + u64::from(frame[at + 2]);
            count += 3;
        }
    }
    sum as f64 / count as f64
}

#[tokio::test]
#[ignore = "needs ffmpeg/ffprobe on PATH, network access for the model and a long CPU budget"]
async fn upscales_to_padded_4k() {
    let output_root = tempfile::tempdir().unwrap();
    std::env::set_var("BUGANIME_OUTPUT_DIR", output_root.path());

    let source_dir = tempfile::tempdir().unwrap();
    let source = source_dir.path().join("White Canvas Sample.mkv");
    synthesize_white_source(&source, 1900, 1080);

    buganime::process_file(&source, true).await.unwrap();

    let converted = output_root
        .path()
        .join("Movies")
        .join("White Canvas Sample.mkv");
    assert!(converted.is_file());

    let stream = probe_first_stream(&converted);
    assert_eq!(stream["codec_name"], "hevc");
    assert_eq!(stream["width"], 3840);
    assert_eq!(stream["height"], 2160);
    assert_eq!(stream["r_frame_rate"], "24000/1001");

    // 1900x1080 fits 3800x2160, leaving 20 px pillars on both sides.
    let frame = first_frame_rgb(&converted);
    let bar = 20;
    assert!(column_band_mean(&frame, 0, bar) < 1.0);
    assert!(column_band_mean(&frame, TARGET_WIDTH - bar, TARGET_WIDTH) < 1.0);
    assert!(column_band_mean(&frame, bar, TARGET_WIDTH - bar) > 254.0);
}
