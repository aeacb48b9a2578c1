//! CPU-side resampling of RGB24 frames.

use anyhow::Context;
use rgb::FromSlice;

/// Largest rectangle with the source aspect ratio that fits the target
/// frame. The writer pads the remainder with black bars.
pub fn upscale_dims(src_w: u32, src_h: u32, target_w: u32, target_h: u32) -> (u32, u32) {
    if u64::from(src_w) * u64::from(target_h) > u64::from(src_h) * u64::from(target_w) {
        // Source is wider than the target: pin the width, letterbox.
        let height = (f64::from(src_h) * f64::from(target_w) / f64::from(src_w)).round() as u32;
        (target_w, height)
    } else {
        // Source is taller (or equal): pin the height, pillarbox.
        let width = (f64::from(src_w) * f64::from(target_h) / f64::from(src_h)).round() as u32;
        (width, target_h)
    }
}

/// Windowed sinc with a four-lobe window; the model's fixed 4x factor
/// rarely lands on the aspect-fit rectangle, so quality of this step
/// shows up in every frame.
fn lanczos4(x: f32) -> f32 {
    const A: f32 = 4.0;
    if x == 0.0 {
        return 1.0;
    }
    if x.abs() >= A {
        return 0.0;
    }
    let pix = std::f32::consts::PI * x;
    A * pix.sin() * (pix / A).sin() / (pix * pix)
}

/// Resample a packed RGB24 buffer to `dst_w` x `dst_h`.
pub fn resize_rgb(
    src: &[u8],
    src_w: u32,
    src_h: u32,
    dst_w: u32,
    dst_h: u32,
) -> Result<Vec<u8>, anyhow::Error> {
    let mut dst = vec![0u8; dst_w as usize * dst_h as usize * 3];
    let mut resizer = resize::new(
        src_w as usize,
        src_h as usize,
        dst_w as usize,
        dst_h as usize,
        resize::Pixel::RGB8,
        resize::Type::Custom(resize::Filter::new(Box::new(lanczos4), 4.0)),
    )
    .context("failed to construct resizer")?;
    resizer
        .resize(src.as_rgb(), dst.as_rgb_mut())
        .context("frame resample failed")?;
    Ok(dst)
}

#[cfg(test)]
mod tests {
    use super::{lanczos4, resize_rgb, upscale_dims};

    #[test]
    fn aspect_fit_pins_the_tight_dimension() {
        // 1900x1080 is slightly narrower than 16:9, so it pillarboxes
        // with 20 px bars on each side.
        assert_eq!(upscale_dims(1900, 1080, 3840, 2160), (3800, 2160));
        // 1940x1080 is wider, so it letterboxes with 11 px bars.
        assert_eq!(upscale_dims(1940, 1080, 3840, 2160), (3840, 2138));
        // Matching aspect fills the target exactly.
        assert_eq!(upscale_dims(1920, 1080, 3840, 2160), (3840, 2160));
        assert_eq!(upscale_dims(3840, 2160, 3840, 2160), (3840, 2160));
    }

    #[test]
    fn kernel_shape() {
        assert_eq!(lanczos4(0.0), 1.0);
        for zero in [1.0f32, 2.0, 3.0] {
            assert!(lanczos4(zero).abs() < 1e-6);
            assert!(lanczos4(-zero).abs() < 1e-6);
        }
        assert_eq!(lanczos4(4.0), 0.0);
        assert_eq!(lanczos4(5.5), 0.0);
        // The first side lobe is negative, which is what gives the
        // kernel its sharpening ring.
        assert!(lanczos4(1.3) < 0.0);
    }

    #[test]
    fn solid_color_survives_resampling() {
        let src = vec![200u8; 16 * 8 * 3];
        let dst = resize_rgb(&src, 16, 8, 8, 4).unwrap();
        assert_eq!(dst.len(), 8 * 4 * 3);
        assert!(dst.iter().all(|&byte| byte.abs_diff(200) <= 1));
    }
}
