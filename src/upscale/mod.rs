//! Per-frame upscaling: model inference under an exclusive GPU lock,
//! then an aspect-fit resample on the CPU.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::Mutex;

use crate::stream_select::VideoInfo;
use crate::transcode::FrameBuffer;

pub mod model;
pub mod resample;

use model::SrVggNet;

pub struct Upscaler {
    net: SrVggNet,
    /// Serializes forward passes; the device cannot take two frames at
    /// once without thrashing.
    gpu_lock: Mutex<()>,
    src_width: u32,
    src_height: u32,
    target_width: u32,
    target_height: u32,
    upscale_width: u32,
    upscale_height: u32,
}

impl Upscaler {
    /// Fetch the weights if needed and bring the model up.
    pub async fn new(
        video_info: &VideoInfo,
        target_width: u32,
        target_height: u32,
    ) -> Result<Self, anyhow::Error> {
        let weights = model::ensure_weights().await?;
        let net = tokio::task::spawn_blocking(move || SrVggNet::load(&weights))
            .await
            .context("model load task failed")??;
        let (upscale_width, upscale_height) = resample::upscale_dims(
            video_info.width,
            video_info.height,
            target_width,
            target_height,
        );
        Ok(Self {
            net,
            gpu_lock: Mutex::new(()),
            src_width: video_info.width,
            src_height: video_info.height,
            target_width,
            target_height,
            upscale_width,
            upscale_height,
        })
    }

    /// Frame size the writer receives, before padding.
    pub fn output_dims(&self) -> (u32, u32) {
        (self.upscale_width, self.upscale_height)
    }

    /// Upscale one decoded frame to the aspect-fit rectangle.
    ///
    /// Inference holds the GPU lock; the Lanczos resample runs after it
    /// is released so it can overlap the next frame's forward pass.
    pub async fn upscale_frame(self: Arc<Self>, frame: FrameBuffer) -> Result<FrameBuffer, anyhow::Error> {
        if self.src_width == self.target_width && self.src_height == self.target_height {
            return Ok(frame);
        }

        let tile = {
            let _gpu = self.gpu_lock.lock().await;
            let this = self.clone();
            tokio::task::spawn_blocking(move || {
                this.net.upscale_tile(this.src_width, this.src_height, &frame)
            })
            .await
            .context("inference task failed")??
        };

        let (tile_width, tile_height) = (self.src_width * 4, self.src_height * 4);
        let (out_width, out_height) = (self.upscale_width, self.upscale_height);
        tokio::task::spawn_blocking(move || {
            resample::resize_rgb(&tile, tile_width, tile_height, out_width, out_height)
        })
        .await
        .context("resample task failed")?
    }
}
