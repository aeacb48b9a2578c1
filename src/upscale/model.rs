//! Real-ESRGAN `realesr-animevideov3` inference.
//!
//! The network is the compact SRVGG layout: a conv/PReLU stack at the
//! input resolution followed by a 4x pixel shuffle, plus a nearest-
//! neighbor upsampled skip connection. Weights come from the upstream
//! release checkpoint and are cached in the OS temp directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use candle_core::{DType, Device, Tensor};
use candle_nn::{Conv2d, Conv2dConfig, Module, PReLU, VarBuilder};

use crate::error::Error;

pub const MODEL_URL: &str =
    "https://github.com/xinntao/Real-ESRGAN/releases/download/v0.2.5.0/realesr-animevideov3.pth";
const MODEL_FILE: &str = "realesr-animevideov3.pth";
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

const NUM_IN_CH: usize = 3;
const NUM_OUT_CH: usize = 3;
const NUM_FEAT: usize = 64;
const NUM_CONV: usize = 16;
const UPSCALE: usize = 4;

const GPU_ATTEMPTS: u32 = 10;
const GPU_RETRY_DELAY: Duration = Duration::from_secs(1);

pub fn model_path() -> PathBuf {
    std::env::temp_dir().join(MODEL_FILE)
}

/// Download the weights into the cache path unless a previous run
/// already did.
pub async fn ensure_weights() -> Result<PathBuf, anyhow::Error> {
    let path = model_path();
    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Ok(path);
    }
    tracing::info!("Downloading upscale model to {}", path.display());
    let client = reqwest::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()?;
    let weights = client
        .get(MODEL_URL)
        .send()
        .await?
        .error_for_status()
        .context("model download failed")?
        .bytes()
        .await?;
    tokio::fs::write(&path, &weights)
        .await
        .context("failed to write model cache")?;
    Ok(path)
}

enum Layer {
    Conv(Conv2d),
    Act(PReLU),
}

pub struct SrVggNet {
    body: Vec<Layer>,
    device: Device,
    dtype: DType,
}

impl SrVggNet {
    /// Load the checkpoint, preferring the GPU in half precision.
    pub fn load(weights: &Path) -> Result<Self, anyhow::Error> {
        let device = Device::cuda_if_available(0)?;
        let dtype = if device.is_cuda() {
            DType::F16
        } else {
            DType::F32
        };
        let tensors: HashMap<String, Tensor> =
            candle_core::pickle::read_all_with_key(weights, Some("params"))
                .context("failed to read model checkpoint")?
                .into_iter()
                .collect();
        let vb = VarBuilder::from_tensors(tensors, dtype, &device);

        let conv_cfg = Conv2dConfig {
            padding: 1,
            ..Default::default()
        };
        let conv = |index: usize, in_ch: usize, out_ch: usize| {
            candle_nn::conv2d(in_ch, out_ch, 3, conv_cfg, vb.pp(format!("body.{index}")))
        };
        let act = |index: usize| {
            let weight = vb.pp(format!("body.{index}")).get(NUM_FEAT, "weight")?;
            Ok::<_, candle_core::Error>(PReLU::new(weight, false))
        };

        let mut body = Vec::with_capacity(2 * NUM_CONV + 3);
        body.push(Layer::Conv(conv(0, NUM_IN_CH, NUM_FEAT)?));
        body.push(Layer::Act(act(1)?));
        for block in 0..NUM_CONV {
            body.push(Layer::Conv(conv(2 * block + 2, NUM_FEAT, NUM_FEAT)?));
            body.push(Layer::Act(act(2 * block + 3)?));
        }
        body.push(Layer::Conv(conv(
            2 * NUM_CONV + 2,
            NUM_FEAT,
            NUM_OUT_CH * UPSCALE * UPSCALE,
        )?));

        Ok(Self {
            body,
            device,
            dtype,
        })
    }

    fn forward(&self, xs: &Tensor) -> Result<Tensor, candle_core::Error> {
        let (_, _, height, width) = xs.dims4()?;
        let base = xs.upsample_nearest2d(height * UPSCALE, width * UPSCALE)?;
        let mut out = xs.clone();
        for layer in &self.body {
            out = match layer {
                Layer::Conv(conv) => conv.forward(&out)?,
                Layer::Act(act) => act.forward(&out)?,
            };
        }
        &pixel_shuffle(&out, UPSCALE)? + &base
    }

    /// Upscale one RGB24 frame by exactly 4x.
    ///
    /// The model is invariant, so a transient device failure is safe to
    /// retry; bail only once the budget is exhausted.
    pub fn upscale_tile(&self, width: u32, height: u32, frame: &[u8]) -> Result<Vec<u8>, Error> {
        let mut attempt = 1;
        loop {
            match self.run_tile(width, height, frame) {
                Ok(upscaled) => return Ok(upscaled),
                Err(err) if attempt < GPU_ATTEMPTS => {
                    tracing::warn!("Inference attempt {attempt} failed, retrying: {err}");
                    std::thread::sleep(GPU_RETRY_DELAY);
                    attempt += 1;
                }
                Err(err) => {
                    return Err(Error::Gpu {
                        attempts: attempt,
                        message: err.to_string(),
                    })
                }
            }
        }
    }

    fn run_tile(
        &self,
        width: u32,
        height: u32,
        frame: &[u8],
    ) -> Result<Vec<u8>, candle_core::Error> {
        let (width, height) = (width as usize, height as usize);
        let input = Tensor::from_slice(frame, (height, width, 3), &Device::Cpu)?
            .to_device(&self.device)?
            .to_dtype(self.dtype)?
            .permute((2, 0, 1))?
            .affine(1.0 / 255.0, 0.0)?
            .unsqueeze(0)?;
        let output = self.forward(&input)?;
        output
            .squeeze(0)?
            .clamp(0f32, 1f32)?
            .affine(255.0, 0.0)?
            .round()?
            .to_dtype(DType::U8)?
            .permute((1, 2, 0))?
            .to_device(&Device::Cpu)?
            .flatten_all()?
            .to_vec1::<u8>()
    }
}

fn pixel_shuffle(xs: &Tensor, factor: usize) -> Result<Tensor, candle_core::Error> {
    let (batch, channels, height, width) = xs.dims4()?;
    let out_channels = channels / (factor * factor);
    xs.reshape((batch, out_channels, factor, factor, height, width))?
        .permute((0, 1, 4, 2, 5, 3))?
        .reshape((batch, out_channels, height * factor, width * factor))
}
