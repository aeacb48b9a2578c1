//! The streaming upscale pipeline.
//!
//! Three stages run concurrently on one runtime: a reader that pulls raw
//! frames out of a decoding ffmpeg child, up to ten in-flight upscale
//! tasks, and a writer that feeds an encoding ffmpeg child. A bounded
//! queue of task handles couples them: the bound caps memory, and
//! awaiting handles in enqueue order keeps frames in decode order even
//! though the GPU finishes them out of order.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::stream_select::VideoInfo;
use crate::upscale::Upscaler;

pub mod reader;
pub mod writer;

use reader::FrameReader;
use writer::FrameWriter;

/// One decoded frame: exactly `width * height * 3` bytes of packed RGB24,
/// top-to-bottom, no padding.
pub type FrameBuffer = Vec<u8>;

/// In-flight frame budget. Each slot can pin a full upscaled frame
/// (~24 MiB at 4K), so the bound is what keeps memory flat.
const QUEUE_DEPTH: usize = 10;

/// A pending frame in the queue; `None` is the end-of-stream sentinel.
type FrameTask = Option<JoinHandle<Result<FrameBuffer, anyhow::Error>>>;

pub struct Transcoder {
    input_path: PathBuf,
    output_path: PathBuf,
    video_info: VideoInfo,
    target_width: u32,
    target_height: u32,
}

impl Transcoder {
    pub fn new(
        input_path: impl AsRef<Path>,
        output_path: impl AsRef<Path>,
        video_info: VideoInfo,
        target_width: u32,
        target_height: u32,
    ) -> Self {
        Self {
            input_path: input_path.as_ref().to_path_buf(),
            output_path: output_path.as_ref().to_path_buf(),
            video_info,
            target_width,
            target_height,
        }
    }

    /// Run the pipeline to completion.
    ///
    /// On failure every outstanding task is cancelled and both children
    /// are reaped before the error surfaces; deleting the partial output
    /// file is left to the caller, which owns the output path.
    pub async fn run(&self) -> Result<(), anyhow::Error> {
        let upscaler = Arc::new(
            Upscaler::new(&self.video_info, self.target_width, self.target_height).await?,
        );
        let (upscale_width, upscale_height) = upscaler.output_dims();

        let frame_reader =
            FrameReader::spawn(&self.input_path, self.video_info.width, self.video_info.height)?;
        let mut frame_writer = FrameWriter::spawn(
            &self.input_path,
            &self.output_path,
            &self.video_info,
            upscale_width,
            upscale_height,
            self.target_width,
            self.target_height,
        )
        .await?;

        let (task_tx, mut task_rx) = mpsc::channel::<FrameTask>(QUEUE_DEPTH);
        let producer = tokio::spawn(produce_tasks(frame_reader, upscaler, task_tx));

        match write_frames(&mut task_rx, &mut frame_writer).await {
            Ok(()) => match producer.await.context("frame producer panicked")? {
                Ok(()) => {
                    frame_writer.finish().await?;
                    Ok(())
                }
                Err(producer_err) => {
                    frame_writer.abort().await;
                    Err(producer_err)
                }
            },
            Err(write_err) => {
                let producer_err = shutdown(task_rx, producer).await;
                frame_writer.abort().await;
                Err(producer_err.unwrap_or(write_err))
            }
        }
    }
}

/// Producer half: decode frames, spawn one upscale task per frame and
/// queue the handles in decode order, then the sentinel.
async fn produce_tasks(
    mut frame_reader: FrameReader,
    upscaler: Arc<Upscaler>,
    task_tx: mpsc::Sender<FrameTask>,
) -> Result<(), anyhow::Error> {
    let mut result = Ok(());
    loop {
        match frame_reader.next_frame().await {
            Ok(Some(frame)) => {
                let task = tokio::spawn(upscaler.clone().upscale_frame(frame));
                if let Err(send_err) = task_tx.send(Some(task)).await {
                    // The writer is gone; it tears the pipeline down.
                    if let Some(task) = send_err.0 {
                        task.abort();
                    }
                    break;
                }
            }
            Ok(None) => {
                let _ = task_tx.send(None).await;
                break;
            }
            Err(err) => {
                result = Err(err.into());
                break;
            }
        }
    }
    let finish_result = frame_reader.finish().await;
    result.and(finish_result.map_err(Into::into))
}

/// Consumer half: await tasks in enqueue order and pipe the frames out.
async fn write_frames(
    task_rx: &mut mpsc::Receiver<FrameTask>,
    frame_writer: &mut FrameWriter,
) -> Result<(), anyhow::Error> {
    loop {
        match task_rx.recv().await {
            Some(Some(task)) => {
                let frame = task.await.context("upscale task panicked")??;
                frame_writer.write_frame(&frame).await?;
            }
            Some(None) => return Ok(()),
            None => anyhow::bail!("frame producer stopped unexpectedly"),
        }
    }
}

/// Cancel everything still in flight and recover the producer's own
/// error, which is usually more precise than the writer's.
async fn shutdown(
    mut task_rx: mpsc::Receiver<FrameTask>,
    producer: JoinHandle<Result<(), anyhow::Error>>,
) -> Option<anyhow::Error> {
    producer.abort();
    task_rx.close();
    while let Some(queued) = task_rx.recv().await {
        if let Some(task) = queued {
            task.abort();
        }
    }
    match producer.await {
        Ok(Ok(())) => None,
        Ok(Err(err)) => Some(err),
        Err(join_err) if join_err.is_panic() => Some(anyhow::anyhow!("frame producer panicked")),
        Err(_) => None,
    }
}
