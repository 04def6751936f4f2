//! Local file frame source using FFmpeg.
//!
//! Decodes the best video stream of a local container to RGB24, in memory.
//! At end of file the decoder is flushed so trailing buffered frames are
//! still delivered before end of stream is reported.

use anyhow::{Context, Result};
use ffmpeg_next as ffmpeg;

use super::SourceStats;
use crate::frame::Frame;

pub(crate) struct FfmpegFileSource {
    path: String,
    /// `None` once closed; dropping it releases the demuxer, decoder and scaler.
    decoding: Option<Decoding>,
    width: u32,
    height: u32,
    frame_count: u64,
}

struct Decoding {
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    eof_sent: bool,
}

impl FfmpegFileSource {
    pub(crate) fn open(path: &str) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&path)
            .with_context(|| format!("failed to open file input '{}' with ffmpeg", path))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow::anyhow!("file has no video track"))?;
        let stream_index = input_stream.index();
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        let (width, height) = (decoder.width(), decoder.height());

        Ok(Self {
            path: path.to_string(),
            decoding: Some(Decoding {
                input,
                stream_index,
                decoder,
                scaler,
                eof_sent: false,
            }),
            width,
            height,
            frame_count: 0,
        })
    }

    pub(crate) fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(decoding) = self.decoding.as_mut() else {
            anyhow::bail!("read from closed source {}", self.path);
        };

        let mut decoded = ffmpeg::frame::Video::empty();

        loop {
            if decoding.decoder.receive_frame(&mut decoded).is_ok() {
                let mut rgb_frame = ffmpeg::frame::Video::empty();
                decoding
                    .scaler
                    .run(&decoded, &mut rgb_frame)
                    .context("scale frame to RGB")?;
                let (pixels, width, height) = frame_to_pixels(&rgb_frame)?;
                self.frame_count += 1;
                return Frame::new(self.frame_count, width, height, pixels).map(Some);
            }
            if decoding.eof_sent {
                return Ok(None);
            }

            let mut sent = false;
            for (stream, packet) in decoding.input.packets() {
                if stream.index() != decoding.stream_index {
                    continue;
                }
                decoding
                    .decoder
                    .send_packet(&packet)
                    .context("send packet to ffmpeg decoder")?;
                sent = true;
                break;
            }

            if !sent {
                decoding
                    .decoder
                    .send_eof()
                    .context("flush ffmpeg decoder")?;
                decoding.eof_sent = true;
            }
        }
    }

    /// Release the demuxer, decoder and scaler. Later reads fail.
    pub(crate) fn close(&mut self) {
        if self.decoding.take().is_some() {
            log::debug!(
                "FileSource: closed {} after {} frames",
                self.path,
                self.frame_count
            );
        }
    }

    pub(crate) fn stats(&self) -> SourceStats {
        SourceStats {
            frames_read: self.frame_count,
            path: self.path.clone(),
        }
    }
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        let packed = data
            .get(..row_bytes * height as usize)
            .context("ffmpeg frame is shorter than its dimensions")?;
        return Ok((packed.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }

    Ok((pixels, width, height))
}
