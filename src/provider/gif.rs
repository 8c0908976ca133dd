use super::FrameProvider;
use crate::anim_log;
use crate::diagnostics::LogLevel;
use crate::error::{AnimError, AnimResult};
use crate::format::{compress_pixels, decompress_pixels, frame_byte_len};
use byteorder::{ByteOrder, LittleEndian};
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage, ImageDecoder, RgbaImage};
use std::io::Cursor;
use std::time::Duration;

/// Composited frames stay deflated in memory until asked for.
const PACK_LEVEL: u32 = 1;

struct PackedFrame {
    delay: Duration,
    payload: Vec<u8>,
}

/// GIF frames decoded once up front, composited to full canvas, then kept compressed.
///
/// `image`'s GIF decoder only walks frames in order and composites each onto the
/// previous canvas, so there is no way to seek to frame N. `from_bytes` therefore pays
/// for decoding every frame on the calling thread; what stays lazy is inflating a
/// frame back to RGBA when the cache asks for it. Construction time grows linearly
/// with the frame count.
pub struct GifProvider {
    width: u32,
    height: u32,
    frame_len: usize,
    loop_count: u32,
    frames: Vec<PackedFrame>,
}

impl GifProvider {
    pub fn from_bytes(data: &[u8]) -> AnimResult<Self> {
        let loop_count = read_loop_count(data);
        let decoder = GifDecoder::new(Cursor::new(data))?;
        let (width, height) = decoder.dimensions();
        let frame_len = frame_byte_len(width, height).ok_or_else(|| {
            AnimError::InvalidFormat(format!("GIF canvas {}x{} too large", width, height))
        })?;

        let mut frames = Vec::new();
        for (index, frame) in decoder.into_frames().enumerate() {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) if index > 0 => {
                    anim_log!(
                        LogLevel::Warn,
                        "GIF frame {} unreadable, keeping {} frames: {}",
                        index,
                        frames.len(),
                        e
                    );
                    break;
                }
                Err(e) => return Err(e.into()),
            };

            let (numer, denom) = frame.delay().numer_denom_ms();
            let delay_ms = if denom > 0 { numer / denom } else { 0 };
            let buffer = frame.into_buffer();
            frames.push(PackedFrame {
                delay: Duration::from_millis(delay_ms as u64),
                payload: compress_pixels(buffer.as_raw(), PACK_LEVEL)?,
            });
        }

        anim_log!(
            LogLevel::Debug,
            "Parsed GIF: {}x{}, {} frames, loop count {}",
            width,
            height,
            frames.len(),
            loop_count
        );

        Ok(Self {
            width,
            height,
            frame_len,
            loop_count,
            frames,
        })
    }
}

impl FrameProvider for GifProvider {
    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn loop_count(&self) -> u32 {
        self.loop_count
    }

    fn delay_time(&self, index: usize) -> Duration {
        self.frames
            .get(index)
            .map(|f| f.delay)
            .unwrap_or_default()
    }

    fn decoded_frame(&self, index: usize) -> AnimResult<DynamicImage> {
        let frame = self.frames.get(index).ok_or(AnimError::IndexOutOfRange {
            index,
            frame_count: self.frames.len(),
        })?;
        let pixels = decompress_pixels(&frame.payload, self.frame_len)
            .map_err(|e| AnimError::frame_decode(index, e))?;
        let buffer = RgbaImage::from_raw(self.width, self.height, pixels)
            .ok_or_else(|| AnimError::frame_decode(index, "pixel buffer size mismatch"))?;
        Ok(DynamicImage::ImageRgba8(buffer))
    }
}

/// Loop count from the NETSCAPE2.0 application extension. A GIF without one plays once.
fn read_loop_count(data: &[u8]) -> u32 {
    data.windows(18)
        .find_map(|w| {
            let is_loop_ext = w[0] == 0x21
                && w[1] == 0xFF
                && w[2] == 0x0B
                && (&w[3..14] == b"NETSCAPE2.0" || &w[3..14] == b"ANIMEXTS1.0")
                && w[14] == 0x03
                && w[15] == 0x01;
            is_loop_ext.then(|| LittleEndian::read_u16(&w[16..18]) as u32)
        })
        .unwrap_or(1)
}
