use super::FrameProvider;
use crate::animation::frame::split_frame_chunk;
use crate::error::{AnimError, AnimResult};
use crate::format::{decompress_pixels, AnimationHeader, ChunkReader, ChunkType};
use image::{DynamicImage, RgbaImage};
use std::time::Duration;

struct PackedFrame {
    delay: Duration,
    payload: Vec<u8>,
}

/// Frames of a WKA1 container, kept compressed and inflated on demand.
pub struct ContainerProvider {
    header: AnimationHeader,
    frame_len: usize,
    frames: Vec<PackedFrame>,
}

impl ContainerProvider {
    pub fn from_bytes(data: &[u8]) -> AnimResult<Self> {
        let chunks = ChunkReader::new(data).read_all_chunks()?;
        let mut chunks = chunks.into_iter();

        let header = match chunks.next() {
            Some(chunk) if chunk.chunk_type == ChunkType::Header => {
                AnimationHeader::decode(&chunk.data)?
            }
            _ => {
                return Err(AnimError::InvalidFormat(
                    "WKA1 container must start with a header chunk".into(),
                ))
            }
        };

        let frame_len = header.validate_dimensions()?;

        // frame_count is untrusted until checked against the chunks below
        let mut frames = Vec::new();
        for chunk in chunks {
            match chunk.chunk_type {
                ChunkType::Frame => {
                    let (delay_ms, payload) = split_frame_chunk(&chunk.data)?;
                    frames.push(PackedFrame {
                        delay: Duration::from_millis(delay_ms as u64),
                        payload: payload.to_vec(),
                    });
                }
                ChunkType::End => break,
                ChunkType::Header => {
                    return Err(AnimError::InvalidFormat("Duplicate header chunk".into()))
                }
            }
        }

        if frames.len() != header.frame_count as usize {
            return Err(AnimError::InvalidFormat(format!(
                "Header declares {} frames, found {}",
                header.frame_count,
                frames.len()
            )));
        }

        Ok(Self {
            header,
            frame_len,
            frames,
        })
    }

    pub fn header(&self) -> &AnimationHeader {
        &self.header
    }
}

impl FrameProvider for ContainerProvider {
    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn size(&self) -> (u32, u32) {
        (self.header.width, self.header.height)
    }

    fn loop_count(&self) -> u32 {
        self.header.loop_count
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
        let buffer = RgbaImage::from_raw(self.header.width, self.header.height, pixels)
            .ok_or_else(|| AnimError::frame_decode(index, "pixel buffer size mismatch"))?;
        Ok(DynamicImage::ImageRgba8(buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{Animation, AnimationFrame};
    use crate::provider::testing::container_with_header;

    fn sample(frames: usize) -> Vec<u8> {
        let mut animation = Animation::new(3, 2).with_loop_count(2);
        for i in 0..frames {
            animation
                .add_frame(AnimationFrame::new(vec![i as u8; 24]).with_delay(50 + i as u32))
                .unwrap();
        }
        animation.encode().unwrap()
    }

    #[test]
    fn test_metadata_from_container() {
        let provider = ContainerProvider::from_bytes(&sample(4)).unwrap();
        assert_eq!(provider.frame_count(), 4);
        assert_eq!(provider.size(), (3, 2));
        assert_eq!(provider.loop_count(), 2);
        assert_eq!(provider.delay_time(3), Duration::from_millis(53));
        assert_eq!(provider.delay_time(99), Duration::ZERO);
    }

    #[test]
    fn test_frames_decode_lazily() {
        let provider = ContainerProvider::from_bytes(&sample(3)).unwrap();
        let frame = provider.decoded_frame(2).unwrap().to_rgba8();
        assert_eq!(frame.dimensions(), (3, 2));
        assert!(frame.as_raw().iter().all(|&b| b == 2));
    }

    #[test]
    fn test_out_of_range_frame() {
        let provider = ContainerProvider::from_bytes(&sample(2)).unwrap();
        assert!(matches!(
            provider.decoded_frame(2),
            Err(AnimError::IndexOutOfRange { index: 2, .. })
        ));
    }

    #[test]
    fn test_overflowing_canvas_rejected() {
        let bytes = container_with_header(AnimationHeader::new(u32::MAX, u32::MAX, 1, 0), 1);
        assert!(matches!(
            ContainerProvider::from_bytes(&bytes),
            Err(AnimError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_oversized_canvas_rejected() {
        let bytes = container_with_header(AnimationHeader::new(60_000, 60_000, 1, 0), 1);
        assert!(matches!(
            ContainerProvider::from_bytes(&bytes),
            Err(AnimError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_empty_canvas_rejected() {
        let bytes = container_with_header(AnimationHeader::new(0, 4, 1, 0), 1);
        assert!(matches!(
            ContainerProvider::from_bytes(&bytes),
            Err(AnimError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_inflated_frame_count_rejected() {
        let bytes = container_with_header(AnimationHeader::new(2, 2, u32::MAX, 0), 1);
        assert!(matches!(
            ContainerProvider::from_bytes(&bytes),
            Err(AnimError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_frame_count_mismatch_rejected() {
        let mut bytes = sample(2);
        // Drop everything after the first frame chunk, then re-terminate.
        let chunks = ChunkReader::new(bytes.as_slice()).read_all_chunks().unwrap();
        let mut writer = crate::format::ChunkWriter::new(Vec::new());
        writer.write_chunk(&chunks[0]).unwrap();
        writer.write_chunk(&chunks[1]).unwrap();
        bytes = writer.finish().unwrap();

        assert!(matches!(
            ContainerProvider::from_bytes(&bytes),
            Err(AnimError::InvalidFormat(_))
        ));
    }
}
