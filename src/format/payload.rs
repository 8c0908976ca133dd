use crate::error::{AnimError, AnimResult};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

pub fn compress_pixels(pixels: &[u8], level: u32) -> AnimResult<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level.min(9)));
    encoder.write_all(pixels)?;
    Ok(encoder.finish()?)
}

pub fn decompress_pixels(data: &[u8], expected_len: usize) -> AnimResult<Vec<u8>> {
    let mut pixels = Vec::new();
    ZlibDecoder::new(data)
        .take(expected_len as u64 + 1)
        .read_to_end(&mut pixels)?;
    if pixels.len() != expected_len {
        return Err(AnimError::InvalidFormat(format!(
            "Pixel data size mismatch: expected {}, got {}",
            expected_len,
            pixels.len()
        )));
    }
    Ok(pixels)
}
