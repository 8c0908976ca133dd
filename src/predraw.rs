use crate::provider::Frame;
use image::{DynamicImage, RgbaImage};
use rayon::prelude::*;
use std::sync::Arc;

/// Rows per rayon task; tiny frames are converted inline.
const ROWS_PER_TASK: usize = 64;

/// Turns a provider frame into the cached representation.
///
/// With predrawing the frame is converted to premultiplied RGBA8 now, on the decoding
/// thread, so the compositor never has to convert at present time.
pub fn prepare_frame(image: DynamicImage, predrawing: bool) -> Frame {
    let mut rgba = image.into_rgba8();
    if predrawing {
        premultiply_alpha(&mut rgba);
    }
    Arc::new(rgba)
}

pub fn premultiply_alpha(image: &mut RgbaImage) {
    let row_len = image.width() as usize * 4;
    if row_len == 0 {
        return;
    }
    let chunk_len = row_len * ROWS_PER_TASK;
    let raw: &mut [u8] = image;

    if raw.len() <= chunk_len {
        premultiply_pixels(raw);
    } else {
        raw.par_chunks_mut(chunk_len).for_each(premultiply_pixels);
    }
}

fn premultiply_pixels(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        let alpha = px[3] as u16;
        if alpha == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((*c as u16 * alpha + 127) / 255) as u8;
        }
    }
}
