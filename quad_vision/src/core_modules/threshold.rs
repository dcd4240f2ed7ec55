// THEORY:
// Black/white conversion uses a fixed cutoff of 130 whose polarity adapts to the image.
// The mean luminance decides which side of the cutoff is background: on a dark image
// the bright pixels (> 130) become white, on a bright image the dark pixels (<= 130)
// become white. Either way the minority content ends up white.
//
// Pass one is a parallel row sum; pass two is a parallel per-pixel map.

use crate::core_modules::pixel_buffer::pixel_buffer::{Byte, CHANNELS, PixelBuffer};
use crate::error::VisionResult;
use rayon::prelude::*;

/// Cutoff on the 0..=255 luminance scale. Also the polarity boundary for the mean.
pub const THRESHOLD: Byte = 130;

const WHITE: Byte = 255;
const BLACK: Byte = 0;

/// Integer mean of the luminance channel over every pixel (padding excluded).
pub fn mean_brightness(gray: &PixelBuffer) -> Byte {
    let sum: u64 = gray
        .par_rows()
        .map(|row| {
            row.chunks_exact(CHANNELS)
                .map(|px| px[0] as u64)
                .sum::<u64>()
        })
        .sum();
    (sum / gray.pixel_count() as u64) as Byte
}

#[inline]
fn classify(value: Byte, is_dark: bool) -> Byte {
    if (is_dark && value > THRESHOLD) || (!is_dark && value <= THRESHOLD) {
        WHITE
    } else {
        BLACK
    }
}

/// Binarizes a grayscale buffer. Every output pixel is 0 or 255 on all color channels.
pub fn threshold(gray: &PixelBuffer) -> VisionResult<PixelBuffer> {
    let is_dark = mean_brightness(gray) < THRESHOLD;
    let mut out = gray.blank_like();
    out.par_rows_mut()
        .zip(gray.par_rows())
        .for_each(|((_, dst_row), src_row)| {
            for (dst, px) in dst_row
                .chunks_exact_mut(CHANNELS)
                .zip(src_row.chunks_exact(CHANNELS))
            {
                let bw = classify(px[0], is_dark);
                dst[0] = bw;
                dst[1] = bw;
                dst[2] = bw;
                dst[3] = px[3];
            }
        });
    Ok(out)
}
