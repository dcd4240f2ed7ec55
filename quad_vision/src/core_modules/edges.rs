// THEORY:
// Edge detection convolves the luminance channel with a 3x3 gradient kernel pair and
// marks a pixel white when the gradient magnitude exceeds a fixed cutoff of 45.
//
// Key architectural principles:
// 1.  **Read-only source**: the grayscale buffer is borrowed immutably for the whole
//     pass, so every neighborhood sees the original values. Edge marks are written only
//     into a freshly allocated output buffer, never into the input.
// 2.  **Interior only**: the outermost rows and columns have no full neighborhood and
//     stay black. Images narrower or shorter than 3 pixels come back entirely black.
// 3.  **Row parallelism**: each output row reads three input rows and writes only
//     itself, so rows are computed independently.

use crate::core_modules::pixel_buffer::pixel_buffer::{Bgrx, Byte, CHANNELS, PixelBuffer};
use crate::error::VisionResult;
use rayon::prelude::*;

type Kernel3 = [[i32; 3]; 3];

const SOBEL_X: Kernel3 = [[-1, 0, 1], [-1, 0, 1], [-1, 0, 1]];
const SOBEL_Y: Kernel3 = [[-1, -1, -1], [0, 0, 0], [1, 1, 1]];

/// Magnitudes strictly above this value are edges.
pub const EDGE_THRESHOLD: u32 = 45;

const EDGE: Byte = 255;

/// Integer gradient magnitude: `floor(sqrt(gx^2 + gy^2))`.
#[inline]
pub fn magnitude(gx: i32, gy: i32) -> u32 {
    (((gx * gx + gy * gy) as f64).sqrt()).floor() as u32
}

/// Horizontal and vertical gradient at column `x` of the middle row in `neighborhood`.
/// `x` must have a left and a right neighbor.
#[inline]
fn gradient(neighborhood: &[&[Byte]; 3], x: usize) -> (i32, i32) {
    let mut gx = 0;
    let mut gy = 0;
    for (ky, row) in neighborhood.iter().enumerate() {
        for kx in 0..3 {
            let sample = row[(x + kx - 1) * CHANNELS] as i32;
            gx += SOBEL_X[ky][kx] * sample;
            gy += SOBEL_Y[ky][kx] * sample;
        }
    }
    (gx, gy)
}

/// Returns a binary edge map of `gray`: 255 on edges, 0 elsewhere, border always 0.
pub fn edges(gray: &PixelBuffer) -> VisionResult<PixelBuffer> {
    let (width, height) = (gray.width(), gray.height());
    let mut out = gray.blank_like();
    out.fill(Bgrx::gray(0));
    if width < 3 || height < 3 {
        return Ok(out);
    }

    out.par_rows_mut().try_for_each(|(y, dst_row)| -> VisionResult<()> {
        if y == 0 || y == height - 1 {
            return Ok(());
        }
        let neighborhood = [gray.row(y - 1)?, gray.row(y)?, gray.row(y + 1)?];
        for x in 1..(width - 1) as usize {
            let (gx, gy) = gradient(&neighborhood, x);
            if magnitude(gx, gy) > EDGE_THRESHOLD {
                let at = x * CHANNELS;
                dst_row[at..at + 3].fill(EDGE);
            }
        }
        Ok(())
    })?;
    Ok(out)
}
