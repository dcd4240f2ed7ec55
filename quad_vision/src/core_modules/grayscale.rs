// THEORY:
// Grayscale conversion collapses each pixel to its Rec. 601 luminance and writes that
// single value into all three color channels. The fourth channel is carried through.
// Each pixel depends only on itself, so rows are converted in parallel.

use crate::core_modules::pixel_buffer::pixel_buffer::{Byte, CHANNELS, PixelBuffer};
use crate::error::VisionResult;
use rayon::prelude::*;

const RED_WEIGHT: f64 = 0.299;
const GREEN_WEIGHT: f64 = 0.587;
const BLUE_WEIGHT: f64 = 0.114;

/// Rec. 601 luma of one pixel, rounded to the nearest integer.
#[inline]
pub fn luminance(red: Byte, green: Byte, blue: Byte) -> Byte {
    let y = RED_WEIGHT * red as f64 + GREEN_WEIGHT * green as f64 + BLUE_WEIGHT * blue as f64;
    y.round().clamp(0.0, 255.0) as Byte
}

/// Returns a new buffer of the same shape holding the luminance of `src`.
pub fn grayscale(src: &PixelBuffer) -> VisionResult<PixelBuffer> {
    let mut out = src.blank_like();
    out.par_rows_mut()
        .zip(src.par_rows())
        .for_each(|((_, dst_row), src_row)| {
            for (dst, px) in dst_row
                .chunks_exact_mut(CHANNELS)
                .zip(src_row.chunks_exact(CHANNELS))
            {
                let gray = luminance(px[2], px[1], px[0]);
                dst[0] = gray;
                dst[1] = gray;
                dst[2] = gray;
                dst[3] = px[3];
            }
        });
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::pixel_buffer::pixel_buffer::Bgrx;

    fn colorful(width: u32, height: u32) -> PixelBuffer {
        let mut buffer = PixelBuffer::with_stride(width, height, width as usize * 4 + 8)
            .expect("allocate");
        for y in 0..height {
            for x in 0..width {
                let px = Bgrx::new((x * 37 % 256) as u8, (y * 91 % 256) as u8, ((x + y) * 53 % 256) as u8, 77);
                buffer.set_pixel(x, y, px).expect("in range");
            }
        }
        buffer
    }

    #[test]
    fn extremes_map_to_extremes() {
        assert_eq!(luminance(0, 0, 0), 0);
        assert_eq!(luminance(255, 255, 255), 255);
    }

    #[test]
    fn uses_rounded_rec601_weights() {
        // 0.299 * 100 + 0.587 * 50 + 0.114 * 200 = 82.05
        assert_eq!(luminance(100, 50, 200), 82);
        // 0.299 * 255 = 76.245
        assert_eq!(luminance(255, 0, 0), 76);
        // 0.587 * 255 = 149.685
        assert_eq!(luminance(0, 255, 0), 150);
    }

    #[test]
    fn output_channels_are_equal_and_alpha_is_kept() {
        let src = colorful(9, 5);
        let gray = grayscale(&src).expect("grayscale");
        assert_eq!((gray.width(), gray.height(), gray.stride()), (9, 5, src.stride()));
        for y in 0..5 {
            for x in 0..9 {
                let s = src.pixel(x, y).expect("in range");
                let g = gray.pixel(x, y).expect("in range");
                assert_eq!(g.blue, g.green);
                assert_eq!(g.green, g.red);
                assert_eq!(g.red, luminance(s.red, s.green, s.blue));
                assert_eq!(g.alpha, 77);
            }
        }
    }

    #[test]
    fn grayscale_is_idempotent() {
        let once = grayscale(&colorful(16, 11)).expect("grayscale");
        let twice = grayscale(&once).expect("grayscale");
        assert_eq!(once, twice);
    }

    #[test]
    fn input_is_not_modified() {
        let src = colorful(4, 4);
        let before = src.clone();
        let _ = grayscale(&src).expect("grayscale");
        assert_eq!(src, before);
    }
}
