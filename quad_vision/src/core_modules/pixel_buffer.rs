// THEORY:
// The `PixelBuffer` is the single image container every other module speaks. It is a
// "dumb" owner of raw bytes laid out as interleaved B, G, R, X quadruples, one row
// after another, with each row occupying `stride` bytes. A platform may hand us rows
// padded past `width * 4`; the padding is carried along but never interpreted.
//
// Key architectural principles:
// 1.  **Owned storage**: the bytes live in a `Vec<u8>` owned by the buffer. Whoever
//     holds the buffer owns the image; dropping it releases the memory exactly once.
// 2.  **Encapsulated addressing**: the `y * stride + x * 4` arithmetic lives here and
//     nowhere else. Transforms ask for rows or pixels; out-of-range requests come back
//     as `OutOfBounds` instead of reading someone else's memory.
// 3.  **Explicit copies**: a buffer is duplicated only through `Clone`. Transforms
//     allocate fresh output with `blank_like` and never write into their input.

pub mod pixel_buffer {
    use crate::error::{VisionError, VisionResult};
    use image::RgbaImage;
    use rayon::prelude::*;

    pub type Byte = u8;
    pub type Channel = Byte;

    /// Bytes per pixel. Fixed for the whole engine.
    pub const CHANNELS: usize = 4;

    /// A single pixel in the engine's native channel order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Bgrx {
        pub blue: Channel,
        pub green: Channel,
        pub red: Channel,
        /// Fourth channel. Carried through, never used for luminance.
        pub alpha: Channel,
    }

    impl Bgrx {
        pub fn new(blue: Channel, green: Channel, red: Channel, alpha: Channel) -> Self {
            Self {
                blue,
                green,
                red,
                alpha,
            }
        }

        /// An opaque gray pixel with all three color channels set to `value`.
        pub fn gray(value: Channel) -> Self {
            Self::new(value, value, value, 255)
        }

        pub fn from_rgb(red: Channel, green: Channel, blue: Channel) -> Self {
            Self::new(blue, green, red, 255)
        }
    }

    impl TryFrom<&[Byte]> for Bgrx {
        type Error = VisionError;

        /// Reads the first four bytes of `bytes`. Shorter slices are a `DecodeFailure`.
        fn try_from(bytes: &[Byte]) -> VisionResult<Self> {
            match *bytes {
                [blue, green, red, alpha, ..] => Ok(Bgrx::new(blue, green, red, alpha)),
                _ => Err(VisionError::DecodeFailure(format!(
                    "a pixel needs {CHANNELS} bytes, got {}",
                    bytes.len()
                ))),
            }
        }
    }

    /// A rectangular image stored as B,G,R,X rows of `stride` bytes each.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct PixelBuffer {
        width: u32,
        height: u32,
        stride: usize,
        bytes: Vec<Byte>,
    }

    impl PixelBuffer {
        /// Allocates a zeroed, tightly packed buffer (`stride == width * 4`).
        pub fn new(width: u32, height: u32) -> VisionResult<Self> {
            Self::with_stride(width, height, width as usize * CHANNELS)
        }

        /// Allocates a zeroed buffer whose rows are `stride` bytes apart.
        pub fn with_stride(width: u32, height: u32, stride: usize) -> VisionResult<Self> {
            let len = Self::checked_len(width, height, stride)
                .map_err(VisionError::TransformFailure)?;
            Ok(Self {
                width,
                height,
                stride,
                bytes: vec![0; len],
            })
        }

        /// Wraps bytes delivered by a source. The length must be exactly `stride * height`.
        pub fn from_bgrx(
            width: u32,
            height: u32,
            stride: usize,
            bytes: Vec<Byte>,
        ) -> VisionResult<Self> {
            let len =
                Self::checked_len(width, height, stride).map_err(VisionError::DecodeFailure)?;
            if bytes.len() != len {
                return Err(VisionError::DecodeFailure(format!(
                    "expected {len} bytes for {width}x{height} with stride {stride}, got {}",
                    bytes.len()
                )));
            }
            Ok(Self {
                width,
                height,
                stride,
                bytes,
            })
        }

        /// Converts a decoded RGBA image into the engine's B,G,R,X layout.
        pub fn from_rgba_image(image: &RgbaImage) -> VisionResult<Self> {
            let mut buffer = Self::new(image.width(), image.height())
                .map_err(|e| VisionError::DecodeFailure(e.to_string()))?;
            for (dst, src) in buffer
                .bytes
                .chunks_exact_mut(CHANNELS)
                .zip(image.as_raw().chunks_exact(CHANNELS))
            {
                dst[0] = src[2];
                dst[1] = src[1];
                dst[2] = src[0];
                dst[3] = src[3];
            }
            Ok(buffer)
        }

        /// Converts back to a packed RGBA image, dropping any row padding.
        pub fn to_rgba_image(&self) -> VisionResult<RgbaImage> {
            let mut raw = Vec::with_capacity(self.width as usize * self.height as usize * CHANNELS);
            for row in self.rows() {
                for px in row.chunks_exact(CHANNELS) {
                    raw.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
                }
            }
            RgbaImage::from_raw(self.width, self.height, raw).ok_or_else(|| {
                VisionError::TransformFailure("rgba conversion produced a short buffer".into())
            })
        }

        /// A zeroed buffer with the same width, height and stride.
        pub fn blank_like(&self) -> Self {
            Self {
                width: self.width,
                height: self.height,
                stride: self.stride,
                bytes: vec![0; self.bytes.len()],
            }
        }

        fn checked_len(width: u32, height: u32, stride: usize) -> Result<usize, String> {
            if width == 0 || height == 0 {
                return Err(format!("buffer dimensions must be non-zero, got {width}x{height}"));
            }
            let min_stride = width as usize * CHANNELS;
            if stride < min_stride {
                return Err(format!("stride {stride} is smaller than {min_stride}"));
            }
            stride
                .checked_mul(height as usize)
                .ok_or_else(|| format!("{width}x{height} with stride {stride} overflows"))
        }

        pub fn width(&self) -> u32 {
            self.width
        }

        pub fn height(&self) -> u32 {
            self.height
        }

        pub fn stride(&self) -> usize {
            self.stride
        }

        pub fn pixel_count(&self) -> usize {
            self.width as usize * self.height as usize
        }

        /// Meaningful bytes per row, excluding padding.
        pub fn row_bytes(&self) -> usize {
            self.width as usize * CHANNELS
        }

        /// The whole backing store, padding included.
        pub fn as_bytes(&self) -> &[Byte] {
            &self.bytes
        }

        fn offset(&self, x: u32, y: u32) -> VisionResult<usize> {
            if x >= self.width || y >= self.height {
                return Err(VisionError::OutOfBounds {
                    x,
                    y,
                    width: self.width,
                    height: self.height,
                });
            }
            Ok(y as usize * self.stride + x as usize * CHANNELS)
        }

        pub fn pixel(&self, x: u32, y: u32) -> VisionResult<Bgrx> {
            let at = self.offset(x, y)?;
            Bgrx::try_from(&self.bytes[at..at + CHANNELS])
        }

        pub fn set_pixel(&mut self, x: u32, y: u32, px: Bgrx) -> VisionResult<()> {
            let at = self.offset(x, y)?;
            self.bytes[at..at + CHANNELS].copy_from_slice(&[px.blue, px.green, px.red, px.alpha]);
            Ok(())
        }

        /// The luminance channel of a grayscale buffer (channel 0; all three are equal).
        pub fn luma(&self, x: u32, y: u32) -> VisionResult<Channel> {
            let at = self.offset(x, y)?;
            Ok(self.bytes[at])
        }

        /// Row `y` without its padding.
        pub fn row(&self, y: u32) -> VisionResult<&[Byte]> {
            if y >= self.height {
                return Err(VisionError::OutOfBounds {
                    x: 0,
                    y,
                    width: self.width,
                    height: self.height,
                });
            }
            let start = y as usize * self.stride;
            Ok(&self.bytes[start..start + self.row_bytes()])
        }

        pub fn rows(&self) -> impl Iterator<Item = &[Byte]> + '_ {
            let row_bytes = self.row_bytes();
            self.bytes
                .chunks_exact(self.stride)
                .map(move |row| &row[..row_bytes])
        }

        pub fn par_rows(&self) -> impl IndexedParallelIterator<Item = &[Byte]> + '_ {
            let row_bytes = self.row_bytes();
            self.bytes
                .par_chunks_exact(self.stride)
                .map(move |row| &row[..row_bytes])
        }

        /// Rows paired with their `y`, for writers that fill a fresh buffer in parallel.
        pub fn par_rows_mut(&mut self) -> impl IndexedParallelIterator<Item = (u32, &mut [Byte])> + '_ {
            let row_bytes = self.row_bytes();
            self.bytes
                .par_chunks_exact_mut(self.stride)
                .enumerate()
                .map(move |(y, row)| (y as u32, &mut row[..row_bytes]))
        }

        /// Fills every pixel, leaving row padding untouched.
        pub fn fill(&mut self, px: Bgrx) {
            self.par_rows_mut().for_each(|(_, row)| {
                for dst in row.chunks_exact_mut(CHANNELS) {
                    dst.copy_from_slice(&[px.blue, px.green, px.red, px.alpha]);
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::pixel_buffer::*;
    use crate::error::VisionError;

    #[test]
    fn new_buffer_is_zeroed_and_tightly_packed() {
        let buffer = PixelBuffer::new(7, 3).expect("allocate");
        assert_eq!(buffer.stride(), 28);
        assert_eq!(buffer.as_bytes().len(), 28 * 3);
        assert!(buffer.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        assert!(PixelBuffer::new(0, 10).is_err());
        assert!(PixelBuffer::new(10, 0).is_err());
    }

    #[test]
    fn stride_smaller_than_row_is_rejected() {
        let err = PixelBuffer::with_stride(4, 4, 15).unwrap_err();
        assert!(matches!(err, VisionError::TransformFailure(_)));
    }

    #[test]
    fn short_slices_are_not_pixels() {
        let bytes: &[Byte] = &[1, 2, 3];
        assert!(matches!(Bgrx::try_from(bytes), Err(VisionError::DecodeFailure(_))));
        let bytes: &[Byte] = &[1, 2, 3, 4, 5];
        assert_eq!(Bgrx::try_from(bytes), Ok(Bgrx::new(1, 2, 3, 4)));
    }

    #[test]
    fn from_bgrx_checks_length() {
        let err = PixelBuffer::from_bgrx(2, 2, 8, vec![0; 15]).unwrap_err();
        assert!(matches!(err, VisionError::DecodeFailure(_)));
        assert!(PixelBuffer::from_bgrx(2, 2, 12, vec![0; 24]).is_ok());
    }

    #[test]
    fn pixel_addressing_honours_stride() {
        let mut buffer = PixelBuffer::with_stride(3, 2, 16).expect("allocate");
        buffer.set_pixel(2, 1, Bgrx::new(1, 2, 3, 4)).expect("in range");
        assert_eq!(&buffer.as_bytes()[16 + 8..16 + 12], &[1, 2, 3, 4]);
        assert_eq!(buffer.pixel(2, 1).expect("in range"), Bgrx::new(1, 2, 3, 4));
        assert_eq!(buffer.luma(2, 1).expect("in range"), 1);
        assert_eq!(buffer.row(1).expect("in range").len(), 12);
    }

    #[test]
    fn out_of_range_access_fails() {
        let mut buffer = PixelBuffer::new(4, 4).expect("allocate");
        assert_eq!(
            buffer.pixel(4, 0),
            Err(VisionError::OutOfBounds {
                x: 4,
                y: 0,
                width: 4,
                height: 4
            })
        );
        assert!(buffer.set_pixel(0, 4, Bgrx::gray(1)).is_err());
        assert!(buffer.row(4).is_err());
    }

    #[test]
    fn fill_leaves_padding_alone() {
        let mut buffer = PixelBuffer::with_stride(2, 2, 12).expect("allocate");
        buffer.fill(Bgrx::gray(9));
        for row in buffer.as_bytes().chunks_exact(12) {
            assert_eq!(&row[..8], &[9, 9, 9, 255, 9, 9, 9, 255]);
            assert_eq!(&row[8..], &[0, 0, 0, 0]);
        }
    }

    #[test]
    fn rgba_conversion_swaps_red_and_blue() {
        let image = image::RgbaImage::from_raw(1, 1, vec![10, 20, 30, 40]).expect("raw");
        let buffer = PixelBuffer::from_rgba_image(&image).expect("convert");
        assert_eq!(buffer.pixel(0, 0).expect("in range"), Bgrx::new(30, 20, 10, 40));
        assert_eq!(buffer.to_rgba_image().expect("convert").as_raw(), &vec![10, 20, 30, 40]);
    }

    #[test]
    fn clone_is_an_independent_copy() {
        let mut original = PixelBuffer::new(2, 2).expect("allocate");
        let copy = original.clone();
        original.set_pixel(0, 0, Bgrx::gray(200)).expect("in range");
        assert_eq!(copy.pixel(0, 0).expect("in range"), Bgrx::default());
    }
}
