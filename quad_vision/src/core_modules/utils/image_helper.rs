// File boundary for still images. Decoding is delegated to the `image` crate; whatever
// format it reads is converted to the engine's B,G,R,X layout. Export goes the other
// way and always writes PNG.

pub mod image_helper {
    use crate::core_modules::pixel_buffer::pixel_buffer::PixelBuffer;
    use crate::error::{VisionError, VisionResult};
    use image::ImageEncoder;
    use std::path::Path;

    /// Reads and decodes an image file into a new `PixelBuffer`.
    pub fn load(path: impl AsRef<Path>) -> VisionResult<PixelBuffer> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(VisionError::SourceUnavailable(format!(
                "no image file at {}",
                path.display()
            )));
        }
        let decoded = image::open(path)?;
        PixelBuffer::from_rgba_image(&decoded.into_rgba8())
    }

    /// Decodes an in-memory encoded image (PNG, JPEG, BMP, ...).
    pub fn decode(bytes: &[u8]) -> VisionResult<PixelBuffer> {
        let decoded = image::load_from_memory(bytes)?;
        PixelBuffer::from_rgba_image(&decoded.into_rgba8())
    }

    /// Writes `buffer` as an RGBA PNG.
    pub fn save(path: impl AsRef<Path>, buffer: &PixelBuffer) -> VisionResult<()> {
        let path = path.as_ref();
        let rgba = buffer.to_rgba_image()?;
        let write = || -> Result<(), image::ImageError> {
            let output = std::fs::File::create(path)?;
            let encoder = image::codecs::png::PngEncoder::new(std::io::BufWriter::new(output));
            encoder.write_image(
                rgba.as_raw(),
                buffer.width(),
                buffer.height(),
                image::ExtendedColorType::Rgba8,
            )
        };
        write().map_err(|e| {
            VisionError::TransformFailure(format!("could not write {}: {e}", path.display()))
        })
    }
}
