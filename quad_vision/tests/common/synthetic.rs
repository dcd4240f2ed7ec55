use quad_vision::{Bgrx, PixelBuffer};

/// Opaque gray image where every pixel is `f(x, y)`.
pub fn gray_from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> u8) -> PixelBuffer {
    let mut buffer = PixelBuffer::new(width, height).expect("allocate");
    for y in 0..height {
        for x in 0..width {
            buffer.set_pixel(x, y, Bgrx::gray(f(x, y))).expect("in range");
        }
    }
    buffer
}

/// Color noise with padded rows, to keep stride handling honest.
pub fn noisy_color(width: u32, height: u32, seed: u32) -> PixelBuffer {
    let mut buffer = PixelBuffer::with_stride(width, height, width as usize * 4 + 16).expect("allocate");
    let mut state = seed.wrapping_mul(2_654_435_761).max(1);
    for y in 0..height {
        for x in 0..width {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let [b, g, r, _] = state.to_le_bytes();
            buffer.set_pixel(x, y, Bgrx::new(b, g, r, 255)).expect("in range");
        }
    }
    buffer
}

/// Uniform color frame whose dimensions identify it.
pub fn tagged_frame(tag: u32) -> PixelBuffer {
    let mut buffer = PixelBuffer::new(16 + tag, 12 + tag % 7).expect("allocate");
    buffer.fill(Bgrx::from_rgb((tag * 13 % 256) as u8, 90, 200));
    buffer
}
