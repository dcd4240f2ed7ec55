pub mod edges;
pub mod grayscale;
pub mod pixel_buffer;
pub mod threshold;
pub mod utils;
