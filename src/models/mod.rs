pub mod image;
pub mod operation;

pub use image::*;
pub use operation::*;
