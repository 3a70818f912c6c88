pub mod gemini;
pub mod image;
pub mod openai;
pub mod request;

pub use image::*;
pub use request::*;
