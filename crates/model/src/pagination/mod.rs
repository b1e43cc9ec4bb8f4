pub mod watermark;
pub mod window;
