pub mod constants;
pub mod frame;
pub mod geometry;
pub mod orientation;
pub mod settings;
