pub mod box_overlay_renderer;
pub mod image_file_writer;
