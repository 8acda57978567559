pub mod face_orientation_summary;
pub mod frame_writer;
pub mod overlay_renderer;
