pub mod annotate_sequence_use_case;
pub mod detection_pipeline;
pub mod infrastructure;
pub mod observation_snapshot;
pub mod pipeline_logger;
