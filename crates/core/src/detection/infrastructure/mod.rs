pub mod math;
pub mod replay_backend;
