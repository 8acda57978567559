pub mod detection_backend;
pub mod observation;
pub mod tracking_request;
