pub mod camera_directory;
pub mod facility_message;
pub mod facility_state_processor;
