pub mod timestamp;
pub mod windowed_state_store;
