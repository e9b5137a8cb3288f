pub mod alert_coordinator;
pub mod alert_state;
