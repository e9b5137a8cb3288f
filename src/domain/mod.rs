pub mod aggregation;
pub mod alert;
pub mod facility;
pub mod schedule;
