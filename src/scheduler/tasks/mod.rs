pub mod alarm;
pub mod minute;
