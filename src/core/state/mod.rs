pub mod alerts;
pub mod window;
