//! Sliding-window state aggregation and flap-dampened alerting for camera
//! description streams.
//!
//! Messages from the description pipeline go through [`FacilityStateProcessor`],
//! which records every camera label into a per-camera trailing window, picks the
//! dominant state, and turns changes in its alert classification into
//! `ALERT` / `RESOLVED` / `FLAPPING_START` / `FLAPPING_END` events.
//!
//! [`FacilityStateProcessor`]: domain::facility::facility_state_processor::FacilityStateProcessor

pub mod app_state;
pub mod core;
pub mod domain;
pub mod errors;
pub mod scheduler;
