pub mod aggregation_config;
pub mod state_aggregator;
