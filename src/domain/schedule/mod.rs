pub mod no_show_monitor;
pub mod no_show_rule;
