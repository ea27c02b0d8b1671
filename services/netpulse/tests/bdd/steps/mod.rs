//! BDD step definitions for netpulse service

pub mod banner_steps;
pub mod monitor_steps;
