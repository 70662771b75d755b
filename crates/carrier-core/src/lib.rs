pub mod config;
pub mod logging;

pub mod broadcast;
pub mod controller;
pub mod error;
pub mod ids;
pub mod iface;
pub mod job;
pub mod ledger;
pub mod progress;
pub mod queue;
pub mod retry;
