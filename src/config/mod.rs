//! # Configuration
//!
//! Process configuration read from the environment. The service
//! configuration itself lives in [`crate::model`].

mod controller;

pub use controller::ControllerConfig;
