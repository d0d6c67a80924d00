//! Fastly Service Controller Library
//!
//! Declarative management of Fastly CDN services. A YAML file describes one
//! service; [`service::ServiceReconciler`] turns the difference between that
//! description and the recorded state into calls against the Fastly API,
//! following the clone, validate and activate version protocol.
//!
//! ## Quick Start
//!
//! ```rust
//! use fastly_service_controller::prelude::*;
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod constants;
pub mod controller;
pub mod handlers;
pub mod model;
pub mod observability;
pub mod prelude;
pub mod server;
pub mod service;
