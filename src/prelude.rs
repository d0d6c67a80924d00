//! # Prelude
//!
//! Re-exports the types most callers need.
//!
//! ```rust
//! use fastly_service_controller::prelude::*;
//! ```

// Service description and recorded state
pub use crate::model::{ConfigError, ServiceConfig, ServiceKind, ServiceState};

// Remote API seam
pub use crate::api::{ApiError, Collection, FastlyClient, ServiceApi, ServiceVersion};

// Reconciliation
pub use crate::controller::{ReconcileOutcome, ReconcilerError};
pub use crate::handlers::{handlers_for, AttributeHandler, BlockChanges};
pub use crate::service::{Plan, PlanAction, ServiceReconciler};

pub use crate::config::ControllerConfig;
