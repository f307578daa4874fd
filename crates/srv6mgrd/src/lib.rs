//! srv6mgrd - SRv6 VPN reconciliation daemon.
//!
//! Converges routing policy learned from (or destined to) the BGP speaker
//! into the kernel-resident SID binding table:
//!
//! - [`import::ImportReconciler`]: binds SIDs carried by remotely learned
//!   routes to the importing VRF.
//! - [`export::ExportReconciler`]: allocates SIDs for locally originated
//!   prefixes, binds them, and drives route advertisements.
//! - [`scheduler::ReconcileScheduler`]: serializes reconciliation per VRF
//!   while letting distinct VRFs converge in parallel.
//! - [`vrf::VrfManager`]: owns the per-VRF reconciler pairs built from the
//!   agent configuration.
//!
//! The BGP speaker itself is out of scope; it is consumed through the
//! [`speaker::RouteSpeaker`] trait.

pub mod config;
pub mod error;
pub mod export;
pub mod import;
pub mod retry;
pub mod scheduler;
pub mod speaker;
pub mod vrf;

pub use config::{AgentConfig, ExportPolicy, VrfPolicy};
pub use error::{BindingFailure, FailedOp, ReconcileError, ReconcileReport, ReconcileResult};
pub use scheduler::{KeyReconciler, ReconcileScheduler};
pub use speaker::{Advertisement, InMemorySpeaker, LearnedRoute, RouteSpeaker};
pub use vrf::VrfManager;
