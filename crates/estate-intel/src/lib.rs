//! Intelligence scoring and forecasting engine for a multi-tenant
//! real-estate CRM.
//!
//! The engine consumes tenant-scoped CRM records through repository traits,
//! produces append-only score/forecast/ranking snapshots, and reacts to
//! domain events through a fire-and-forget trigger dispatcher. Persistence,
//! HTTP auth, and notification transports are collaborator contracts owned
//! elsewhere.

pub mod config;
pub mod error;
pub mod intelligence;
pub mod telemetry;
