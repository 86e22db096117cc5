//! The metrics query layer: PromQL templates per metric family, a vendor
//! dialect table for the handful of managed-Prometheus flavors KRR talks to,
//! and the client that actually issues queries and deduplicates series.
//!
//! Grounded on `robusta_krr/core/integrations/prometheus/*`.

pub mod aws_signer;
pub mod client;
pub mod families;
pub mod vendors;
