//! Common types shared across the Meridian workspace.

mod metrics;
mod network;
mod types;

pub use metrics::{Metrics, NoopMetrics};
pub use network::NetworkId;
pub use types::Hash256;
