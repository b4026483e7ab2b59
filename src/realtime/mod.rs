//! Live-update machinery: subscription registry, fan-out and the
//! latest-reading cache.

pub mod registry;
pub mod latest;

pub use latest::LatestCache;
pub use registry::ConnectionManager;
