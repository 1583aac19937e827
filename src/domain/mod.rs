// Domain layer: request/response model, ports, and the pure metric library.
// Nothing in here performs I/O.

pub mod api_health;
pub mod cpc_scheme;
pub mod metrics;
pub mod model;
pub mod ports;
pub mod scurve;
pub mod similarity;
pub mod temporal_metrics;
