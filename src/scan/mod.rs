// Module declarations
pub mod probe;
pub mod resolve;
pub mod types;

// Re-export types for convenience
pub use probe::{probe, ProbeError};
pub use resolve::{EndpointResolver, ResolveError};
pub use types::ClusterTarget;
