pub mod geo;
pub mod geometry_cache;
pub mod hex;

// Foundation crate: small, well-tested primitives only.
pub use geo::*;
pub use geometry_cache::*;
pub use hex::*;
