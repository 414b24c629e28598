//! Safe SQL builder: identifiers from resource descriptors only, values as typed parameters.

mod builder;
pub mod params;
pub use builder::*;
pub use params::*;
