pub mod config;
pub mod error;
pub mod handle_map;

pub use config::{BackendConfig, GlShimConfig, LoggingConfig, SurfaceConfig};
pub use error::{HalError, HalResult};
pub use handle_map::HandleAllocator;
