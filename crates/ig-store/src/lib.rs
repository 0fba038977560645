pub mod config;
pub mod error;
pub mod schema;
pub mod store;
pub mod workspace;

pub use config::Config;
pub use error::{Result, StoreError};
pub use store::{SqliteStore, StoreStats};
pub use workspace::{DATA_DIR_ENV, Workspace, default_base_dir};
