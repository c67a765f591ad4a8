pub mod config;
pub mod order;
pub mod session;

pub use config::{load_config, load_config_from_env, ConfigError, SyncConfig};
pub use order::{LineId, LineRef, OrderLine, OrderSnapshot, SnapshotLine, VariantId};
pub use session::{
    store_from_config, FileSessionStore, MemorySessionStore, SessionStore, SessionToken,
};
