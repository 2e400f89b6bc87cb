pub mod cli;
pub mod config;
pub mod entity;
pub mod error;
pub mod instantiate;
pub mod position;
pub mod reorder;
pub mod storage;
pub mod variables;
pub mod warnings;

pub use config::Config;
pub use error::{ArborError, Result};
pub use instantiate::{InstantiateOptions, InstantiateRequest, InstantiationReport, TreeInstantiator};
pub use position::PositionKey;
pub use reorder::reorder;
pub use storage::{LoroStore, NodeStore};
