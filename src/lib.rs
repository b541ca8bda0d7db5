pub mod config;
pub mod core;
pub mod data;
pub mod export;
pub mod model;
pub mod runtime;
pub mod snapshot;
pub mod util;
pub mod widgets;

pub use config::Config;
pub use core::{LivenoteCore, NotebookController};
pub use data::{Database, NotebookStore, StorageError};
pub use model::{Cell, CellType, Chapter, Id, Notebook};
pub use snapshot::{LiveRegion, MemoryRegion, RegionSnapshot};
