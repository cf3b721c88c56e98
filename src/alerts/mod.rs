mod storage;

pub use storage::{AlertRecord, AlertSet, AlertStore, StorageError};
