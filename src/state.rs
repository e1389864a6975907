use crate::storage::MemoryStore;
use std::{path::PathBuf, sync::Arc};
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub data_path: PathBuf,
    pub default_profile: String,
    pub store: Arc<Mutex<MemoryStore>>,
}

impl AppState {
    pub fn new(data_path: PathBuf, default_profile: String, store: MemoryStore) -> Self {
        Self {
            data_path,
            default_profile,
            store: Arc::new(Mutex::new(store)),
        }
    }
}
