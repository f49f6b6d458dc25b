use crate::services::storage::Storage;
use crate::{Config, Database};

pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub storage: Storage,
}

impl AppState {
    pub fn new(config: Config, db: Database) -> Self {
        let storage = Storage::new(&config.storage.upload_dir);
        Self {
            config,
            db,
            storage,
        }
    }
}
