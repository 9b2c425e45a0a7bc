pub mod db;

use anyhow::Result;
use std::path::Path;
use tracing::info;

pub use db::Database;

use crate::config::{Config, CONFIG_FILE};

/// Create the data directory, its database and a default configuration file.
/// An existing configuration is left untouched.
pub async fn init(data_dir: &Path) -> Result<Config> {
    tokio::fs::create_dir_all(data_dir).await?;

    let db = Database::new(data_dir)?;
    db.initialize()?;

    let config = if data_dir.join(CONFIG_FILE).exists() {
        Config::load(data_dir)?
    } else {
        let config = Config::default();
        config.save(data_dir)?;
        config
    };

    info!(data_dir = %data_dir.display(), "discussion store initialized");
    Ok(config)
}

/// Open the database in `data_dir`, creating missing tables.
pub fn open(data_dir: &Path) -> Result<Database> {
    std::fs::create_dir_all(data_dir)?;
    let db = Database::new(data_dir)?;
    db.initialize()?;
    Ok(db)
}
