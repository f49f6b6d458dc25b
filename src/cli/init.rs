use anyhow::Result;
use std::path::PathBuf;

pub fn run(path: PathBuf) -> Result<()> {
    std::fs::create_dir_all(&path)?;
    std::fs::create_dir_all(path.join("data"))?;
    std::fs::create_dir_all(path.join("data/uploads"))?;

    let config = r#"[server]
host = "127.0.0.1"
port = 3000

[database]
path = "./data/inkpost.db"

[storage]
upload_dir = "./data/uploads"

[content]
posts_per_page = 10
tags_per_page = 20

[auth]
session_days = 7

[app]
debug = false
"#;

    std::fs::write(path.join("inkpost.toml"), config)?;

    tracing::info!("Created new site at {:?}", path);
    tracing::info!("Run 'inkpost migrate' to set up the database");
    tracing::info!("Run 'inkpost user add --admin' to create an admin account");
    tracing::info!("Run 'inkpost serve' to start the server");

    Ok(())
}
