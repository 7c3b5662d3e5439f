// Shared SQLite pool bootstrap. The stores all live in one database file, so
// the pool is created once here and cloned into each of them.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::path::Path;

/// Connect to the SQLite database, creating the file (and its parent
/// directory) on first run.
pub async fn connect(database_url: &str) -> anyhow::Result<Pool<Sqlite>> {
    // Ensure the file exists if it's a file path. Both "sqlite://x.db" and
    // "sqlite:x.db" are valid URL forms.
    let path_str = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    if !database_url.contains(":memory:") && !Path::new(path_str).exists() {
        if let Some(parent) = Path::new(path_str).parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::File::create(path_str)?;
    }

    let conn_str = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite://{}", database_url)
    };

    Ok(SqlitePoolOptions::new().connect(&conn_str).await?)
}
