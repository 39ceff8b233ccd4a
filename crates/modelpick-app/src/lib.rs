use std::path::{Path, PathBuf};

use directories::ProjectDirs;

const APP_QUALIFIER: &str = "dev";
const APP_ORGANIZATION: &str = "modelpick";
const APP_NAME: &str = "modelpick";
const CATALOG_DB_FILENAME: &str = "catalog.sqlite3";

/// Overrides the catalog database location.
pub const CATALOG_DB_ENV: &str = "MODELPICK_DB";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not resolve user data directory")]
    MissingUserDataDir,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// App-local user data directory (for durable application state).
pub fn user_data_dir() -> Result<PathBuf> {
    let dirs = ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
        .ok_or(Error::MissingUserDataDir)?;
    Ok(dirs.data_local_dir().to_path_buf())
}

pub fn ensure_user_data_dir() -> Result<PathBuf> {
    let dir = user_data_dir()?;
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Default catalog database path inside the user data directory.
pub fn catalog_db_path() -> Result<PathBuf> {
    Ok(ensure_user_data_dir()?.join(CATALOG_DB_FILENAME))
}

/// Where the catalog database lives.
///
/// An explicit path wins, then `MODELPICK_DB`, then the user data directory.
/// The parent directory is created if missing.
pub fn resolve_catalog_db_path(explicit: Option<&Path>) -> Result<PathBuf> {
    let from_env = std::env::var_os(CATALOG_DB_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from);
    match explicit.map(Path::to_path_buf).or(from_env) {
        Some(path) => {
            ensure_parent_dir(&path)?;
            Ok(path)
        }
        None => catalog_db_path(),
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_wins_and_gets_a_parent_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("catalog.sqlite3");

        let resolved = resolve_catalog_db_path(Some(path.as_path())).expect("resolve");

        assert_eq!(resolved, path);
        assert!(dir.path().join("nested").is_dir());
    }

    #[test]
    fn bare_file_names_need_no_parent() {
        let resolved = resolve_catalog_db_path(Some(Path::new("catalog.sqlite3"))).expect("resolve");
        assert_eq!(resolved, PathBuf::from("catalog.sqlite3"));
    }
}
