//! Local persistence of the per-machine API key.
//!
//! One small file under the OS config dir, readable by the owner only.
//! An absent file is not an error; it just means the agent has to request
//! a key from the central service.

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

pub fn default_key_path() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow!("could not find config directory"))?;
    path.push("vigil-agent");
    path.push("api-key");
    Ok(path)
}

pub async fn load_api_key(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = tokio::fs::read_to_string(path).await?;
    let key = content.trim();
    if key.is_empty() {
        return Ok(None);
    }
    Ok(Some(key.to_string()))
}

pub async fn save_api_key(path: &Path, key: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, key).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(path, perms).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_file_is_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("api-key");
        assert_eq!(load_api_key(&path).await.unwrap(), None);
    }

    #[tokio::test]
    async fn roundtrip_and_trim() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("api-key");
        save_api_key(&path, "abc-123").await.unwrap();
        assert_eq!(load_api_key(&path).await.unwrap(), Some("abc-123".to_string()));

        tokio::fs::write(&path, "  spaced-key \n").await.unwrap();
        assert_eq!(
            load_api_key(&path).await.unwrap(),
            Some("spaced-key".to_string())
        );
    }

    #[tokio::test]
    async fn empty_file_is_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("api-key");
        tokio::fs::write(&path, "\n").await.unwrap();
        assert_eq!(load_api_key(&path).await.unwrap(), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let path = dir.path().join("api-key");
        save_api_key(&path, "secret").await.unwrap();
        let mode = tokio::fs::metadata(&path).await.unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
