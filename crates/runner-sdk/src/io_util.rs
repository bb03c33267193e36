use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// File-system helpers used for runner settings and job workspaces.
pub struct IOUtil;

impl IOUtil {
    /// Serialize a value as pretty JSON and write it atomically.
    ///
    /// The content goes to `<path>.tmp` first and is then renamed over `path`,
    /// so a crash never leaves a half-written file behind. On unix the file
    /// is created with mode `0600`.
    pub fn save_object<T: Serialize>(path: &Path, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create directory '{}'", parent.display())
            })?;
        }

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = Path::new(&tmp);

        fs::write(tmp, json.as_bytes())
            .with_context(|| format!("Failed to write object to '{}'", tmp.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(tmp, fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to restrict permissions on '{}'", tmp.display()))?;
        }

        fs::rename(tmp, path)
            .with_context(|| format!("Failed to move '{}' into place", path.display()))?;
        Ok(())
    }

    /// Read a file and deserialize it from JSON.
    pub fn load_object<T: DeserializeOwned>(path: &Path) -> Result<T> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read file '{}'", path.display()))?;
        let value = serde_json::from_str(&json)
            .with_context(|| format!("Failed to deserialize JSON from '{}'", path.display()))?;
        Ok(value)
    }

    /// Check that `path` exists, is a directory, and can be listed.
    pub fn check_directory_accessible(path: &Path) -> Result<()> {
        let meta = fs::metadata(path)
            .with_context(|| format!("Directory '{}' does not exist", path.display()))?;
        if !meta.is_dir() {
            anyhow::bail!("'{}' is not a directory", path.display());
        }
        fs::read_dir(path)
            .with_context(|| format!("Directory '{}' is not readable", path.display()))?;
        Ok(())
    }
}
