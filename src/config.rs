use anyhow::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;

/// Largest accepted upload, request body included
pub const MAX_UPLOAD_BYTES: usize = 4 * 1024 * 1024;

/// Settings for the HTTP server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory holding uploads while they are processed
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16, upload_dir: impl Into<PathBuf>) -> Self {
        ServerConfig {
            host: host.into(),
            port,
            upload_dir: upload_dir.into(),
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }

    pub fn bind_addr(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }

    /// Create the upload directory if it does not exist yet
    pub fn ensure_upload_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.upload_dir).with_context(|| {
            format!(
                "Failed to create upload directory {}",
                self.upload_dir.display()
            )
        })?;
        info!("Uploads are stored in {}", self.upload_dir.display());
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig::new("0.0.0.0", 5000, "uploads")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_service() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr(), ("0.0.0.0".to_string(), 5000));
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
        assert_eq!(config.max_upload_bytes, 4 * 1024 * 1024);
    }

    #[test]
    fn upload_dir_is_created() {
        let root = tempfile::tempdir().unwrap();
        let config = ServerConfig::new("127.0.0.1", 0, root.path().join("nested/uploads"));

        config.ensure_upload_dir().unwrap();

        assert!(config.upload_dir.is_dir());
    }
}
