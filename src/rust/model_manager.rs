use std::path::{Path, PathBuf};
use std::fs;
use std::io;
use std::sync::Arc;
use std::env;
use tokio::sync::Mutex;
use sha2::{Sha256, Digest};

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Artefact not found: {0}")]
    NotFound(PathBuf),
    #[error("Download error: {0}")]
    DownloadError(#[from] reqwest::Error),
    #[error("Download of {url} failed with status {status}")]
    BadStatus { url: String, status: u16 },
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Cannot derive a file name from {0}")]
    InvalidLocation(String),
    #[error("Hash mismatch: expected {expected}, got {actual} for {path:?}")]
    HashMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
}

/// Resolves model artefact locations to verified local files.
///
/// A location is either a filesystem path or an `http(s)://` URL. URLs are
/// downloaded once into the models directory and reused on later starts.
#[derive(Clone, Debug)]
pub struct ModelManager {
    models_dir: PathBuf,
    download_lock: Arc<Mutex<()>>,
}

impl ModelManager {
    /// Creates a new ModelManager with the default models directory
    pub fn new_default() -> io::Result<Self> {
        Self::new(Self::get_default_models_dir())
    }

    /// Returns the default models directory path
    pub fn get_default_models_dir() -> PathBuf {
        // 1. Check environment variable
        if let Ok(path) = env::var("GLOSSCLASS_MODELS") {
            return PathBuf::from(path);
        }

        // 2. Use platform-specific cache directory
        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("glossclass").join("models");
        }

        // 3. Fallback to user's home directory
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".cache").join("glossclass").join("models");
        }

        // 4. If all else fails, use system temp directory (platform agnostic)
        env::temp_dir().join("glossclass").join("models")
    }

    pub fn new<P: AsRef<Path>>(models_dir: P) -> io::Result<Self> {
        let models_dir = models_dir.as_ref().to_path_buf();
        fs::create_dir_all(&models_dir)?;
        Ok(Self {
            models_dir,
            download_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Returns a local path for `location`, downloading it first when it is a URL.
    ///
    /// When `expected_hash` is given the file must match it. A cached download
    /// that fails verification is fetched again; a local file that fails is an error.
    pub async fn resolve(
        &self,
        location: &str,
        expected_hash: Option<&str>,
    ) -> Result<PathBuf, ModelError> {
        if is_url(location) {
            return self.fetch(location, expected_hash).await;
        }

        let path = self.local_path(location)?;
        if let Some(expected) = expected_hash {
            let actual = compute_sha256(&path)?;
            if actual != normalise_hex(expected) {
                log::error!("Checksum mismatch for {:?}", path);
                return Err(ModelError::HashMismatch {
                    path,
                    expected: normalise_hex(expected),
                    actual,
                });
            }
            log::info!("Verified checksum of {:?}", path);
        }
        Ok(path)
    }

    /// Finds a local artefact as given, or relative to the models directory.
    pub fn local_path(&self, location: &str) -> Result<PathBuf, ModelError> {
        let given = PathBuf::from(location);
        if given.exists() {
            return Ok(given);
        }
        if given.is_relative() {
            let in_models_dir = self.models_dir.join(&given);
            if in_models_dir.exists() {
                return Ok(in_models_dir);
            }
        }
        Err(ModelError::NotFound(given))
    }

    async fn fetch(&self, url: &str, expected_hash: Option<&str>) -> Result<PathBuf, ModelError> {
        let file_name = url
            .split(['?', '#'])
            .next()
            .and_then(|base| base.rsplit('/').next())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ModelError::InvalidLocation(url.to_string()))?;
        let path = self.models_dir.join(file_name);

        let _lock = self.download_lock.lock().await;

        if path.exists() {
            match expected_hash {
                Some(expected) if !self.verify_file(&path, expected)? => {
                    log::warn!("Cached file {:?} failed verification, downloading again", path);
                }
                _ => {
                    log::info!("Using cached artefact {:?}", path);
                    return Ok(path);
                }
            }
        }

        self.download_and_verify_file(url, &path, expected_hash).await?;
        Ok(path)
    }

    pub fn verify_file(&self, path: &Path, expected_hash: &str) -> Result<bool, ModelError> {
        log::info!("Verifying file: {:?}", path);
        let hash = compute_sha256(path)?;
        log::debug!("Calculated hash: {}", hash);
        log::debug!("Expected hash:   {}", expected_hash);
        Ok(hash == normalise_hex(expected_hash))
    }

    async fn download_and_verify_file(
        &self,
        url: &str,
        path: &Path,
        expected_hash: Option<&str>,
    ) -> Result<(), ModelError> {
        log::info!("Downloading {} to {:?}", url, path);
        let response = reqwest::get(url).await?;
        if !response.status().is_success() {
            return Err(ModelError::BadStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let bytes = response.bytes().await?;
        log::info!("Downloaded {} bytes", bytes.len());

        if let Some(expected) = expected_hash {
            let mut hasher = Sha256::new();
            hasher.update(&bytes);
            let hash = format!("{:x}", hasher.finalize());
            if hash != normalise_hex(expected) {
                log::error!("Hash mismatch for {}: expected {}, got {}", url, expected, hash);
                return Err(ModelError::HashMismatch {
                    path: path.to_path_buf(),
                    expected: normalise_hex(expected),
                    actual: hash,
                });
            }
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write next to the target first so a crash never leaves a truncated artefact
        let partial = path.with_extension("part");
        fs::write(&partial, &bytes)?;
        fs::rename(&partial, path)?;

        log::info!("Artefact stored at {:?}", path);
        Ok(())
    }
}

fn is_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Computes the lowercase hex SHA-256 digest of a file.
pub fn compute_sha256(path: &Path) -> Result<String, ModelError> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

fn normalise_hex(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // SHA-256 of the bytes "hello\n"
    const HELLO_SHA256: &str = "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03";

    #[test]
    fn test_default_models_dir() {
        env::set_var("GLOSSCLASS_MODELS", "/tmp/test-glossclass");
        let path = ModelManager::get_default_models_dir();
        assert_eq!(path, PathBuf::from("/tmp/test-glossclass"));
        env::remove_var("GLOSSCLASS_MODELS");

        let path = ModelManager::get_default_models_dir();
        assert!(path.to_str().unwrap().contains("glossclass"));
    }

    #[test]
    fn test_compute_sha256() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(b"hello\n")?;
        assert_eq!(compute_sha256(file.path())?, HELLO_SHA256);
        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_local_with_checksum() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let manager = ModelManager::new(dir.path())?;
        fs::write(dir.path().join("classes.txt"), "hello\n")?;

        // Relative locations fall back to the models directory
        let path = manager.resolve("classes.txt", Some(&HELLO_SHA256.to_uppercase())).await?;
        assert_eq!(path, dir.path().join("classes.txt"));

        let result = manager.resolve("classes.txt", Some("deadbeef")).await;
        assert!(matches!(result, Err(ModelError::HashMismatch { .. })));
        Ok(())
    }

    #[test]
    fn test_resolve_missing_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let manager = ModelManager::new(dir.path())?;
        let result = tokio_test::block_on(manager.resolve("does-not-exist.onnx", None));
        assert!(matches!(result, Err(ModelError::NotFound(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_cached_download_is_reused() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let manager = ModelManager::new(dir.path())?;
        fs::write(dir.path().join("han.onnx"), "hello\n")?;

        // Never touches the network because the cached copy verifies
        let path = manager
            .resolve("https://models.invalid/releases/han.onnx?download=1", Some(HELLO_SHA256))
            .await?;
        assert_eq!(path, dir.path().join("han.onnx"));
        Ok(())
    }
}
