use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::APP_DIR_NAME;
use crate::shared::download::{stream_to_file, ProgressFn};

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Resolve a model file by name, checking cache locations before downloading.
///
/// Resolution order:
/// 1. User cache directory (platform-specific)
/// 2. Bundled path (for development / pre-packaged installs)
/// 3. Download from URL to cache
pub fn resolve(
    name: &str,
    url: &str,
    bundled_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    resolve_in(&model_cache_dir()?, name, url, bundled_dir, progress)
}

/// Same as [`resolve`] with an explicit cache directory.
pub fn resolve_in(
    cache_dir: &Path,
    name: &str,
    url: &str,
    bundled_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let cached_path = cache_dir.join(name);
    if cached_path.exists() {
        return Ok(cached_path);
    }

    if let Some(dir) = bundled_dir {
        let bundled_path = dir.join(name);
        if bundled_path.exists() {
            return Ok(bundled_path);
        }
    }

    fs::create_dir_all(cache_dir).map_err(ModelResolveError::CacheDir)?;
    log::info!("Downloading model {name} from {url}");
    download(url, &cached_path, progress)?;
    Ok(cached_path)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/FaceHunt/models/`
/// - Linux: `$XDG_CACHE_HOME/FaceHunt/models/` or `~/.cache/FaceHunt/models/`
/// - Windows: `%LOCALAPPDATA%/FaceHunt/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|d| d.join(APP_DIR_NAME).join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir()
            .map(|d| d.join(APP_DIR_NAME).join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| ModelResolveError::Download {
            url: url.to_string(),
            source: e,
        })?;

    stream_to_file(response, dest, progress.as_ref()).map_err(|e| ModelResolveError::Write {
        path: dest.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Route, TestServer};
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn model_server() -> TestServer {
        TestServer::start(HashMap::from([(
            "/model.onnx".to_string(),
            Route::ok("application/octet-stream", b"onnx weights"),
        )]))
    }

    #[test]
    fn test_resolve_prefers_cached_file() {
        let server = model_server();
        let cache = TempDir::new().unwrap();
        let cached = cache.path().join("model.onnx");
        fs::write(&cached, b"cached").unwrap();

        let path = resolve_in(
            cache.path(),
            "model.onnx",
            &server.url("/model.onnx"),
            None,
            None,
        )
        .unwrap();

        assert_eq!(path, cached);
        assert_eq!(server.gets(), 0);
    }

    #[test]
    fn test_resolve_finds_bundled_file() {
        let server = model_server();
        let cache = TempDir::new().unwrap();
        let bundled = TempDir::new().unwrap();
        let bundled_path = bundled.path().join("model.onnx");
        fs::write(&bundled_path, b"bundled").unwrap();

        let path = resolve_in(
            cache.path(),
            "model.onnx",
            &server.url("/model.onnx"),
            Some(bundled.path()),
            None,
        )
        .unwrap();

        assert_eq!(path, bundled_path);
        assert_eq!(server.gets(), 0);
    }

    #[test]
    fn test_resolve_downloads_into_cache() {
        let server = model_server();
        let cache = TempDir::new().unwrap();
        let cache_dir = cache.path().join("models");

        let path = resolve_in(
            &cache_dir,
            "model.onnx",
            &server.url("/model.onnx"),
            None,
            None,
        )
        .unwrap();

        assert_eq!(path, cache_dir.join("model.onnx"));
        assert_eq!(fs::read(&path).unwrap(), b"onnx weights");
        assert_eq!(server.gets(), 1);
    }

    #[test]
    fn test_model_cache_dir_returns_path() {
        let path = model_cache_dir().unwrap();
        assert!(path.to_string_lossy().contains(APP_DIR_NAME));
        assert!(path.to_string_lossy().contains("models"));
    }

    #[test]
    fn test_download_http_error_leaves_no_file() {
        let server = model_server();
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("model.onnx");

        let result = download(&server.url("/missing.onnx"), &dest, None);

        assert!(matches!(result, Err(ModelResolveError::Download { .. })));
        assert!(!dest.exists());
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
    }
}
