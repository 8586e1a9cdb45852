use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::constants::{
    DETECTION_MODEL_NAME, DETECTION_MODEL_URL, EMBEDDING_MODEL_NAME, EMBEDDING_MODEL_URL,
};

/// Environment variable that overrides the model cache directory.
pub const MODEL_DIR_ENV: &str = "BLURFACES_MODEL_DIR";

const DOWNLOAD_CHUNK: usize = 1024 * 1024;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("failed to create model directory {path}: {source}")]
    CacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
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
    #[error("could not determine a model cache directory")]
    NoCacheDir,
}

/// A downloadable model file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModelSpec {
    pub file_name: &'static str,
    pub url: &'static str,
}

pub const DETECTION_MODEL: ModelSpec = ModelSpec {
    file_name: DETECTION_MODEL_NAME,
    url: DETECTION_MODEL_URL,
};

pub const EMBEDDING_MODEL: ModelSpec = ModelSpec {
    file_name: EMBEDDING_MODEL_NAME,
    url: EMBEDDING_MODEL_URL,
};

/// Progress callback: `(bytes_downloaded, total_bytes)`, where `total_bytes`
/// is 0 when the server sends no Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Finds a model on disk, downloading it into the cache on first use.
///
/// Looks in the cache directory, then `bundled_dir`, then downloads.
pub fn resolve(
    model: ModelSpec,
    bundled_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let cache_dir = model_cache_dir()?;
    if let Some(found) = find_existing(model, &cache_dir, bundled_dir) {
        log::debug!("Model {} found at {}", model.file_name, found.display());
        return Ok(found);
    }

    fs::create_dir_all(&cache_dir).map_err(|source| ModelResolveError::CacheDir {
        path: cache_dir.clone(),
        source,
    })?;
    let dest = cache_dir.join(model.file_name);
    log::info!("Downloading {} to {}", model.url, dest.display());
    download(model.url, &dest, progress)?;
    Ok(dest)
}

fn find_existing(model: ModelSpec, cache_dir: &Path, bundled_dir: Option<&Path>) -> Option<PathBuf> {
    std::iter::once(cache_dir)
        .chain(bundled_dir)
        .map(|dir| dir.join(model.file_name))
        .find(|path| path.is_file())
}

/// Model cache directory: `$BLURFACES_MODEL_DIR` when set, otherwise
/// `<platform cache dir>/BlurFaces/models`.
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    if let Some(dir) = std::env::var_os(MODEL_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    dirs::cache_dir()
        .map(|d| d.join("BlurFaces").join("models"))
        .ok_or(ModelResolveError::NoCacheDir)
}

/// Streams `url` into `dest` through a `.part` file that is renamed only
/// once the body has been fully written.
fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let part = dest.with_extension("part");
    let result = stream_to(url, &part, progress).and_then(|()| {
        fs::rename(&part, dest).map_err(|source| ModelResolveError::Write {
            path: dest.to_path_buf(),
            source,
        })
    });
    if result.is_err() {
        let _ = fs::remove_file(&part);
    }
    result
}

fn stream_to(url: &str, part: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|source| ModelResolveError::Download {
            url: url.to_string(),
            source,
        })?;

    let write_err = |source: std::io::Error| ModelResolveError::Write {
        path: part.to_path_buf(),
        source,
    };

    let total = response.content_length().unwrap_or(0);
    let mut file = fs::File::create(part).map_err(write_err)?;
    let mut buf = vec![0u8; DOWNLOAD_CHUNK];
    let mut downloaded: u64 = 0;
    loop {
        let n = response.read(&mut buf).map_err(write_err)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err)?;
        downloaded += n as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }
    file.flush().map_err(write_err)
}
