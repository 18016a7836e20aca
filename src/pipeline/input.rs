//! Input resolution: turn a user-supplied path, URL or `-` into text.
//!
//! Text is read fully into memory. Anything that is not valid UTF-8 is
//! rejected up front so the pipeline never has to deal with lossy input.

use crate::error::Text2MdError;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

/// Input argument that means "read standard input".
pub const STDIN: &str = "-";

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Read the whole input as UTF-8 text.
///
/// `-` reads stdin, `http(s)://` downloads with a `timeout_secs` bound,
/// anything else is a local file path.
pub async fn read_input(input: &str, timeout_secs: u64) -> Result<String, Text2MdError> {
    if input == STDIN {
        read_stdin().await
    } else if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

async fn read_stdin() -> Result<String, Text2MdError> {
    let mut bytes = Vec::new();
    tokio::io::stdin()
        .read_to_end(&mut bytes)
        .await
        .map_err(|e| Text2MdError::InvalidInput {
            reason: format!("failed to read stdin: {e}"),
        })?;
    debug!("Read {} bytes from stdin", bytes.len());
    decode(bytes, "stdin")
}

async fn read_local(path_str: &str) -> Result<String, Text2MdError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Text2MdError::PermissionDenied { path });
        }
        Err(_) => return Err(Text2MdError::FileNotFound { path }),
    };

    debug!("Read {} bytes from {}", bytes.len(), path.display());
    decode(bytes, path_str)
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<String, Text2MdError> {
    info!("Downloading text from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Text2MdError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let map_send_err = |e: reqwest::Error| {
        if e.is_timeout() {
            Text2MdError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Text2MdError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(map_send_err)?;

    if !response.status().is_success() {
        return Err(Text2MdError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(map_send_err)?;
    info!("Downloaded {} bytes", bytes.len());
    decode(bytes.to_vec(), url)
}

fn decode(bytes: Vec<u8>, origin: &str) -> Result<String, Text2MdError> {
    String::from_utf8(bytes).map_err(|e| Text2MdError::InvalidInput {
        reason: format!("{origin} is not valid UTF-8 (byte {})", e.utf8_error().valid_up_to()),
    })
}
