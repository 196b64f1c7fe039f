//! Streaming download of input media into request-scoped files.

use std::path::Path;

use futures::StreamExt;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::debug;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to download file: {0}")]
    Request(#[from] reqwest::Error),
    #[error("failed to store downloaded file: {0}")]
    Io(#[from] std::io::Error),
}

/// Download `url` into `dest`, streaming chunks straight to disk. Fails on
/// any non-success status and leaves no file behind on error.
pub async fn download(client: &reqwest::Client, url: &str, dest: &Path) -> Result<(), FetchError> {
    let response = client.get(url).send().await?.error_for_status()?;

    let mut file = tokio::fs::File::create(dest).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(error) => {
                let _ = tokio::fs::remove_file(dest).await;
                return Err(error.into());
            }
        };
        written += chunk.len() as u64;
        if let Err(error) = file.write_all(&chunk).await {
            let _ = tokio::fs::remove_file(dest).await;
            return Err(error.into());
        }
    }

    file.flush().await?;
    debug!(url, ?dest, written, "Downloaded input file");
    Ok(())
}
