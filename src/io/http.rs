use reqwest::Client;
use std::time::Duration;

use super::MemoryReader;
use crate::logger::Logger;
use crate::warn;
use anyhow::{Result, bail};

const MAX_RETRY: u32 = 10;

/// Download a remote package into memory.
///
/// Timeouts and connection failures are retried with a linear backoff;
/// any other failure, or a non-success status, aborts.
pub async fn fetch_remote(url: &str, log: &Logger) -> Result<MemoryReader> {
    let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
    let mut retry_count = 0;

    loop {
        match client.get(url).send().await {
            Ok(resp) => {
                if !resp.status().is_success() {
                    bail!("HTTP request failed with status: {}", resp.status());
                }
                let bytes = resp.bytes().await?;
                return Ok(MemoryReader::new(bytes.to_vec()));
            }
            Err(e) if e.is_timeout() || e.is_connect() => {
                retry_count += 1;
                if retry_count >= MAX_RETRY {
                    bail!("Max retries exceeded fetching {url}");
                }
                warn!(log, "fetch"; "connection error, retry {}/{}: {}", retry_count, MAX_RETRY, e);
                tokio::time::sleep(Duration::from_millis(500 * retry_count as u64)).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}
