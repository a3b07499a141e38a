//! Startup readiness probe for the inference collaborators.
//!
//! The VAD, ASR, LLM and TTS services usually live in one inference process
//! that needs time to load its models. When `inference.health_url` is set the
//! gateway polls it before accepting devices; `voxgate check` runs only this
//! probe.
//!
//! ```text
//! $ INFERENCE_HEALTH_URL=http://127.0.0.1:8001/health voxgate check
//! ```

use std::time::Duration;

use anyhow::{Result, anyhow};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::InferenceConfig;

/// Delay between two health requests
pub const PROBE_INTERVAL: Duration = Duration::from_secs(1);

/// Wait for the configured inference health endpoint, if any.
pub async fn run(config: &InferenceConfig) -> Result<()> {
    let Some(url) = config.health_url.as_deref() else {
        info!("No inference health URL configured, skipping readiness probe");
        return Ok(());
    };
    wait_until_ready(
        url,
        Duration::from_secs(config.ready_timeout_seconds),
        PROBE_INTERVAL,
    )
    .await
}

/// Poll `url` with `GET` until it answers 2xx or `deadline` elapses.
pub async fn wait_until_ready(url: &str, deadline: Duration, interval: Duration) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(interval.max(Duration::from_secs(1)))
        .build()?;
    let started = Instant::now();
    let mut attempts = 0u32;

    info!("Waiting for inference service at {}", url);

    loop {
        attempts += 1;
        match client.get(url).send().await {
            Ok(response) if response.status().is_success() => {
                info!(
                    "Inference service ready after {} attempt(s) ({:?})",
                    attempts,
                    started.elapsed()
                );
                return Ok(());
            }
            Ok(response) => debug!("Health probe returned {}", response.status()),
            Err(e) => debug!("Health probe failed: {}", e),
        }

        if started.elapsed() + interval > deadline {
            return Err(anyhow!(
                "Inference service at {url} not ready after {attempts} attempt(s) within {deadline:?}"
            ));
        }
        tokio::time::sleep(interval).await;
    }
}
