use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use crate::collector::Collector;
use crate::error::Error;
use crate::models::Setup;
use crate::stats::RequestResult;

/// One concrete request the loop issues repeatedly.
#[derive(Debug, Clone)]
pub struct Target {
    pub method: String,
    pub url: String,
    pub body: Vec<u8>,
    pub headers: HashMap<String, String>,
}

impl From<&Setup> for Target {
    fn from(setup: &Setup) -> Self {
        Self {
            method: setup.method.clone(),
            url: setup.url.clone(),
            body: setup.body.clone(),
            headers: setup.headers.clone(),
        }
    }
}

/// Drives one run's paced request generation.
///
/// Spawns one request task per tick until the duration elapses or the
/// token is cancelled, and never returns before every spawned task has
/// pushed its result into the collector's channel. Request tasks do not
/// observe the token: cancellation stops scheduling promptly while
/// in-flight requests finish within the client's request timeout.
///
/// Missed ticks are skipped, never queued, so a saturated host degrades
/// to its own capacity instead of bursting to catch up.
pub async fn run_attack(
    cancel: CancellationToken,
    run_id: Uuid,
    client: Client,
    collector: &Collector,
    setup: &Setup,
) -> Result<(), Error> {
    if setup.url.is_empty() {
        return Err(Error::Validation("url cannot be empty".to_string()));
    }
    url::Url::parse(&setup.url).map_err(|err| Error::Validation(format!("invalid url: {err}")))?;
    if setup.rps == 0 {
        return Err(Error::Validation("rps must be greater than 0".to_string()));
    }

    let sink = collector.start_run(run_id);
    let target = Arc::new(Target::from(setup));

    // A zero-length interval panics the timer; clamp to 1ns, which
    // issues requests back to back.
    let mut tick = Duration::from_secs(1) / setup.rps;
    if tick.is_zero() {
        tick = Duration::from_nanos(1);
    }
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let stop_at = Instant::now() + setup.duration;
    let tracker = TaskTracker::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if Instant::now() > stop_at {
                    break;
                }

                let client = client.clone();
                let sink = sink.clone();
                let target = Arc::clone(&target);
                tracker.spawn(async move {
                    let result = send(&client, &target).await;
                    let _ = sink.send(result).await;
                });
            }
        }
    }

    tracker.close();
    tracker.wait().await;
    Ok(())
}

/// Issues a single request and reports exactly one result.
///
/// Latency covers the send up to the response headers; the body is
/// drained fully afterwards to count its bytes and keep the connection
/// reusable.
pub(crate) async fn send(client: &Client, target: &Target) -> RequestResult {
    let timestamp = Utc::now();

    let method = match Method::from_bytes(target.method.as_bytes()) {
        Ok(method) => method,
        Err(err) => {
            return RequestResult {
                status_code: 0,
                latency: Duration::ZERO,
                bytes_read: 0,
                error: Some(format!("create request: {err}")),
                timestamp,
            }
        }
    };

    let mut request = client.request(method, target.url.as_str());
    let has_content_type = target
        .headers
        .keys()
        .any(|name| name.eq_ignore_ascii_case("content-type"));
    if !target.body.is_empty() && !has_content_type {
        request = request.header(CONTENT_TYPE, "application/octet-stream");
    }
    for (name, value) in &target.headers {
        request = request.header(name.as_str(), value.as_str());
    }
    if !target.body.is_empty() {
        request = request.body(target.body.clone());
    }

    let start = std::time::Instant::now();
    let mut response = match request.send().await {
        Ok(response) => response,
        Err(err) => {
            return RequestResult {
                status_code: 0,
                latency: start.elapsed(),
                bytes_read: 0,
                error: Some(format!("do request: {err}")),
                timestamp,
            }
        }
    };
    let latency = start.elapsed();
    let status_code = response.status().as_u16();

    let mut bytes_read = 0u64;
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => bytes_read += chunk.len() as u64,
            Ok(None) => break,
            Err(err) => {
                return RequestResult {
                    status_code,
                    latency,
                    bytes_read: 0,
                    error: Some(format!("read body: {err}")),
                    timestamp,
                }
            }
        }
    }

    RequestResult {
        status_code,
        latency,
        bytes_read,
        error: None,
        timestamp,
    }
}
