//! Device Module
//!
//! HTTP client for the sensor device's channel endpoints:
//! `GET/POST /channel/<n>/config` to inspect or change sampling, and
//! `GET /channel/<n>` to drain the samples buffered on the device.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sample::RawSample;

/// Number of ADC channels the device exposes
pub const MAX_CHANNELS: u8 = 4;

/// Largest ring buffer the device accepts per channel
pub const MAX_BUFFER_SIZE: u16 = 100;

/// Longest interval in seconds; the device keeps it in milliseconds as a `u32`.
pub const MAX_SAMPLING_INTERVAL: u32 = u32::MAX / 1000;

/// Device API errors
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),
    #[error("device returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("channel {0} out of range (device has {} channels)", MAX_CHANNELS)]
    InvalidChannel(u8),
    #[error("buffer size {0} out of range (1..={})", MAX_BUFFER_SIZE)]
    InvalidBufferSize(u16),
    #[error("sampling interval {0}s out of range (max {}s)", MAX_SAMPLING_INTERVAL)]
    InvalidInterval(u32),
    #[error("invalid device URL")]
    InvalidUrl(#[from] url::ParseError),
}

/// Sampling settings of one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelConfig {
    /// Seconds between samples
    pub sampling_interval: u32,
    pub buffer_size: u16,
    pub sampling_enabled: bool,
}

impl ChannelConfig {
    pub fn validate(&self) -> Result<(), DeviceError> {
        if self.buffer_size == 0 || self.buffer_size > MAX_BUFFER_SIZE {
            return Err(DeviceError::InvalidBufferSize(self.buffer_size));
        }
        if self.sampling_interval > MAX_SAMPLING_INTERVAL {
            return Err(DeviceError::InvalidInterval(self.sampling_interval));
        }
        Ok(())
    }
}

/// Samples drained from a channel buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelData {
    pub data: Vec<RawSample>,
    /// Set when the device dropped samples since the previous drain.
    pub overflow: bool,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: String,
}

/// Client for one device
#[derive(Debug, Clone)]
pub struct DeviceClient {
    base_url: url::Url,
    client: Client,
}

impl DeviceClient {
    pub fn new(base_url: &str) -> Result<Self, DeviceError> {
        let base_url = url::Url::parse(base_url)?;

        // The device serves one request at a time; keep a single idle connection.
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(1)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(DeviceClient { base_url, client })
    }

    /// Read the configuration of `channel`.
    pub async fn get_config(&self, channel: u8) -> Result<ChannelConfig, DeviceError> {
        let url = self.channel_url(channel, "/config")?;
        tracing::debug!(%url, "fetching channel config");
        let response = self.client.get(url).send().await?;
        Ok(check(response).await?.json().await?)
    }

    /// Replace the configuration of `channel`. The device resets the
    /// channel's buffer when it accepts a new configuration.
    pub async fn set_config(&self, channel: u8, config: &ChannelConfig) -> Result<(), DeviceError> {
        config.validate()?;
        let url = self.channel_url(channel, "/config")?;
        tracing::debug!(%url, ?config, "updating channel config");
        let response = self.client.post(url).json(config).send().await?;
        check(response).await?;
        Ok(())
    }

    /// Fetch and clear the samples buffered for `channel`.
    pub async fn drain(&self, channel: u8) -> Result<ChannelData, DeviceError> {
        let url = self.channel_url(channel, "")?;
        let response = self.client.get(url).send().await?;
        let data: ChannelData = check(response).await?.json().await?;
        if data.overflow {
            tracing::warn!(channel, "device buffer overflowed, samples were lost");
        }
        Ok(data)
    }

    fn channel_url(&self, channel: u8, suffix: &str) -> Result<url::Url, DeviceError> {
        if channel >= MAX_CHANNELS {
            return Err(DeviceError::InvalidChannel(channel));
        }
        Ok(self.base_url.join(&format!("/channel/{}{}", channel, suffix))?)
    }
}

/// Turn a non-2xx response into `DeviceError::Api`.
async fn check(response: Response) -> Result<Response, DeviceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await?;
    let message = serde_json::from_str::<ApiError>(&body)
        .map(|e| e.error)
        .unwrap_or(body);
    Err(DeviceError::Api {
        status: status.as_u16(),
        message,
    })
}
