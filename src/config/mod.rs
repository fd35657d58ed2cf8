//! Config Module
//!
//! Command line for the stream client and the device subcommands, and
//! construction of the WebSocket and HTTP targets from it.

use clap::{Args, Parser, Subcommand};
use thiserror::Error;
use url::Url;

use crate::dispatch::OutputFormat;
use crate::sample::Schema;
use crate::stream::{StreamConfig, DEFAULT_BUFFER};

pub const DEFAULT_HOST: &str = "192.168.1.66";
pub const DEFAULT_WS_PORT: u16 = 81;
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid URL {url}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported scheme {0:?}, expected ws or wss")]
    UnsupportedScheme(String),
}

/// Stream samples from an ESP32 sensor over WebSocket
#[derive(Parser, Debug)]
#[command(name = "sensor-stream", version)]
pub struct Cli {
    /// Device host name or address
    #[arg(long, global = true, default_value = DEFAULT_HOST)]
    pub host: String,

    #[command(flatten)]
    pub stream: StreamArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Options of the default streaming mode
#[derive(Args, Debug)]
pub struct StreamArgs {
    /// WebSocket server port
    #[arg(long, default_value_t = DEFAULT_WS_PORT)]
    pub port: u16,

    /// Request path, e.g. /ws/channel/0
    #[arg(long, default_value = "")]
    pub path: String,

    /// Full WebSocket URL, overrides --host, --port and --path
    #[arg(long)]
    pub url: Option<String>,

    /// Frame layout sent by the device
    #[arg(long, value_enum, default_value_t = Schema::Channel)]
    pub schema: Schema,

    /// How samples are printed
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    pub output: OutputFormat,

    /// Samples held between reader and printer
    #[arg(long, default_value_t = DEFAULT_BUFFER)]
    pub buffer: usize,

    /// Exit on Ctrl-C without sending a close frame
    #[arg(long)]
    pub no_signals: bool,
}

/// Device REST operations
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the configuration of a channel
    Config {
        channel: u8,
        #[arg(long, default_value_t = DEFAULT_HTTP_PORT)]
        http_port: u16,
    },
    /// Change the sampling configuration of a channel
    Configure {
        channel: u8,
        /// Seconds between samples
        #[arg(long)]
        interval: u32,
        /// Ring buffer length on the device (1-100)
        #[arg(long)]
        buffer_size: u16,
        /// Configure the channel with sampling turned off
        #[arg(long)]
        disable: bool,
        #[arg(long, default_value_t = DEFAULT_HTTP_PORT)]
        http_port: u16,
    },
    /// Fetch and clear the samples buffered on the device
    Drain {
        channel: u8,
        #[arg(long, default_value_t = DEFAULT_HTTP_PORT)]
        http_port: u16,
    },
}

impl Cli {
    /// WebSocket target of the stream mode.
    pub fn stream_url(&self) -> Result<Url, ConfigError> {
        let raw = match &self.stream.url {
            Some(url) => url.clone(),
            None => {
                let path = &self.stream.path;
                let sep = if path.is_empty() || path.starts_with('/') { "" } else { "/" };
                format!("ws://{}:{}{}{}", self.host, self.stream.port, sep, path)
            }
        };

        let url = Url::parse(&raw).map_err(|source| ConfigError::InvalidUrl {
            url: raw.clone(),
            source,
        })?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(ConfigError::UnsupportedScheme(other.to_string())),
        }
    }

    pub fn stream_config(&self) -> Result<StreamConfig, ConfigError> {
        let url = self.stream_url()?;
        Ok(StreamConfig {
            url: url.into(),
            schema: self.stream.schema,
            buffer: self.stream.buffer,
        })
    }

    pub fn device_url(&self, http_port: u16) -> String {
        format!("http://{}:{}", self.host, http_port)
    }
}
