//! Sensor Stream
//!
//! Client for the WebSocket sample stream of an ESP32 sensor device.
//! A background reader decodes JSON frames into samples and a dispatch loop
//! prints them until the stream ends, fails, or the user interrupts.
//! The device's REST channel API is available through [`device`].

pub mod config;
pub mod device;
pub mod dispatch;
pub mod sample;
pub mod stream;

pub use dispatch::{dispatch, CsvSink, Exit, LogSink, OutputFormat, SampleSink};
pub use sample::{ChannelSample, RawSample, Sample, Schema};
pub use stream::{stream_samples, Closer, SampleStream, StreamConfig, StreamError};
