//! Sample Module
//!
//! Typed sensor readings as they arrive from the device, one JSON object
//! per WebSocket frame. Two record layouts exist: the multi-channel stream
//! (`channel`, `timestamp`, `value`) and the raw ADC stream (`timestamp`,
//! `value`).

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Frame decoding errors
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("invalid sample JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reading from the multi-channel stream
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelSample {
    pub channel: u16,
    /// Device-relative time (milliseconds since boot), wraps at `u32::MAX`.
    pub timestamp: u32,
    pub value: f32,
}

/// Reading from the raw ADC stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSample {
    pub timestamp: u32,
    pub value: u32,
}

/// A decoded sample of either layout
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    Channel(ChannelSample),
    Raw(RawSample),
}

impl Sample {
    pub fn timestamp(&self) -> u32 {
        match self {
            Sample::Channel(s) => s.timestamp,
            Sample::Raw(s) => s.timestamp,
        }
    }

    /// Fixed-format line, e.g. `2, 1000, 3.500000`.
    pub fn to_csv_line(&self) -> String {
        match self {
            Sample::Channel(s) => format!("{}, {}, {:.6}", s.channel, s.timestamp, s.value),
            Sample::Raw(s) => format!("{}, {}", s.timestamp, s.value),
        }
    }
}

/// Which record layout a stream carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Schema {
    /// `{"channel": int, "timestamp": u32, "value": f32}`
    #[default]
    Channel,
    /// `{"timestamp": u32, "value": u32}`
    Raw,
}

impl Schema {
    /// Decode one frame payload into a sample of this schema.
    pub fn decode(&self, payload: &[u8]) -> Result<Sample, DecodeError> {
        let sample = match self {
            Schema::Channel => Sample::Channel(serde_json::from_slice(payload)?),
            Schema::Raw => Sample::Raw(serde_json::from_slice(payload)?),
        };
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_channel_sample() {
        let sample = Schema::Channel
            .decode(br#"{"channel":2,"timestamp":1000,"value":3.5}"#)
            .unwrap();
        assert_eq!(
            sample,
            Sample::Channel(ChannelSample {
                channel: 2,
                timestamp: 1000,
                value: 3.5
            })
        );
        assert_eq!(sample.to_csv_line(), "2, 1000, 3.500000");
    }

    #[test]
    fn test_decode_raw_sample() {
        let sample = Schema::Raw.decode(br#"{"timestamp":42,"value":7}"#).unwrap();
        assert_eq!(sample, Sample::Raw(RawSample { timestamp: 42, value: 7 }));
        assert_eq!(sample.timestamp(), 42);
        assert_eq!(sample.to_csv_line(), "42, 7");
    }

    #[test]
    fn test_timestamp_accepts_full_u32_range() {
        let sample = Schema::Raw
            .decode(br#"{"timestamp":4294967295,"value":0}"#)
            .unwrap();
        assert_eq!(sample.timestamp(), u32::MAX);
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let sample = Schema::Raw
            .decode(br#"{"timestamp":1,"value":2,"channel":0}"#)
            .unwrap();
        assert_eq!(sample, Sample::Raw(RawSample { timestamp: 1, value: 2 }));
    }

    #[test]
    fn test_encoded_samples_decode_unchanged() {
        let channel_samples = [
            ChannelSample { channel: 0, timestamp: 0, value: 0.0 },
            ChannelSample { channel: 3, timestamp: 1234, value: 0.1 },
            ChannelSample { channel: 1, timestamp: u32::MAX, value: -273.15 },
            ChannelSample { channel: u16::MAX, timestamp: 7, value: f32::MAX },
            ChannelSample { channel: 2, timestamp: 99, value: f32::MIN_POSITIVE },
        ];
        for sample in channel_samples {
            let frame = serde_json::to_vec(&sample).unwrap();
            assert_eq!(Schema::Channel.decode(&frame).unwrap(), Sample::Channel(sample));
        }

        let raw_samples = [
            RawSample { timestamp: 0, value: 0 },
            RawSample { timestamp: u32::MAX, value: 4095 },
            RawSample { timestamp: 42, value: u32::MAX },
        ];
        for sample in raw_samples {
            let frame = serde_json::to_vec(&sample).unwrap();
            assert_eq!(Schema::Raw.decode(&frame).unwrap(), Sample::Raw(sample));
        }
    }

    #[test]
    fn test_malformed_frames_are_rejected() {
        let frames: [&[u8]; 6] = [
            b"not json",
            br#"{"channel":2,"timestamp":1000}"#,
            br#"{"channel":2,"timestamp":"soon","value":1.0}"#,
            br#"{"channel":-1,"timestamp":1,"value":1.0}"#,
            br#"{"channel":1,"timestamp":4294967296,"value":1.0}"#,
            b"",
        ];
        for frame in frames {
            assert!(Schema::Channel.decode(frame).is_err(), "{:?}", frame);
        }

        // Floats are not valid raw ADC counts.
        assert!(Schema::Raw.decode(br#"{"timestamp":1,"value":1.5}"#).is_err());
    }

    #[test]
    fn test_channel_frame_does_not_fit_raw_schema() {
        let err = Schema::Raw
            .decode(br#"{"channel":2,"timestamp":1000,"value":3.5}"#)
            .unwrap_err();
        assert!(err.to_string().starts_with("invalid sample JSON"));
    }
}
