//! Engine settings.
//!
//! [`EngineConfig`] is plain data with serde support so the configuration
//! layer can embed it as the `[engine]` table of a setup file. Every field
//! has a default; a file only needs to name what it changes.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SetupError;

/// Requested orchestration strategy. See [`crate::select_mixmode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MixmodeRequest {
    /// Pick from the topology.
    #[default]
    Auto,
    /// Single chain, no mixing. Downgraded to normal if the topology
    /// does not allow it.
    Simple,
    /// Single-threaded mixing.
    Normal,
    /// Chain processing on a submix worker thread.
    Multithreaded,
}

impl fmt::Display for MixmodeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Simple => "simple",
            Self::Normal => "normal",
            Self::Multithreaded => "multithreaded",
        })
    }
}

impl FromStr for MixmodeRequest {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "simple" => Ok(Self::Simple),
            "normal" => Ok(Self::Normal),
            "multithreaded" | "mt" => Ok(Self::Multithreaded),
            other => Err(format!("unknown mixmode '{other}'")),
        }
    }
}

/// Settings fixed for the lifetime of an engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Frames per cycle.
    pub buffersize: usize,
    /// Engine sample rate in Hz.
    pub sample_rate: u32,
    /// Requested mixmode.
    pub mixmode: MixmodeRequest,
    /// Keep polling the control queue instead of running start to finish.
    pub interactive: bool,
    /// Restart from the beginning when the length bound is reached.
    pub looping: bool,
    /// Processing length in seconds. With `looping` and no length, the
    /// longest non-realtime input is used.
    pub length: Option<f64>,
    /// Auto mode picks multithreaded from this many chains up.
    pub multithread_min_chains: usize,
    /// Auto mode picks multithreaded only from this buffersize up.
    pub multithread_min_buffersize: usize,
    /// Longest wait for the submix worker to return a chain.
    pub handshake_timeout_ms: u64,
    /// How long an idle interactive engine waits on the queue per poll.
    pub poll_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffersize: 1024,
            sample_rate: 48_000,
            mixmode: MixmodeRequest::Auto,
            interactive: false,
            looping: false,
            length: None,
            multithread_min_chains: 8,
            multithread_min_buffersize: 256,
            handshake_timeout_ms: 2_000,
            poll_interval_ms: 100,
        }
    }
}

impl EngineConfig {
    /// Rejects values the engine cannot run with.
    pub fn validate(&self) -> Result<(), SetupError> {
        if self.buffersize == 0 {
            return Err(SetupError::ZeroBuffersize);
        }
        if self.sample_rate == 0 {
            return Err(SetupError::ZeroSampleRate);
        }
        if self.handshake_timeout_ms == 0 {
            return Err(SetupError::ZeroInterval("handshake_timeout_ms"));
        }
        if self.poll_interval_ms == 0 {
            return Err(SetupError::ZeroInterval("poll_interval_ms"));
        }
        if let Some(length) = self.length
            && (!length.is_finite() || length < 0.0)
        {
            return Err(SetupError::InvalidLength(length));
        }
        Ok(())
    }

    /// Converts seconds at the engine rate to frames.
    pub fn seconds_to_frames(&self, seconds: f64) -> u64 {
        (seconds.max(0.0) * f64::from(self.sample_rate)).round() as u64
    }

    /// Converts frames at the engine rate to seconds.
    pub fn frames_to_seconds(&self, frames: u64) -> f64 {
        frames as f64 / f64::from(self.sample_rate)
    }

    /// Configured length in frames.
    pub fn length_frames(&self) -> Option<u64> {
        self.length.map(|secs| self.seconds_to_frames(secs))
    }

    /// Handshake bound as a [`Duration`].
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Idle poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_values_are_rejected() {
        let cfg = EngineConfig {
            buffersize: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(SetupError::ZeroBuffersize)));

        let cfg = EngineConfig {
            sample_rate: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(SetupError::ZeroSampleRate)));

        let cfg = EngineConfig {
            length: Some(f64::NAN),
            ..EngineConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(SetupError::InvalidLength(_))));
    }

    #[test]
    fn frame_conversions_use_engine_rate() {
        let cfg = EngineConfig {
            sample_rate: 44_100,
            length: Some(2.0),
            ..EngineConfig::default()
        };
        assert_eq!(cfg.length_frames(), Some(88_200));
        assert_eq!(cfg.frames_to_seconds(22_050), 0.5);
    }

    #[test]
    fn mixmode_names_parse() {
        assert_eq!("MT".parse(), Ok(MixmodeRequest::Multithreaded));
        assert_eq!("normal".parse(), Ok(MixmodeRequest::Normal));
        assert!("fast".parse::<MixmodeRequest>().is_err());
        assert_eq!(MixmodeRequest::Simple.to_string(), "simple");
    }
}
