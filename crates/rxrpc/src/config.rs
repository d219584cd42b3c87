//! Tunables spec.md §6 calls out as implementation-defined constants,
//! gathered into one `CallConfig` the way `sauoro-amethyst`'s `config.rs`
//! gathers the demo server's settings — except this crate has no process,
//! so there is no file-loading `handle()`/`save()` here; the binary that
//! embeds this crate deserializes a `[call]` table into this struct with
//! the same `toml`/`serde` stack the teacher uses for its own config.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallConfig {
    /// Receive window size; must be `<= sack_size`.
    pub rx_winsize: u32,
    /// Size of the SACK bitmap; must be a power of two and `>= rx_winsize`.
    pub sack_size: u32,
    /// Congestion-window ceiling.
    pub tx_max_window: u32,
    /// Segment MSS used to pick the initial slow-start `cwnd`.
    pub tx_smss: u32,
    /// Payload bytes per jumbo subpacket.
    pub jumbo_datalen: u32,
    /// Number of outstanding RTT-probe slots.
    pub rtt_slots: u32,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            rx_winsize: 32,
            sack_size: crate::ack_window::SACK_SIZE as u32,
            tx_max_window: crate::congestion::TX_MAX_WINDOW,
            tx_smss: crate::congestion::TX_SMSS,
            jumbo_datalen: crate::wire::JUMBO_DATALEN as u32,
            rtt_slots: crate::rtt::RTT_SLOTS as u32,
        }
    }
}

impl CallConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.sack_size.is_power_of_two() {
            return Err(ConfigError::Validation(format!(
                "sack_size must be a power of two, got {}",
                self.sack_size
            )));
        }
        if self.sack_size < self.rx_winsize {
            return Err(ConfigError::Validation(format!(
                "sack_size ({}) must be >= rx_winsize ({})",
                self.sack_size, self.rx_winsize
            )));
        }
        if self.rx_winsize == 0 {
            return Err(ConfigError::Validation(
                "rx_winsize must be greater than 0".to_string(),
            ));
        }
        if self.rtt_slots == 0 {
            return Err(ConfigError::Validation(
                "rtt_slots must be greater than 0".to_string(),
            ));
        }
        if self.tx_max_window == 0 {
            return Err(ConfigError::Validation(
                "tx_max_window must be greater than 0".to_string(),
            ));
        }
        if self.tx_smss == 0 {
            return Err(ConfigError::Validation(
                "tx_smss must be greater than 0".to_string(),
            ));
        }
        if self.jumbo_datalen == 0 {
            return Err(ConfigError::Validation(
                "jumbo_datalen must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(CallConfig::default().validate().is_ok());
    }

    #[test]
    fn non_power_of_two_sack_size_is_rejected() {
        let mut cfg = CallConfig::default();
        cfg.sack_size = 100;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn sack_size_smaller_than_rx_winsize_is_rejected() {
        let mut cfg = CallConfig::default();
        cfg.rx_winsize = 512;
        cfg.sack_size = 256;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_rtt_slots_is_rejected() {
        let mut cfg = CallConfig::default();
        cfg.rtt_slots = 0;
        assert!(cfg.validate().is_err());
    }
}
