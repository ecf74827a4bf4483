//! Engine configuration
//!
//! Limits, fee schedule and quorum counting rules. Every field has a default,
//! so a config file only needs to name what it overrides.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Default upper bound on a keygroup's lifetime, in hours
pub const DEFAULT_MAX_LIFETIME_HOURS: i64 = 72;

/// Hard ceiling on `max_lifetime_hours` (100 years), far inside the date range
pub const LIFETIME_HOURS_CEILING: i64 = 24 * 365 * 100;

/// Default maximum number of keygroup members
pub const DEFAULT_MAX_KEYGROUP_SIZE: usize = 15;

/// Default base fee per registration slot (keygroup members + owner)
pub const DEFAULT_MULTISIG_BASE_FEE: u64 = 500_000_000;

/// Default fee charged for an executed transfer
pub const DEFAULT_TRANSFER_FEE: u64 = 10_000_000;

/// Default sweeper period
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 10;

/// Default number of resolved transactions remembered by the pool
pub const DEFAULT_RESOLVED_HISTORY: usize = 1024;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Fees charged by the ledger when a pending transaction executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSchedule {
    pub multisig_base_fee: u64,
    pub transfer_fee: u64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            multisig_base_fee: DEFAULT_MULTISIG_BASE_FEE,
            transfer_fee: DEFAULT_TRANSFER_FEE,
        }
    }
}

impl FeeSchedule {
    /// Registration fee: one base fee per keygroup member plus one for the owner
    pub fn registration_fee(&self, keygroup_size: usize) -> u64 {
        self.multisig_base_fee
            .saturating_mul(keygroup_size as u64 + 1)
    }
}

/// How many keygroup signatures a registration needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationQuorum {
    /// `min` signatures from the proposed keygroup
    #[default]
    Threshold,
    /// Every proposed member must sign
    AllMembers,
}

/// Counting rules that decide `required_min` for new pending transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct QuorumRules {
    pub registration: RegistrationQuorum,
    /// The initiating send counts as one approval, so a transfer needs
    /// `min - 1` co-signatures (never fewer than one).
    pub sender_counts_toward_min: bool,
}

impl QuorumRules {
    pub fn registration_min(&self, min: usize, keygroup_size: usize) -> usize {
        match self.registration {
            RegistrationQuorum::Threshold => min,
            RegistrationQuorum::AllMembers => keygroup_size,
        }
    }

    pub fn transfer_min(&self, account_min: usize) -> usize {
        if self.sender_counts_toward_min {
            account_min.saturating_sub(1).max(1)
        } else {
            account_min
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_lifetime_hours: i64,
    pub max_keygroup_size: usize,
    pub fees: FeeSchedule,
    pub quorum: QuorumRules,
    pub sweep_interval_secs: u64,
    pub resolved_history_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_lifetime_hours: DEFAULT_MAX_LIFETIME_HOURS,
            max_keygroup_size: DEFAULT_MAX_KEYGROUP_SIZE,
            fees: FeeSchedule::default(),
            quorum: QuorumRules::default(),
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            resolved_history_capacity: DEFAULT_RESOLVED_HISTORY,
        }
    }
}

impl EngineConfig {
    /// Load a JSON config file and validate it
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_lifetime_hours < 1 || self.max_lifetime_hours > LIFETIME_HOURS_CEILING {
            return Err(ConfigError::Invalid(format!(
                "max_lifetime_hours must be between 1 and {}",
                LIFETIME_HOURS_CEILING
            )));
        }
        if self.max_keygroup_size < 1 {
            return Err(ConfigError::Invalid(
                "max_keygroup_size must be at least 1".to_string(),
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sweep_interval_secs must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_registration_fee() {
        let fees = FeeSchedule {
            multisig_base_fee: 5,
            transfer_fee: 1,
        };
        assert_eq!(fees.registration_fee(3), 20);
        assert_eq!(fees.registration_fee(0), 5);
    }

    #[test]
    fn test_quorum_rules() {
        let default = QuorumRules::default();
        assert_eq!(default.registration_min(3, 5), 3);
        assert_eq!(default.transfer_min(3), 3);

        let legacy = QuorumRules {
            registration: RegistrationQuorum::AllMembers,
            sender_counts_toward_min: true,
        };
        assert_eq!(legacy.registration_min(3, 5), 5);
        assert_eq!(legacy.transfer_min(3), 2);
        assert_eq!(legacy.transfer_min(1), 1);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"max_lifetime_hours": 24, "quorum": {{"registration": "all_members"}}}}"#
        )
        .unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.max_lifetime_hours, 24);
        assert_eq!(config.quorum.registration, RegistrationQuorum::AllMembers);
        assert!(!config.quorum.sender_counts_toward_min);
        assert_eq!(config.fees, FeeSchedule::default());
        assert_eq!(config.max_keygroup_size, DEFAULT_MAX_KEYGROUP_SIZE);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_lifetime_hours": 0}}"#).unwrap();
        assert!(matches!(
            EngineConfig::from_file(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_lifetime_ceiling() {
        let mut config = EngineConfig {
            max_lifetime_hours: LIFETIME_HOURS_CEILING,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_ok());

        config.max_lifetime_hours = i64::from(u32::MAX);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
