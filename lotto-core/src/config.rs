use crate::error::{CoreError, Result};
use crate::types::Amount;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Smallest number on a ticket.
pub const MIN_NUMBER: u8 = 1;
/// Largest number on a ticket.
pub const MAX_NUMBER: u8 = 90;
/// Numbers drawn per round, and numbers per implicit ticket line.
pub const DRAWN_NUMBERS: usize = 6;
/// Prize tiers cover 2 through 6 matches.
pub const TIER_COUNT: usize = 5;
pub const MIN_WINNING_MATCHES: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotteryConfig {
    pub min_numbers: usize,
    pub max_numbers: usize,
    pub price_per_line: Amount,
    pub referral_commission_bps: u16,
    /// Share of the prize pool snapshot paid to each non-empty tier, indexed by
    /// `matches - 2`.
    pub tier_share_bps: [u16; TIER_COUNT],
    pub schedule: DrawSchedule,
}

/// Weekly drawing window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawSchedule {
    /// Start of the first window, measured from the Unix epoch.
    pub epoch_offset: Duration,
    pub period: Duration,
    pub window: Duration,
}

impl Default for DrawSchedule {
    fn default() -> Self {
        Self {
            // Saturday 1970-01-03 20:00:00 UTC
            epoch_offset: Duration::from_secs(244_800),
            period: Duration::from_secs(7 * 24 * 60 * 60),
            window: Duration::from_secs(4 * 60 * 60),
        }
    }
}

impl Default for LotteryConfig {
    fn default() -> Self {
        Self {
            min_numbers: 6,
            max_numbers: 8,
            price_per_line: Amount::from_units(10_000_000),
            referral_commission_bps: 1_000,
            tier_share_bps: [1_800; TIER_COUNT],
            schedule: DrawSchedule::default(),
        }
    }
}

impl LotteryConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_numbers < DRAWN_NUMBERS {
            return Err(CoreError::config(format!(
                "Tickets need at least {} numbers",
                DRAWN_NUMBERS
            )));
        }

        if self.max_numbers < self.min_numbers || self.max_numbers > usize::from(MAX_NUMBER) {
            return Err(CoreError::config(format!(
                "Invalid ticket size bounds {}..={}",
                self.min_numbers, self.max_numbers
            )));
        }

        if self.price_per_line.is_zero() {
            return Err(CoreError::config("Price per line must be greater than 0"));
        }

        if self.referral_commission_bps > 10_000 {
            return Err(CoreError::config("Referral commission cannot exceed 100%"));
        }

        let total_share: u32 = self.tier_share_bps.iter().map(|&bps| u32::from(bps)).sum();
        if total_share > 10_000 {
            return Err(CoreError::config(format!(
                "Tier shares add up to {} bps, more than the whole pool",
                total_share
            )));
        }

        let schedule = &self.schedule;
        if schedule.period.is_zero() || schedule.window.is_zero() {
            return Err(CoreError::config("Draw period and window must be non-zero"));
        }
        if schedule.window > schedule.period {
            return Err(CoreError::config("Draw window cannot be longer than the period"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        LotteryConfig::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_overcommitted_tiers() {
        let mut config = LotteryConfig::default();
        config.tier_share_bps = [2_500; TIER_COUNT];
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_rejects_bad_ticket_bounds() {
        let mut config = LotteryConfig::default();
        config.min_numbers = 5;
        assert!(config.validate().is_err());

        let mut config = LotteryConfig::default();
        config.max_numbers = 91;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lotto.json");
        let mut config = LotteryConfig::default();
        config.max_numbers = 10;
        std::fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();

        assert_eq!(LotteryConfig::load(&path).unwrap(), config);
    }
}
