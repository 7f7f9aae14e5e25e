use chrono::{DateTime, Utc};
use lotto_core::config::{MIN_WINNING_MATCHES, TIER_COUNT};
use lotto_core::{AccountId, Amount, RequestId, RoundIndex, TicketId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{LotteryError, NumberSet, Result};

/// Round lifecycle. A settled round becomes `Closed` once its prizes are paid
/// and the next round opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundState {
    Open,
    DrawPending,
    NumbersDrawn,
    Settled,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub owner: AccountId,
    pub round: RoundIndex,
    pub numbers: NumberSet,
}

/// Resumable match tally. `cursor` counts drawn numbers already folded into
/// `matches`; only tickets touched by some drawn number get a counter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerTally {
    pub cursor: usize,
    pub matches: BTreeMap<TicketId, u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    pub index: RoundIndex,
    pub state: RoundState,
    pub ticket_ids: Vec<TicketId>,
    pub request_id: Option<RequestId>,
    pub drawn_numbers: Option<NumberSet>,
    /// When the oracle seed was accepted.
    #[serde(default)]
    pub drawn_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tally: Option<WinnerTally>,
    /// Winning ticket ids per tier, ascending; index is `matches - 2`.
    pub winners_by_tier: [Vec<TicketId>; TIER_COUNT],
    pub prize_pool_snapshot: Amount,
    /// Amount credited to each winner of a tier once the round is closed.
    pub payout_per_winner: [Amount; TIER_COUNT],
}

impl Round {
    pub fn new(index: RoundIndex) -> Self {
        Self {
            index,
            state: RoundState::Open,
            ticket_ids: Vec::new(),
            request_id: None,
            drawn_numbers: None,
            drawn_at: None,
            tally: None,
            winners_by_tier: Default::default(),
            prize_pool_snapshot: Amount::ZERO,
            payout_per_winner: [Amount::ZERO; TIER_COUNT],
        }
    }

    pub fn expect_state(&self, expected: RoundState) -> Result<()> {
        if self.state != expected {
            return Err(LotteryError::WrongRoundState {
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }

    /// Tickets that matched exactly `matches` numbers (2..=6).
    pub fn winners(&self, matches: usize) -> &[TicketId] {
        tier_slot(matches)
            .map(|slot| self.winners_by_tier[slot].as_slice())
            .unwrap_or(&[])
    }

    pub fn draw_data(&self) -> DrawData {
        DrawData {
            round: self.index,
            state: self.state,
            request_id: self.request_id,
            numbers: self.drawn_numbers.map(|set| set.to_sorted_vec()),
            drawn_at: self.drawn_at,
            winners: self.winners_by_tier.clone(),
            prize_pool_snapshot: self.prize_pool_snapshot,
            payout_per_winner: self.payout_per_winner,
        }
    }
}

/// Position of a match count in the tier arrays, if it wins at all.
pub fn tier_slot(matches: usize) -> Option<usize> {
    matches
        .checked_sub(MIN_WINNING_MATCHES)
        .filter(|&slot| slot < TIER_COUNT)
}

/// Public view of a round's draw and its results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawData {
    pub round: RoundIndex,
    pub state: RoundState,
    pub request_id: Option<RequestId>,
    pub numbers: Option<Vec<u8>>,
    pub drawn_at: Option<DateTime<Utc>>,
    pub winners: [Vec<TicketId>; TIER_COUNT],
    pub prize_pool_snapshot: Amount,
    pub payout_per_winner: [Amount; TIER_COUNT],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_slot() {
        assert_eq!(tier_slot(0), None);
        assert_eq!(tier_slot(1), None);
        assert_eq!(tier_slot(2), Some(0));
        assert_eq!(tier_slot(6), Some(4));
        assert_eq!(tier_slot(7), None);
    }

    #[test]
    fn test_expect_state() {
        let round = Round::new(3);
        assert!(round.expect_state(RoundState::Open).is_ok());
        assert!(matches!(
            round.expect_state(RoundState::Settled),
            Err(LotteryError::WrongRoundState {
                expected: RoundState::Settled,
                actual: RoundState::Open
            })
        ));
    }

    #[test]
    fn test_round_serde_skips_empty_tally() {
        let round = Round::new(0);
        let json = serde_json::to_string(&round).unwrap();
        assert!(!json.contains("tally"));

        let restored: Round = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.state, RoundState::Open);
        assert!(restored.tally.is_none());
    }
}
