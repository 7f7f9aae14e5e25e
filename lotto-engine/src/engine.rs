use crate::drawing;
use crate::oracle::{DrawHandle, DrawParams, RandomnessOracle};
use crate::referral::ReferralRegistry;
use crate::round::{tier_slot, DrawData, Round, RoundState, Ticket, WinnerTally};
use crate::schedule;
use crate::{LotteryError, NumberSet, Result, RevenueLedger, TicketIndex};
use chrono::{DateTime, Utc};
use lotto_core::config::{DRAWN_NUMBERS, TIER_COUNT};
use lotto_core::{
    AccountId, Amount, Clock, CoreError, LotteryConfig, PaymentRail, ReferralCode, RequestId,
    RoundIndex, Seed, TicketId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Everything the engine owns, in a form that can be snapshotted and restored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineState {
    current_round: RoundIndex,
    rounds: Vec<Round>,
    /// Ticket arena; a ticket's id is its position.
    tickets: Vec<Ticket>,
    tickets_by_owner: BTreeMap<AccountId, Vec<TicketId>>,
    /// Index of the current round's tickets only.
    index: TicketIndex,
    ledger: RevenueLedger,
    referrals: ReferralRegistry,
    prize_pool: Amount,
    total_received: Amount,
    last_draw_window: Option<i64>,
    paused: bool,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            current_round: 0,
            rounds: vec![Round::new(0)],
            tickets: Vec::new(),
            tickets_by_owner: BTreeMap::new(),
            index: TicketIndex::new(),
            ledger: RevenueLedger::new(),
            referrals: ReferralRegistry::new(),
            prize_pool: Amount::ZERO,
            total_received: Amount::ZERO,
            last_draw_window: None,
            paused: false,
        }
    }
}

/// Outcome of one bounded winner-computation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinnerProgress {
    Pending { processed: usize, total: usize },
    Complete,
}

/// Round state machine: sells tickets, requests and accepts draws, finds
/// winners and pays tiers pari-mutuel into the revenue ledger.
///
/// Every entry point validates first and mutates last, so a failed call leaves
/// no trace.
pub struct SettlementEngine {
    config: LotteryConfig,
    state: EngineState,
    clock: Arc<dyn Clock>,
    oracle: Arc<dyn RandomnessOracle>,
    rail: Arc<dyn PaymentRail>,
}

impl SettlementEngine {
    pub fn new(
        config: LotteryConfig,
        clock: Arc<dyn Clock>,
        oracle: Arc<dyn RandomnessOracle>,
        rail: Arc<dyn PaymentRail>,
    ) -> Result<Self> {
        Self::restore(config, EngineState::default(), clock, oracle, rail)
    }

    pub fn restore(
        config: LotteryConfig,
        state: EngineState,
        clock: Arc<dyn Clock>,
        oracle: Arc<dyn RandomnessOracle>,
        rail: Arc<dyn PaymentRail>,
    ) -> Result<Self> {
        config.validate()?;

        if state.rounds.len() as u64 != state.current_round + 1 {
            return Err(CoreError::internal("Snapshot round list does not match current round").into());
        }

        Ok(Self {
            config,
            state,
            clock,
            oracle,
            rail,
        })
    }

    pub fn config(&self) -> &LotteryConfig {
        &self.config
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn snapshot(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.state)?)
    }

    fn current(&self) -> &Round {
        &self.state.rounds[self.state.current_round as usize]
    }

    fn current_mut(&mut self) -> &mut Round {
        let index = self.state.current_round as usize;
        &mut self.state.rounds[index]
    }

    fn validate_numbers(&self, numbers: &[u8]) -> Result<NumberSet> {
        let size = numbers.len();
        if size < self.config.min_numbers || size > self.config.max_numbers {
            return Err(LotteryError::InvalidTicketSize {
                size,
                min: self.config.min_numbers,
                max: self.config.max_numbers,
            });
        }
        NumberSet::from_numbers(numbers)
    }

    fn price_for(&self, size: usize) -> Result<Amount> {
        let lines = binomial(size as u64, DRAWN_NUMBERS as u64);
        self.config
            .price_per_line
            .checked_mul(lines)
            .ok_or_else(|| CoreError::internal("Ticket price overflow").into())
    }

    /// Price of a ticket: one line per 6-number combination it covers.
    pub fn ticket_price(&self, numbers: &[u8]) -> Result<Amount> {
        let set = self.validate_numbers(numbers)?;
        self.price_for(set.size())
    }

    pub fn buy_ticket(
        &mut self,
        buyer: &AccountId,
        referral: Option<ReferralCode>,
        numbers: &[u8],
        payment: Amount,
    ) -> Result<TicketId> {
        if self.state.paused {
            return Err(LotteryError::Paused);
        }
        self.current().expect_state(RoundState::Open)?;

        let set = self.validate_numbers(numbers)?;
        let price = self.price_for(set.size())?;
        let excess = payment
            .checked_sub(price)
            .ok_or(LotteryError::InsufficientPayment {
                need: price,
                available: payment,
            })?;

        if !excess.is_zero() {
            self.rail.transfer(buyer, excess)?;
        }

        let id = self.state.tickets.len() as TicketId;
        let round = self.state.current_round;
        self.state.tickets.push(Ticket {
            id,
            owner: buyer.clone(),
            round,
            numbers: set,
        });
        self.state
            .tickets_by_owner
            .entry(buyer.clone())
            .or_default()
            .push(id);
        self.state.index.insert(id, &set);
        self.current_mut().ticket_ids.push(id);

        let referrer = referral
            .filter(|code| !code.is_none())
            .and_then(|code| self.state.referrals.owner_of(&code).cloned());
        let commission = match referrer {
            Some(partner) => {
                let commission = price.mul_bps(self.config.referral_commission_bps);
                self.state.ledger.credit(&partner, commission);
                tracing::debug!("Credited referral commission {} to {}", commission, partner);
                commission
            }
            None => Amount::ZERO,
        };

        self.state.prize_pool = self
            .state
            .prize_pool
            .saturating_add(price.saturating_sub(commission));
        self.state.total_received = self.state.total_received.saturating_add(price);

        tracing::info!(
            "Ticket {} sold to {} in round {}: {} for {}",
            id,
            buyer,
            round,
            set,
            price
        );
        Ok(id)
    }

    pub fn claim_referral_code(&mut self, code: ReferralCode, owner: &AccountId) -> Result<()> {
        self.state.referrals.claim(code, owner)
    }

    /// True inside the weekly window, while the round is open, at most once per window.
    pub fn can_draw(&self) -> bool {
        if self.state.paused || self.current().state != RoundState::Open {
            return false;
        }
        match schedule::window_start(&self.config.schedule, self.clock.now()) {
            Some(window) => self.state.last_draw_window != Some(window),
            None => false,
        }
    }

    pub fn next_draw_time(&self) -> DateTime<Utc> {
        schedule::next_draw_time(&self.config.schedule, self.clock.now())
    }

    pub fn request_draw(&mut self, params: &DrawParams) -> Result<DrawHandle> {
        if self.state.paused {
            return Err(LotteryError::Paused);
        }

        match self.current().state {
            RoundState::Open => {}
            RoundState::DrawPending => return Err(LotteryError::DrawAlreadyRequested),
            actual => {
                return Err(LotteryError::WrongRoundState {
                    expected: RoundState::Open,
                    actual,
                })
            }
        }

        let window = schedule::window_start(&self.config.schedule, self.clock.now())
            .ok_or(LotteryError::DrawWindowClosed)?;
        if self.state.last_draw_window == Some(window) {
            return Err(LotteryError::DrawAlreadyRequested);
        }

        let request_id = self.oracle.request_randomness(params)?;

        self.state.last_draw_window = Some(window);
        let round = self.current_mut();
        round.state = RoundState::DrawPending;
        round.request_id = Some(request_id);

        let handle = DrawHandle {
            round: round.index,
            request_id,
        };
        tracing::info!(
            "Round {} requested draw, oracle request {}",
            handle.round,
            request_id
        );
        Ok(handle)
    }

    /// Oracle callback. Callbacks that do not answer the outstanding request are
    /// rejected with `UnexpectedFulfillment` and change nothing.
    pub fn fulfill_draw(
        &mut self,
        caller: &AccountId,
        request_id: RequestId,
        seed: &Seed,
    ) -> Result<NumberSet> {
        if caller != self.oracle.account() {
            return Err(LotteryError::NotOracle(caller.to_string()));
        }

        let round = self.current();
        if round.state != RoundState::DrawPending || round.request_id != Some(request_id) {
            tracing::warn!(
                "Dropping oracle fulfillment {} for round {} in state {:?}",
                request_id,
                round.index,
                round.state
            );
            return Err(LotteryError::UnexpectedFulfillment(request_id));
        }

        let drawn = drawing::draw(seed);
        let drawn_at = self.clock.now();

        let round = self.current_mut();
        round.drawn_numbers = Some(drawn);
        round.drawn_at = Some(drawn_at);
        round.tally = Some(WinnerTally::default());
        round.state = RoundState::NumbersDrawn;

        tracing::info!("Round {} drew {}", round.index, drawn);
        Ok(drawn)
    }

    /// Folds up to `max_numbers` more drawn numbers into the match tally. Once
    /// all six are in, buckets tickets into tiers, snapshots the prize pool and
    /// moves the round to `Settled`.
    pub fn find_winners_step(&mut self, max_numbers: usize) -> Result<WinnerProgress> {
        self.current().expect_state(RoundState::NumbersDrawn)?;

        let EngineState {
            current_round,
            rounds,
            index,
            prize_pool,
            ..
        } = &mut self.state;
        let round = &mut rounds[*current_round as usize];

        let drawn = round
            .drawn_numbers
            .ok_or_else(|| CoreError::internal("Drawn round without numbers"))?
            .to_sorted_vec();
        let tally = round.tally.get_or_insert_with(WinnerTally::default);

        let end = tally
            .cursor
            .saturating_add(max_numbers.max(1))
            .min(drawn.len());
        for &number in &drawn[tally.cursor..end] {
            let holders = index.lookup(number);
            for &id in holders {
                *tally.matches.entry(id).or_insert(0) += 1;
            }
            tracing::debug!(
                "Round {}: number {} matched {} tickets",
                round.index,
                number,
                holders.len()
            );
        }
        tally.cursor = end;

        if end < drawn.len() {
            return Ok(WinnerProgress::Pending {
                processed: end,
                total: drawn.len(),
            });
        }

        let tally = round.tally.take().unwrap_or_default();
        let mut winners: [Vec<TicketId>; TIER_COUNT] = Default::default();
        for (id, matches) in tally.matches {
            if let Some(slot) = tier_slot(usize::from(matches)) {
                winners[slot].push(id);
            }
        }

        round.winners_by_tier = winners;
        round.prize_pool_snapshot = *prize_pool;
        round.state = RoundState::Settled;

        let counts: Vec<usize> = round.winners_by_tier.iter().map(Vec::len).collect();
        tracing::info!(
            "Round {} winners per tier (2..6 matches): {:?}, pool {}",
            round.index,
            counts,
            round.prize_pool_snapshot
        );
        Ok(WinnerProgress::Complete)
    }

    pub fn compute_winners(&mut self) -> Result<()> {
        loop {
            if self.find_winners_step(DRAWN_NUMBERS)? == WinnerProgress::Complete {
                return Ok(());
            }
        }
    }

    /// Pays every non-empty tier its share of the pool snapshot, split evenly
    /// between its winners, and opens the next round. Division remainders and
    /// the shares of empty tiers stay in the pool.
    pub fn close_round(&mut self) -> Result<RoundIndex> {
        self.current().expect_state(RoundState::Settled)?;

        let round = self.current();
        let snapshot = round.prize_pool_snapshot;
        let mut payout_per_winner = [Amount::ZERO; TIER_COUNT];
        let mut credits: Vec<(AccountId, Amount)> = Vec::new();
        let mut total_paid = Amount::ZERO;

        for (slot, winners) in round.winners_by_tier.iter().enumerate() {
            if winners.is_empty() {
                continue;
            }
            let allocation = snapshot.mul_bps(self.config.tier_share_bps[slot]);
            let (share, _remainder) = allocation.split(winners.len() as u64);
            payout_per_winner[slot] = share;

            for &id in winners {
                let owner = &self.state.tickets[id as usize].owner;
                credits.push((owner.clone(), share));
                total_paid = total_paid.saturating_add(share);
            }
        }

        let remaining_pool = self
            .state
            .prize_pool
            .checked_sub(total_paid)
            .filter(|_| total_paid <= snapshot)
            .ok_or_else(|| CoreError::internal("Tier payouts exceed the prize pool"))?;

        for (owner, share) in &credits {
            self.state.ledger.credit(owner, *share);
        }
        self.state.prize_pool = remaining_pool;

        let closed = self.state.current_round;
        let round = self.current_mut();
        round.payout_per_winner = payout_per_winner;
        round.state = RoundState::Closed;

        self.state.index.clear();
        self.state.current_round += 1;
        self.state.rounds.push(Round::new(self.state.current_round));

        tracing::info!(
            "Round {} closed, paid {} to {} winning tickets, pool now {}",
            closed,
            total_paid,
            credits.len(),
            remaining_pool
        );
        Ok(self.state.current_round)
    }

    pub fn withdraw(&mut self, account: &AccountId) -> Result<Amount> {
        self.state.ledger.withdraw(account, self.rail.as_ref())
    }

    pub fn pause(&mut self) {
        self.state.paused = true;
        tracing::info!("Lottery paused");
    }

    pub fn unpause(&mut self) {
        self.state.paused = false;
        tracing::info!("Lottery unpaused");
    }

    pub fn is_paused(&self) -> bool {
        self.state.paused
    }

    pub fn current_round(&self) -> RoundIndex {
        self.state.current_round
    }

    pub fn round_state(&self) -> RoundState {
        self.current().state
    }

    /// Outstanding oracle request of the current round, if any.
    pub fn pending_request(&self) -> Option<RequestId> {
        let round = self.current();
        match round.state {
            RoundState::DrawPending => round.request_id,
            _ => None,
        }
    }

    /// Highest oracle request id any round has used.
    pub fn last_request_id(&self) -> Option<RequestId> {
        self.state
            .rounds
            .iter()
            .filter_map(|round| round.request_id)
            .max()
    }

    pub fn round(&self, index: RoundIndex) -> Result<&Round> {
        self.state
            .rounds
            .get(index as usize)
            .ok_or(LotteryError::RoundNotFound(index))
    }

    pub fn draw_data(&self, index: RoundIndex) -> Result<DrawData> {
        self.round(index).map(Round::draw_data)
    }

    pub fn ticket(&self, id: TicketId) -> Result<&Ticket> {
        self.state
            .tickets
            .get(id as usize)
            .ok_or(LotteryError::TicketNotFound(id))
    }

    pub fn ticket_count(&self) -> u64 {
        self.state.tickets.len() as u64
    }

    pub fn ticket_ids(&self, owner: &AccountId) -> &[TicketId] {
        self.state
            .tickets_by_owner
            .get(owner)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The owner's tickets in `round`. Ids are assigned in purchase order and
    /// rounds only move forward, so the owner's list is sorted by round too.
    pub fn ticket_ids_for_round(&self, owner: &AccountId, round: RoundIndex) -> &[TicketId] {
        let ids = self.ticket_ids(owner);
        let round_of = |id: &TicketId| self.state.tickets[*id as usize].round;
        let start = ids.partition_point(|id| round_of(id) < round);
        let end = ids.partition_point(|id| round_of(id) <= round);
        &ids[start..end]
    }

    pub fn pending_balance(&self, account: &AccountId) -> Amount {
        self.state.ledger.balance(account)
    }

    pub fn referral_owner(&self, code: &ReferralCode) -> Option<&AccountId> {
        self.state.referrals.owner_of(code)
    }

    pub fn referral_code_of(&self, owner: &AccountId, index: usize) -> Result<ReferralCode> {
        self.state.referrals.code_of(owner, index)
    }

    pub fn prize_pool(&self) -> Amount {
        self.state.prize_pool
    }

    pub fn total_received(&self) -> Amount {
        self.state.total_received
    }

    pub fn total_credited(&self) -> Amount {
        self.state.ledger.total_credited()
    }

    pub fn total_withdrawn(&self) -> Amount {
        self.state.ledger.total_withdrawn()
    }

    /// Balances credited but not yet withdrawn.
    pub fn outstanding_liabilities(&self) -> Amount {
        self.state.ledger.liabilities()
    }
}

/// `n choose k`, exact for the small ticket sizes involved.
fn binomial(n: u64, k: u64) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    (0..k).fold(1u64, |acc, i| acc * (n - i) / (i + 1))
}
