//! Settlement engine for a 6-of-90 numbers lottery
//!
//! Players buy tickets of 6 to 8 numbers. Once a week a seed from an external
//! randomness oracle is turned into six winning numbers, tickets are bucketed
//! into tiers by how many numbers they match, and each non-empty tier shares a
//! fixed slice of the prize pool pari-mutuel.

pub mod drawing;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod number_set;
pub mod oracle;
pub mod referral;
pub mod round;
pub mod schedule;
pub mod service;
pub mod ticket_index;

pub use engine::{EngineState, SettlementEngine, WinnerProgress};
pub use error::{LotteryError, Result};
pub use ledger::RevenueLedger;
pub use number_set::NumberSet;
pub use oracle::{random_seed, DrawHandle, DrawParams, MockOracle, RandomnessOracle};
pub use referral::ReferralRegistry;
pub use round::{DrawData, Round, RoundState, Ticket};
pub use service::LotteryService;
pub use ticket_index::TicketIndex;
