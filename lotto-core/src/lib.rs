//! Shared building blocks for the 90-number lottery engine
//!
//! Value and identity types, configuration, the clock and payment rail seams,
//! and SQLite-backed snapshot storage.

pub mod clock;
pub mod config;
pub mod error;
pub mod payment;
pub mod storage;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{DrawSchedule, LotteryConfig};
pub use error::{CoreError, Result};
pub use payment::{PaymentRail, RecordingRail, Transfer};
pub use storage::{SnapshotStore, Storage};
pub use types::{AccountId, Amount, ReferralCode, RequestId, RoundIndex, Seed, TicketId};
