use lotto_core::{Amount, RequestId, RoundIndex, TicketId};
use thiserror::Error;

use crate::round::RoundState;

pub type Result<T> = std::result::Result<T, LotteryError>;

#[derive(Error, Debug)]
pub enum LotteryError {
    #[error("Lottery core error: {0}")]
    Core(#[from] lotto_core::CoreError),

    #[error("Ticket must have {min} to {max} numbers, got {size}")]
    InvalidTicketSize { size: usize, min: usize, max: usize },

    #[error("Number {0} is outside 1..=90")]
    InvalidNumber(u8),

    #[error("Number {0} appears more than once")]
    DuplicateNumber(u8),

    #[error("Insufficient payment: need {need}, got {available}")]
    InsufficientPayment { need: Amount, available: Amount },

    #[error("Drawing window is closed")]
    DrawWindowClosed,

    #[error("A draw was already requested")]
    DrawAlreadyRequested,

    #[error("Unexpected fulfillment for request {0}")]
    UnexpectedFulfillment(RequestId),

    #[error("Caller {0} is not the randomness oracle")]
    NotOracle(String),

    #[error("Round is {actual:?}, expected {expected:?}")]
    WrongRoundState {
        expected: RoundState,
        actual: RoundState,
    },

    #[error("Nothing to withdraw")]
    NothingToWithdraw,

    #[error("Lottery is paused")]
    Paused,

    #[error("Referral code already claimed")]
    ReferralCodeTaken,

    #[error("Invalid referral code")]
    InvalidReferralCode,

    #[error("Index {index} out of range, length is {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Ticket not found: {0}")]
    TicketNotFound(TicketId),

    #[error("Round not found: {0}")]
    RoundNotFound(RoundIndex),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
