//! Common types shared by the aviator engine and transport layer.
//!
//! The data model (`game`) is owned by the engine; the wire types (`api`)
//! are what the websocket layer serializes. Keeping both here lets the
//! engine build outbound messages without depending on the transport.

pub mod api;
pub mod error;
pub mod game;

pub use error::EngineError;
pub use game::{
    payout_for, round_multiplier, AutoBetPrefs, AutoCashoutPrefs, Bet, BetId, Phase,
    PlayerSession, RoundId, RoundRecord, STARTING_BALANCE,
};
