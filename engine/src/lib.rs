//! Aviator engine: the authoritative core of the crash game.
//!
//! This crate contains the round state machine, bet ledger, provably fair
//! crash-point generation, and round history. It is transport-agnostic: a
//! socket layer drives it through commands and forwards the events it
//! emits.
//!
//! ## Ownership
//! - The state machine ([`CrashEngine`]) exclusively owns round
//!   transitions and the live multiplier.
//! - The ledger ([`BetLedger`]) exclusively owns balance mutations and
//!   bet records.
//!
//! ## Ordering invariant
//! Within a tick, auto-cashout evaluation is fully applied before the
//! crash-threshold comparison, so a bet whose target equals the final
//! crash point settles as a win, never a loss.
//!
//! ## Determinism
//! Crash points derive only from the recorded seed material, nonce, and
//! scaling factor; [`fairness::verify_record`] reproduces any finalized
//! round bit-for-bit.

pub mod engine;
pub mod fairness;
pub mod history;
pub mod ledger;
pub mod scaling;

pub use engine::{CrashEngine, EngineConfig, EngineEvent};
pub use fairness::{
    crash_point_from_uniform, generate_client_seed, generate_crash_point, generate_server_seed,
    verify_crash_point, verify_record,
};
pub use history::RoundHistory;
pub use ledger::BetLedger;
pub use scaling::{calculate_scaling_factor, SCALING_WINDOW, TARGET_RTP};
