//! Core data model for the crash game.
//!
//! Amounts are integer chips. Multipliers are quoted to two decimal
//! places; `round_multiplier` is the single place that rounding happens
//! so the engine and verifier always agree on the quoted value.

/// Starting balance in chips granted to a new player session.
pub const STARTING_BALANCE: u64 = 1_000;

/// Default auto-bet stake for a fresh session.
pub const DEFAULT_AUTO_BET_AMOUNT: u64 = 10;

/// Default auto-cashout target for a fresh session.
pub const DEFAULT_AUTO_CASHOUT_TARGET: f64 = 2.0;

/// Unique bet identifier, assigned by the ledger at placement.
pub type BetId = u64;

/// Monotonic round identifier, assigned by the state machine.
pub type RoundId = u64;

/// Quote a multiplier to two decimal places.
pub fn round_multiplier(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Payout for a stake cashed out at a given multiplier.
pub fn payout_for(stake: u64, multiplier: f64) -> u64 {
    (stake as f64 * multiplier).round() as u64
}

/// Round lifecycle phases. The cycle repeats for the life of the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Pre-round countdown. Bets can be placed and cancelled.
    Waiting,
    /// Multiplier climbing. Cash-outs accepted, bets rejected.
    Running,
    /// Multiplier frozen at the crash point; settlement done.
    Crashed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Waiting => "waiting",
            Phase::Running => "running",
            Phase::Crashed => "crashed",
        }
    }
}

/// A single bet in the current round.
///
/// Exactly one of {cash-out, crash settlement} ever flips `settled`;
/// once set, the realized multiplier and payout never change.
#[derive(Clone, Debug, PartialEq)]
pub struct Bet {
    pub id: BetId,
    /// Owning player (assigned username).
    pub player: String,
    /// Stake in chips, debited at placement.
    pub amount: u64,
    /// Whether the engine cashes this bet out automatically.
    pub auto_cashout: bool,
    /// Target multiplier for auto-cashout.
    pub target_multiplier: Option<f64>,
    /// Multiplier the bet settled at. `None` until settled.
    pub realized_multiplier: Option<f64>,
    /// Chips credited at settlement. Zero for a loss.
    pub payout: u64,
    pub settled: bool,
}

impl Bet {
    pub fn new(
        id: BetId,
        player: impl Into<String>,
        amount: u64,
        auto_cashout: bool,
        target_multiplier: Option<f64>,
    ) -> Self {
        Self {
            id,
            player: player.into(),
            amount,
            auto_cashout,
            target_multiplier,
            realized_multiplier: None,
            payout: 0,
            settled: false,
        }
    }

    /// Target multiplier if auto-cashout is armed for this bet.
    pub fn auto_cashout_target(&self) -> Option<f64> {
        if self.auto_cashout {
            self.target_multiplier
        } else {
            None
        }
    }

    /// A settled bet with a non-zero payout was cashed out in time.
    pub fn is_win(&self) -> bool {
        self.settled && self.payout > 0
    }
}

/// Immutable snapshot of a finalized round.
///
/// Carries everything an external verifier needs to recompute the crash
/// point: seed material, nonce, and the scaling factor in force when the
/// crash point was generated.
#[derive(Clone, Debug, PartialEq)]
pub struct RoundRecord {
    pub id: RoundId,
    /// Secret committed before the round; revealed here for audit.
    pub server_seed: String,
    /// Public per-round salt.
    pub client_seed: String,
    /// Nonce mixed into the derivation (the round id).
    pub nonce: u64,
    /// Scaling factor in force at generation time.
    pub scaling_factor: f64,
    pub crash_point: f64,
    /// Round start, unix milliseconds.
    pub started_at_ms: u64,
    /// All bets resolved during the round, in placement order.
    pub bets: Vec<Bet>,
}

/// Auto-bet preference: place a bet automatically at each round start.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AutoBetPrefs {
    pub enabled: bool,
    pub amount: u64,
}

impl Default for AutoBetPrefs {
    fn default() -> Self {
        Self {
            enabled: false,
            amount: DEFAULT_AUTO_BET_AMOUNT,
        }
    }
}

/// Auto-cashout preference: cash out automatically at a target multiplier.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AutoCashoutPrefs {
    pub enabled: bool,
    pub target: f64,
}

impl Default for AutoCashoutPrefs {
    fn default() -> Self {
        Self {
            enabled: false,
            target: DEFAULT_AUTO_CASHOUT_TARGET,
        }
    }
}

/// Durable per-player state. Survives round transitions and reconnects;
/// only bet placement, cancellation, and settlement touch the balance.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayerSession {
    pub player: String,
    pub balance: u64,
    pub auto_bet: AutoBetPrefs,
    pub auto_cashout: AutoCashoutPrefs,
}

impl PlayerSession {
    pub fn new(player: impl Into<String>, balance: u64) -> Self {
        Self {
            player: player.into(),
            balance,
            auto_bet: AutoBetPrefs::default(),
            auto_cashout: AutoCashoutPrefs::default(),
        }
    }
}
