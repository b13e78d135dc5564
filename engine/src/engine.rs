//! Round state machine: the single-writer heart of the game.
//!
//! The engine drives the waiting -> running -> crashed cycle, owns the
//! authoritative multiplier clock, applies auto-bet and auto-cashout
//! policy at the right transition points, and emits the broadcast
//! messages the transport fans out.
//!
//! All mutation funnels through one `CrashEngine` value: the caller
//! serializes the tick clock and inbound player commands against it
//! (the server holds it behind a mutex), so no command ever observes
//! ledger state mid-tick.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use aviator_types::api::{BetView, GameStateMessage, HistoryMessage, RoundView};
use aviator_types::{round_multiplier, BetId, EngineError, Phase, RoundId, RoundRecord};
use tracing::{debug, error, info, warn};

use crate::{fairness, scaling, BetLedger, RoundHistory};

#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    /// Waiting-phase countdown before each round.
    pub wait_ms: u64,
    /// Pause on the crash screen before the next countdown starts.
    pub crash_pause_ms: u64,
    /// Multiplier increase per tick.
    pub multiplier_step: f64,
    /// How many finalized rounds to retain.
    pub history_cap: usize,
    /// Balance granted to a new player session.
    pub starting_balance: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wait_ms: 15_000,
            crash_pause_ms: 3_000,
            multiplier_step: 0.01,
            history_cap: 30,
            starting_balance: aviator_types::STARTING_BALANCE,
        }
    }
}

/// The live round's secret state. Dropped into a [`RoundRecord`] at the
/// crash transition; the crash point is never recomputed or altered
/// after generation.
#[derive(Clone, Debug)]
struct LiveRound {
    id: RoundId,
    server_seed: String,
    client_seed: String,
    scaling_factor: f64,
    crash_point: f64,
    started_at_ms: u64,
}

/// Event emitted by a tick, for the transport to broadcast.
#[derive(Clone, Debug)]
pub enum EngineEvent {
    State(GameStateMessage),
    History(HistoryMessage),
}

pub struct CrashEngine {
    config: EngineConfig,
    ledger: BetLedger,
    history: RoundHistory,
    phase: Phase,
    phase_ends_at: Instant,
    multiplier: f64,
    round: Option<LiveRound>,
    next_round_id: RoundId,
}

impl CrashEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            ledger: BetLedger::new(),
            history: RoundHistory::new(config.history_cap),
            phase: Phase::Waiting,
            phase_ends_at: Instant::now() + Duration::from_millis(config.wait_ms),
            multiplier: 1.0,
            round: None,
            next_round_id: 1,
            config,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn history(&self) -> &RoundHistory {
        &self.history
    }

    pub fn balance(&self, player: &str) -> Option<u64> {
        self.ledger.balance(player)
    }

    pub fn has_player(&self, player: &str) -> bool {
        self.ledger.session(player).is_some()
    }

    /// Register a player session. Idempotent; reconnecting players keep
    /// their balance and preferences.
    pub fn join(&mut self, player: &str) {
        self.ledger.join(player, self.config.starting_balance);
    }

    /// Place a bet for the upcoming round. Only allowed while waiting.
    ///
    /// An explicit `auto_cashout` target arms auto-cashout for this bet.
    pub fn handle_place_bet(
        &mut self,
        player: &str,
        amount: u64,
        auto_cashout: Option<f64>,
    ) -> Result<BetId, EngineError> {
        if self.phase != Phase::Waiting {
            return Err(EngineError::WrongPhase {
                action: "place_bet",
                phase: self.phase,
            });
        }
        let target = auto_cashout.map(|t| round_multiplier(t.max(1.01)));
        self.ledger
            .place_bet(player, amount, target.is_some(), target)
    }

    /// Cancel the player's own pending bet. Only allowed while waiting;
    /// once the round is running the stake is committed.
    pub fn handle_cancel_bet(&mut self, player: &str, bet_id: BetId) -> Result<u64, EngineError> {
        if self.phase != Phase::Waiting {
            return Err(EngineError::WrongPhase {
                action: "cancel_bet",
                phase: self.phase,
            });
        }
        match self.ledger.bets().iter().find(|bet| bet.id == bet_id) {
            Some(bet) if bet.player != player => Err(EngineError::BetNotFound),
            _ => self.ledger.cancel_bet(bet_id),
        }
    }

    /// Cash out the player's active bet at the current multiplier.
    /// Returns the realized multiplier and payout.
    pub fn handle_cash_out(&mut self, player: &str) -> Result<(f64, u64), EngineError> {
        if self.phase != Phase::Running {
            return Err(EngineError::WrongPhase {
                action: "cash_out",
                phase: self.phase,
            });
        }
        let multiplier = self.multiplier;
        let (_, payout) = self.ledger.cash_out_player(player, multiplier)?;
        Ok((multiplier, payout))
    }

    pub fn set_auto_bet(&mut self, player: &str, enabled: bool, amount: u64) {
        self.ledger.set_auto_bet(player, enabled, amount);
    }

    pub fn set_auto_cashout(&mut self, player: &str, enabled: bool, target: f64) {
        self.ledger.set_auto_cashout(player, enabled, target);
    }

    /// Advance the engine clock. Called at the tick cadence; also safe
    /// to call at any other moment (e.g. right after a transition) since
    /// phase deadlines are absolute.
    pub fn tick(&mut self, now: Instant) -> Vec<EngineEvent> {
        let mut events = Vec::with_capacity(2);
        match self.phase {
            Phase::Waiting => {
                if now >= self.phase_ends_at {
                    self.start_round();
                }
            }
            Phase::Running => {
                if self.advance_multiplier(now) {
                    events.push(EngineEvent::History(self.history_message()));
                }
            }
            Phase::Crashed => {
                if now >= self.phase_ends_at {
                    self.begin_waiting(now);
                }
            }
        }
        events.insert(0, EngineEvent::State(self.state_snapshot(now)));
        events
    }

    /// Waiting -> Running. Generates the round's seeds and crash point
    /// and applies pending auto-bets.
    fn start_round(&mut self) {
        let recent = self.history.recent_crash_points(scaling::SCALING_WINDOW);
        let scaling_factor = scaling::calculate_scaling_factor(&recent);
        let server_seed = fairness::generate_server_seed();
        let client_seed = fairness::generate_client_seed();
        let id = self.next_round_id;
        self.next_round_id = self.next_round_id.saturating_add(1);

        // The crash point goes through the verify path (nonce = round
        // id) so the published record reproduces it exactly.
        let crash_point =
            fairness::verify_crash_point(&server_seed, &client_seed, id, scaling_factor);

        self.multiplier = 1.0;
        self.round = Some(LiveRound {
            id,
            server_seed,
            client_seed,
            scaling_factor,
            crash_point,
            started_at_ms: unix_ms(),
        });
        self.phase = Phase::Running;
        info!(round = id, scaling_factor, "round started");
        debug!(round = id, crash_point, "crash point generated");

        self.apply_auto_bets();
    }

    /// Place bets for every session with auto-bet enabled. Failures are
    /// skipped with a warning; they never stall the round.
    fn apply_auto_bets(&mut self) {
        let pending: Vec<(String, u64, Option<f64>)> = self
            .ledger
            .sessions()
            .filter(|session| session.auto_bet.enabled)
            .map(|session| {
                let target = session
                    .auto_cashout
                    .enabled
                    .then_some(session.auto_cashout.target);
                (session.player.clone(), session.auto_bet.amount, target)
            })
            .collect();

        for (player, amount, target) in pending {
            if self.ledger.active_bet(&player).is_some() {
                // A manual bet placed during the countdown wins.
                continue;
            }
            if let Err(err) = self.ledger.place_bet(&player, amount, target.is_some(), target) {
                warn!(%player, %err, "skipping auto-bet");
            }
        }
    }

    /// One running tick: advance the multiplier, apply due auto-cashouts,
    /// then crash if the threshold was reached. Returns true on crash.
    fn advance_multiplier(&mut self, now: Instant) -> bool {
        let Some(round) = self.round.as_ref() else {
            debug_assert!(false, "running phase with no live round");
            error!("running phase with no live round; starting next countdown");
            self.begin_waiting(now);
            return false;
        };
        let crash_point = round.crash_point;

        let candidate = round_multiplier(self.multiplier + self.config.multiplier_step);
        let crashed = candidate >= crash_point;
        // Clamp before evaluating auto-cashouts: a target at or below the
        // crash point is honored even on the crash tick.
        self.multiplier = if crashed { crash_point } else { candidate };

        let due: Vec<(BetId, f64)> = self
            .ledger
            .bets()
            .iter()
            .filter(|bet| !bet.settled)
            .filter_map(|bet| bet.auto_cashout_target().map(|target| (bet.id, target)))
            .filter(|(_, target)| *target <= self.multiplier)
            .collect();
        for (bet_id, target) in due {
            // Realized at the exact target, not the tick's multiplier.
            if let Err(err) = self.ledger.cash_out(bet_id, target) {
                warn!(bet_id, %err, "auto-cashout failed");
            }
        }

        if crashed {
            self.finalize_round(now);
        }
        crashed
    }

    /// Running -> Crashed. Sweeps the losses, freezes the round into
    /// history, and starts the crash pause.
    fn finalize_round(&mut self, now: Instant) {
        let Some(round) = self.round.take() else {
            error!("finalize with no live round; starting next countdown");
            self.begin_waiting(now);
            return;
        };

        let lost = self.ledger.settle_all_unsettled(round.crash_point);
        let bets = self.ledger.take_round_bets();
        info!(
            round = round.id,
            crash_point = round.crash_point,
            bets = bets.len(),
            lost,
            "round crashed"
        );

        self.history.push(RoundRecord {
            id: round.id,
            server_seed: round.server_seed,
            client_seed: round.client_seed,
            nonce: round.id,
            scaling_factor: round.scaling_factor,
            crash_point: round.crash_point,
            started_at_ms: round.started_at_ms,
            bets,
        });

        self.multiplier = round.crash_point;
        self.phase = Phase::Crashed;
        self.phase_ends_at = now + Duration::from_millis(self.config.crash_pause_ms);
    }

    /// Crashed -> Waiting. Per-round transients reset; sessions are not.
    fn begin_waiting(&mut self, now: Instant) {
        self.round = None;
        self.multiplier = 1.0;
        self.phase = Phase::Waiting;
        self.phase_ends_at = now + Duration::from_millis(self.config.wait_ms);
    }

    /// The full authoritative snapshot broadcast every tick.
    pub fn state_snapshot(&self, now: Instant) -> GameStateMessage {
        let countdown = match self.phase {
            Phase::Waiting => {
                let remaining = self.phase_ends_at.saturating_duration_since(now);
                Some((remaining.as_millis() as u64).div_ceil(1_000))
            }
            _ => None,
        };

        let (round_id, crash_point, bets) = match self.phase {
            Phase::Waiting => (self.next_round_id, None, bet_views(self.ledger.bets())),
            Phase::Running => (
                self.round.as_ref().map(|round| round.id).unwrap_or_default(),
                None,
                bet_views(self.ledger.bets()),
            ),
            // The ledger is already drained; show the finished round.
            Phase::Crashed => match self.history.latest() {
                Some(record) => (
                    record.id,
                    Some(record.crash_point),
                    bet_views(&record.bets),
                ),
                None => (0, None, Vec::new()),
            },
        };

        GameStateMessage {
            msg_type: GameStateMessage::TYPE,
            state: self.phase.as_str(),
            round_id,
            multiplier: self.multiplier,
            countdown,
            bets,
            crash_point,
        }
    }

    /// All retained finalized rounds, newest first.
    pub fn history_message(&self) -> HistoryMessage {
        HistoryMessage {
            msg_type: HistoryMessage::TYPE,
            rounds: self.history.iter().map(RoundView::from).collect(),
        }
    }
}

fn bet_views(bets: &[aviator_types::Bet]) -> Vec<BetView> {
    bets.iter().map(BetView::from).collect()
}

fn unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}
