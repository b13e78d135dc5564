//! Bet ledger: player sessions, balances, and the current round's bets.
//!
//! The ledger exclusively owns balance mutations and bet records. It is
//! phase-agnostic - the round state machine decides *when* an operation
//! is allowed and the ledger enforces everything else: amount validity,
//! one active bet per player, and the settled flag that guarantees
//! exactly one of {cash-out, crash-settlement} applies per bet.

use std::collections::HashMap;
use std::mem;

use aviator_types::{payout_for, round_multiplier, Bet, BetId, EngineError, PlayerSession};

#[derive(Clone, Debug, Default)]
pub struct BetLedger {
    sessions: HashMap<String, PlayerSession>,
    /// Current round's bets, in placement order.
    bets: Vec<Bet>,
    next_bet_id: BetId,
}

impl BetLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session for a player if one does not exist yet.
    /// Sessions persist across rounds and reconnects.
    pub fn join(&mut self, player: &str, starting_balance: u64) -> &PlayerSession {
        self.sessions
            .entry(player.to_string())
            .or_insert_with(|| PlayerSession::new(player, starting_balance))
    }

    pub fn session(&self, player: &str) -> Option<&PlayerSession> {
        self.sessions.get(player)
    }

    pub fn balance(&self, player: &str) -> Option<u64> {
        self.sessions.get(player).map(|session| session.balance)
    }

    pub fn sessions(&self) -> impl Iterator<Item = &PlayerSession> {
        self.sessions.values()
    }

    pub fn set_auto_bet(&mut self, player: &str, enabled: bool, amount: u64) {
        if let Some(session) = self.sessions.get_mut(player) {
            session.auto_bet.enabled = enabled;
            session.auto_bet.amount = amount;
        }
    }

    pub fn set_auto_cashout(&mut self, player: &str, enabled: bool, target: f64) {
        if let Some(session) = self.sessions.get_mut(player) {
            session.auto_cashout.enabled = enabled;
            session.auto_cashout.target = round_multiplier(target.max(1.01));
        }
    }

    /// The current round's bets, in placement order.
    pub fn bets(&self) -> &[Bet] {
        &self.bets
    }

    /// The player's unsettled bet this round, if any.
    pub fn active_bet(&self, player: &str) -> Option<&Bet> {
        self.bets
            .iter()
            .find(|bet| bet.player == player && !bet.settled)
    }

    /// Place a bet, debiting the stake immediately.
    pub fn place_bet(
        &mut self,
        player: &str,
        amount: u64,
        auto_cashout: bool,
        target_multiplier: Option<f64>,
    ) -> Result<BetId, EngineError> {
        if amount == 0 {
            return Err(EngineError::InvalidAmount);
        }
        if self.active_bet(player).is_some() {
            return Err(EngineError::DuplicateActiveBet);
        }
        let session = self
            .sessions
            .get_mut(player)
            .ok_or(EngineError::InsufficientBalance {
                needed: amount,
                available: 0,
            })?;
        if session.balance < amount {
            return Err(EngineError::InsufficientBalance {
                needed: amount,
                available: session.balance,
            });
        }

        session.balance -= amount;
        let id = self.next_bet_id;
        self.next_bet_id = self.next_bet_id.saturating_add(1);
        self.bets
            .push(Bet::new(id, player, amount, auto_cashout, target_multiplier));
        Ok(id)
    }

    /// Remove an unsettled bet and credit the stake back.
    /// Returns the refunded amount.
    pub fn cancel_bet(&mut self, bet_id: BetId) -> Result<u64, EngineError> {
        let index = self
            .bets
            .iter()
            .position(|bet| bet.id == bet_id)
            .ok_or(EngineError::BetNotFound)?;
        if self.bets[index].settled {
            return Err(EngineError::AlreadySettled);
        }

        let bet = self.bets.remove(index);
        if let Some(session) = self.sessions.get_mut(&bet.player) {
            session.balance = session.balance.saturating_add(bet.amount);
        }
        Ok(bet.amount)
    }

    /// Settle a bet as a win at the given multiplier and credit the
    /// payout. Returns the payout.
    pub fn cash_out(&mut self, bet_id: BetId, multiplier: f64) -> Result<u64, EngineError> {
        let bet = self
            .bets
            .iter_mut()
            .find(|bet| bet.id == bet_id)
            .ok_or(EngineError::BetNotFound)?;
        if bet.settled {
            return Err(EngineError::AlreadySettled);
        }

        let multiplier = round_multiplier(multiplier.max(1.0));
        let payout = payout_for(bet.amount, multiplier);
        bet.settled = true;
        bet.realized_multiplier = Some(multiplier);
        bet.payout = payout;

        let player = bet.player.clone();
        if let Some(session) = self.sessions.get_mut(&player) {
            session.balance = session.balance.saturating_add(payout);
        }
        Ok(payout)
    }

    /// Cash out the player's own active bet.
    pub fn cash_out_player(
        &mut self,
        player: &str,
        multiplier: f64,
    ) -> Result<(BetId, u64), EngineError> {
        let bet_id = self
            .active_bet(player)
            .map(|bet| bet.id)
            .ok_or(EngineError::BetNotFound)?;
        let payout = self.cash_out(bet_id, multiplier)?;
        Ok((bet_id, payout))
    }

    /// Mark every still-unsettled bet as a crash loss. Called exactly
    /// once per round at the crash transition; bets already settled by
    /// cash-out are untouched, so the sweep is idempotent.
    pub fn settle_all_unsettled(&mut self, crash_point: f64) -> usize {
        let mut lost = 0;
        for bet in self.bets.iter_mut().filter(|bet| !bet.settled) {
            bet.settled = true;
            bet.realized_multiplier = Some(crash_point);
            bet.payout = 0;
            lost += 1;
        }
        lost
    }

    /// Drain the round's bets for the history snapshot, leaving the
    /// ledger ready for the next round. Bet ids keep incrementing.
    pub fn take_round_bets(&mut self) -> Vec<Bet> {
        mem::take(&mut self.bets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_with(player: &str, balance: u64) -> BetLedger {
        let mut ledger = BetLedger::new();
        ledger.join(player, balance);
        ledger
    }

    #[test]
    fn test_join_is_idempotent() {
        let mut ledger = ledger_with("alice", 1_000);
        ledger.place_bet("alice", 100, false, None).unwrap();
        // Re-joining never resets the balance.
        assert_eq!(ledger.join("alice", 1_000).balance, 900);
    }

    #[test]
    fn test_place_bet_validations() {
        let mut ledger = ledger_with("alice", 100);

        assert_eq!(
            ledger.place_bet("alice", 0, false, None),
            Err(EngineError::InvalidAmount)
        );
        assert_eq!(
            ledger.place_bet("alice", 101, false, None),
            Err(EngineError::InsufficientBalance {
                needed: 101,
                available: 100
            })
        );

        ledger.place_bet("alice", 50, false, None).unwrap();
        assert_eq!(
            ledger.place_bet("alice", 10, false, None),
            Err(EngineError::DuplicateActiveBet)
        );
        assert_eq!(ledger.balance("alice"), Some(50));
    }

    #[test]
    fn test_place_then_cancel_conserves_balance() {
        let mut ledger = ledger_with("alice", 500);
        let bet_id = ledger.place_bet("alice", 120, false, None).unwrap();
        assert_eq!(ledger.balance("alice"), Some(380));

        let refunded = ledger.cancel_bet(bet_id).unwrap();
        assert_eq!(refunded, 120);
        assert_eq!(ledger.balance("alice"), Some(500));
        assert!(ledger.active_bet("alice").is_none());
    }

    #[test]
    fn test_place_then_cash_out_nets_stake_times_multiplier() {
        let mut ledger = ledger_with("alice", 1_000);
        let bet_id = ledger.place_bet("alice", 50, false, None).unwrap();

        let payout = ledger.cash_out(bet_id, 2.0).unwrap();
        assert_eq!(payout, 100);
        // A·m − A = 50·2 − 50 = +50
        assert_eq!(ledger.balance("alice"), Some(1_050));

        let bet = &ledger.bets()[0];
        assert!(bet.is_win());
        assert_eq!(bet.realized_multiplier, Some(2.0));
    }

    #[test]
    fn test_cash_out_unknown_and_double() {
        let mut ledger = ledger_with("alice", 100);
        assert_eq!(ledger.cash_out(99, 1.5), Err(EngineError::BetNotFound));

        let bet_id = ledger.place_bet("alice", 10, false, None).unwrap();
        ledger.cash_out(bet_id, 1.5).unwrap();
        assert_eq!(
            ledger.cash_out(bet_id, 1.6),
            Err(EngineError::AlreadySettled)
        );
        assert_eq!(ledger.cancel_bet(bet_id), Err(EngineError::AlreadySettled));
    }

    #[test]
    fn test_exactly_one_settlement_path() {
        let mut ledger = ledger_with("alice", 1_000);
        ledger.join("bob", 1_000);
        let alice_bet = ledger.place_bet("alice", 50, false, None).unwrap();
        ledger.place_bet("bob", 30, false, None).unwrap();

        // Alice cashes out before the crash; the sweep must not touch her.
        ledger.cash_out(alice_bet, 1.8).unwrap();
        let lost = ledger.settle_all_unsettled(2.4);
        assert_eq!(lost, 1);

        let alice = &ledger.bets()[0];
        assert_eq!(alice.realized_multiplier, Some(1.8));
        assert_eq!(alice.payout, 90);
        assert_eq!(ledger.balance("alice"), Some(1_040));

        let bob = &ledger.bets()[1];
        assert!(bob.settled);
        assert_eq!(bob.realized_multiplier, Some(2.4));
        assert_eq!(bob.payout, 0);
        assert_eq!(ledger.balance("bob"), Some(970));

        // Sweep is idempotent.
        assert_eq!(ledger.settle_all_unsettled(2.4), 0);
        assert_eq!(ledger.balance("alice"), Some(1_040));
    }

    #[test]
    fn test_cash_out_player_targets_own_bet() {
        let mut ledger = ledger_with("alice", 100);
        ledger.join("bob", 100);
        ledger.place_bet("bob", 20, false, None).unwrap();

        // Alice has no active bet.
        assert_eq!(
            ledger.cash_out_player("alice", 2.0),
            Err(EngineError::BetNotFound)
        );

        let (bet_id, payout) = ledger.cash_out_player("bob", 2.0).unwrap();
        assert_eq!(payout, 40);
        assert_eq!(ledger.bets()[0].id, bet_id);
    }

    #[test]
    fn test_take_round_bets_resets_for_next_round() {
        let mut ledger = ledger_with("alice", 1_000);
        let first = ledger.place_bet("alice", 10, false, None).unwrap();
        ledger.settle_all_unsettled(1.1);

        let snapshot = ledger.take_round_bets();
        assert_eq!(snapshot.len(), 1);
        assert!(ledger.bets().is_empty());

        // Ids stay unique across rounds.
        let second = ledger.place_bet("alice", 10, false, None).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_auto_cashout_preference_clamps_target() {
        let mut ledger = ledger_with("alice", 100);
        ledger.set_auto_cashout("alice", true, 0.5);
        let session = ledger.session("alice").unwrap();
        assert!(session.auto_cashout.enabled);
        // A target at or below 1.0 would cash out instantly; clamped.
        assert_eq!(session.auto_cashout.target, 1.01);
    }
}
