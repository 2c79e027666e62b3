use thiserror::Error;
use uuid::Uuid;

/// Phases of the game. The cycle `voting → results → voting` never terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    /// Admin configures teams, starting balance and multiplier.
    Setup,
    /// Players may join.
    Registration,
    /// Players submit their contribution for the current round.
    Voting,
    /// The round has been settled and results are shown.
    Results,
}

impl GamePhase {
    /// Stable lowercase name used in logs and payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            GamePhase::Setup => "setup",
            GamePhase::Registration => "registration",
            GamePhase::Voting => "voting",
            GamePhase::Results => "results",
        }
    }
}

/// Events that can be applied to the state machine. Only the admin emits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    /// Leave setup and let players join.
    OpenRegistration,
    /// Close the lobby and start the first voting round.
    StartGame,
    /// Settle the round and show results.
    Settle,
    /// Start the next voting round.
    NextRound,
    /// Wipe everything and go back to setup.
    Reset,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: GamePhase,
    /// The event that cannot be applied from this phase.
    pub event: GameEvent,
}

/// Errors that can occur when planning a state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    AlreadyPending,
    /// The requested transition is not valid from the current phase.
    InvalidTransition(InvalidTransition),
}

/// Errors that can occur when applying a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
    /// State machine phase changed since the plan was created.
    PhaseMismatch {
        /// Phase when plan was created.
        expected: GamePhase,
        /// Current phase.
        actual: GamePhase,
    },
    /// State machine version changed since the plan was created.
    VersionMismatch {
        /// Version when plan was created.
        expected: usize,
        /// Current version.
        actual: usize,
    },
}

/// Errors that can occur when aborting a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned state transition.
pub type PlanId = Uuid;

/// A planned state machine transition that has been validated but not yet applied.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Phase the state machine is currently in.
    pub from: GamePhase,
    /// Phase the state machine will transition to.
    pub to: GamePhase,
    /// Event that triggered this transition.
    pub event: GameEvent,
    /// Version number after applying this transition.
    pub version_next: usize,
}

/// Phase state machine with a plan/apply/abort protocol so side effects can
/// run between validation and commit.
#[derive(Debug, Clone)]
pub struct GameStateMachine {
    phase: GamePhase,
    version: usize,
    pending: Option<Plan>,
}

impl GameStateMachine {
    /// Restart the machine from a phase loaded from storage.
    pub fn resume(phase: GamePhase) -> Self {
        Self {
            phase,
            version: 0,
            pending: None,
        }
    }

    /// Plan a transition by validating that the event can be applied from the current phase.
    /// Returns a Plan that can later be applied or aborted.
    pub fn plan(&mut self, event: GameEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let next = self
            .compute_transition(event)
            .map_err(PlanError::InvalidTransition)?;

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.phase,
            to: next,
            event,
            version_next: self.version + 1,
        };

        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Apply a planned transition, moving the state machine to the next phase.
    /// Returns the new phase after the transition.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<GamePhase, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected_plan_id = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected: expected_plan_id,
                got: plan_id,
            });
        }

        if self.phase != plan.from {
            return Err(ApplyError::PhaseMismatch {
                expected: plan.from,
                actual: self.phase,
            });
        }

        if self.version + 1 != plan.version_next {
            return Err(ApplyError::VersionMismatch {
                expected: plan.version_next,
                actual: self.version + 1,
            });
        }

        self.phase = plan.to;
        self.version = plan.version_next;

        Ok(self.phase)
    }

    /// Abort a planned transition without applying it, returning the state machine to its previous state.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    /// Compute a transition from an event if the transition is valid.
    fn compute_transition(&self, event: GameEvent) -> Result<GamePhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (_, GameEvent::Reset) => GamePhase::Setup,
            (GamePhase::Setup, GameEvent::OpenRegistration) => GamePhase::Registration,
            (GamePhase::Registration, GameEvent::StartGame) => GamePhase::Voting,
            (GamePhase::Voting, GameEvent::Settle) => GamePhase::Results,
            (GamePhase::Results, GameEvent::NextRound) => GamePhase::Voting,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut GameStateMachine, event: GameEvent) -> GamePhase {
        let plan = sm.plan(event).unwrap();
        sm.apply(plan.id).unwrap()
    }

    #[test]
    fn full_happy_path_cycles_rounds() {
        let mut sm = GameStateMachine::resume(GamePhase::Setup);

        assert_eq!(
            apply(&mut sm, GameEvent::OpenRegistration),
            GamePhase::Registration
        );
        assert_eq!(apply(&mut sm, GameEvent::StartGame), GamePhase::Voting);
        for _ in 0..3 {
            assert_eq!(apply(&mut sm, GameEvent::Settle), GamePhase::Results);
            assert_eq!(apply(&mut sm, GameEvent::NextRound), GamePhase::Voting);
        }
        assert_eq!(sm.plan(GameEvent::Settle).unwrap().version_next, 9);
    }

    #[test]
    fn reset_is_accepted_from_every_phase() {
        let paths: [&[GameEvent]; 4] = [
            &[],
            &[GameEvent::OpenRegistration],
            &[GameEvent::OpenRegistration, GameEvent::StartGame],
            &[
                GameEvent::OpenRegistration,
                GameEvent::StartGame,
                GameEvent::Settle,
            ],
        ];
        for path in paths {
            let mut sm = GameStateMachine::resume(GamePhase::Setup);
            for event in path {
                apply(&mut sm, *event);
            }
            assert_eq!(apply(&mut sm, GameEvent::Reset), GamePhase::Setup);
        }
    }

    #[test]
    fn invalid_transition_returns_error() {
        let mut sm = GameStateMachine::resume(GamePhase::Setup);
        let err = sm.plan(GameEvent::Settle).unwrap_err();
        match err {
            PlanError::InvalidTransition(invalid) => {
                assert_eq!(invalid.from, GamePhase::Setup);
                assert_eq!(invalid.event, GameEvent::Settle);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn settle_cannot_run_twice() {
        let mut sm = GameStateMachine::resume(GamePhase::Voting);
        apply(&mut sm, GameEvent::Settle);
        assert!(matches!(
            sm.plan(GameEvent::Settle),
            Err(PlanError::InvalidTransition(_))
        ));
    }

    #[test]
    fn second_plan_is_rejected_while_pending() {
        let mut sm = GameStateMachine::resume(GamePhase::Setup);
        sm.plan(GameEvent::OpenRegistration).unwrap();
        assert_eq!(
            sm.plan(GameEvent::Reset).unwrap_err(),
            PlanError::AlreadyPending
        );
    }

    #[test]
    fn abort_clears_pending() {
        let mut sm = GameStateMachine::resume(GamePhase::Setup);
        let plan = sm.plan(GameEvent::OpenRegistration).unwrap();
        sm.abort(plan.id).unwrap();
        assert!(sm.pending.is_none());
        assert_eq!(sm.phase, GamePhase::Setup);
    }

    #[test]
    fn apply_with_wrong_id_keeps_plan() {
        let mut sm = GameStateMachine::resume(GamePhase::Setup);
        let plan = sm.plan(GameEvent::OpenRegistration).unwrap();
        let err = sm.apply(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, ApplyError::IdMismatch { .. }));
        assert_eq!(sm.apply(plan.id).unwrap(), GamePhase::Registration);
    }
}
