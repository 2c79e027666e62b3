//! Business logic powering the admin REST routes. Every mutation goes through
//! the game engine; these helpers only translate DTOs and build views.

use crate::{
    dto::{
        admin::{AdminGameView, PhaseActionResponse, ResetScoresResponse, SettingsUpdateRequest},
        common::SettingsView,
    },
    error::ServiceError,
    services::sse_events,
    state::{SharedState, state_machine::GameEvent},
};

/// Full admin projection of the current record.
pub fn game_view(state: &SharedState) -> AdminGameView {
    sse_events::admin_view(state, &state.game())
}

/// Apply a partial settings change.
pub async fn update_settings(
    state: &SharedState,
    request: SettingsUpdateRequest,
) -> Result<SettingsView, ServiceError> {
    let settings = state.update_settings(request.into()).await?;
    Ok(settings.into())
}

/// Setup → registration.
pub async fn open_registration(state: &SharedState) -> Result<PhaseActionResponse, ServiceError> {
    run_transition(state, GameEvent::OpenRegistration).await
}

/// Registration → voting.
pub async fn start_game(state: &SharedState) -> Result<PhaseActionResponse, ServiceError> {
    run_transition(state, GameEvent::StartGame).await
}

/// Voting → results, settling the round.
pub async fn settle_round(state: &SharedState) -> Result<PhaseActionResponse, ServiceError> {
    run_transition(state, GameEvent::Settle).await
}

/// Results → voting, next round.
pub async fn next_round(state: &SharedState) -> Result<PhaseActionResponse, ServiceError> {
    run_transition(state, GameEvent::NextRound).await
}

/// Back to setup with default settings and no players.
pub async fn reset_game(state: &SharedState) -> Result<PhaseActionResponse, ServiceError> {
    run_transition(state, GameEvent::Reset).await
}

/// Every player back to the starting balance.
pub async fn reset_scores(state: &SharedState) -> Result<ResetScoresResponse, ServiceError> {
    let players_reset = state.reset_scores().await?;
    Ok(ResetScoresResponse { players_reset })
}

async fn run_transition(
    state: &SharedState,
    event: GameEvent,
) -> Result<PhaseActionResponse, ServiceError> {
    let phase = state.transition(event).await?;
    Ok(PhaseActionResponse {
        phase: phase.into(),
        round: state.game().current_round,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::game_store::memory::MemoryGameStore,
        dto::{phase::VisibleGamePhase, player::RegisterRequest},
        services::{player_service, public_service, sse_events},
        state::AppState,
    };

    async fn attached_state() -> SharedState {
        let state = AppState::new(AppConfig::default());
        state
            .attach_store(Arc::new(MemoryGameStore::new()))
            .await
            .unwrap();
        state
    }

    fn join(name: &str, team: u32) -> RegisterRequest {
        RegisterRequest {
            name: name.into(),
            team,
        }
    }

    #[tokio::test]
    async fn two_rounds_through_the_services() {
        let state = attached_state().await;
        let settings = update_settings(
            &state,
            SettingsUpdateRequest {
                num_teams: Some(2),
                initial_points: Some(10.0),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(settings.multiplier, 2.0);

        open_registration(&state).await.unwrap();
        let ada = player_service::register(&state, join("Ada", 1)).await.unwrap();
        let bob = player_service::register(&state, join("Bob", 1)).await.unwrap();
        let cy = player_service::register(&state, join("Cy", 2)).await.unwrap();

        let started = start_game(&state).await.unwrap();
        assert_eq!(started.phase, VisibleGamePhase::Voting);
        assert_eq!(started.round, 1);

        let ada_id = ada.player_id.as_str().into();
        let reply = player_service::submit_contribution(&state, ada_id, 4.0)
            .await
            .unwrap();
        assert!(!reply.overwritten);
        assert_eq!(reply.player.current_vote, Some(4.0));
        player_service::submit_contribution(&state, cy.player_id.as_str().into(), 10.0)
            .await
            .unwrap();
        assert_eq!(public_service::get_game(&state).submitted, 2);

        let settled = settle_round(&state).await.unwrap();
        assert_eq!(settled.phase, VisibleGamePhase::Results);

        let view = game_view(&state);
        let team_one = &view.teams[0];
        assert_eq!(team_one.pot, Some(4.0));
        assert_eq!(team_one.multiplied_pot, Some(8.0));
        assert_eq!(team_one.share, Some(4.0));
        let bob_view = player_service::get_player(&state, &bob.player_id.as_str().into()).unwrap();
        assert_eq!(bob_view.points, 14.0);
        assert_eq!(bob_view.last_round_change, Some(4.0));

        let next = next_round(&state).await.unwrap();
        assert_eq!(next.round, 2);
        assert_eq!(public_service::get_game_phase(&state).round, 2);
        assert_eq!(public_service::get_game(&state).submitted, 0);
    }

    #[tokio::test]
    async fn reset_scores_then_reset_game() {
        let state = attached_state().await;
        open_registration(&state).await.unwrap();
        let ada = player_service::register(&state, join("Ada", 1)).await.unwrap();
        start_game(&state).await.unwrap();
        player_service::submit_contribution(&state, ada.player_id.as_str().into(), 5.0)
            .await
            .unwrap();
        settle_round(&state).await.unwrap();

        let reset = reset_scores(&state).await.unwrap();
        assert_eq!(reset.players_reset, 1);
        let view = player_service::get_player(&state, &ada.player_id.as_str().into()).unwrap();
        assert_eq!(view.points, 20.0);
        assert_eq!(game_view(&state).phase, VisibleGamePhase::Results);

        let back = reset_game(&state).await.unwrap();
        assert_eq!(back.phase, VisibleGamePhase::Setup);
        let err = player_service::get_player(&state, &ada.player_id.as_str().into()).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn hidden_points_apply_mid_game() {
        let state = attached_state().await;
        open_registration(&state).await.unwrap();
        player_service::register(&state, join("Ada", 2)).await.unwrap();

        let err = update_settings(
            &state,
            SettingsUpdateRequest {
                multiplier: Some(3.0),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        update_settings(
            &state,
            SettingsUpdateRequest {
                hide_points: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let public = public_service::get_game(&state);
        assert_eq!(public.teams[1].members[0].points, None);
        assert_eq!(game_view(&state).teams[1].members[0].points, 20.0);
    }

    #[tokio::test]
    async fn transitions_are_announced_on_the_public_stream() {
        let state = attached_state().await;
        let mut events = state.public_sse().subscribe();

        open_registration(&state).await.unwrap();

        let first = events.recv().await.unwrap();
        assert_eq!(first.event.as_deref(), Some(sse_events::EVENT_GAME_UPDATED));
        let second = events.recv().await.unwrap();
        assert_eq!(second.event.as_deref(), Some(sse_events::EVENT_PHASE_CHANGED));
        assert!(second.data.contains("registration"));
    }
}
