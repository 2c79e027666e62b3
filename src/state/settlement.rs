//! Round settlement: turns the round's contributions into updated balances.
//!
//! Every team pools what its members staked, the pool is scaled by the
//! multiplier and split evenly across the team, whatever each member put in.
//! Values are never rounded here; rounding belongs to display code only.

use std::collections::BTreeMap;

use indexmap::IndexMap;

use crate::state::game::{Player, PlayerId, TeamId, VoteStatus};

/// Per-team figures of a settled round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TeamSettlement {
    /// Sum of the members' contributions.
    pub raw_pot: f64,
    /// `raw_pot * multiplier`.
    pub multiplied_pot: f64,
    /// Amount credited to each member.
    pub share: f64,
    /// Number of members the pot was split across.
    pub members: usize,
}

/// Result of [`settle`].
#[derive(Debug, Clone, PartialEq)]
pub struct RoundSettlement {
    /// Players with updated balances and cleared votes.
    pub players: IndexMap<PlayerId, Player>,
    /// Per-team breakdown, only for teams that have members.
    pub teams: BTreeMap<TeamId, TeamSettlement>,
}

impl RoundSettlement {
    /// Raw pots keyed by team, the shape stored on the game record.
    pub fn team_pots(&self) -> BTreeMap<TeamId, f64> {
        self.teams
            .iter()
            .map(|(team, settled)| (*team, settled.raw_pot))
            .collect()
    }

    /// Member counts the pots were split across, keyed by team.
    pub fn team_sizes(&self) -> BTreeMap<TeamId, usize> {
        self.teams
            .iter()
            .map(|(team, settled)| (*team, settled.members))
            .collect()
    }
}

/// Settle one round.
///
/// Missing votes count as zero. The input is left untouched so the same
/// input always produces the same output.
pub fn settle(players: &IndexMap<PlayerId, Player>, multiplier: f64) -> RoundSettlement {
    let mut pots: BTreeMap<TeamId, (f64, usize)> = BTreeMap::new();
    for player in players.values() {
        let entry = pots.entry(player.team).or_insert((0.0, 0));
        entry.0 += player.current_vote.unwrap_or(0.0);
        entry.1 += 1;
    }

    let teams: BTreeMap<TeamId, TeamSettlement> = pots
        .into_iter()
        .map(|(team, (raw_pot, members))| {
            let multiplied_pot = raw_pot * multiplier;
            let share = multiplied_pot / members as f64;
            (
                team,
                TeamSettlement {
                    raw_pot,
                    multiplied_pot,
                    share,
                    members,
                },
            )
        })
        .collect();

    let players = players
        .iter()
        .map(|(id, player)| {
            // Every player's team is present in `teams` by construction.
            let share = teams
                .get(&player.team)
                .map(|settled| settled.share)
                .unwrap_or_default();
            let contribution = player.current_vote.unwrap_or(0.0);
            let change = share - contribution;

            let mut settled = player.clone();
            settled.last_round_change = Some(change);
            settled.points = player.points + change;
            settled.current_vote = None;
            settled.vote_status = VoteStatus::Settled;
            (id.clone(), settled)
        })
        .collect();

    RoundSettlement { players, teams }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(team: TeamId, points: f64, vote: Option<f64>) -> Player {
        let mut player = Player::new(format!("p{team}"), team, points);
        if let Some(amount) = vote {
            player.submit(amount);
        }
        player
    }

    fn roster(entries: &[(&str, Player)]) -> IndexMap<PlayerId, Player> {
        entries
            .iter()
            .map(|(id, player)| (PlayerId::from(*id), player.clone()))
            .collect()
    }

    #[test]
    fn two_team_scenario() {
        let players = roster(&[
            ("a", player(1, 10.0, Some(4.0))),
            ("b", player(1, 10.0, Some(6.0))),
            ("c", player(2, 20.0, Some(0.0))),
        ]);

        let result = settle(&players, 2.0);

        assert_eq!(result.team_pots().get(&1), Some(&10.0));
        assert_eq!(result.team_pots().get(&2), Some(&0.0));
        assert_eq!(result.teams[&1].multiplied_pot, 20.0);
        assert_eq!(result.teams[&1].share, 10.0);

        let a = &result.players[&PlayerId::from("a")];
        assert_eq!(a.points, 16.0);
        assert_eq!(a.last_round_change, Some(6.0));
        let b = &result.players[&PlayerId::from("b")];
        assert_eq!(b.points, 14.0);
        assert_eq!(b.last_round_change, Some(4.0));
        let c = &result.players[&PlayerId::from("c")];
        assert_eq!(c.points, 20.0);
        assert_eq!(c.last_round_change, Some(0.0));
    }

    #[test]
    fn votes_are_cleared_and_marked_settled() {
        let players = roster(&[("a", player(1, 10.0, Some(4.0)))]);
        let result = settle(&players, 1.5);
        let a = &result.players[&PlayerId::from("a")];
        assert_eq!(a.current_vote, None);
        assert_eq!(a.vote_status, VoteStatus::Settled);
    }

    #[test]
    fn zero_multiplier_loses_exactly_the_contribution() {
        let players = roster(&[
            ("a", player(1, 10.0, Some(3.0))),
            ("b", player(1, 10.0, Some(7.0))),
        ]);
        let result = settle(&players, 0.0);
        assert_eq!(result.players[&PlayerId::from("a")].last_round_change, Some(-3.0));
        assert_eq!(result.players[&PlayerId::from("b")].last_round_change, Some(-7.0));
    }

    #[test]
    fn single_member_team_is_not_diluted() {
        let players = roster(&[("solo", player(3, 10.0, Some(5.0)))]);
        let result = settle(&players, 1.8);
        assert_eq!(result.teams[&3].share, 5.0 * 1.8);
    }

    #[test]
    fn non_contributing_team_shares_nothing() {
        let players = roster(&[("a", player(1, 10.0, None)), ("b", player(1, 4.0, None))]);
        let result = settle(&players, 3.0);
        assert_eq!(result.teams[&1].share, 0.0);
        assert_eq!(result.players[&PlayerId::from("b")].points, 4.0);
    }

    #[test]
    fn team_changes_sum_to_pot_times_multiplier_minus_one() {
        let players = roster(&[
            ("a", player(1, 12.5, Some(2.0))),
            ("b", player(1, 9.0, Some(5.0))),
            ("c", player(1, 3.0, None)),
            ("d", player(2, 8.0, Some(8.0))),
        ]);
        let multiplier = 1.5;
        let result = settle(&players, multiplier);

        for (team, settled) in &result.teams {
            let sum: f64 = result
                .players
                .values()
                .filter(|p| p.team == *team)
                .filter_map(|p| p.last_round_change)
                .sum();
            let expected = settled.raw_pot * (multiplier - 1.0);
            assert!((sum - expected).abs() < 1e-9, "team {team}: {sum} != {expected}");
        }
    }

    #[test]
    fn new_points_equal_old_points_plus_change() {
        let players = roster(&[
            ("a", player(1, 10.3, Some(3.0))),
            ("b", player(1, 7.7, Some(1.0))),
            ("c", player(2, 1.1, None)),
        ]);
        let result = settle(&players, 2.3);
        for (id, before) in &players {
            let after = &result.players[id];
            assert_eq!(after.points, before.points + after.last_round_change.unwrap());
        }
    }

    #[test]
    fn settling_cleared_votes_changes_nothing() {
        let players = roster(&[
            ("a", player(1, 10.0, Some(4.0))),
            ("b", player(2, 10.0, Some(6.0))),
        ]);
        let first = settle(&players, 2.0);
        let second = settle(&first.players, 2.0);
        for (id, settled) in &second.players {
            assert_eq!(settled.last_round_change, Some(0.0));
            assert_eq!(settled.points, first.players[id].points);
        }
    }

    #[test]
    fn stale_input_reproduces_the_same_result() {
        let players = roster(&[("a", player(1, 10.0, Some(4.0)))]);
        assert_eq!(settle(&players, 2.0), settle(&players, 2.0));
    }

    #[test]
    fn empty_roster_is_a_no_op() {
        let result = settle(&IndexMap::new(), 2.0);
        assert!(result.players.is_empty());
        assert!(result.teams.is_empty());
    }
}
