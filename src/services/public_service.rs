//! Service helpers that expose read-only public projections of the tournament.

use std::cmp::Ordering;

use crate::{
    dao::models::{FixtureEntity, ResultEntity, TeamEntity},
    dto::public::{
        CollectionStatus, FixturesResponse, GroupStandings, GroupsResponse, ResultsResponse,
        StandingRow, SyncStatusResponse,
    },
    state::SharedState,
    sync::GroupsSnapshot,
};

/// Return the standings of every group.
pub async fn get_groups(state: &SharedState) -> GroupsResponse {
    let groups = state.engine().groups().await;
    GroupsResponse {
        groups: standings(groups),
    }
}

/// Return every scheduled match.
pub async fn get_fixtures(state: &SharedState) -> FixturesResponse {
    let fixtures = state.engine().snapshot::<FixtureEntity>().await;
    FixturesResponse {
        fixtures: fixtures.into_iter().map(Into::into).collect(),
    }
}

/// Return every recorded result.
pub async fn get_results(state: &SharedState) -> ResultsResponse {
    let results = state.engine().snapshot::<ResultEntity>().await;
    ResultsResponse {
        results: results.into_iter().map(Into::into).collect(),
    }
}

/// Return the per-collection sync state and the degraded flag.
pub async fn get_sync_status(state: &SharedState) -> SyncStatusResponse {
    let engine = state.engine();
    SyncStatusResponse {
        degraded: engine.is_degraded().await,
        collections: engine.statuses().into_iter().map(CollectionStatus::from).collect(),
    }
}

/// Rank the teams of each group: most points first, then most wins, then by name.
pub fn standings(groups: GroupsSnapshot) -> Vec<GroupStandings> {
    groups
        .into_iter()
        .map(|(label, mut teams)| {
            teams.sort_by(rank);
            GroupStandings {
                label,
                teams: teams.into_iter().map(StandingRow::from).collect(),
            }
        })
        .collect()
}

fn rank(a: &TeamEntity, b: &TeamEntity) -> Ordering {
    b.points
        .cmp(&a.points)
        .then_with(|| b.win.cmp(&a.win))
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.key.cmp(&b.key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::test_support::team;

    #[test]
    fn standings_rank_by_points_then_wins_then_name() {
        let mut beta = team("t2", "beta", "A", 6);
        beta.win = 2;
        let mut gamma = team("t3", "Gamma", "A", 6);
        gamma.win = 1;
        let mut alpha = team("t1", "Alpha", "A", 6);
        alpha.win = 2;
        let delta = team("t4", "Delta", "A", 9);

        let mut groups = GroupsSnapshot::new();
        groups.insert("A".into(), vec![beta, gamma, alpha, delta]);
        groups.insert("B".into(), vec![]);

        let table = standings(groups);
        let order: Vec<_> = table[0].teams.iter().map(|row| row.name.as_str()).collect();
        assert_eq!(order, vec!["Delta", "Alpha", "beta", "Gamma"]);
        assert_eq!(table[1].label, "B");
        assert!(table[1].teams.is_empty());
    }
}
