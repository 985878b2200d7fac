use std::collections::BTreeMap;

use indexmap::IndexMap;
use rand::{Rng, seq::IndexedRandom};

use crate::dao::models::{DEFAULT_TEAM_GLYPH, TeamEntity};

/// Teams keyed by group label: configured labels first (in configured order), then any other
/// label found in the data, in lexical order. Teams within a group are ordered by key.
pub type GroupsSnapshot = IndexMap<String, Vec<TeamEntity>>;

/// Project a flat team list onto the groups view.
pub fn group_teams<I>(labels: &[String], teams: I) -> GroupsSnapshot
where
    I: IntoIterator<Item = TeamEntity>,
{
    let mut extra: BTreeMap<String, Vec<TeamEntity>> = BTreeMap::new();
    let mut groups: GroupsSnapshot = labels
        .iter()
        .map(|label| (label.clone(), Vec::new()))
        .collect();

    for team in teams {
        match groups.get_mut(&team.group) {
            Some(members) => members.push(team),
            None => extra.entry(team.group.clone()).or_default().push(team),
        }
    }
    groups.extend(extra);

    for members in groups.values_mut() {
        members.sort_by(|a, b| a.key.cmp(&b.key));
    }
    groups
}

/// Flatten a groups view into teams whose `group` matches the label they are listed under.
///
/// A key listed twice keeps its last occurrence. The result is ordered by key.
pub fn flatten(snapshot: &GroupsSnapshot) -> Vec<TeamEntity> {
    let mut teams: BTreeMap<String, TeamEntity> = BTreeMap::new();
    for (label, members) in snapshot {
        for team in members {
            let mut team = team.clone();
            team.group = label.clone();
            if team.glyph.is_empty() {
                team.glyph = DEFAULT_TEAM_GLYPH.to_string();
            }
            teams.insert(team.key.clone(), team);
        }
    }
    teams.into_values().collect()
}

/// Canonical form of a groups view, identical to what a load of its teams produces.
pub fn normalize(labels: &[String], snapshot: &GroupsSnapshot) -> GroupsSnapshot {
    group_teams(labels, flatten(snapshot))
}

/// Label of the group with the fewest teams among `labels`, ties broken uniformly at random.
pub fn least_populated<'a, R>(labels: &'a [String], groups: &GroupsSnapshot, rng: &mut R) -> Option<&'a String>
where
    R: Rng + ?Sized,
{
    let size = |label: &String| groups.get(label).map_or(0, Vec::len);
    let smallest = labels.iter().map(size).min()?;
    let candidates: Vec<&String> = labels.iter().filter(|label| size(label) == smallest).collect();
    candidates.choose(rng).copied()
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn labels() -> Vec<String> {
        vec!["A".into(), "B".into(), "C".into()]
    }

    fn team(key: &str, group: &str) -> TeamEntity {
        TeamEntity {
            key: key.into(),
            name: key.to_uppercase(),
            group: group.into(),
            glyph: DEFAULT_TEAM_GLYPH.into(),
            ..TeamEntity::default()
        }
    }

    #[test]
    fn configured_labels_come_first_and_stay_when_empty() {
        let groups = group_teams(
            &labels(),
            vec![team("t3", "Z"), team("t2", "B"), team("t1", "B"), team("t4", "D")],
        );

        let order: Vec<_> = groups.keys().cloned().collect();
        assert_eq!(order, vec!["A", "B", "C", "D", "Z"]);
        assert!(groups["A"].is_empty());
        let b: Vec<_> = groups["B"].iter().map(|t| t.key.as_str()).collect();
        assert_eq!(b, vec!["t1", "t2"]);
    }

    #[test]
    fn normalize_moves_teams_to_the_label_they_are_listed_under() {
        let mut snapshot = GroupsSnapshot::new();
        snapshot.insert("B".into(), vec![team("t1", "A")]);

        let normalized = normalize(&labels(), &snapshot);
        assert_eq!(normalized["B"][0].group, "B");
        assert_eq!(normalized.len(), 3);
        assert_eq!(normalize(&labels(), &normalized), normalized);
    }

    #[test]
    fn least_populated_picks_among_the_smallest_groups() {
        let groups = group_teams(&labels(), vec![team("t1", "A"), team("t2", "B")]);
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(least_populated(&labels(), &groups, &mut rng).unwrap(), "C");

        let groups = group_teams(&labels(), vec![team("t1", "A")]);
        let labels = labels();
        for _ in 0..32 {
            let picked = least_populated(&labels, &groups, &mut rng).unwrap();
            assert!(picked == "B" || picked == "C");
        }
        assert!(least_populated(&[], &groups, &mut rng).is_none());
    }
}
