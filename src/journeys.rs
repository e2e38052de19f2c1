// Journey Paths
//
// Mines the most frequent visitation sequences across reconstructed sessions,
// along with the distinct entry and exit entities.

use std::collections::{BTreeSet, HashMap};

use crate::models::{EntityCode, JourneyFlow, JourneyPath, Session};

pub const TOP_PATHS: usize = 5;
const PATH_SEPARATOR: &str = "->";

pub fn path_key(entities: &[EntityCode]) -> String {
    entities
        .iter()
        .map(EntityCode::as_str)
        .collect::<Vec<_>>()
        .join(PATH_SEPARATOR)
}

fn expand_path_key(key: &str) -> Vec<EntityCode> {
    key.split(PATH_SEPARATOR).filter_map(EntityCode::parse).collect()
}

pub fn mine_journeys(sessions: &[Session]) -> JourneyFlow {
    let mut entry_points = BTreeSet::new();
    let mut exit_points = BTreeSet::new();
    // key -> (count, first-seen position)
    let mut counts: HashMap<String, (u64, usize)> = HashMap::new();

    for session in sessions {
        let visited = &session.visited_entities;
        let (Some(first), Some(last)) = (visited.first(), visited.last()) else {
            continue;
        };
        entry_points.insert(first.clone());
        exit_points.insert(last.clone());

        let seen = counts.len();
        counts
            .entry(path_key(&session.visited_entities))
            .or_insert((0, seen))
            .0 += 1;
    }

    let mut ranked: Vec<(String, u64, usize)> = counts
        .into_iter()
        .map(|(key, (count, order))| (key, count, order))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.2.cmp(&b.2)));

    let top_paths = ranked
        .into_iter()
        .take(TOP_PATHS)
        .map(|(key, count, _)| JourneyPath {
            path: expand_path_key(&key),
            count,
        })
        .collect();

    JourneyFlow {
        entry_points: entry_points.into_iter().collect(),
        exit_points: exit_points.into_iter().collect(),
        top_paths,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeviceCategory;
    use chrono::Utc;
    use uuid::Uuid;

    fn session(codes: &[&str]) -> Session {
        Session {
            session_id: Uuid::new_v4(),
            start_time: Utc::now(),
            end_time: Utc::now(),
            visited_entities: codes.iter().map(|c| EntityCode::parse(c).unwrap()).collect(),
            device_category: DeviceCategory::Desktop,
            converted: false,
            event_count: codes.len() as u64,
        }
    }

    fn codes(list: &[EntityCode]) -> Vec<&str> {
        list.iter().map(EntityCode::as_str).collect()
    }

    #[test]
    fn repeated_path_is_counted() {
        let flow = mine_journeys(&[session(&["TX", "CA"]), session(&["TX", "CA"])]);

        assert_eq!(flow.top_paths.len(), 1);
        assert_eq!(codes(&flow.top_paths[0].path), ["TX", "CA"]);
        assert_eq!(flow.top_paths[0].count, 2);
        assert_eq!(codes(&flow.entry_points), ["TX"]);
        assert_eq!(codes(&flow.exit_points), ["CA"]);
    }

    #[test]
    fn only_five_paths_are_kept() {
        let sessions: Vec<Session> = ["AL", "AK", "AZ", "AR", "CA", "CO", "CT"]
            .iter()
            .enumerate()
            .flat_map(|(i, &code)| {
                std::iter::repeat_with(move || session(&[code, "NY"])).take(i + 1)
            })
            .collect();

        let flow = mine_journeys(&sessions);
        assert_eq!(flow.top_paths.len(), TOP_PATHS);
        assert_eq!(codes(&flow.top_paths[0].path), ["CT", "NY"]);
        assert_eq!(flow.top_paths[0].count, 7);
        assert_eq!(flow.entry_points.len(), 7);
        assert_eq!(codes(&flow.exit_points), ["NY"]);
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let flow = mine_journeys(&[session(&["WA"]), session(&["OR", "WA"])]);
        assert_eq!(codes(&flow.top_paths[0].path), ["WA"]);
        assert_eq!(codes(&flow.top_paths[1].path), ["OR", "WA"]);
    }

    #[test]
    fn path_key_joins_with_arrow() {
        let path: Vec<EntityCode> =
            ["TX", "CA"].iter().map(|c| EntityCode::parse(c).unwrap()).collect();
        assert_eq!(path_key(&path), "TX->CA");
    }
}
