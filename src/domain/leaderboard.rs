// Room leaderboard entries as published by the room service.

use serde::{Deserialize, Serialize};

const MAX_NAME_COLUMN: usize = 14;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub count: i64,
}

impl LeaderboardEntry {
    pub fn new(name: impl Into<String>, count: i64) -> Self {
        Self {
            name: name.into(),
            count,
        }
    }
}

/// Formats the first `limit` entries as ranked rows, in the order the room sent them.
///
/// Names are cut to a fixed column so counts line up.
pub fn standings(entries: &[LeaderboardEntry], limit: usize) -> Vec<String> {
    entries
        .iter()
        .take(limit)
        .enumerate()
        .map(|(rank, entry)| {
            let name: String = entry.name.chars().take(MAX_NAME_COLUMN).collect();
            format!(
                "{}. {:<width$}  {}",
                rank + 1,
                name,
                entry.count,
                width = MAX_NAME_COLUMN
            )
        })
        .collect()
}
