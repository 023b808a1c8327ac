use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::config::Config;
use crate::events::ChatMode;

/// A conversation the user touched recently, cached locally so `vaelis list`
/// works offline and resume is one keystroke away
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentConversation {
    pub conv_id: i64,
    pub title: String,
    pub mode: ChatMode,
    pub last_activity: DateTime<Utc>,
}

/// Maximum entries kept in the cache
const MAX_RECENTS: usize = 50;

/// Local cache of recently opened conversations
pub struct RecentsStore {
    path: PathBuf,
}

impl RecentsStore {
    pub fn new(config: &Config) -> Self {
        Self {
            path: config.vaelis_home.join("recents.json"),
        }
    }

    /// Load the cache, newest first. A missing file is an empty cache.
    pub fn load(&self) -> Result<Vec<RecentConversation>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)
            .context("Failed to read recents cache")?;
        let mut recents: Vec<RecentConversation> = serde_json::from_str(&content)
            .context("Failed to parse recents cache")?;
        recents.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        Ok(recents)
    }

    /// Record activity on a conversation, replacing any previous entry for it
    pub fn record(&self, conv_id: i64, title: &str, mode: ChatMode) -> Result<()> {
        let mut recents = self.load().unwrap_or_default();
        recents.retain(|r| r.conv_id != conv_id);
        recents.insert(
            0,
            RecentConversation {
                conv_id,
                title: truncate_title(title),
                mode,
                last_activity: Utc::now(),
            },
        );
        recents.truncate(MAX_RECENTS);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Failed to create .vaelis directory")?;
        }
        let content = serde_json::to_string_pretty(&recents)
            .context("Failed to serialize recents cache")?;
        fs::write(&self.path, content).context("Failed to write recents cache")?;

        Ok(())
    }
}

/// Conversations are titled by their first prompt; keep the cache compact
fn truncate_title(title: &str) -> String {
    let title = title.trim().replace('\n', " ");
    let mut out: String = title.chars().take(80).collect();
    if out.len() < title.len() {
        out.push('…');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles_are_flattened_and_capped() {
        let long = "x".repeat(200);
        assert_eq!(truncate_title(&long).chars().count(), 81);
        assert_eq!(truncate_title("a\nb"), "a b");
        assert_eq!(truncate_title("  hello  "), "hello");
    }
}
