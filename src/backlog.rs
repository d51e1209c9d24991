//! Backlog items, the uploaded backlog format and the estimation download.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

const UNNAMED_TASK: &str = "Unnamed task";
const NO_DESCRIPTION: &str = "No description provided.";

/// One story of the room's backlog.
///
/// The estimation fields are filled in by the server once the story's votes
/// have been revealed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawBacklogItem")]
pub struct BacklogItem {
    pub name: String,
    pub description: String,
    /// Consensus result recorded for this story.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_vote: Option<String>,
    /// Rule that produced `final_vote` (`strict`, `average`, `median`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consensus_rule: Option<String>,
    /// Raw votes at reveal time, username to card face.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub votes_submitted: BTreeMap<String, String>,
}

/// Backlog item as uploaded or sent by the server.
///
/// Files may name a story through `name`, the French `nom`, or both; the
/// first non-empty one wins.
#[derive(Deserialize)]
struct RawBacklogItem {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    nom: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    final_vote: Option<String>,
    #[serde(default)]
    consensus_rule: Option<String>,
    #[serde(default)]
    votes_submitted: Option<BTreeMap<String, String>>,
}

impl From<RawBacklogItem> for BacklogItem {
    fn from(raw: RawBacklogItem) -> Self {
        let name = [raw.name, raw.nom]
            .into_iter()
            .flatten()
            .find(|name| !name.is_empty())
            .unwrap_or_else(|| UNNAMED_TASK.to_string());
        Self {
            name,
            description: raw
                .description
                .unwrap_or_else(|| NO_DESCRIPTION.to_string()),
            final_vote: raw.final_vote,
            consensus_rule: raw.consensus_rule,
            votes_submitted: raw.votes_submitted.unwrap_or_default(),
        }
    }
}

impl BacklogItem {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            final_vote: None,
            consensus_rule: None,
            votes_submitted: BTreeMap::new(),
        }
    }

    /// Whether the server has recorded a result for this story.
    pub fn is_estimated(&self) -> bool {
        self.final_vote.is_some()
    }
}

/// Parse an uploaded backlog file: a JSON array of `{name|nom, description}`.
///
/// Missing names and descriptions get placeholder text rather than failing.
///
/// # Errors
///
/// Returns [`PokerRoomError::Serialization`](crate::PokerRoomError::Serialization)
/// if `json` is not an array of objects.
pub fn parse_backlog(json: &str) -> Result<Vec<BacklogItem>> {
    Ok(serde_json::from_str(json)?)
}

/// The estimation file handed to the renderer when the admin asks for a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BacklogFile {
    pub file_name: String,
    /// Pretty-printed JSON of the whole backlog, estimation results included.
    pub contents: String,
}

impl BacklogFile {
    /// # Errors
    ///
    /// Fails only if the backlog cannot be serialized.
    pub fn new(room_id: &str, backlog: &[BacklogItem]) -> Result<Self> {
        Ok(Self {
            file_name: format!("backlog_{room_id}_estimations.json"),
            contents: serde_json::to_string_pretty(backlog)?,
        })
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_french_name_alias_and_defaults() {
        let items = parse_backlog(
            r#"[
                {"name": "Login page", "description": "OAuth flow"},
                {"nom": "Tableau de bord"},
                {}
            ]"#,
        )
        .unwrap();

        assert_eq!(items.len(), 3);
        assert_eq!(items[0], BacklogItem::new("Login page", "OAuth flow"));
        assert_eq!(items[1].name, "Tableau de bord");
        assert_eq!(items[1].description, NO_DESCRIPTION);
        assert_eq!(items[2].name, UNNAMED_TASK);
    }

    #[test]
    fn parse_prefers_first_non_empty_name() {
        let items = parse_backlog(
            r#"[
                {"name": "Login page", "nom": "Page de connexion"},
                {"name": "", "nom": "Tableau de bord"},
                {"name": "", "nom": ""},
                {"name": null, "description": null}
            ]"#,
        )
        .unwrap();

        assert_eq!(items[0].name, "Login page");
        assert_eq!(items[1].name, "Tableau de bord");
        assert_eq!(items[2].name, UNNAMED_TASK);
        assert_eq!(items[3].name, UNNAMED_TASK);
        assert_eq!(items[3].description, NO_DESCRIPTION);
    }

    #[test]
    fn serialized_item_has_no_nom_key() {
        let json = serde_json::to_value(BacklogItem::new("Search", "Full text")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "Search", "description": "Full text"})
        );
    }

    #[test]
    fn parse_rejects_non_array() {
        assert!(parse_backlog(r#"{"name": "x"}"#).is_err());
        assert!(parse_backlog("not json").is_err());
    }

    #[test]
    fn server_items_keep_estimation_results() {
        let item: BacklogItem = serde_json::from_str(
            r#"{
                "name": "Search",
                "description": "Full text",
                "votes": {},
                "final_vote": "5.0",
                "consensus_rule": "median",
                "votes_submitted": {"alice": "5", "bob": "5"}
            }"#,
        )
        .unwrap();

        assert!(item.is_estimated());
        assert_eq!(item.consensus_rule.as_deref(), Some("median"));
        assert_eq!(item.votes_submitted.len(), 2);
    }

    #[test]
    fn download_file_is_named_after_room() {
        let mut done = BacklogItem::new("Search", "Full text");
        done.final_vote = Some("8".into());
        let file = BacklogFile::new("3F2A9C1B", &[done, BacklogItem::new("Export", "CSV")])
            .unwrap();

        assert_eq!(file.file_name, "backlog_3F2A9C1B_estimations.json");
        let parsed: Vec<BacklogItem> = serde_json::from_str(&file.contents).unwrap();
        assert_eq!(parsed[0].final_vote.as_deref(), Some("8"));
        assert!(!parsed[1].is_estimated());
        assert!(file.contents.contains('\n'));
    }
}
