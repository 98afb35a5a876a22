use serde::Serialize;

use crate::matching::match_record::MatchRecord;

/// Final outcome of one search, ready for display or serialization.
///
/// `matches` is `Some` exactly when `success` is true; a successful search
/// may still have found nothing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowResult {
    pub success: bool,
    pub message: String,
    pub matches: Option<Vec<MatchRecord>>,
}

impl WorkflowResult {
    pub fn completed(matches: Vec<MatchRecord>) -> Self {
        let message = match matches.len() {
            0 => "Search completed. The person was not found in the video.".to_string(),
            1 => "Search completed. Found 1 matching frame.".to_string(),
            n => format!("Search completed. Found {n} matching frames."),
        };
        Self {
            success: true,
            message,
            matches: Some(matches),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            matches: None,
        }
    }
}
