use serde::{Deserialize, Serialize};

/// Engagement events recorded against a problem by the display layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    View,
    ClickSource,
    Bookmark,
    Share,
}

impl SignalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::View => "view",
            SignalType::ClickSource => "click_source",
            SignalType::Bookmark => "bookmark",
            SignalType::Share => "share",
        }
    }
}
