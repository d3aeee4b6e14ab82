use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagType {
    Domain,
    Persona,
    Impact,
    Status,
    SourceTag,
    #[default]
    System,
}

impl TagType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagType::Domain => "domain",
            TagType::Persona => "persona",
            TagType::Impact => "impact",
            TagType::Status => "status",
            TagType::SourceTag => "source_tag",
            TagType::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "domain" => Some(TagType::Domain),
            "persona" => Some(TagType::Persona),
            "impact" => Some(TagType::Impact),
            "status" => Some(TagType::Status),
            "source_tag" => Some(TagType::SourceTag),
            "system" => Some(TagType::System),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub slug: String,
    pub name: String,
    #[serde(rename = "type")]
    pub tag_type: TagType,
}

/// Lowercases and joins whitespace-separated words with `-`: `"Home Improvement"` -> `home-improvement`.
pub fn slugify(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_hyphenates_and_lowercases() {
        assert_eq!(slugify("Home Improvement"), "home-improvement");
        assert_eq!(slugify("  Personal   Finance "), "personal-finance");
        assert_eq!(slugify("budgeting"), "budgeting");
        assert_eq!(slugify("   "), "");
    }

    #[test]
    fn tag_type_round_trips_through_text() {
        for t in [TagType::Domain, TagType::SourceTag, TagType::System] {
            assert_eq!(TagType::parse(t.as_str()), Some(t));
        }
    }
}
