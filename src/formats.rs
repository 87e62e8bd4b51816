use serde::{Deserialize, Serialize};

/// Rating labels in ascending order; position + 1 is the numeric quality.
pub const QUALITY_LABELS: [&str; 5] = ["poor", "fair", "good", "excellent", "the best!"];

/// Annotation rating on the listing, 1 ("poor") to 5 ("the best!").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Quality(u8);

impl Quality {
    /// Exact lookup: case and punctuation matter.
    pub fn from_label(label: &str) -> Option<Self> {
        QUALITY_LABELS
            .iter()
            .position(|known| *known == label)
            .map(|idx| Self(idx as u8 + 1))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Quality {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (1..=5).contains(&value) {
            Ok(Self(value))
        } else {
            Err(format!("quality must be within 1..=5, got {value}"))
        }
    }
}

impl From<Quality> for u8 {
    fn from(quality: Quality) -> Self {
        quality.0
    }
}

/// One row of the link manifest. Field order is the manifest column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    #[serde(rename = "game_id")]
    pub id: u64,
    #[serde(rename = "game_link")]
    pub link: String,
    #[serde(rename = "game_quality")]
    pub quality: Quality,
    #[serde(rename = "game_comments_qtd")]
    pub comment_count: u32,
}

/// Strings scraped from one listing row, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub link: Option<String>,
    pub quality_label: Option<String>,
    pub comments_text: String,
}

/// Exported move record for one game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: u64,
    pub raw_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_labels_map_to_one_through_five() {
        let values: Vec<u8> = QUALITY_LABELS
            .iter()
            .map(|label| Quality::from_label(label).map(Quality::value).unwrap_or(0))
            .collect();
        assert_eq!(values, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn quality_lookup_is_exact() {
        assert_eq!(Quality::from_label("Poor"), None);
        assert_eq!(Quality::from_label("the best"), None);
        assert_eq!(Quality::from_label(" good"), None);
        assert_eq!(Quality::from_label(""), None);
    }

    #[test]
    fn quality_rejects_out_of_range_values() {
        assert!(Quality::try_from(0).is_err());
        assert!(Quality::try_from(6).is_err());
        assert_eq!(Quality::try_from(4).map(Quality::value), Ok(4));
    }
}
