//! Data models for the project.
//!
//! This module defines the canonical anime record every provider document is
//! converted into, together with its classification enums.

use serde::{Deserialize, Serialize};

/// Canonical anime record produced by converting a raw provider document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnimeRecord {
    /// Links to the entry on every provider it was seen on
    pub sources: Vec<String>,

    // Titles
    pub title: String,
    #[serde(default)]
    pub synonyms: Vec<String>,

    // Type and status
    #[serde(rename = "type", default)]
    pub anime_type: AnimeType,
    #[serde(default)]
    pub episodes: u32,
    #[serde(default)]
    pub status: AnimeStatus,
    #[serde(rename = "animeSeason", default)]
    pub anime_season: AnimeSeason,

    // Images
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,

    // Relations and classifications
    #[serde(rename = "relatedAnime", default)]
    pub related_anime: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl AnimeRecord {
    /// Create a record with a single source and a title, everything else unknown
    pub fn new(source: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            sources: vec![source.into()],
            title: title.into(),
            synonyms: Vec::new(),
            anime_type: AnimeType::default(),
            episodes: 0,
            status: AnimeStatus::default(),
            anime_season: AnimeSeason::default(),
            picture: None,
            thumbnail: None,
            related_anime: Vec::new(),
            tags: Vec::new(),
        }
    }
}

/// Season in which an anime premiered
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnimeSeason {
    #[serde(default)]
    pub season: Season,
    #[serde(default)]
    pub year: Option<i32>,
}

/// Anime type
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum AnimeType {
    Tv,
    Movie,
    Ova,
    Ona,
    Special,
    #[default]
    Unknown,
}

impl std::fmt::Display for AnimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnimeType::Tv => write!(f, "TV"),
            AnimeType::Movie => write!(f, "MOVIE"),
            AnimeType::Ova => write!(f, "OVA"),
            AnimeType::Ona => write!(f, "ONA"),
            AnimeType::Special => write!(f, "SPECIAL"),
            AnimeType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl std::str::FromStr for AnimeType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TV" => Ok(AnimeType::Tv),
            "MOVIE" => Ok(AnimeType::Movie),
            "OVA" => Ok(AnimeType::Ova),
            "ONA" => Ok(AnimeType::Ona),
            "SPECIAL" => Ok(AnimeType::Special),
            "UNKNOWN" => Ok(AnimeType::Unknown),
            _ => Err(anyhow::anyhow!("Invalid anime type: {}", s)),
        }
    }
}

/// Airing status
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum AnimeStatus {
    Finished,
    Ongoing,
    Upcoming,
    #[default]
    Unknown,
}

impl std::fmt::Display for AnimeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnimeStatus::Finished => write!(f, "FINISHED"),
            AnimeStatus::Ongoing => write!(f, "ONGOING"),
            AnimeStatus::Upcoming => write!(f, "UPCOMING"),
            AnimeStatus::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl std::str::FromStr for AnimeStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "FINISHED" => Ok(AnimeStatus::Finished),
            "ONGOING" => Ok(AnimeStatus::Ongoing),
            "UPCOMING" => Ok(AnimeStatus::Upcoming),
            "UNKNOWN" => Ok(AnimeStatus::Unknown),
            _ => Err(anyhow::anyhow!("Invalid anime status: {}", s)),
        }
    }
}

/// Season of the year
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Season {
    Spring,
    Summer,
    Fall,
    Winter,
    #[default]
    Undefined,
}

impl std::fmt::Display for Season {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Season::Spring => write!(f, "SPRING"),
            Season::Summer => write!(f, "SUMMER"),
            Season::Fall => write!(f, "FALL"),
            Season::Winter => write!(f, "WINTER"),
            Season::Undefined => write!(f, "UNDEFINED"),
        }
    }
}

impl std::str::FromStr for Season {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SPRING" => Ok(Season::Spring),
            "SUMMER" => Ok(Season::Summer),
            "FALL" => Ok(Season::Fall),
            "WINTER" => Ok(Season::Winter),
            "UNDEFINED" => Ok(Season::Undefined),
            _ => Err(anyhow::anyhow!("Invalid season: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_defaults_from_minimal_json() {
        let json = r#"{"sources":["https://anidb.net/anime/1535"],"title":"Death Note"}"#;
        let record: AnimeRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record, AnimeRecord::new("https://anidb.net/anime/1535", "Death Note"));
        assert_eq!(record.anime_type, AnimeType::Unknown);
        assert_eq!(record.anime_season.season, Season::Undefined);
    }

    #[test]
    fn test_record_uses_canonical_field_names() {
        let mut record = AnimeRecord::new("https://kitsu.app/anime/1376", "Death Note");
        record.anime_type = AnimeType::Tv;
        record.anime_season.year = Some(2006);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["type"], "TV");
        assert_eq!(value["animeSeason"]["year"], 2006);
        assert!(value.get("relatedAnime").is_some());
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("tv".parse::<AnimeType>().unwrap(), AnimeType::Tv);
        assert_eq!("Finished".parse::<AnimeStatus>().unwrap(), AnimeStatus::Finished);
        assert_eq!("FALL".parse::<Season>().unwrap(), Season::Fall);
        assert!("weekly".parse::<AnimeStatus>().is_err());
        assert_eq!(Season::Winter.to_string(), "WINTER");
    }
}
