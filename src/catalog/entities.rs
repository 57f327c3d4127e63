//! The subset of MangaDex entities the backend proxies.
//!
//! The meaning of most fields can be found at <https://api.mangadex.org/docs/>

use serde::{Deserialize, Serialize};
use serde_json::Value;

use std::collections::HashMap;

/// Language code (`en`, `ja-ro`, ...) to text
pub type LocalizedString = HashMap<String, String>;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Manga,
    CoverArt,
    Chapter,
    Author,
    Artist,
    Tag,
    ScanlationGroup,
    User,
    Creator,
    #[serde(other)]
    Other,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Relationship {
    pub id: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    /// Only present when the relationship was requested with `includes[]`
    pub attributes: Option<Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TagAttributes {
    pub name: LocalizedString,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Tag {
    pub id: String,
    pub attributes: TagAttributes,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MangaAttributes {
    pub title: LocalizedString,
    #[serde(default)]
    pub alt_titles: Vec<LocalizedString>,
    #[serde(default)]
    pub description: LocalizedString,
    pub last_chapter: Option<String>,
    pub status: Option<String>,
    pub year: Option<i32>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Manga {
    pub id: String,
    pub attributes: MangaAttributes,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

/// Follow counters from `/statistics/manga`
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default)]
pub struct Statistics {
    #[serde(default)]
    pub follows: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CoverArtAttributes {
    pub file_name: String,
    pub volume: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AuthorAttributes {
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ChapterAttributes {
    pub title: Option<String>,
    pub volume: Option<String>,
    pub chapter: Option<String>,
    #[serde(default)]
    pub pages: usize,
    pub translated_language: Option<String>,
    pub publish_at: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Chapter {
    pub id: String,
    pub attributes: ChapterAttributes,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AtHomeChapter {
    pub hash: String,
    pub data: Vec<String>,
    pub data_saver: Vec<String>,
}

/// Response of `/at-home/server/{chapterId}`
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AtHomeServer {
    pub base_url: String,
    pub chapter: AtHomeChapter,
}
