use serde::{Deserialize, Serialize};

use std::collections::BTreeSet;

use super::query_utils::lenient_year;

/// Which shelf [`list_manga`](crate::VaaniClient::list_manga) should read from
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    Popular,
    Recent,
    #[default]
    Default,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MangaStatus {
    Ongoing,
    Completed,
    Hiatus,
    Cancelled,
    #[default]
    #[serde(other)]
    Unknown,
}

/// One catalog entry as shown in lists and search results.
///
/// `id` is the join key for every other lookup and is compared as-is, without any case or
/// whitespace normalization.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MangaSummary {
    #[serde(alias = "_id")]
    pub id: String,
    pub title: String,
    #[serde(alias = "image", alias = "coverImage", default)]
    pub cover_image_url: String,
    #[serde(alias = "chapter", default)]
    pub chapter_label: String,
    #[serde(alias = "view", alias = "views", default)]
    pub view_count_label: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MangaDetail {
    #[serde(flatten)]
    pub summary: MangaSummary,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub status: MangaStatus,
    #[serde(default, deserialize_with = "lenient_year")]
    pub year: Option<i32>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

/// One page of search results
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SearchResults {
    pub results: Vec<MangaSummary>,
    pub total: u64,
    pub page: u32,
    pub offset: u32,
}

impl SearchResults {
    pub fn has_next_page(&self) -> bool {
        u64::from(self.offset) + (self.results.len() as u64) < self.total
    }
}
