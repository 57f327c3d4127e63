//! Reshaping of MangaDex payloads into the value types the reader works with.
//!
//! This is what the backend does before answering `/manga/*`; keeping it here lets the same
//! rules (titles, cover urls, quality tiers, chapter order) be checked without a server.

pub mod entities;

use crate::requests::chapter::{sort_chapters_desc, ChapterImageSet, ChapterSummary};
use crate::requests::manga::{MangaDetail, MangaStatus, MangaSummary};
use entities::{
    AtHomeServer, AuthorAttributes, Chapter, CoverArtAttributes, EntityType, LocalizedString,
    Manga, Statistics,
};

pub const COVER_BASE_URL: &str = "https://uploads.mangadex.org/covers";

/// Image tier served by the MangaDex@Home network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
    #[default]
    Full,
    DataSaver,
}

impl Quality {
    pub fn path_segment(self) -> &'static str {
        match self {
            Quality::Full => "data",
            Quality::DataSaver => "data-saver",
        }
    }
}

pub fn cover_url(manga_id: &str, file_name: &str) -> String {
    format!("{COVER_BASE_URL}/{manga_id}/{file_name}")
}

/// English text if there is one, otherwise whatever language comes first alphabetically
pub fn localized(text: &LocalizedString) -> Option<&str> {
    if let Some(en) = text.get("en") {
        return Some(en.as_str());
    }

    let mut keys: Vec<&String> = text.keys().collect();
    keys.sort();
    keys.first().and_then(|k| text.get(*k)).map(String::as_str)
}

/// `950` -> `950`, `1234` -> `1.2K`, `3400000` -> `3.4M`
pub fn compact_count(n: u64) -> String {
    match n {
        0..=999 => n.to_string(),
        1_000..=999_999 => format!("{:.1}K", n as f64 / 1_000.0),
        _ => format!("{:.1}M", n as f64 / 1_000_000.0),
    }
}

fn title_of(manga: &Manga) -> String {
    localized(&manga.attributes.title)
        .or_else(|| {
            manga
                .attributes
                .alt_titles
                .iter()
                .find_map(|t| t.get("en").map(String::as_str))
        })
        .unwrap_or("Untitled")
        .to_owned()
}

fn related<T: serde::de::DeserializeOwned>(manga: &Manga, entity_type: EntityType) -> Option<T> {
    manga
        .relationships
        .iter()
        .filter(|r| r.entity_type == entity_type)
        .find_map(|r| {
            r.attributes
                .clone()
                .and_then(|a| serde_json::from_value::<T>(a).ok())
        })
}

pub fn summarize(manga: &Manga, statistics: Option<&Statistics>) -> MangaSummary {
    let cover_image_url = related::<CoverArtAttributes>(manga, EntityType::CoverArt)
        .map(|cover| cover_url(&manga.id, &cover.file_name))
        .unwrap_or_default();

    let chapter_label = match manga.attributes.last_chapter.as_deref().map(str::trim) {
        Some(last) if !last.is_empty() => format!("Chapter {last}"),
        _ => "Ongoing".to_owned(),
    };

    let view_count_label = statistics
        .and_then(|s| s.follows)
        .map(compact_count)
        .unwrap_or_else(|| "N/A".to_owned());

    MangaSummary {
        id: manga.id.clone(),
        title: title_of(manga),
        cover_image_url,
        chapter_label,
        view_count_label,
        description: localized(&manga.attributes.description)
            .unwrap_or_default()
            .to_owned(),
    }
}

pub fn detail(manga: &Manga, statistics: Option<&Statistics>) -> MangaDetail {
    let status = match manga.attributes.status.as_deref() {
        Some("ongoing") => MangaStatus::Ongoing,
        Some("completed") => MangaStatus::Completed,
        Some("hiatus") => MangaStatus::Hiatus,
        Some("cancelled") => MangaStatus::Cancelled,
        _ => MangaStatus::Unknown,
    };

    MangaDetail {
        summary: summarize(manga, statistics),
        author: related::<AuthorAttributes>(manga, EntityType::Author)
            .map(|a| a.name)
            .unwrap_or_else(|| "Unknown".to_owned()),
        status,
        year: manga.attributes.year,
        tags: manga
            .attributes
            .tags
            .iter()
            .filter_map(|t| localized(&t.attributes.name))
            .map(str::to_owned)
            .collect(),
    }
}

pub fn chapter_summary(chapter: &Chapter) -> ChapterSummary {
    let attributes = &chapter.attributes;
    let number = attributes.chapter.clone().unwrap_or_default();

    let title = match attributes.title.as_deref().map(str::trim) {
        Some(title) if !title.is_empty() => title.to_owned(),
        _ if !number.is_empty() => format!("Chapter {number}"),
        _ => "Oneshot".to_owned(),
    };

    ChapterSummary {
        id: chapter.id.clone(),
        title,
        number,
        publish_date: attributes.publish_at.clone(),
        volume: attributes.volume.clone(),
    }
}

/// Chapter list in the order every screen shows it, see [sort_chapters_desc]
pub fn chapter_summaries(chapters: &[Chapter]) -> Vec<ChapterSummary> {
    let mut summaries: Vec<ChapterSummary> = chapters.iter().map(chapter_summary).collect();
    sort_chapters_desc(&mut summaries);

    summaries
}

/// Page urls of a chapter: `{baseUrl}/{data|data-saver}/{hash}/{file}`
pub fn image_set(chapter_id: &str, server: &AtHomeServer, quality: Quality) -> ChapterImageSet {
    let base = server.base_url.trim_end_matches('/');
    let files = match quality {
        Quality::Full => &server.chapter.data,
        Quality::DataSaver => &server.chapter.data_saver,
    };

    let images = files
        .iter()
        .map(|file| {
            format!(
                "{base}/{}/{}/{file}",
                quality.path_segment(),
                server.chapter.hash
            )
        })
        .collect();

    ChapterImageSet::new(chapter_id, images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images;

    use serde_json::json;

    fn chainsaw_man() -> Manga {
        serde_json::from_value(json!({
            "id": "a77742b1-befd-49a4-bff5-1ad4e6b0ef7b",
            "type": "manga",
            "attributes": {
                "title": { "en": "Chainsaw Man" },
                "altTitles": [{ "ja": "チェンソーマン" }],
                "description": { "en": "Broke young man + chainsaw dog demon = Chainsaw Man!", "ru": "..." },
                "lastChapter": "",
                "status": "ongoing",
                "year": 2018,
                "tags": [
                    { "id": "t1", "type": "tag", "attributes": { "name": { "en": "Action" } } },
                    { "id": "t2", "type": "tag", "attributes": { "name": { "en": "Gore" } } }
                ]
            },
            "relationships": [
                { "id": "au1", "type": "author", "attributes": { "name": "Fujimoto Tatsuki" } },
                { "id": "cv1", "type": "cover_art", "attributes": { "fileName": "8fe0c6ee.jpg", "volume": "1" } },
                { "id": "x", "type": "creator" },
                { "id": "y", "type": "some_new_relation" }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_summary() {
        let manga = chainsaw_man();
        let summary = summarize(&manga, Some(&Statistics { follows: Some(412_345) }));

        assert_eq!(summary.title, "Chainsaw Man");
        assert_eq!(
            summary.cover_image_url,
            "https://uploads.mangadex.org/covers/a77742b1-befd-49a4-bff5-1ad4e6b0ef7b/8fe0c6ee.jpg"
        );
        assert_eq!(summary.chapter_label, "Ongoing");
        assert_eq!(summary.view_count_label, "412.3K");
        assert!(summary.description.starts_with("Broke young man"));
    }

    #[test]
    fn test_detail() {
        let info = detail(&chainsaw_man(), None);

        assert_eq!(info.author, "Fujimoto Tatsuki");
        assert_eq!(info.status, MangaStatus::Ongoing);
        assert_eq!(info.year, Some(2018));
        assert_eq!(
            info.tags.iter().map(String::as_str).collect::<Vec<_>>(),
            ["Action", "Gore"]
        );
        assert_eq!(info.summary.view_count_label, "N/A");
    }

    #[test]
    fn test_title_falls_back_to_other_languages() {
        let mut manga = chainsaw_man();
        manga.attributes.title = LocalizedString::from([("ja-ro".to_owned(), "Chensoman".to_owned())]);

        assert_eq!(summarize(&manga, None).title, "Chensoman");
    }

    #[test]
    fn test_chapters_sorted_desc() {
        let chapters: Vec<Chapter> = serde_json::from_value(json!([
            { "id": "c1", "attributes": { "title": "Dog & Chainsaw", "chapter": "1", "volume": "1", "publishAt": "2018-12-03T15:00:00+00:00" } },
            { "id": "c3", "attributes": { "title": null, "chapter": "3", "volume": null, "publishAt": "2018-12-17T15:00:00+00:00" } },
            { "id": "c2", "attributes": { "title": "", "chapter": "2", "volume": "1", "publishAt": "2018-12-10T15:00:00+00:00" } },
            { "id": "os", "attributes": { "title": null, "chapter": null, "volume": null, "publishAt": "2019-01-01T15:00:00+00:00" } }
        ]))
        .unwrap();

        let summaries = chapter_summaries(&chapters);

        let ids: Vec<&str> = summaries.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["c3", "c2", "c1", "os"]);
        assert_eq!(summaries[0].title, "Chapter 3");
        assert_eq!(summaries[2].title, "Dog & Chainsaw");
        assert_eq!(summaries[3].title, "Oneshot");
    }

    #[test]
    fn test_image_tiers_line_up_with_fallback() {
        let server: AtHomeServer = serde_json::from_value(json!({
            "result": "ok",
            "baseUrl": "https://cmdxd98sb0x3yprd.mangadex.network/",
            "chapter": {
                "hash": "3303dd03ac8d27452cce3f2a882e94b2",
                "data": ["1-f7a76de10d346de7ba01786762ebbedc.png", "2-a9a4f9e7e4c6f1b1.png"],
                "dataSaver": ["1-27b0e6a1.jpg", "2-bb3c.jpg"]
            }
        }))
        .unwrap();

        let full = image_set("ch1", &server, Quality::Full);
        assert_eq!(full.page_count(), 2);
        assert_eq!(
            full.page(1),
            Some("https://cmdxd98sb0x3yprd.mangadex.network/data/3303dd03ac8d27452cce3f2a882e94b2/1-f7a76de10d346de7ba01786762ebbedc.png")
        );

        let saver = image_set("ch1", &server, Quality::DataSaver);
        assert!(saver.images().iter().all(|url| url.contains("/data-saver/")));

        // a failed full quality page falls back onto the data-saver host path
        let fallback = images::resolve_fallback(full.page(2).unwrap(), true);
        assert!(fallback.starts_with(
            "https://cmdxd98sb0x3yprd.mangadex.network/data-saver/3303dd03ac8d27452cce3f2a882e94b2/"
        ));
    }

    #[test]
    fn test_compact_count() {
        assert_eq!(compact_count(950), "950");
        assert_eq!(compact_count(1_234), "1.2K");
        assert_eq!(compact_count(3_400_000), "3.4M");
    }
}
