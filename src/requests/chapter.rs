use serde::{Deserialize, Serialize};

use std::cmp::Ordering;

use super::query_utils::string_or_number;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChapterSummary {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Decimal string, may be fractional (`"10.5"`)
    #[serde(alias = "chapter", deserialize_with = "string_or_number")]
    pub number: String,
    #[serde(alias = "publishAt", default)]
    pub publish_date: String,
    #[serde(default)]
    pub volume: Option<String>,
}

impl ChapterSummary {
    /// Parsed chapter number, `None` for labels like `"Oneshot"`
    pub fn numeric(&self) -> Option<f64> {
        self.number
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
    }
}

/// Orders chapters by number, highest first.
///
/// The sort is stable: chapters with equal numbers keep the order they arrived in.
/// Chapters without a numeric label go last.
pub fn sort_chapters_desc(chapters: &mut [ChapterSummary]) {
    chapters.sort_by(|a, b| match (a.numeric(), b.numeric()) {
        (Some(a), Some(b)) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// What `/manga/chapter/{id}` carries in `data`
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ChapterImagesPayload {
    pub chapter_id: Option<String>,
    pub images: Vec<String>,
    pub page_count: Option<usize>,
}

/// Page images of one chapter, in reading order
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChapterImageSet {
    chapter_id: String,
    images: Vec<String>,
    page_count: usize,
}

impl ChapterImageSet {
    pub fn new(chapter_id: impl Into<String>, images: Vec<String>) -> Self {
        Self {
            chapter_id: chapter_id.into(),
            page_count: images.len(),
            images,
        }
    }

    pub fn chapter_id(&self) -> &str {
        &self.chapter_id
    }

    pub fn images(&self) -> &[String] {
        &self.images
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Image of the 1-indexed `page`
    pub fn page(&self, page: usize) -> Option<&str> {
        page.checked_sub(1)
            .and_then(|i| self.images.get(i))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(id: &str, number: &str) -> ChapterSummary {
        ChapterSummary {
            id: id.to_owned(),
            title: String::new(),
            number: number.to_owned(),
            publish_date: "2024-01-01T00:00:00+00:00".to_owned(),
            volume: None,
        }
    }

    #[test]
    fn test_sort_desc_keeps_ties_in_arrival_order() {
        let mut chapters = vec![
            chapter("a", "1"),
            chapter("b", "10.5"),
            chapter("extra", "Oneshot"),
            chapter("c", "10"),
            chapter("d", "10.5"),
            chapter("e", "2"),
        ];

        sort_chapters_desc(&mut chapters);

        let ids: Vec<&str> = chapters.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["b", "d", "c", "e", "a", "extra"]);
    }

    #[test]
    fn test_number_accepts_numeric_json() {
        let chapter: ChapterSummary = serde_json::from_value(serde_json::json!({
            "id": "ch1",
            "title": "Dog & Chainsaw",
            "chapter": 1.5,
            "publishAt": "2018-12-03T15:00:00+00:00",
            "volume": "1"
        }))
        .unwrap();

        assert_eq!(chapter.number, "1.5");
        assert_eq!(chapter.numeric(), Some(1.5));
        assert_eq!(chapter.volume.as_deref(), Some("1"));
    }

    #[test]
    fn test_image_set_pages_are_one_indexed() {
        let set = ChapterImageSet::new(
            "ch1",
            vec!["https://x/1.png".to_owned(), "https://x/2.png".to_owned()],
        );

        assert_eq!(set.page_count(), 2);
        assert_eq!(set.page(1), Some("https://x/1.png"));
        assert_eq!(set.page(2), Some("https://x/2.png"));
        assert_eq!(set.page(0), None);
        assert_eq!(set.page(3), None);
    }
}
