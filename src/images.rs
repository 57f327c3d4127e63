//! Fallbacks for page and cover images that failed to load.
//!
//! Everything here is computed from the url alone. Placeholders are fixed points of
//! [resolve_fallback], so a load-error loop in the reader always ends on one.

use reqwest::Url;

/// Host of the placeholder image service
pub const PLACEHOLDER_HOST: &str = "via.placeholder.com";

pub const IMAGE_NOT_FOUND_PLACEHOLDER: &str =
    "https://via.placeholder.com/512x768/1f1f1f/ffffff?text=Image+Not+Found";

pub const COVER_NOT_AVAILABLE_PLACEHOLDER: &str =
    "https://via.placeholder.com/512x768/1f1f1f/ffffff?text=Cover+Not+Available";

const FULL_QUALITY_SEGMENT: &str = "/data/";
const DATA_SAVER_SEGMENT: &str = "/data-saver/";
const COVER_SEGMENT: &str = "/covers/";

pub fn page_placeholder(page: Option<u64>) -> String {
    match page {
        Some(page) => format!("https://{PLACEHOLDER_HOST}/512x768/1f1f1f/ffffff?text=Page+{page}"),
        None => format!("https://{PLACEHOLDER_HOST}/512x768/1f1f1f/ffffff?text=Page+Unknown"),
    }
}

pub fn is_placeholder(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => parsed.host_str() == Some(PLACEHOLDER_HOST),
        Err(_) => url.contains(PLACEHOLDER_HOST),
    }
}

/// Url to show after `url` failed to load.
///
/// In order: a missing url gets the generic placeholder, a placeholder is returned as is,
/// a full quality page is moved to the data-saver tier when `prefer_data_saver` is set,
/// an uploaded cover gets the cover placeholder, and anything else gets a placeholder
/// naming the page number found in the file name.
pub fn resolve_fallback(url: &str, prefer_data_saver: bool) -> String {
    let url = url.trim();

    if url.is_empty() {
        return IMAGE_NOT_FOUND_PLACEHOLDER.to_owned();
    }

    if is_placeholder(url) {
        return url.to_owned();
    }

    if prefer_data_saver && url.contains(FULL_QUALITY_SEGMENT) {
        return url.replacen(FULL_QUALITY_SEGMENT, DATA_SAVER_SEGMENT, 1);
    }

    if url.contains(COVER_SEGMENT) {
        return COVER_NOT_AVAILABLE_PLACEHOLDER.to_owned();
    }

    page_placeholder(page_number(url))
}

/// Successive fallbacks for `url`, ending with the first placeholder reached
pub fn fallback_chain(url: &str, prefer_data_saver: bool) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current = url.to_owned();

    loop {
        let next = resolve_fallback(&current, prefer_data_saver);
        if next == current {
            break;
        }

        let done = is_placeholder(&next);
        chain.push(next.clone());
        if done {
            break;
        }

        current = next;
    }

    chain
}

/// First run of digits in the file name, `page007.png` -> 7
fn page_number(url: &str) -> Option<u64> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file_name = path.rsplit('/').next().unwrap_or(path);

    let digits: String = file_name
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();

    digits.parse().ok()
}
