//! Google Books volumes response types and conversion to [`Book`].

use bookscout_core::Book;
use serde::Deserialize;

/// Provenance tag stamped on every converted book.
pub const SOURCE: &str = "google_books";

/// Raw response from `GET /volumes`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumesResponse {
    #[serde(default)]
    pub total_items: u32,
    /// Absent altogether when nothing matched.
    #[serde(default)]
    pub items: Vec<Volume>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub id: String,
    #[serde(default)]
    pub volume_info: VolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeInfo {
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    pub description: Option<String>,
    pub publisher: Option<String>,
    pub published_date: Option<String>,
    pub page_count: Option<u32>,
    pub language: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    pub average_rating: Option<f32>,
    pub info_link: Option<String>,
    pub image_links: Option<ImageLinks>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageLinks {
    pub small_thumbnail: Option<String>,
    pub thumbnail: Option<String>,
    pub small: Option<String>,
    pub medium: Option<String>,
    pub large: Option<String>,
}

impl ImageLinks {
    /// Best available cover, served over https at the larger zoom level.
    pub fn cover_url(&self) -> Option<String> {
        let raw = [&self.thumbnail, &self.small_thumbnail, &self.small, &self.medium, &self.large]
            .into_iter()
            .flatten()
            .map(|url| url.trim())
            .find(|url| !url.is_empty())?;

        let url = match raw.strip_prefix("http://") {
            Some(rest) => format!("https://{rest}"),
            None => raw.to_string(),
        };

        if url.contains("zoom=") {
            Some(url.replace("zoom=1", "zoom=2"))
        } else if url.contains('?') {
            Some(format!("{url}&zoom=2"))
        } else {
            Some(format!("{url}?zoom=2"))
        }
    }
}

impl From<Volume> for Book {
    fn from(volume: Volume) -> Self {
        let info = volume.volume_info;
        let title = info.title.filter(|t| !t.trim().is_empty()).unwrap_or_else(|| "Unknown".to_string());
        let cover_url = info.image_links.as_ref().and_then(ImageLinks::cover_url).unwrap_or_default();

        Book::new(volume.id, title, SOURCE)
            .with_authors(info.authors)
            .with_description(info.description.unwrap_or_default())
            .with_categories(info.categories)
            .with_cover_url(cover_url)
            .with_publisher(info.publisher)
            .with_published_date(info.published_date)
            .with_language(info.language)
            .with_page_count(info.page_count)
            .with_rating(info.average_rating)
            .with_info_link(info.info_link)
    }
}

impl VolumesResponse {
    /// Convert to books, dropping volumes without a usable cover image.
    pub fn into_books(self) -> Vec<Book> {
        let total = self.items.len();
        let books: Vec<Book> = self.items.into_iter().map(Book::from).filter(Book::has_cover).collect();
        if books.len() < total {
            tracing::debug!(dropped = total - books.len(), "dropped volumes without cover images");
        }
        books
    }
}
