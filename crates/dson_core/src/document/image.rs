//! Image library entries.

use super::library::LibraryEntry;
use super::raw::RawImage;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Image {
    pub id: String,
    pub name: String,
    pub map_gamma: f64,

    /// Content-relative path of the first map, if any.
    pub url: Option<String>,
}

impl Image {
    pub fn from_raw(raw: RawImage) -> Self {
        let url = raw.map.into_iter().find_map(|m| m.url);
        Self {
            name: raw.name.unwrap_or_else(|| raw.id.clone()),
            id: raw.id,
            map_gamma: raw.map_gamma.unwrap_or(0.0),
            url,
        }
    }
}

impl LibraryEntry for Image {
    fn id(&self) -> &str {
        &self.id
    }
}
