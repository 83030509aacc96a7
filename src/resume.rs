use crate::catalog::Catalog;
use crate::models::SharedStateDocument;

/// Where playback should pick up after loading the document and the catalog.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResumePoint {
    /// The document's current label matched catalog item `index`.
    Matched { index: usize, offset_seconds: f64 },
    /// No match; play the first item from its start.
    StartFromBeginning,
    /// The catalog is empty.
    NoItemAvailable,
}

impl ResumePoint {
    /// Index and offset to prime the player with, if anything can be played.
    pub fn position(&self) -> Option<(usize, f64)> {
        match *self {
            ResumePoint::Matched { index, offset_seconds } => Some((index, offset_seconds)),
            ResumePoint::StartFromBeginning => Some((0, 0.0)),
            ResumePoint::NoItemAvailable => None,
        }
    }
}

/// Left-to-right scan; the earliest matching item wins.
pub fn resolve(document: &SharedStateDocument, catalog: &Catalog) -> ResumePoint {
    if catalog.is_empty() {
        return ResumePoint::NoItemAvailable;
    }
    let label = document.current_file_label.as_str();
    match catalog.items().iter().position(|it| it.matches_label(label)) {
        Some(index) => {
            let offset = document.current_offset_seconds;
            let offset_seconds = if offset.is_finite() && offset > 0.0 { offset } else { 0.0 };
            ResumePoint::Matched { index, offset_seconds }
        }
        None => ResumePoint::StartFromBeginning,
    }
}
