use crate::api::{CatalogSource, RemoteEntry};
use crate::config::CatalogLayout;
use crate::error::Result;
use crate::models::PlayableItem;
use crate::util::bounded;
use std::time::Duration;
use tracing::{info, warn};

/// Ordered, immutable list of playable items. Rebuilt wholesale on every load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    items: Vec<PlayableItem>,
}

impl Catalog {
    pub fn new(items: Vec<PlayableItem>) -> Self {
        Self { items }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[PlayableItem] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&PlayableItem> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of distinct groups, in catalog order.
    pub fn group_count(&self) -> usize {
        let mut last: Option<&str> = None;
        let mut n = 0;
        for it in &self.items {
            let g = it.group_name.as_deref();
            if g.is_some() && g != last {
                n += 1;
            }
            last = g;
        }
        n
    }
}

fn is_audio(entry: &RemoteEntry, mime_types: &[String]) -> bool {
    match entry.mime_type.as_deref() {
        Some(m) => mime_types.iter().any(|t| t.eq_ignore_ascii_case(m)),
        None => false,
    }
}

fn to_items(
    source: &dyn CatalogSource,
    entries: Vec<RemoteEntry>,
    group: Option<&str>,
    mime_types: &[String],
) -> Vec<PlayableItem> {
    entries
        .into_iter()
        .filter(|e| is_audio(e, mime_types))
        .map(|e| PlayableItem {
            source_locator: source.source_locator(&e.id),
            id: e.id,
            display_name: e.name,
            group_name: group.map(String::from),
        })
        .collect()
}

/// Build the catalog under `root_id`. Backend ordering is kept as-is.
///
/// Every listing is bounded by `per_call` on its own. Grouped layout: failing to
/// list the root is an error, failing (or timing out) on a single group folder
/// only drops that folder.
pub async fn load(
    source: &dyn CatalogSource,
    root_id: &str,
    layout: CatalogLayout,
    mime_types: &[String],
    per_call: Duration,
) -> Result<Catalog> {
    match layout {
        CatalogLayout::Flat => {
            let entries = bounded(per_call, "audio listing", source.list_audio(root_id, mime_types)).await?;
            let items = to_items(source, entries, None, mime_types);
            info!("Loaded {} audio files from {}", items.len(), source.name());
            Ok(Catalog::new(items))
        }
        CatalogLayout::Grouped => {
            let folders = bounded(per_call, "folder listing", source.list_folders(root_id)).await?;
            info!("Found {} group folders", folders.len());
            let mut items = Vec::new();
            for folder in &folders {
                match bounded(per_call, "audio listing", source.list_audio(&folder.id, mime_types)).await {
                    Ok(entries) => {
                        let before = items.len();
                        items.extend(to_items(source, entries, Some(&folder.name), mime_types));
                        info!("  Added {} files from {}", items.len() - before, folder.name);
                    }
                    Err(e) => {
                        warn!("Failed to load files from folder {}: {}", folder.name, e);
                    }
                }
            }
            info!(
                "Loaded {} audio files from {} folders via {}",
                items.len(),
                folders.len(),
                source.name()
            );
            Ok(Catalog::new(items))
        }
    }
}
