use crate::error::{BenchmarkError, Result};
use crate::storage::{join_uri, parent_uri, StorageIo};
use log::debug;
use serde::Deserialize;

/// The slice of a STAC document this tooling needs: an id plus the link
/// graph used to walk children and items.
#[derive(Debug, Deserialize)]
struct Document {
    id: String,
    #[serde(default)]
    links: Vec<Link>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Link {
    pub rel: String,
    pub href: String,
}

/// A loaded catalog (or collection) document.
#[derive(Debug)]
pub struct Catalog {
    pub id: String,
    pub uri: String,
    links: Vec<Link>,
}

/// A catalog item, carrying the id of the child catalog that owns it.
/// For this benchmark the owning catalog id is the area name.
#[derive(Debug, Clone)]
pub struct Item {
    pub id: String,
    pub uri: String,
    pub area: String,
}

impl Catalog {
    pub fn from_uri(uri: &str, storage: &dyn StorageIo) -> Result<Self> {
        let text = storage.read_text(uri)?;
        let doc: Document = serde_json::from_str(&text)?;
        debug!("Loaded catalog {} from {}", doc.id, uri);
        Ok(Self {
            id: doc.id,
            uri: uri.to_string(),
            links: doc.links,
        })
    }

    /// Resolve a link href against this document's directory.
    fn resolve(&self, href: &str) -> String {
        if href.contains("://") || href.starts_with('/') {
            href.to_string()
        } else {
            join_uri(&parent_uri(&self.uri), href)
        }
    }

    fn links_with_rel<'a>(&'a self, rel: &'a str) -> impl Iterator<Item = &'a Link> {
        self.links.iter().filter(move |l| l.rel == rel)
    }

    /// Load every child catalog.
    pub fn children(&self, storage: &dyn StorageIo) -> Result<Vec<Catalog>> {
        self.links_with_rel("child")
            .map(|link| Catalog::from_uri(&self.resolve(&link.href), storage))
            .collect()
    }

    /// Find a child catalog by id.
    pub fn child(&self, id: &str, storage: &dyn StorageIo) -> Result<Catalog> {
        for child in self.children(storage)? {
            if child.id == id {
                return Ok(child);
            }
        }
        Err(BenchmarkError::Catalog {
            uri: self.uri.clone(),
            reason: format!("no child catalog with id {}", id),
        })
    }

    /// Load the items linked directly from this catalog.
    pub fn items(&self, storage: &dyn StorageIo) -> Result<Vec<Item>> {
        self.links_with_rel("item")
            .map(|link| {
                let uri = self.resolve(&link.href);
                let text = storage.read_text(&uri)?;
                let doc: Document = serde_json::from_str(&text)?;
                Ok(Item {
                    id: doc.id,
                    uri,
                    area: self.id.clone(),
                })
            })
            .collect()
    }

    /// Find an item of this catalog by id.
    pub fn item(&self, id: &str, storage: &dyn StorageIo) -> Result<Item> {
        for item in self.items(storage)? {
            if item.id == id {
                return Ok(item);
            }
        }
        Err(BenchmarkError::Catalog {
            uri: self.uri.clone(),
            reason: format!("no item with id {}", id),
        })
    }

    /// Flatten this catalog's items and every descendant's, depth-first.
    pub fn all_items(&self, storage: &dyn StorageIo) -> Result<Vec<Item>> {
        let mut items = self.items(storage)?;
        for child in self.children(storage)? {
            items.extend(child.all_items(storage)?);
        }
        Ok(items)
    }
}

/// Label geometry URI for an item:
/// `{catalog_dir}/{area}/{item_id}-labels/{item_id}.geojson`.
pub fn label_uri(catalog_uri: &str, area: &str, item_id: &str) -> String {
    join_uri(
        &parent_uri(catalog_uri),
        &format!("{}/{}-labels/{}.geojson", area, item_id, item_id),
    )
}
