//! Content collections: the descriptor registry, column schemas, data
//! sources, and the listing controller that pages through them.

pub mod listing;
pub mod schema;
pub mod source;

pub use listing::{ListingController, ListingError, ListingState};
pub use schema::{field_schema, FieldDescriptor};
pub use source::{
    DataSource, HttpDataSource, Page, PageRequest, RegistryDataSource, SortCriterion,
    SortDirection,
};

use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDescriptor {
    pub id: String,
    pub slug: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub entry_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub created_at: NaiveDate,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("A collection with slug '{0}' already exists")]
    DuplicateSlug(String),

    #[error("Collection slug must not be empty")]
    EmptySlug,
}

/// Descriptors keyed by slug, kept in insertion order.
///
/// Views hold slugs, not copies, so edits here show up on their next refresh.
#[derive(Debug, Default)]
pub struct CollectionRegistry {
    entries: RwLock<Vec<CollectionDescriptor>>,
}

impl CollectionRegistry {
    pub fn new(entries: Vec<CollectionDescriptor>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Registry seeded with the stock content types.
    pub fn with_defaults() -> Self {
        let seed = [
            ("ct-1", "Blog Posts", "blog-posts", "Articles and blog content", 45, "📝", (2024, 1, 20)),
            ("ct-2", "Products", "products", "E-commerce product catalog", 128, "🛍️", (2024, 1, 22)),
            ("ct-3", "Authors", "authors", "Content authors and contributors", 12, "✍️", (2024, 1, 25)),
            ("ct-4", "Categories", "categories", "Content categorization", 24, "📁", (2024, 2, 1)),
            ("ct-5", "Pages", "pages", "Static website pages", 18, "📄", (2024, 2, 5)),
            ("ct-6", "Media", "media", "Images, videos, and files", 342, "🖼️", (2024, 2, 10)),
            ("ct-7", "Testimonials", "testimonials", "Customer reviews and testimonials", 56, "💬", (2024, 2, 15)),
            ("ct-8", "Team Members", "team-members", "Company team members", 15, "👥", (2024, 2, 20)),
            ("ct-9", "FAQ", "faq", "Frequently asked questions", 32, "❓", (2024, 3, 1)),
            ("ct-10", "Events", "events", "Upcoming events and webinars", 8, "📅", (2024, 3, 5)),
        ];

        let entries = seed
            .into_iter()
            .map(|(id, label, slug, description, count, icon, (y, m, d))| CollectionDescriptor {
                id: id.to_string(),
                slug: slug.to_string(),
                label: label.to_string(),
                description: Some(description.to_string()),
                entry_count: count,
                icon: Some(icon.to_string()),
                created_at: NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default(),
            })
            .collect();

        Self::new(entries)
    }

    pub fn list(&self) -> Vec<CollectionDescriptor> {
        self.entries.read().clone()
    }

    pub fn get(&self, slug: &str) -> Option<CollectionDescriptor> {
        self.entries.read().iter().find(|c| c.slug == slug).cloned()
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.entries.read().iter().any(|c| c.slug == slug)
    }

    pub fn first(&self) -> Option<CollectionDescriptor> {
        self.entries.read().first().cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn add(&self, descriptor: CollectionDescriptor) -> Result<(), RegistryError> {
        if descriptor.slug.trim().is_empty() {
            return Err(RegistryError::EmptySlug);
        }
        let mut entries = self.entries.write();
        if entries.iter().any(|c| c.slug == descriptor.slug) {
            return Err(RegistryError::DuplicateSlug(descriptor.slug));
        }
        tracing::debug!(slug = %descriptor.slug, "Registered collection");
        entries.push(descriptor);
        Ok(())
    }

    pub fn remove(&self, slug: &str) -> Option<CollectionDescriptor> {
        let mut entries = self.entries.write();
        let index = entries.iter().position(|c| c.slug == slug)?;
        Some(entries.remove(index))
    }

    /// Returns false when the slug is not registered.
    pub fn set_entry_count(&self, slug: &str, entry_count: u64) -> bool {
        match self.entries.write().iter_mut().find(|c| c.slug == slug) {
            Some(descriptor) => {
                descriptor.entry_count = entry_count;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(slug: &str) -> CollectionDescriptor {
        CollectionDescriptor {
            id: format!("ct-{}", slug),
            slug: slug.to_string(),
            label: slug.to_string(),
            description: None,
            entry_count: 3,
            icon: None,
            created_at: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
        }
    }

    #[test]
    fn test_default_registry() {
        let registry = CollectionRegistry::with_defaults();
        assert_eq!(registry.len(), 10);
        assert_eq!(registry.first().unwrap().slug, "blog-posts");
        assert_eq!(registry.get("products").unwrap().entry_count, 128);
        assert_eq!(registry.get("media").unwrap().label, "Media");
        assert!(!registry.contains("unknown-slug"));
    }

    #[test]
    fn test_add_rejects_duplicates() {
        let registry = CollectionRegistry::default();
        registry.add(descriptor("recipes")).unwrap();

        assert_eq!(
            registry.add(descriptor("recipes")),
            Err(RegistryError::DuplicateSlug("recipes".to_string()))
        );
        assert_eq!(registry.add(descriptor("  ")), Err(RegistryError::EmptySlug));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_and_update() {
        let registry = CollectionRegistry::with_defaults();

        assert!(registry.set_entry_count("events", 99));
        assert_eq!(registry.get("events").unwrap().entry_count, 99);
        assert!(!registry.set_entry_count("nope", 1));

        let removed = registry.remove("blog-posts").unwrap();
        assert_eq!(removed.slug, "blog-posts");
        assert_eq!(registry.first().unwrap().slug, "products");
        assert!(registry.remove("blog-posts").is_none());
    }

    #[test]
    fn test_descriptor_json_shape() {
        let registry = CollectionRegistry::with_defaults();
        let json = serde_json::to_value(registry.get("faq").unwrap()).unwrap();
        assert_eq!(json["entryCount"], 32);
        assert_eq!(json["createdAt"], "2024-03-01");
    }
}
