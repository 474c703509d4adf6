//! Column schemas per collection type.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub key: String,
    pub label: String,
    /// Minimum column width in pixels
    pub min_width_hint: u32,
}

type SchemaRow = (&'static str, &'static str, u32);

const BLOG_POSTS: &[SchemaRow] = &[
    ("title", "Title", 250),
    ("author", "Author", 150),
    ("category", "Category", 120),
    ("status", "Status", 120),
    ("publishedAt", "Published", 150),
    ("views", "Views", 100),
    ("createdAt", "Created At", 150),
];

const PRODUCTS: &[SchemaRow] = &[
    ("name", "Product Name", 200),
    ("sku", "SKU", 120),
    ("price", "Price", 100),
    ("stock", "Stock", 100),
    ("category", "Category", 150),
    ("status", "Status", 120),
    ("createdAt", "Created At", 150),
];

const RESTAURANTS: &[SchemaRow] = &[
    ("name", "Name", 200),
    ("address", "Address", 250),
    ("email", "Email", 200),
    ("phone", "Phone", 150),
    ("website", "Website", 200),
    ("status", "Status", 120),
    ("category", "Category", 150),
    ("rating", "Rating", 100),
    ("description", "Description", 300),
    ("tags", "Tags", 200),
    ("createdAt", "Created At", 180),
    ("updatedAt", "Updated At", 180),
];

/// Used for every collection without a dedicated schema.
const GENERIC: &[SchemaRow] = &[
    ("name", "Name", 200),
    ("id", "ID", 100),
    ("status", "Status", 120),
    ("createdAt", "Created At", 150),
];

const SCHEMAS: &[(&str, &[SchemaRow])] = &[
    ("blog-posts", BLOG_POSTS),
    ("products", PRODUCTS),
    ("restaurants", RESTAURANTS),
];

/// Ordered columns for a collection slug.
pub fn field_schema(slug: &str) -> Vec<FieldDescriptor> {
    let rows = SCHEMAS
        .iter()
        .find(|(name, _)| *name == slug)
        .map(|(_, rows)| *rows)
        .unwrap_or(GENERIC);
    to_descriptors(rows)
}

pub fn generic_schema() -> Vec<FieldDescriptor> {
    to_descriptors(GENERIC)
}

pub fn has_dedicated_schema(slug: &str) -> bool {
    SCHEMAS.iter().any(|(name, _)| *name == slug)
}

fn to_descriptors(rows: &[SchemaRow]) -> Vec<FieldDescriptor> {
    rows.iter()
        .map(|(key, label, width)| FieldDescriptor {
            key: key.to_string(),
            label: label.to_string(),
            min_width_hint: *width,
        })
        .collect()
}
