//! Page providers behind the listing controller.
//!
//! [`RegistryDataSource`] synthesizes deterministic records sized by the
//! registry's entry counts. [`HttpDataSource`] asks the backend for a page.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::CollectionRegistry;
use crate::http::ApiClient;

/// Size of a collection the registry does not know about.
pub const DEFAULT_ENTRY_COUNT: u64 = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    #[serde(rename = "asc")]
    Ascending,
    #[serde(rename = "desc")]
    Descending,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Ascending),
            "desc" | "descending" => Ok(SortDirection::Descending),
            other => Err(format!("unknown sort direction: {}", other)),
        }
    }
}

/// An empty field means "no sort".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortCriterion {
    pub field: String,
    pub direction: SortDirection,
}

impl SortCriterion {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    pub fn is_unsorted(&self) -> bool {
        self.field.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub collection: String,
    /// 1-based
    pub page_index: usize,
    pub page_size: usize,
    pub search: String,
    pub sort: SortCriterion,
}

impl PageRequest {
    /// Zero-based offset of the first record on this page.
    pub fn offset(&self) -> usize {
        self.page_index.saturating_sub(1).saturating_mul(self.page_size)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Value>,
    pub total_records: u64,
}

#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page>;
}

pub struct RegistryDataSource {
    registry: Arc<CollectionRegistry>,
}

impl RegistryDataSource {
    pub fn new(registry: Arc<CollectionRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl DataSource for RegistryDataSource {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page> {
        let descriptor = self.registry.get(&request.collection);
        let count = descriptor
            .as_ref()
            .map(|d| d.entry_count)
            .unwrap_or(DEFAULT_ENTRY_COUNT);
        let label = descriptor.map(|d| d.label);
        let generate = |index: u64| generate_record(&request.collection, label.as_deref(), index);

        let search = request.search.trim().to_lowercase();

        // Fast path: only materialize the requested window
        if search.is_empty() && request.sort.is_unsorted() {
            let start = (request.offset() as u64).min(count);
            let end = start.saturating_add(request.page_size as u64).min(count);
            return Ok(Page {
                items: (start..end).map(generate).collect(),
                total_records: count,
            });
        }

        let mut records: Vec<Value> = (0..count)
            .map(generate)
            .filter(|record| search.is_empty() || matches_search(record, &search))
            .collect();

        if !request.sort.is_unsorted() {
            let field = request.sort.field.as_str();
            records.sort_by(|a, b| {
                let ordering = compare_values(a.get(field), b.get(field));
                match request.sort.direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            });
        }

        let total_records = records.len() as u64;
        let items = records
            .into_iter()
            .skip(request.offset())
            .take(request.page_size)
            .collect();

        Ok(Page {
            items,
            total_records,
        })
    }
}

fn matches_search(record: &Value, needle: &str) -> bool {
    let Some(fields) = record.as_object() else {
        return false;
    };
    fields.values().any(|value| match value {
        Value::String(s) => s.to_lowercase().contains(needle),
        Value::Number(n) => n.to_string().contains(needle),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .any(|s| s.to_lowercase().contains(needle)),
        _ => false,
    })
}

/// Numbers compare numerically, strings lexicographically. Missing values sort first.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

const TITLE_PREFIXES: [&str; 5] = ["How to", "Guide to", "Understanding", "Introduction to", "Advanced"];
const TITLE_TOPICS: [&str; 5] = ["Vue.js", "React", "TypeScript", "Node.js", "Web Development"];
const AUTHORS: [&str; 4] = ["John Doe", "Jane Smith", "Bob Johnson", "Alice Williams"];
const BLOG_CATEGORIES: [&str; 4] = ["Technology", "Tutorial", "News", "Review"];
const BLOG_STATUSES: [&str; 3] = ["Published", "Draft", "Scheduled"];
const PRODUCT_CATEGORIES: [&str; 4] = ["Electronics", "Clothing", "Books", "Home & Garden"];
const CUISINES: [&str; 5] = ["Italian", "Japanese", "Mexican", "Indian", "French"];
const TAGS: [&str; 4] = ["Family Friendly", "Outdoor Seating", "Delivery", "Vegan Options"];

fn record_date(index: u64) -> String {
    NaiveDate::from_ymd_opt(2024, (index % 12 + 1) as u32, (index % 28 + 1) as u32)
        .map(|d| d.to_string())
        .unwrap_or_default()
}

/// Record `index` (zero-based) of a collection. Same inputs, same record.
pub fn generate_record(slug: &str, label: Option<&str>, index: u64) -> Value {
    let n = index + 1;
    let i = index as usize;
    let created_at = record_date(index);

    match slug {
        "blog-posts" => json!({
            "id": n,
            "title": format!("{} {}", TITLE_PREFIXES[i % 5], TITLE_TOPICS[i % 5]),
            "author": AUTHORS[i % AUTHORS.len()],
            "category": BLOG_CATEGORIES[i % BLOG_CATEGORIES.len()],
            "status": BLOG_STATUSES[i % BLOG_STATUSES.len()],
            "publishedAt": created_at.clone(),
            "views": (index * 7919 + 13) % 10_000,
            "createdAt": created_at,
        }),
        "products" => json!({
            "id": n,
            "name": format!("Product {}", n),
            "sku": format!("SKU-{:05}", n),
            "price": format!("${:.2}", ((index * 7919) % 100_000) as f64 / 100.0),
            "stock": (index * 37) % 500,
            "category": PRODUCT_CATEGORIES[i % PRODUCT_CATEGORIES.len()],
            "status": if index % 10 < 7 { "In Stock" } else { "Out of Stock" },
            "createdAt": created_at,
        }),
        "restaurants" => json!({
            "id": n,
            "name": format!("Restaurant {}", n),
            "address": format!("{} Main Street", 100 + index),
            "email": format!("contact{}@example.com", n),
            "phone": format!("+1 555 {:04}", n % 10_000),
            "website": format!("https://restaurant{}.example.com", n),
            "status": if index % 2 == 0 { "Active" } else { "Inactive" },
            "category": CUISINES[i % CUISINES.len()],
            "rating": format!("{:.1}", ((index * 17) % 50) as f64 / 10.0),
            "description": format!("{} cuisine in the heart of the city", CUISINES[i % CUISINES.len()]),
            "tags": [TAGS[i % TAGS.len()], TAGS[(i + 1) % TAGS.len()]],
            "createdAt": created_at,
            "updatedAt": record_date(index + 1),
        }),
        _ => json!({
            "id": n,
            "name": format!("{} {}", label.unwrap_or("Item"), n),
            "status": if index % 2 == 0 { "Active" } else { "Inactive" },
            "createdAt": created_at,
        }),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntriesResponse {
    #[serde(default)]
    items: Vec<Value>,
    #[serde(alias = "total")]
    total_records: u64,
}

/// `GET /collections/{slug}/entries`
pub struct HttpDataSource {
    api: ApiClient,
}

impl HttpDataSource {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl DataSource for HttpDataSource {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page> {
        let path = format!(
            "/collections/{}/entries",
            urlencoding::encode(&request.collection)
        );

        let mut query = vec![
            ("page", request.page_index.to_string()),
            ("pageSize", request.page_size.to_string()),
        ];
        if !request.search.is_empty() {
            query.push(("search", request.search.clone()));
        }
        if !request.sort.is_unsorted() {
            query.push(("sort", request.sort.field.clone()));
            query.push(("order", request.sort.direction.to_string()));
        }

        let response: EntriesResponse = self
            .api
            .get(&path, &query)
            .await
            .with_context(|| format!("Failed to fetch entries for {}", request.collection))?;

        let mut items = response.items;
        items.truncate(request.page_size);

        Ok(Page {
            items,
            total_records: response.total_records,
        })
    }
}
