//! Product category and packaging size models

use serde::{Deserialize, Serialize};

/// Label used when the selected category is not in the registry
pub const ALL_CATEGORIES_LABEL: &str = "All Categories";

/// A sellable unit variant of a product (e.g. bottle volume)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackagingSize {
    /// Packaging size id (psid), stable within a category
    pub id: i64,
    /// Short label such as "180ml"
    pub label: String,
    /// Display title such as "Quarter"
    pub title: String,
    pub category_id: i64,
}

/// A product category with its ordered packaging sizes.
///
/// `sizes` order is the column order for the table, the totals and the export.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub sizes: Vec<PackagingSize>,
}

impl Category {
    pub fn size_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.sizes.iter().map(|size| size.id)
    }
}

/// Find a category by id
pub fn find_category<'a>(categories: &'a [Category], id: &str) -> Option<&'a Category> {
    categories.iter().find(|category| category.id == id)
}

/// Resolve the display label for a category id
pub fn category_label(categories: &[Category], id: &str) -> String {
    find_category(categories, id)
        .map(|category| category.name.clone())
        .unwrap_or_else(|| ALL_CATEGORIES_LABEL.to_string())
}
