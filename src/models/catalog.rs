use serde::{Deserialize, Serialize};
use std::path::Path;

const EMBEDDED_CATALOG: &str = include_str!("../../data/categories.json");

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("catalog is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("duplicate category id {0}")]
    DuplicateCategory(i64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubCategory {
    pub subcategory_id: i64,
    pub name: String,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub category_id: i64,
    pub name: String,
    pub image_url: String,
    #[serde(default)]
    pub subcategories: Vec<SubCategory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogFile {
    categories: Vec<Category>,
}

/// Read-only category tree loaded once at startup.
#[derive(Debug, Clone)]
pub struct Catalog {
    categories: Vec<Category>,
}

impl Catalog {
    pub fn embedded() -> Result<Self, CatalogError> {
        Self::from_json(EMBEDDED_CATALOG)
    }

    pub async fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| CatalogError::Io {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(raw)?;

        let mut seen = Vec::with_capacity(file.categories.len());
        for category in &file.categories {
            if seen.contains(&category.category_id) {
                return Err(CatalogError::DuplicateCategory(category.category_id));
            }
            seen.push(category.category_id);
        }

        Ok(Self {
            categories: file.categories,
        })
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn find(&self, category_id: i64) -> Option<&Category> {
        self.categories
            .iter()
            .find(|category| category.category_id == category_id)
    }
}

/// Parses a `highlight=1,2,3` query value, skipping anything that is not an id.
pub fn parse_highlight(raw: Option<&str>) -> Vec<i64> {
    raw.map(|value| {
        value
            .split(',')
            .filter_map(|part| part.trim().parse::<i64>().ok())
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_catalog_parses() {
        let catalog = Catalog::embedded().unwrap();
        assert!(!catalog.categories().is_empty());
        let first = &catalog.categories()[0];
        assert_eq!(catalog.find(first.category_id), Some(first));
    }

    #[test]
    fn unknown_category_is_none() {
        let catalog = Catalog::embedded().unwrap();
        assert!(catalog.find(-1).is_none());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let raw = r#"{"categories": [
            {"category_id": 1, "name": "A", "image_url": "/a.png"},
            {"category_id": 1, "name": "B", "image_url": "/b.png"}
        ]}"#;
        assert!(matches!(
            Catalog::from_json(raw),
            Err(CatalogError::DuplicateCategory(1))
        ));
    }

    #[test]
    fn highlight_ignores_garbage() {
        assert_eq!(parse_highlight(Some("3, 4,x,,7")), vec![3, 4, 7]);
        assert!(parse_highlight(None).is_empty());
    }
}
