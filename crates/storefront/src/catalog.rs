//! Product catalog loaded once at startup from YAML.
//!
//! ```yaml
//! products:
//!   - id: labubu-classic
//!     name: Labubu Classic
//!     description: The original monster.
//!     price: "29.90"
//!     image: /static/img/labubu-classic.webp
//!     category: collectibles
//! ```

use std::collections::HashMap;
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading the catalog file.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid catalog YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("duplicate product id: {0}")]
    DuplicateId(String),
    #[error("product {0} must have a positive price")]
    InvalidPrice(String),
    #[error("product id cannot be empty")]
    EmptyId,
}

/// A product for sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// URL-safe slug.
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    products: Vec<Product>,
}

/// Immutable, in-memory product list.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Vec<Product>,
    by_id: HashMap<String, usize>,
}

impl Catalog {
    /// Load the catalog from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the file cannot be read or fails validation.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&raw)
    }

    /// Parse a catalog from YAML text.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` on malformed YAML, empty or duplicate ids, or
    /// non-positive prices.
    pub fn from_yaml(raw: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_yaml::from_str(raw)?;
        Self::from_products(file.products)
    }

    /// Build a catalog from already-parsed products.
    ///
    /// # Errors
    ///
    /// Same validation as [`Catalog::from_yaml`].
    pub fn from_products(products: Vec<Product>) -> Result<Self, CatalogError> {
        let mut by_id = HashMap::with_capacity(products.len());
        for (index, product) in products.iter().enumerate() {
            if product.id.trim().is_empty() {
                return Err(CatalogError::EmptyId);
            }
            if product.price <= Decimal::ZERO {
                return Err(CatalogError::InvalidPrice(product.id.clone()));
            }
            if by_id.insert(product.id.clone(), index).is_some() {
                return Err(CatalogError::DuplicateId(product.id.clone()));
            }
        }
        Ok(Self { products, by_id })
    }

    /// All products in file order.
    #[must_use]
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Product> {
        self.by_id.get(id).and_then(|&i| self.products.get(i))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.products.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::str::FromStr;

    use super::*;

    const YAML: &str = r#"
products:
  - id: labubu-classic
    name: Labubu Classic
    price: "29.90"
  - id: labubu-mini
    name: Labubu Mini
    description: Pocket size.
    price: "12.50"
    category: collectibles
"#;

    #[test]
    fn test_load_preserves_order_and_lookup() {
        let catalog = Catalog::from_yaml(YAML).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.products()[0].id, "labubu-classic");
        let mini = catalog.get("labubu-mini").unwrap();
        assert_eq!(mini.price, Decimal::from_str("12.50").unwrap());
        assert_eq!(mini.category.as_deref(), Some("collectibles"));
        assert!(catalog.get("missing").is_none());
    }

    #[test]
    fn test_rejects_duplicates() {
        let yaml = r#"
products:
  - { id: a, name: A, price: "1.00" }
  - { id: a, name: B, price: "2.00" }
"#;
        assert!(matches!(
            Catalog::from_yaml(yaml),
            Err(CatalogError::DuplicateId(id)) if id == "a"
        ));
    }

    #[test]
    fn test_rejects_non_positive_price() {
        let yaml = r#"
products:
  - { id: free, name: Free, price: "0" }
"#;
        assert!(matches!(
            Catalog::from_yaml(yaml),
            Err(CatalogError::InvalidPrice(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = Catalog::load(Path::new("/nonexistent/products.yaml")).unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }
}
