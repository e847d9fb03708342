use crate::domain::product::{ProductCatalogEntry, ProductId};

/// Read-only product lookups the intake pipeline needs from the catalog collaborator.
pub trait CatalogLookup: Send + Sync {
    fn get_by_id(&self, product_id: &ProductId) -> Option<&ProductCatalogEntry>;

    /// First entry whose name contains `text` or is contained in it, ignoring case.
    fn search_by_name_substring(&self, text: &str) -> Option<&ProductCatalogEntry>;
}

#[derive(Clone, Debug, Default)]
pub struct Catalog {
    products: Vec<ProductCatalogEntry>,
}

impl Catalog {
    pub fn new(products: Vec<ProductCatalogEntry>) -> Self {
        Self { products }
    }

    pub fn products(&self) -> &[ProductCatalogEntry] {
        &self.products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

impl CatalogLookup for Catalog {
    fn get_by_id(&self, product_id: &ProductId) -> Option<&ProductCatalogEntry> {
        self.products.iter().find(|product| &product.id == product_id)
    }

    fn search_by_name_substring(&self, text: &str) -> Option<&ProductCatalogEntry> {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        self.products.iter().find(|product| {
            let name = product.name.to_lowercase();
            name.contains(&needle) || needle.contains(&name)
        })
    }
}
