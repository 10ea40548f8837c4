//! Ticket category reference data.
//!
//! Categories are configuration, not mutable state: the catalog is built
//! once at startup (from code or a TOML file) and shared by reference.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::api::CategoryId;
use crate::db::repository::error::{ErrorContext, RepositoryError, RepositoryResult};

/// One ticket category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TicketCategory {
    pub id: CategoryId,
    pub name: String,
    /// Fallback resolution estimate for tickets in this category, minutes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_estimate_minutes: Option<i64>,
}

impl TicketCategory {
    pub fn new(id: CategoryId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            default_estimate_minutes: None,
        }
    }

    pub fn with_default_estimate(mut self, minutes: i64) -> Self {
        self.default_estimate_minutes = Some(minutes);
        self
    }
}

/// Immutable category lookup, constructed once and passed by reference.
#[derive(Debug, Clone, Default)]
pub struct CategoryCatalog {
    by_id: HashMap<CategoryId, TicketCategory>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    categories: Vec<TicketCategory>,
}

impl CategoryCatalog {
    /// Build a catalog from a list. A repeated id replaces the earlier
    /// entry.
    pub fn new(categories: Vec<TicketCategory>) -> Self {
        let by_id = categories.into_iter().map(|c| (c.id, c)).collect();
        Self { by_id }
    }

    /// Parse a catalog from TOML text with `[[categories]]` entries.
    pub fn from_toml_str(raw: &str) -> RepositoryResult<Self> {
        let parsed: CatalogFile = toml::from_str(raw).map_err(|e| {
            RepositoryError::configuration_with_context(
                format!("Failed to parse category catalog: {}", e),
                ErrorContext::new("catalog_from_toml").with_entity("ticket_category"),
            )
        })?;
        Ok(Self::new(parsed.categories))
    }

    /// Load a catalog from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> RepositoryResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RepositoryError::configuration_with_context(
                format!("Failed to read category catalog {}: {}", path.display(), e),
                ErrorContext::new("catalog_from_file").with_entity("ticket_category"),
            )
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn get(&self, id: CategoryId) -> Option<&TicketCategory> {
        self.by_id.get(&id)
    }

    pub fn contains(&self, id: CategoryId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TicketCategory> {
        self.by_id.values()
    }
}
