//! Per-catalog configuration.
//!
//! Each registered catalog carries a capability descriptor that gates
//! lifecycle operations and selects filter behavior. Configuration can be
//! built in code or read from `METACAT_<CATALOG>_*` environment variables.

use serde::{Deserialize, Serialize};

use metacat_core::{Error, Result};

use crate::filter::{BareWordPolicy, FilterOptions, TypePolicy};

/// What a catalog's backend allows and how its filters behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogCapabilities {
    /// Databases may be created.
    pub can_create_database: bool,
    /// Tables may be created.
    pub can_create_table: bool,
    /// Databases may be deleted.
    pub can_delete_database: bool,
    /// Tables may be deleted.
    pub can_delete_table: bool,
    /// The backend evaluates partition filters itself.
    pub supports_predicate_pushdown: bool,
    /// Quoted literals compared with numeric keys are rejected.
    pub strict_filter_typing: bool,
    /// Partition-key fields are moved after all other fields on create.
    pub partition_keys_trail_in_field_order: bool,
}

impl Default for CatalogCapabilities {
    fn default() -> Self {
        Self {
            can_create_database: true,
            can_create_table: true,
            can_delete_database: true,
            can_delete_table: true,
            supports_predicate_pushdown: false,
            strict_filter_typing: false,
            partition_keys_trail_in_field_order: false,
        }
    }
}

impl CatalogCapabilities {
    /// Every lifecycle operation allowed, filters pushed down.
    #[must_use]
    pub const fn full() -> Self {
        Self {
            can_create_database: true,
            can_create_table: true,
            can_delete_database: true,
            can_delete_table: true,
            supports_predicate_pushdown: true,
            strict_filter_typing: false,
            partition_keys_trail_in_field_order: false,
        }
    }

    /// No databases or tables may be created or deleted.
    #[must_use]
    pub const fn read_only() -> Self {
        Self {
            can_create_database: false,
            can_create_table: false,
            can_delete_database: false,
            can_delete_table: false,
            supports_predicate_pushdown: false,
            strict_filter_typing: false,
            partition_keys_trail_in_field_order: false,
        }
    }
}

/// Configuration of one registered catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Catalog name (lower-case).
    pub name: String,
    /// Capability flags.
    #[serde(default)]
    pub capabilities: CatalogCapabilities,
    /// Unquoted words in filters.
    #[serde(default)]
    pub bare_words: BareWordPolicy,
}

impl CatalogConfig {
    /// Creates a config with default capabilities.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_capabilities(name, CatalogCapabilities::default())
    }

    /// Creates a config with the given capabilities.
    #[must_use]
    pub fn with_capabilities(name: impl Into<String>, capabilities: CatalogCapabilities) -> Self {
        Self {
            name: name.into().trim().to_lowercase(),
            capabilities,
            bare_words: BareWordPolicy::default(),
        }
    }

    /// Accepts unquoted words as string literals in filters.
    #[must_use]
    pub fn allow_bare_words(mut self) -> Self {
        self.bare_words = BareWordPolicy::AsString;
        self
    }

    /// Filter options in effect for this catalog.
    ///
    /// Typing follows [`CatalogCapabilities::strict_filter_typing`], so a
    /// config changed or deserialized field by field cannot disagree with
    /// its capabilities.
    #[must_use]
    pub fn filter_options(&self) -> FilterOptions {
        FilterOptions {
            bare_words: self.bare_words,
            type_policy: if self.capabilities.strict_filter_typing {
                TypePolicy::Strict
            } else {
                TypePolicy::Lenient
            },
        }
    }

    /// Loads configuration from `METACAT_<CATALOG>_*` environment variables.
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to something that is not a
    /// boolean.
    pub fn from_env(catalog: &str) -> Result<Self> {
        Self::from_lookup(catalog, |name| std::env::var(name).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to something that is not a
    /// boolean.
    pub fn from_lookup(catalog: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let prefix = env_prefix(catalog);
        let var = |suffix: &str| {
            let name = format!("{prefix}_{suffix}");
            let value = lookup(&name);
            (name, value)
        };
        let flag = |suffix: &str, default: bool| -> Result<bool> {
            let (name, value) = var(suffix);
            Ok(env_bool(&name, value)?.unwrap_or(default))
        };

        let defaults = CatalogCapabilities::default();
        let capabilities = CatalogCapabilities {
            can_create_database: flag("CAN_CREATE_DATABASE", defaults.can_create_database)?,
            can_create_table: flag("CAN_CREATE_TABLE", defaults.can_create_table)?,
            can_delete_database: flag("CAN_DELETE_DATABASE", defaults.can_delete_database)?,
            can_delete_table: flag("CAN_DELETE_TABLE", defaults.can_delete_table)?,
            supports_predicate_pushdown: flag(
                "SUPPORTS_PREDICATE_PUSHDOWN",
                defaults.supports_predicate_pushdown,
            )?,
            strict_filter_typing: flag("STRICT_FILTER_TYPING", defaults.strict_filter_typing)?,
            partition_keys_trail_in_field_order: flag(
                "PARTITION_KEYS_TRAIL",
                defaults.partition_keys_trail_in_field_order,
            )?,
        };
        let bare_words = if flag("FILTER_BARE_WORDS", false)? {
            BareWordPolicy::AsString
        } else {
            BareWordPolicy::Reject
        };

        Ok(Self {
            name: catalog.trim().to_lowercase(),
            capabilities,
            bare_words,
        })
    }
}

fn env_prefix(catalog: &str) -> String {
    let normalized: String = catalog
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("METACAT_{normalized}")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    let value = value.trim().to_ascii_lowercase();
    match value.as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => Err(Error::InvalidInput(format!(
            "{name} must be a boolean (true/false/1/0)"
        ))),
    }
}

fn env_bool(name: &str, value: Option<String>) -> Result<Option<bool>> {
    let Some(v) = non_empty(value) else {
        return Ok(None);
    };
    parse_bool(name, &v).map(Some)
}
