//! Audit trail carried by every persisted catalog entity.
//!
//! `created_*` is stamped once, on first persistence. `last_modified_*` moves
//! on every mutating save; a no-op save leaves it untouched.
//!
//! Timestamps are always supplied by the caller, never read from the system
//! clock here, so the same inputs produce the same audit record.
//!
//! ## Usage
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use metacat_core::audit::AuditInfo;
//!
//! let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
//! let t1 = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
//!
//! let created = AuditInfo::created("svc:etl", t0);
//! let modified = created.touched("user:ana", t1);
//!
//! assert_eq!(modified.created_date, t0);
//! assert_eq!(modified.last_modified_date, t1);
//! assert_eq!(modified.last_modified_by, "user:ana");
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who created and last modified an entity, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditInfo {
    /// Actor that first persisted the entity.
    pub created_by: String,
    /// When the entity was first persisted.
    pub created_date: DateTime<Utc>,
    /// Actor of the latest mutating save.
    pub last_modified_by: String,
    /// When the latest mutating save happened.
    pub last_modified_date: DateTime<Utc>,
}

impl AuditInfo {
    /// Audit record for an entity persisted for the first time.
    #[must_use]
    pub fn created(actor: impl Into<String>, now: DateTime<Utc>) -> Self {
        let actor = actor.into();
        Self {
            created_by: actor.clone(),
            created_date: now,
            last_modified_by: actor,
            last_modified_date: now,
        }
    }

    /// Returns a copy with `last_modified_*` moved forward.
    #[must_use]
    pub fn touched(&self, actor: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            last_modified_by: actor.into(),
            last_modified_date: now,
            ..self.clone()
        }
    }
}
