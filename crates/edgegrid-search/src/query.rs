//! Search query model.

use std::cmp::Ordering;

use edgegrid_core::{EdgeCluster, TenantId};
use serde::{Deserialize, Serialize};

use crate::error::{SearchError, SearchResult};

/// Field a result window can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Id,
    Name,
    TenantId,
    ClusterType,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: SortField,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: SortField) -> Self {
        Self {
            field,
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: SortField) -> Self {
        Self {
            field,
            direction: SortDirection::Desc,
        }
    }

    fn compare(&self, a: &EdgeCluster, b: &EdgeCluster) -> Ordering {
        let ordering = match self.field {
            SortField::Id => a.id.cmp(&b.id),
            SortField::Name => a.name.cmp(&b.name),
            SortField::TenantId => a.tenant_id.cmp(&b.tenant_id),
            SortField::ClusterType => a.cluster_type.cmp(&b.cluster_type),
        };
        self.direction.apply(ordering)
    }
}

/// Cursor window. `after`/`before` are mutually exclusive, as are
/// `first`/`last`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pagination {
    pub after: Option<String>,
    pub before: Option<String>,
    pub first: Option<usize>,
    pub last: Option<usize>,
}

impl Pagination {
    pub fn forward(after: Option<String>, first: usize) -> Self {
        Self {
            after,
            first: Some(first),
            ..Default::default()
        }
    }

    pub fn backward(before: Option<String>, last: usize) -> Self {
        Self {
            before,
            last: Some(last),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> SearchResult<()> {
        if self.after.is_some() && self.before.is_some() {
            return Err(SearchError::InvalidArgument {
                name: "pagination",
                reason: "after and before cannot be combined".to_string(),
            });
        }
        if self.first.is_some() && self.last.is_some() {
            return Err(SearchError::InvalidArgument {
                name: "pagination",
                reason: "first and last cannot be combined".to_string(),
            });
        }
        Ok(())
    }
}

/// A tenant-scoped search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub tenant_id: TenantId,
    /// Restrict to these IDs; empty means no restriction.
    #[serde(default)]
    pub ids: Vec<String>,
    /// Restrict to these owning tenants; empty means no restriction.
    #[serde(default)]
    pub owners: Vec<TenantId>,
    #[serde(default)]
    pub pagination: Pagination,
    /// Ordering of the returned window; empty means ascending ID.
    #[serde(default)]
    pub sort: Vec<SortKey>,
}

impl SearchQuery {
    pub fn for_tenant(tenant_id: impl Into<TenantId>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            ..Default::default()
        }
    }

    pub fn with_ids(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_owners(mut self, owners: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.owners = owners.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn sorted_by(mut self, key: SortKey) -> Self {
        self.sort.push(key);
        self
    }

    pub fn validate(&self) -> SearchResult<()> {
        self.pagination.validate()
    }

    /// The conjunctive filter predicate.
    pub fn matches(&self, cluster: &EdgeCluster) -> bool {
        cluster.tenant_id == self.tenant_id
            && (self.ids.is_empty() || self.ids.iter().any(|id| *id == cluster.id))
            && (self.owners.is_empty() || self.owners.iter().any(|o| *o == cluster.tenant_id))
    }

    /// Total order for the result window.
    ///
    /// Ties on every requested key fall back to ID, in the direction of the
    /// last key, so reversing a single key reverses the whole window.
    pub fn compare(&self, a: &EdgeCluster, b: &EdgeCluster) -> Ordering {
        let tie_break = self.sort.last().map(|k| k.direction).unwrap_or_default();
        self.sort
            .iter()
            .map(|key| key.compare(a, b))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| tie_break.apply(a.id.cmp(&b.id)))
    }
}
