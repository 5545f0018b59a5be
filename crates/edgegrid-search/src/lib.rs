//! edgegrid-search — cursor-paginated search over a tenant partition.
//!
//! A query is evaluated against one consistent snapshot of the tenant's
//! partition:
//!
//! 1. filter: tenant AND `id ∈ ids` AND `owner ∈ owners` (empty lists match all)
//! 2. count: `total_count` is taken before any cursor bound or limit
//! 3. bound: `after` / `before` cursors, compared in ID order
//! 4. limit: `first` keeps the head of the bounded range, `last` the tail
//! 5. sort: the selected window is ordered by the requested sort keys
//!
//! Cursors are record IDs, handed out and accepted as opaque strings.

pub mod engine;
pub mod error;
pub mod page;
pub mod query;

pub use engine::{paginate, SearchEngine};
pub use error::{SearchError, SearchResult};
pub use page::{Edge, Page, PageInfo};
pub use query::{Pagination, SearchQuery, SortDirection, SortField, SortKey};
