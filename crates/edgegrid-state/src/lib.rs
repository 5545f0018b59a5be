//! edgegrid-state — tenant-scoped storage of edge-cluster records.
//!
//! # Architecture
//!
//! ```text
//! TenantRepository (async, cancellable, assigns IDs)
//!   └── Arc<dyn PartitionStore> (blocking, linearizable per tenant)
//!         ├── MemoryStore  — RwLock per tenant partition
//!         └── RedbStore    — redb tables, `{tenant}/{id}` keys
//! ```
//!
//! A tenant partition is created lazily by the first insert under that
//! tenant and is never removed, even once it is empty. Reads, updates and
//! deletes against a tenant that never had an insert fail with
//! [`StateError::TenantNotFound`].

pub mod disk;
pub mod error;
pub mod id;
pub mod memory;
pub mod repository;
pub mod store;
pub mod tables;

pub use disk::RedbStore;
pub use error::{StateError, StateResult};
pub use id::IdGenerator;
pub use memory::MemoryStore;
pub use repository::TenantRepository;
pub use store::PartitionStore;
