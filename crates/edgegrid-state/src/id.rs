//! Edge-cluster ID generation.

use std::sync::Mutex;

use edgegrid_core::EdgeClusterId;
use ulid::Generator;

use crate::error::{StateError, StateResult};

/// Monotonic ULID source.
///
/// IDs are rendered in lowercase so they can be embedded in host-platform
/// object names; Crockford base32 sorts identically in either case, so
/// lexicographic order stays equal to creation order.
pub struct IdGenerator {
    inner: Mutex<Generator>,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Generator::new()),
        }
    }

    /// Produce an ID strictly greater than every ID previously returned.
    pub fn next_id(&self) -> StateResult<EdgeClusterId> {
        let mut generator = self
            .inner
            .lock()
            .map_err(|e| StateError::IdGeneration(e.to_string()))?;
        let ulid = generator
            .generate()
            .map_err(|e| StateError::IdGeneration(e.to_string()))?;
        Ok(ulid.to_string().to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn ids_strictly_increase() {
        let ids = IdGenerator::new();
        let mut prev = ids.next_id().unwrap();
        for _ in 0..1000 {
            let next = ids.next_id().unwrap();
            assert!(next > prev, "{next} should sort after {prev}");
            prev = next;
        }
    }

    #[test]
    fn ids_are_lowercase_dns_safe() {
        let id = IdGenerator::new().next_id().unwrap();
        assert_eq!(id.len(), 26);
        assert!(edgegrid_core::config::is_dns_label(&id));
    }

    #[test]
    fn concurrent_generation_never_collides() {
        let ids = Arc::new(IdGenerator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ids = Arc::clone(&ids);
                std::thread::spawn(move || (0..500).map(|_| ids.next_id().unwrap()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id generated");
            }
        }
        assert_eq!(seen.len(), 8 * 500);
    }
}
