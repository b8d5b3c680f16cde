//! Identifier pools for foreign-key selection.

use crate::GenerateError;
use rand::seq::IndexedRandom;
use rand::Rng;
use uuid::Uuid;

/// Identifiers generated for one table, handed to later phases by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdPool {
    table: &'static str,
    ids: Vec<Uuid>,
}

impl IdPool {
    pub fn new(table: &'static str, ids: Vec<Uuid>) -> Self {
        Self { table, ids }
    }

    pub fn empty(table: &'static str) -> Self {
        Self::new(table, Vec::new())
    }

    /// Table the identifiers belong to
    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn as_slice(&self) -> &[Uuid] {
        &self.ids
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.ids.contains(id)
    }

    /// Uniformly pick one identifier.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Uuid, GenerateError> {
        self.ids
            .choose(rng)
            .copied()
            .ok_or(GenerateError::EmptyPool { pool: self.table })
    }

    /// Fail with [`GenerateError::EmptyPool`] unless the pool has ids.
    pub fn require_non_empty(&self) -> Result<(), GenerateError> {
        if self.is_empty() {
            Err(GenerateError::EmptyPool { pool: self.table })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_pick_from_pool() {
        let ids: Vec<Uuid> = (1..=4u128).map(Uuid::from_u128).collect();
        let pool = IdPool::new("assets", ids);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        for _ in 0..100 {
            let id = pool.pick(&mut rng).unwrap();
            assert!(pool.contains(&id));
        }
        assert_eq!(pool.len(), 4);
        assert_eq!(pool.table(), "assets");
    }

    #[test]
    fn test_empty_pool_errors() {
        let pool = IdPool::empty("events");
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        assert!(matches!(
            pool.pick(&mut rng),
            Err(GenerateError::EmptyPool { pool: "events" })
        ));
        assert!(pool.require_non_empty().is_err());
    }
}
