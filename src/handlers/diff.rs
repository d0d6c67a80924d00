//! Set-difference over configuration blocks.
//!
//! Blocks are compared by value after [`Block::normalized`] strips the fields
//! the API assigns (ids, hashes). The order of the first argument is kept so
//! deletes and creates run in the order the configuration lists them.

use serde::Serialize;

/// One configuration block of a sub-resource list
pub trait Block: Clone + PartialEq {
    /// Name the API addresses the block by
    fn name(&self) -> &str;

    /// Copy of the block without server-assigned fields
    #[must_use]
    fn normalized(&self) -> Self {
        self.clone()
    }
}

/// Blocks of `from` that have no equal in `other`
pub fn difference<'a, T: Block>(from: &'a [T], other: &[T]) -> Vec<&'a T> {
    let other: Vec<T> = other.iter().map(Block::normalized).collect();
    from.iter()
        .filter(|block| !other.contains(&block.normalized()))
        .collect()
}

/// Names removed and added between two block lists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BlockChanges {
    pub removed: Vec<String>,
    pub added: Vec<String>,
}

impl BlockChanges {
    #[must_use]
    pub fn between<T: Block>(old: &[T], new: &[T]) -> Self {
        Self {
            removed: names(difference(old, new)),
            added: names(difference(new, old)),
        }
    }

    /// Changes for a single optional block
    #[must_use]
    pub fn between_single<T: Block>(old: Option<&T>, new: Option<&T>) -> Self {
        let old: Vec<T> = old.into_iter().cloned().collect();
        let new: Vec<T> = new.into_iter().cloned().collect();
        Self::between(&old, &new)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

fn names<T: Block>(blocks: Vec<&T>) -> Vec<String> {
    blocks.into_iter().map(|b| b.name().to_string()).collect()
}
