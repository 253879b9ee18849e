use std::sync::atomic::{AtomicU32, Ordering};

/// Position of a node inside its [`AstPool`](super::pool::AstPool).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AstIdx(pub usize);

/// Interned identifier or string literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NameIdx(pub usize);

/// Identity of a pool. Node indices are only unique within one pool, so any
/// table keyed across pools pairs the index with this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolId(pub u32);

static NEXT_POOL_ID: AtomicU32 = AtomicU32::new(0);

impl PoolId {
    pub fn fresh() -> Self {
        PoolId(NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed))
    }
}
