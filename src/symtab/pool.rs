use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use tracing::trace;

use super::{GlobalScope, SymbolTable};

/// Bounded pool of reusable symbol tables over one global scope.
///
/// At most `capacity` tables exist at once; [`acquire`](Self::acquire)
/// blocks while all of them are checked out. A returned table is reset to
/// global depth before anyone else can see it.
#[derive(Debug)]
pub struct SymtabPool {
    global: Arc<GlobalScope>,
    capacity: usize,
    state: Mutex<PoolState>,
    available: Condvar,
}

#[derive(Debug, Default)]
struct PoolState {
    idle: Vec<SymbolTable>,
    created: usize,
}

impl SymtabPool {
    pub fn new(global: Arc<GlobalScope>, capacity: usize) -> Self {
        Self {
            global,
            capacity: capacity.max(1),
            state: Mutex::new(PoolState::default()),
            available: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn acquire(&self) -> PooledSymtab<'_> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(table) = state.idle.pop() {
                return PooledSymtab { pool: self, table };
            }
            if state.created < self.capacity {
                state.created += 1;
                trace!(created = state.created, "symbol table created for pool");
                return PooledSymtab {
                    pool: self,
                    table: SymbolTable::new(Arc::clone(&self.global)),
                };
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Tables currently sitting unused in the pool.
    pub fn idle(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .idle
            .len()
    }

    fn release(&self, mut table: SymbolTable) {
        table.reset_to_global();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.idle.push(table);
        drop(state);
        self.available.notify_one();
    }
}

/// Exclusive handle to a pooled table; returns it on drop.
#[derive(Debug)]
pub struct PooledSymtab<'a> {
    pool: &'a SymtabPool,
    table: SymbolTable,
}

impl Deref for PooledSymtab<'_> {
    type Target = SymbolTable;

    fn deref(&self) -> &SymbolTable {
        &self.table
    }
}

impl DerefMut for PooledSymtab<'_> {
    fn deref_mut(&mut self) -> &mut SymbolTable {
        &mut self.table
    }
}

impl Drop for PooledSymtab<'_> {
    fn drop(&mut self) {
        let empty = SymbolTable::new(Arc::clone(&self.pool.global));
        let table = std::mem::replace(&mut self.table, empty);
        self.pool.release(table);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::ArchConfig;

    fn pool(capacity: usize) -> SymtabPool {
        let arch = Arc::new(ArchConfig::builder().xlen(32).build());
        SymtabPool::new(Arc::new(GlobalScope::builtin(arch)), capacity)
    }

    #[test]
    fn release_restores_global_depth() {
        let pool = pool(1);
        {
            let mut t = pool.acquire();
            t.push();
            t.push();
            assert_eq!(t.levels(), 3);
        }
        assert_eq!(pool.idle(), 1);
        assert_eq!(pool.acquire().levels(), 1);
    }

    #[test]
    fn blocked_acquire_resumes_after_release() {
        let pool = Arc::new(pool(1));
        let held = pool.acquire();

        let waiter = {
            let pool = Arc::clone(&pool);
            std::thread::spawn(move || pool.acquire().levels())
        };

        std::thread::sleep(std::time::Duration::from_millis(20));
        drop(held);
        assert_eq!(waiter.join().unwrap(), 1);
    }
}
