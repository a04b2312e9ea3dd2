//! Memoized compilation
//!
//! An [`ExpressionCache`] compiles each `(tree, backend)` pair at most once.
//! The map lock is held only long enough to find or create a key's entry;
//! compilation runs outside it, so a slow compile blocks only callers waiting
//! on that same key. Compilation failures are cached too.

use crate::algebra::{Algebra, Value};
use crate::backend::{compile, Backend, Expression};
use crate::{CompileOptions, MastError, MastResult, Mst};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::trace;

/// How many compiled expressions a cache keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Keep everything
    Unbounded,
    /// Keep the most recently used entries
    Lru(NonZeroUsize),
    /// Compile on every request
    Disabled,
}

type Entry<T> = Arc<OnceLock<MastResult<Arc<dyn Expression<T>>>>>;
type Key = (Mst, Backend);

pub struct ExpressionCache<T, A: ?Sized> {
    algebra: Arc<A>,
    options: CompileOptions,
    policy: EvictionPolicy,
    entries: Option<Mutex<LruCache<Key, Entry<T>>>>,
}

impl<T, A> ExpressionCache<T, A>
where
    T: Value,
    A: Algebra<T> + ?Sized + 'static,
{
    pub fn new(algebra: Arc<A>, policy: EvictionPolicy) -> Self {
        Self::with_options(algebra, policy, CompileOptions::default())
    }

    pub fn with_options(algebra: Arc<A>, policy: EvictionPolicy, options: CompileOptions) -> Self {
        let entries = match policy {
            EvictionPolicy::Unbounded => Some(Mutex::new(LruCache::unbounded())),
            EvictionPolicy::Lru(capacity) => Some(Mutex::new(LruCache::new(capacity))),
            EvictionPolicy::Disabled => None,
        };
        Self {
            algebra,
            options,
            policy,
            entries,
        }
    }

    /// Return the compiled expression for `tree`, compiling it on first use
    pub fn get_or_compile(&self, tree: &Mst, backend: Backend) -> MastResult<Arc<dyn Expression<T>>> {
        let Some(entries) = &self.entries else {
            return self.compile(tree, backend);
        };

        let entry = {
            let mut entries = entries.lock().map_err(|_| poisoned())?;
            entries
                .get_or_insert((tree.clone(), backend), || Arc::new(OnceLock::new()))
                .clone()
        };

        entry.get_or_init(|| self.compile(tree, backend)).clone()
    }

    fn compile(&self, tree: &Mst, backend: Backend) -> MastResult<Arc<dyn Expression<T>>> {
        trace!(backend = %backend, "Expression cache miss");
        compile(tree, Arc::clone(&self.algebra), backend, &self.options)
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    pub fn algebra(&self) -> &Arc<A> {
        &self.algebra
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries
            .as_ref()
            .and_then(|entries| entries.lock().ok().map(|entries| entries.len()))
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Some(Ok(mut entries)) = self.entries.as_ref().map(|entries| entries.lock()) {
            entries.clear();
        }
    }
}

fn poisoned() -> MastError {
    MastError::Backend("expression cache lock poisoned".to_string())
}
