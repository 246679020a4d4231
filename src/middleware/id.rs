use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

/// Source of tool-call ids. Injectable so tests get stable output.
pub trait CallIdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Default generator: `call_` followed by a uuid4 without hyphens.
#[derive(Debug, Default)]
pub struct UuidCallIds;

impl CallIdGenerator for UuidCallIds {
    fn next_id(&self) -> String {
        format!("call_{}", Uuid::new_v4().simple())
    }
}

/// Deterministic generator: `{prefix}_0`, `{prefix}_1`, ...
#[derive(Debug)]
pub struct SequentialCallIds {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialCallIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl CallIdGenerator for SequentialCallIds {
    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}_{}", self.prefix, n)
    }
}
