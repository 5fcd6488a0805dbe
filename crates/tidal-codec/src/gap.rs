use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::value::Value;

static NEXT_GAP_ID: AtomicU64 = AtomicU64::new(1);

/// A placeholder for a value that is not known yet.
///
/// Gaps are compared by identity: every constructor call yields a new id,
/// clones share it. Two gaps with equal defaults are still distinct.
#[derive(Debug, Clone)]
pub struct Gap {
    id: u64,
    default: Option<Arc<Value>>,
}

impl Gap {
    pub fn new() -> Self {
        Self {
            id: NEXT_GAP_ID.fetch_add(1, Ordering::Relaxed),
            default: None,
        }
    }

    /// Creates a gap that resolves to `default` when no fill is supplied.
    pub fn with_default(default: impl Into<Value>) -> Self {
        Self {
            default: Some(Arc::new(default.into())),
            ..Self::new()
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_deref()
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Pairs this gap with its concrete value.
    pub fn fill(&self, value: impl Into<Value>) -> Fill {
        Fill {
            gap: self.clone(),
            value: value.into(),
        }
    }
}

impl Default for Gap {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Gap {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Gap {}

impl Hash for Gap {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A gap together with the value that resolves it.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub gap: Gap,
    pub value: Value,
}

#[cfg(test)]
mod tests {
    use super::Gap;
    use crate::value::Value;

    #[test]
    fn gaps_compare_by_identity() {
        let a = Gap::with_default(1_u8);
        let b = Gap::with_default(1_u8);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_eq!(a.default_value(), b.default_value());
    }

    #[test]
    fn fill_keeps_gap_identity() {
        let gap = Gap::new();
        let fill = gap.fill("late");
        assert_eq!(fill.gap, gap);
        assert_eq!(fill.value, Value::Text("late".into()));
        assert!(!gap.has_default());
    }
}
