//! Three-tier value resolution: per-item override, then global setting,
//! then the built-in default.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Item,
    Global,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved<T> {
    pub value: T,
    pub tier: Tier,
}

/// Returns the first present value among `item` and `global`, falling back to
/// `default`. The default is only computed when both tiers are empty.
pub fn resolve<T>(item: Option<T>, global: Option<T>, default: impl FnOnce() -> T) -> Resolved<T> {
    if let Some(value) = item {
        return Resolved {
            value,
            tier: Tier::Item,
        };
    }
    if let Some(value) = global {
        return Resolved {
            value,
            tier: Tier::Global,
        };
    }
    Resolved {
        value: default(),
        tier: Tier::Default,
    }
}
