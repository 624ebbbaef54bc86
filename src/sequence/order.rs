//! Axis ordering.
//!
//! The nesting order of a sequence's axes comes from, in priority order:
//!
//! 1. the sequence's own `axis_order`,
//! 2. the order inherited from the enclosing enumeration,
//! 3. the declaration order of the axes.
//!
//! An explicit order keeps only keys that name one of the sequence's axes.
//! Unknown keys are dropped silently, and so are axes the order leaves out.

use std::collections::HashSet;
use std::sync::Arc;

use crate::axis::{Axis, AxisIterable};

/// Axes of a sequence, nested in the order that applies to it.
pub fn resolve(
    axes: &[Arc<Axis>],
    own: Option<&[String]>,
    inherited: Option<&[String]>,
) -> Vec<Arc<Axis>> {
    ordered(axes, own.or(inherited))
}

/// `axes` arranged by `order`, or unchanged without one.
pub fn ordered(axes: &[Arc<Axis>], order: Option<&[String]>) -> Vec<Arc<Axis>> {
    let Some(order) = order else {
        return axes.to_vec();
    };
    let mut seen = HashSet::with_capacity(order.len());
    order
        .iter()
        .filter(|key| seen.insert(key.as_str()))
        .filter_map(|key| axes.iter().find(|a| a.axis_key() == key).cloned())
        .collect()
}

/// Split a compact order such as `"tpgcz"` into single-letter keys.
pub fn parse_compact(order: &str) -> Vec<String> {
    order
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_lowercase().to_string())
        .collect()
}

/// Keys that appear more than once in `order`, each reported once.
pub(crate) fn duplicates<'a>(keys: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut dups: Vec<String> = Vec::new();
    for key in keys {
        if !seen.insert(key) && !dups.iter().any(|d| d == key) {
            dups.push(key.to_string());
        }
    }
    dups
}
