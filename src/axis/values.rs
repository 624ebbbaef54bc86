//! Generic axes: explicit value lists and integer counters.

use serde::{Deserialize, Serialize};

use crate::error::{AppResult, SequenceError};

use super::{AxisItem, AxisIterable, AxisValue};

/// Axis yielding an explicit list of items.
///
/// Items may be nested sequences; each must carry a `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueAxis {
    /// Key of the axis.
    pub axis_key: String,
    /// Items in iteration order.
    #[serde(default)]
    pub values: Vec<AxisItem>,
}

impl ValueAxis {
    /// Axis `key` over `values`.
    pub fn new<I, V>(key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<AxisItem>,
    {
        Self {
            axis_key: key.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

impl AxisIterable for ValueAxis {
    fn axis_key(&self) -> &str {
        &self.axis_key
    }

    fn iter(&self) -> Box<dyn Iterator<Item = AxisItem>> {
        Box::new(self.values.clone().into_iter())
    }

    fn length(&self) -> Option<usize> {
        Some(self.values.len())
    }

    fn validate(&self) -> AppResult<()> {
        if self.values.iter().any(|item| item.value().is_none()) {
            return Err(SequenceError::MissingOverrideValue {
                axis: self.axis_key.clone(),
            });
        }
        Ok(())
    }
}

/// Integer counter `start, start + 1, ...`, endless unless `stop` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterAxis {
    /// Key of the axis.
    pub axis_key: String,
    /// First value.
    #[serde(default)]
    pub start: i64,
    /// Exclusive upper bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<i64>,
}

impl CounterAxis {
    /// Endless counter from 0.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            axis_key: key.into(),
            start: 0,
            stop: None,
        }
    }

    /// Stop before `stop`.
    #[must_use]
    pub fn with_stop(mut self, stop: i64) -> Self {
        self.stop = Some(stop);
        self
    }
}

impl AxisIterable for CounterAxis {
    fn axis_key(&self) -> &str {
        &self.axis_key
    }

    fn iter(&self) -> Box<dyn Iterator<Item = AxisItem>> {
        let values = self.start..;
        match self.stop {
            Some(stop) => Box::new(
                values
                    .take_while(move |v| *v < stop)
                    .map(|v| AxisItem::Value(AxisValue::Integer(v))),
            ),
            None => Box::new(values.map(|v| AxisItem::Value(AxisValue::Integer(v)))),
        }
    }

    fn length(&self) -> Option<usize> {
        self.stop
            .map(|stop| usize::try_from(stop.saturating_sub(self.start)).unwrap_or(0))
    }
}
