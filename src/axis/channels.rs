//! Channel axis (`c`).
//!
//! Besides identity and exposure, a channel decides when it is acquired:
//! only on every `acquire_every`-th time point, and, with `do_stack` off,
//! only on the middle plane of a z stack.

use serde::{Deserialize, Serialize};

use crate::error::{AppResult, SequenceError};
use crate::event::{Contribution, Coord, EventChannel, EventField};

use super::{keys, AxisIndex, AxisItem, AxisIterable, AxisValue, Prefix};

fn default_group() -> String {
    "Channel".to_string()
}

fn is_default_group(group: &str) -> bool {
    group == "Channel"
}

fn default_true() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

fn default_acquire_every() -> usize {
    1
}

fn is_one(value: &usize) -> bool {
    *value == 1
}

/// Channel descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Channel {
    /// Name of the configuration preset.
    pub config: String,
    /// Configuration group the preset belongs to.
    #[serde(default = "default_group", skip_serializing_if = "is_default_group")]
    pub group: String,
    /// Exposure in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposure: Option<f64>,
    /// Acquire the full z stack (otherwise only the middle plane).
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub do_stack: bool,
    /// Acquire only on every n-th time point.
    #[serde(default = "default_acquire_every", skip_serializing_if = "is_one")]
    pub acquire_every: usize,
    /// Focus offset added to the z position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_offset: Option<f64>,
}

impl Channel {
    /// Channel `config` in the default group.
    pub fn new(config: impl Into<String>) -> Self {
        Self {
            config: config.into(),
            group: default_group(),
            exposure: None,
            do_stack: true,
            acquire_every: 1,
            z_offset: None,
        }
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn with_exposure(mut self, exposure_ms: f64) -> Self {
        self.exposure = Some(exposure_ms);
        self
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn with_do_stack(mut self, do_stack: bool) -> Self {
        self.do_stack = do_stack;
        self
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn with_acquire_every(mut self, every: usize) -> Self {
        self.acquire_every = every;
        self
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn with_z_offset(mut self, offset: f64) -> Self {
        self.z_offset = Some(offset);
        self
    }

    /// Whether this channel is acquired at time index `t`.
    #[must_use]
    pub fn acquired_at(&self, t: usize) -> bool {
        t % self.acquire_every.max(1) == 0
    }
}

/// Channel axis.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelsPlan {
    /// Channels in acquisition order.
    pub channels: Vec<Channel>,
}

impl ChannelsPlan {
    #[allow(missing_docs)]
    pub fn new(channels: impl IntoIterator<Item = Channel>) -> Self {
        Self {
            channels: channels.into_iter().collect(),
        }
    }
}

impl AxisIterable for ChannelsPlan {
    fn axis_key(&self) -> &str {
        keys::CHANNEL
    }

    fn iter(&self) -> Box<dyn Iterator<Item = AxisItem>> {
        Box::new(
            self.channels
                .clone()
                .into_iter()
                .map(|c| AxisItem::Value(AxisValue::Channel(c))),
        )
    }

    fn length(&self) -> Option<usize> {
        Some(self.channels.len())
    }

    fn should_skip(&self, prefix: &Prefix) -> bool {
        let Some(entry) = prefix.get(keys::CHANNEL) else {
            return false;
        };
        let AxisValue::Channel(channel) = &entry.value else {
            return false;
        };

        if let Some(t) = prefix.index_of(keys::TIME) {
            if !channel.acquired_at(t) {
                return true;
            }
        }

        if !channel.do_stack {
            if let Some(z) = prefix.get(keys::Z) {
                let planes = z.axis.length().unwrap_or(0);
                if z.index != planes / 2 {
                    return true;
                }
            }
        }
        false
    }

    fn contribute(&self, value: &AxisValue, _index: &AxisIndex) -> Contribution {
        let AxisValue::Channel(channel) = value else {
            return Contribution::new();
        };
        let mut contribution = Contribution::new().with(EventField::Channel(EventChannel {
            config: channel.config.clone(),
            group: channel.group.clone(),
        }));
        if let Some(exposure) = channel.exposure {
            contribution.push(EventField::Exposure(exposure));
        }
        contribution.with_delta(Coord::Z, channel.z_offset)
    }

    fn validate(&self) -> AppResult<()> {
        if self.channels.iter().any(|c| c.acquire_every == 0) {
            return Err(SequenceError::invalid_axis(
                keys::CHANNEL,
                "acquire_every must be at least 1",
            ));
        }
        Ok(())
    }
}
