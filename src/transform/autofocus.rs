//! Hardware autofocus triggered by axis changes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::axis::{keys, AxisIterable};
use crate::event::{Action, MdaEvent};

use super::{EventTransform, Lookahead};

/// Autofocus plan: focus whenever the index of one of `axes` changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AxesBasedAf {
    /// Axes whose index changes trigger autofocus.
    #[serde(default)]
    pub axes: Vec<String>,
    /// Name of the autofocus offset device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autofocus_device_name: Option<String>,
    /// Position to move the offset device to before focusing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autofocus_motor_offset: Option<f64>,
}

impl AxesBasedAf {
    /// Plan watching `axes`, with no device settings.
    pub fn new<I, S>(axes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            axes: axes.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn with_device(mut self, name: impl Into<String>) -> Self {
        self.autofocus_device_name = Some(name.into());
        self
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn with_motor_offset(mut self, offset: f64) -> Self {
        self.autofocus_motor_offset = Some(offset);
        self
    }

    /// The action carried by inserted autofocus events.
    pub fn as_action(&self) -> Action {
        Action::HardwareAutofocus {
            autofocus_device_name: self.autofocus_device_name.clone(),
            autofocus_motor_offset: self.autofocus_motor_offset,
        }
    }
}

/// Inserts an autofocus event before the first event this instance sees and
/// before every event where a watched axis index differs from the last index
/// seen for that axis. Events without a watched axis never trigger it.
///
/// The autofocus event copies the triggering event with the plan's action.
/// When the event's sequence has a relative z axis, its `z_pos` is moved back
/// to the home plane of the stack.
#[derive(Debug, Clone)]
pub struct AutofocusTransform {
    plan: AxesBasedAf,
    last_seen: HashMap<String, usize>,
    started: bool,
}

impl AutofocusTransform {
    #[allow(missing_docs)]
    pub fn new(plan: AxesBasedAf) -> Self {
        Self {
            plan,
            last_seen: HashMap::new(),
            started: false,
        }
    }

    /// Record the watched indices of `event`, reporting whether any changed.
    fn observe(&mut self, event: &MdaEvent) -> bool {
        let mut changed = !self.started;
        self.started = true;
        for key in &self.plan.axes {
            let Some(index) = event.index_of(key) else {
                continue;
            };
            if self.last_seen.insert(key.clone(), index) != Some(index) {
                changed = true;
            }
        }
        changed
    }

    fn focus_event(&self, event: &MdaEvent) -> MdaEvent {
        let mut af = event.clone();
        af.action = self.plan.as_action();
        let offset = event.sequence.as_ref().and_then(|seq| {
            let z = seq.axis(keys::Z)?;
            z.relative_offset(event.index_of(keys::Z)?)
        });
        if let (Some(z), Some(offset)) = (af.z_pos, offset) {
            af.z_pos = Some(z - offset);
        }
        af
    }
}

impl EventTransform for AutofocusTransform {
    fn apply(
        &mut self,
        event: MdaEvent,
        _prev: Option<&MdaEvent>,
        _next: &Lookahead<'_>,
    ) -> Vec<MdaEvent> {
        if self.plan.axes.is_empty() || !self.observe(&event) {
            return vec![event];
        }
        tracing::trace!(index = ?event.index, "inserting autofocus event");
        vec![self.focus_event(&event), event]
    }
}
