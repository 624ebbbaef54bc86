//! Keeping the shutter open between closely related events.

use crate::event::MdaEvent;

use super::{EventTransform, Lookahead};

/// Sets `keep_shutter_open` on an event when every axis whose index changes
/// before the next raw event is one of `axes`.
///
/// The last event of a stream is never flagged.
#[derive(Debug, Clone)]
pub struct KeepShutterOpen {
    axes: Vec<String>,
}

impl KeepShutterOpen {
    #[allow(missing_docs)]
    pub fn new(axes: Vec<String>) -> Self {
        Self { axes }
    }
}

impl EventTransform for KeepShutterOpen {
    fn apply(
        &mut self,
        mut event: MdaEvent,
        _prev: Option<&MdaEvent>,
        next: &Lookahead<'_>,
    ) -> Vec<MdaEvent> {
        let Some(next) = next.get() else {
            return vec![event];
        };
        let only_watched_change = event
            .index
            .iter()
            .filter(|(key, idx)| next.index.get(*key) != Some(*idx))
            .all(|(key, _)| self.axes.contains(key));
        if only_watched_change {
            event.keep_shutter_open = true;
        }
        vec![event]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::AxisIndex;

    fn event(pairs: &[(&str, usize)]) -> MdaEvent {
        MdaEvent::with_index(pairs.iter().map(|(k, i)| (k.to_string(), *i)).collect::<AxisIndex>())
    }

    fn flag(axes: &[&str], current: MdaEvent, next: Option<MdaEvent>) -> bool {
        let mut tf = KeepShutterOpen::new(axes.iter().map(|a| a.to_string()).collect());
        let out = tf.apply(current, None, &Lookahead::fixed(next));
        out[0].keep_shutter_open
    }

    #[test]
    fn test_only_watched_axis_changes() {
        assert!(flag(
            &["c"],
            event(&[("t", 0), ("c", 0)]),
            Some(event(&[("t", 0), ("c", 1)]))
        ));
    }

    #[test]
    fn test_unwatched_axis_changes() {
        assert!(!flag(
            &["c"],
            event(&[("t", 0), ("c", 1)]),
            Some(event(&[("t", 1), ("c", 0)]))
        ));
    }

    #[test]
    fn test_axis_missing_from_next_counts_as_change() {
        assert!(!flag(&["c"], event(&[("z", 0)]), Some(event(&[("c", 0)]))));
        assert!(flag(&["z"], event(&[("z", 0)]), Some(event(&[("c", 0)]))));
    }

    #[test]
    fn test_last_event_untouched() {
        assert!(!flag(&["c", "t", "z"], event(&[("c", 0)]), None));
    }
}
