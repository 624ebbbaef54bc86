//! Event timer reset at the start of each time phase.

use crate::axis::keys;
use crate::event::MdaEvent;

use super::{EventTransform, Lookahead};

/// Flags `reset_event_timer` on an event at `t` index 0 whenever the last
/// `t` index seen was not 0, including on the first timed event.
///
/// The last index is tracked over the whole stream, across nested sequences.
#[derive(Debug, Default)]
pub struct ResetEventTimer {
    last_t: Option<usize>,
}

impl EventTransform for ResetEventTimer {
    fn apply(
        &mut self,
        mut event: MdaEvent,
        _prev: Option<&MdaEvent>,
        _next: &Lookahead<'_>,
    ) -> Vec<MdaEvent> {
        if let Some(t) = event.index_of(keys::TIME) {
            if t == 0 && self.last_t != Some(0) {
                event.reset_event_timer = true;
            }
            self.last_t = Some(t);
        }
        vec![event]
    }
}
