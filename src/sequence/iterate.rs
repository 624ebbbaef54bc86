//! The combination enumerator.
//!
//! [`AxesIter`] walks the nested-loop product of a sequence's axes with an
//! explicit stack of frames, one per active axis; the last axis varies
//! fastest. It yields one [`Combination`] per complete assignment that no
//! axis vetoes.
//!
//! # Overrides
//!
//! When an axis yields a nested sequence, the rest of that branch drops every
//! remaining axis whose key the nested sequence declares, appends the nested
//! sequence's own axes (ordered by its own `axis_order`, else by the order
//! the enumeration was started with, else by declaration), and pushes the
//! nested sequence onto the context. The nested sequence's `value` is what
//! the combination records for the axis.
//!
//! # Unbounded axes
//!
//! The first active axis list (the root list, or the rest of a branch after
//! a splice) that holds an axis with no known length opens a window. Inside
//! it the list is enumerated in passes: every unbounded axis only visits
//! indices `[offset, offset + W)` (keeping their absolute indices), bounded
//! axes are visited in full, and `offset` advances by `W` after each pass.
//! Unbounded axes spliced in while the window is open share it. The window
//! closes once a pass completes no assignment that drew from a windowed
//! axis; a list holding an empty bounded axis never opens one.

use std::sync::Arc;

use crate::axis::{Axis, AxisItem, AxisIterable, Prefix, PrefixEntry};
use crate::error::{AppResult, SequenceError};

use super::{order, IterOptions, MdaSequence};

/// One complete assignment of the active axes.
#[derive(Debug, Clone)]
pub struct Combination {
    /// Entry of every active axis, outermost first.
    pub prefix: Prefix,
    /// Sequences whose overrides produced this combination, outermost first;
    /// the first element is always the enumerated sequence.
    pub context: Vec<Arc<MdaSequence>>,
}

impl Combination {
    /// Innermost sequence of the context.
    #[must_use]
    pub fn sequence(&self) -> Option<&Arc<MdaSequence>> {
        self.context.last()
    }
}

struct Frame {
    axis: Arc<Axis>,
    rest: Vec<Arc<Axis>>,
    items: Box<dyn Iterator<Item = (usize, AxisItem)>>,
    windowed: bool,
    /// Whether `prefix` holds a value drawn from a windowed axis.
    drawn: bool,
    prefix: Prefix,
    context: Vec<Arc<MdaSequence>>,
}

/// The axis list being enumerated in passes, and where it sits on the stack.
struct Window {
    axes: Vec<Arc<Axis>>,
    prefix: Prefix,
    context: Vec<Arc<MdaSequence>>,
    depth: usize,
    offset: usize,
    passes: usize,
    progressed: bool,
}

/// Lazy iterator over the combinations of a sequence.
///
/// After yielding an error the iterator is exhausted.
pub struct AxesIter {
    root: Arc<MdaSequence>,
    root_axes: Vec<Arc<Axis>>,
    inherited_order: Option<Vec<String>>,
    window_size: usize,
    window: Option<Window>,
    stack: Vec<Frame>,
    started: bool,
    done: bool,
}

impl AxesIter {
    /// Enumerate `root` with `options`.
    pub fn new(root: Arc<MdaSequence>, options: &IterOptions) -> Self {
        let inherited_order = options.axis_order.clone();
        let root_order = inherited_order.as_deref().or(root.axis_order.as_deref());
        let root_axes = order::ordered(&root.axes, root_order);
        Self {
            root,
            root_axes,
            inherited_order,
            window_size: options.window_size.max(1),
            window: None,
            stack: Vec::new(),
            started: false,
            done: false,
        }
    }

    /// Start the next pass of the open window, or close it.
    fn next_pass(&mut self) -> Option<Combination> {
        let window = self.window.as_mut()?;
        if window.passes > 0 {
            if !window.progressed {
                tracing::debug!(passes = window.passes, "closing enumeration window");
                self.window = None;
                return None;
            }
            window.offset += self.window_size;
            tracing::debug!(offset = window.offset, "advancing enumeration window");
        }
        window.passes += 1;
        window.progressed = false;
        let (axes, prefix, context) = (
            window.axes.clone(),
            window.prefix.clone(),
            window.context.clone(),
        );
        self.descend(axes, prefix, context, false)
    }

    /// Push a frame for the first of `axes`, or complete the combination if
    /// no axes are left.
    fn descend(
        &mut self,
        mut axes: Vec<Arc<Axis>>,
        prefix: Prefix,
        context: Vec<Arc<MdaSequence>>,
        drawn: bool,
    ) -> Option<Combination> {
        if axes.is_empty() {
            if drawn {
                if let Some(window) = self.window.as_mut() {
                    window.progressed = true;
                }
            }
            let vetoed = prefix.iter().any(|(_, entry)| entry.axis.should_skip(&prefix));
            return (!vetoed).then_some(Combination { prefix, context });
        }

        if self.window.is_none() && axes.iter().any(|a| a.is_unbounded()) {
            if axes.iter().any(|a| a.length() == Some(0)) {
                tracing::trace!("unbounded branch with an empty axis yields nothing");
                return None;
            }
            tracing::debug!(size = self.window_size, "enumerating unbounded axes in windows");
            self.window = Some(Window {
                axes,
                prefix,
                context,
                depth: self.stack.len(),
                offset: 0,
                passes: 0,
                progressed: false,
            });
            return None;
        }

        let axis = axes.remove(0);
        let items = axis.iter().enumerate();
        let (items, windowed): (Box<dyn Iterator<Item = (usize, AxisItem)>>, bool) =
            match &self.window {
                Some(window) if axis.is_unbounded() => (
                    Box::new(items.skip(window.offset).take(self.window_size)),
                    true,
                ),
                _ => (Box::new(items), false),
            };
        self.stack.push(Frame {
            axis,
            rest: axes,
            items,
            windowed,
            drawn,
            prefix,
            context,
        });
        None
    }

    fn splice(&self, rest: &mut Vec<Arc<Axis>>, nested: &MdaSequence) {
        rest.retain(|a| nested.axis(a.axis_key()).is_none());
        rest.extend(order::resolve(
            &nested.axes,
            nested.axis_order.as_deref(),
            self.inherited_order.as_deref(),
        ));
    }

    fn fail(&mut self, err: SequenceError) -> Option<AppResult<Combination>> {
        self.done = true;
        self.stack.clear();
        self.window = None;
        Some(Err(err))
    }
}

impl Iterator for AxesIter {
    type Item = AppResult<Combination>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }

            if let Some(depth) = self.window.as_ref().map(|w| w.depth) {
                if self.stack.len() == depth {
                    if let Some(combination) = self.next_pass() {
                        return Some(Ok(combination));
                    }
                    continue;
                }
            }

            let Some(frame) = self.stack.last_mut() else {
                if self.started {
                    self.done = true;
                    return None;
                }
                self.started = true;
                let axes = self.root_axes.clone();
                let context = vec![Arc::clone(&self.root)];
                if let Some(combination) = self.descend(axes, Prefix::default(), context, false) {
                    return Some(Ok(combination));
                }
                continue;
            };

            let Some((index, item)) = frame.items.next() else {
                self.stack.pop();
                continue;
            };

            let drawn = frame.drawn || frame.windowed;
            let axis = Arc::clone(&frame.axis);
            let mut rest = frame.rest.clone();
            let mut prefix = frame.prefix.clone();
            let mut context = frame.context.clone();

            let value = match item {
                AxisItem::Value(value) => value,
                AxisItem::Sequence(nested) => {
                    let Some(value) = nested.value.clone() else {
                        return self.fail(SequenceError::MissingOverrideValue {
                            axis: axis.axis_key().to_string(),
                        });
                    };
                    tracing::trace!(axis = axis.axis_key(), index, "splicing nested sequence");
                    self.splice(&mut rest, &nested);
                    context.push(nested);
                    value
                }
            };
            prefix.insert(PrefixEntry { index, value, axis });

            if let Some(combination) = self.descend(rest, prefix, context, drawn) {
                return Some(Ok(combination));
            }
        }
    }
}
