//! Event transform pipeline.
//!
//! Raw events are built one combination at a time and then passed through a
//! chain of [`EventTransform`]s. Each transform receives the event, the event
//! emitted before it, and a [`Lookahead`] onto the next raw event, and returns
//! any number of events: one to replace, none to drop, several to insert.
//!
//! The chain for an event is composed from its context. Every sequence in the
//! context contributes its [`TransformSpec`]s, outermost first; when two
//! sequences contribute the same kind, the innermost wins. The merged specs
//! run in ascending [`TransformSpec::priority`], ties keeping their order.
//!
//! Transform instances belong to one [`EventStream`]: they are created the
//! first time a (kind, owning sequence) pair is needed and dropped with the
//! stream. The event timer reset is a single instance for the whole stream.

pub mod autofocus;
pub mod shutter;
pub mod timer;

use std::cell::{OnceCell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::AppResult;
use crate::event::{EventBuilder, MdaEvent, MdaEventBuilder};
use crate::sequence::{AxesIter, Combination, IterOptions, MdaSequence};

pub use autofocus::{AutofocusTransform, AxesBasedAf};
pub use shutter::KeepShutterOpen;
pub use timer::ResetEventTimer;

/// A stateful step of the event pipeline.
pub trait EventTransform: Send {
    /// Transform `event`.
    ///
    /// `prev` is the last event emitted before this one, after transforms.
    /// `next` gives access to the next raw event, before transforms.
    fn apply(
        &mut self,
        event: MdaEvent,
        prev: Option<&MdaEvent>,
        next: &Lookahead<'_>,
    ) -> Vec<MdaEvent>;
}

type TransformFactory = Arc<dyn Fn() -> Box<dyn EventTransform> + Send + Sync>;

/// Declarative description of a transform attached to a sequence.
#[derive(Clone)]
pub enum TransformSpec {
    /// Flag the first event of each time phase.
    ResetEventTimer,
    /// Insert autofocus events when watched axes change.
    Autofocus(AxesBasedAf),
    /// Keep the shutter open when only these axes change.
    KeepShutterOpen(Vec<String>),
    /// User transform, created by `factory` for each stream.
    Custom {
        /// Kind name; specs with the same name replace each other.
        name: String,
        /// Ordering among transforms, lower runs first.
        priority: i32,
        #[allow(missing_docs)]
        factory: TransformFactory,
    },
}

impl fmt::Debug for TransformSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResetEventTimer => f.write_str("ResetEventTimer"),
            Self::Autofocus(plan) => f.debug_tuple("Autofocus").field(plan).finish(),
            Self::KeepShutterOpen(axes) => f.debug_tuple("KeepShutterOpen").field(axes).finish(),
            Self::Custom { name, priority, .. } => f
                .debug_struct("Custom")
                .field("name", name)
                .field("priority", priority)
                .finish_non_exhaustive(),
        }
    }
}

impl TransformSpec {
    /// Custom transform with default priority.
    pub fn custom<F, T>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: EventTransform + 'static,
    {
        Self::Custom {
            name: name.into(),
            priority: 0,
            factory: Arc::new(move || Box::new(factory())),
        }
    }

    /// Kind name used to merge specs across nested sequences.
    pub fn kind(&self) -> &str {
        match self {
            Self::ResetEventTimer => "reset_event_timer",
            Self::Autofocus(_) => "autofocus",
            Self::KeepShutterOpen(_) => "keep_shutter_open",
            Self::Custom { name, .. } => name,
        }
    }

    #[allow(missing_docs)]
    pub fn priority(&self) -> i32 {
        match self {
            Self::ResetEventTimer => -2,
            Self::Autofocus(_) => -1,
            Self::KeepShutterOpen(_) => 0,
            Self::Custom { priority, .. } => *priority,
        }
    }

    /// Fresh transform instance.
    pub fn instantiate(&self) -> Box<dyn EventTransform> {
        match self {
            Self::ResetEventTimer => Box::new(ResetEventTimer::default()),
            Self::Autofocus(plan) => Box::new(AutofocusTransform::new(plan.clone())),
            Self::KeepShutterOpen(axes) => Box::new(KeepShutterOpen::new(axes.clone())),
            Self::Custom { factory, .. } => factory(),
        }
    }

    fn is_stream_wide(&self) -> bool {
        matches!(self, Self::ResetEventTimer)
    }
}

// =============================================================================
// Raw events
// =============================================================================

struct RawEvent {
    event: MdaEvent,
    context: Vec<Arc<MdaSequence>>,
}

/// Combinations turned into events, with one item of lookahead.
struct RawEvents {
    combinations: AxesIter,
    peeked: Option<Option<AppResult<RawEvent>>>,
}

impl RawEvents {
    fn build(combination: Combination) -> AppResult<RawEvent> {
        let Combination { prefix, context } = combination;
        let event = match context.iter().rev().find_map(|seq| seq.event_builder()) {
            Some(builder) => builder.build(&prefix, &context)?,
            None => MdaEventBuilder.build(&prefix, &context)?,
        };
        tracing::trace!(index = ?event.index, "built event");
        Ok(RawEvent { event, context })
    }

    fn pull(&mut self) -> Option<AppResult<RawEvent>> {
        self.combinations.next().map(|c| c.and_then(Self::build))
    }

    fn next(&mut self) -> Option<AppResult<RawEvent>> {
        match self.peeked.take() {
            Some(peeked) => peeked,
            None => self.pull(),
        }
    }

    /// Next event without consuming it. Errors stay queued for `next`.
    fn peek_event(&mut self) -> Option<&MdaEvent> {
        if self.peeked.is_none() {
            self.peeked = Some(self.pull());
        }
        match self.peeked.as_ref() {
            Some(Some(Ok(raw))) => Some(&raw.event),
            _ => None,
        }
    }
}

/// Lazy view of the next raw event.
///
/// The event is built on the first call to [`get`](Self::get) and cached for
/// the rest of the current event's pass through the pipeline.
pub struct Lookahead<'a> {
    source: RefCell<Option<&'a mut RawEvents>>,
    cached: OnceCell<Option<MdaEvent>>,
}

impl<'a> Lookahead<'a> {
    fn over(source: &'a mut RawEvents) -> Self {
        Self {
            source: RefCell::new(Some(source)),
            cached: OnceCell::new(),
        }
    }

    /// Lookahead with a known next event; useful for driving a transform by
    /// hand.
    pub fn fixed(next: Option<MdaEvent>) -> Self {
        Self {
            source: RefCell::new(None),
            cached: OnceCell::from(next),
        }
    }

    /// The next raw event, `None` at the end of the stream.
    pub fn get(&self) -> Option<&MdaEvent> {
        self.cached
            .get_or_init(|| {
                self.source
                    .borrow_mut()
                    .as_mut()
                    .and_then(|source| source.peek_event().cloned())
            })
            .as_ref()
    }
}

// =============================================================================
// Stream
// =============================================================================

/// Identity of one transform instance within a stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StageKey {
    kind: String,
    owner: usize,
}

/// Lazy, transformed event stream of one enumeration.
///
/// Yields events in order; an error ends the stream.
pub struct EventStream {
    raw: RawEvents,
    stages: HashMap<StageKey, Box<dyn EventTransform>>,
    pending: VecDeque<MdaEvent>,
    last_emitted: Option<MdaEvent>,
    done: bool,
}

impl EventStream {
    /// Stream the events of `root`.
    pub fn new(root: Arc<MdaSequence>, options: &IterOptions) -> Self {
        Self {
            raw: RawEvents {
                combinations: AxesIter::new(root, options),
                peeked: None,
            },
            stages: HashMap::new(),
            pending: VecDeque::new(),
            last_emitted: None,
            done: false,
        }
    }

    /// Transform specs that apply to an event produced under `context`, with
    /// the key of the instance that runs each.
    fn compose(context: &[Arc<MdaSequence>]) -> Vec<(StageKey, TransformSpec)> {
        let mut merged: IndexMap<String, (StageKey, TransformSpec)> = IndexMap::new();
        for seq in context {
            let owner = Arc::as_ptr(seq) as usize;
            for spec in seq.transform_specs() {
                let key = StageKey {
                    kind: spec.kind().to_string(),
                    owner: if spec.is_stream_wide() { 0 } else { owner },
                };
                merged.insert(key.kind.clone(), (key, spec));
            }
        }
        let mut stages: Vec<_> = merged.into_values().collect();
        stages.sort_by_key(|(_, spec)| spec.priority());
        stages
    }

    fn process(&mut self, raw: RawEvent) -> Vec<MdaEvent> {
        let Self {
            raw: source,
            stages,
            last_emitted,
            ..
        } = self;
        let next = Lookahead::over(source);

        let mut batch = vec![raw.event];
        for (key, spec) in Self::compose(&raw.context) {
            let transform = stages
                .entry(key)
                .or_insert_with(|| spec.instantiate());
            let mut prev = last_emitted.clone();
            let mut out = Vec::with_capacity(batch.len());
            for event in batch {
                let produced = transform.apply(event, prev.as_ref(), &next);
                if let Some(last) = produced.last() {
                    prev = Some(last.clone());
                }
                out.extend(produced);
            }
            batch = out;
        }
        batch
    }
}

impl Iterator for EventStream {
    type Item = AppResult<MdaEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                self.last_emitted = Some(event.clone());
                return Some(Ok(event));
            }
            if self.done {
                return None;
            }
            match self.raw.next() {
                Some(Ok(raw)) => {
                    let events = self.process(raw);
                    self.pending.extend(events);
                }
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(err));
                }
                None => {
                    self.done = true;
                    return None;
                }
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("stages", &self.stages.len())
            .field("pending", &self.pending.len())
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}
