//! Declarative multi-dimensional acquisition sequences.
//!
//! A [`MdaSequence`] is a set of named axes (time, stage positions, grid,
//! channels, z, or any user-defined [`AxisIterable`]). The library enumerates
//! the nested-loop product of those axes, lets axes veto combinations or
//! override the remaining axes of a branch with a nested sequence, builds one
//! [`MdaEvent`] per combination and post-processes the event stream with a
//! chain of transforms (timer resets, autofocus, shutter handling).
//!
//! ```rust
//! use rust_mda::prelude::*;
//!
//! let seq = MdaSequence::builder()
//!     .values("t", [0, 1])
//!     .channels([Channel::new("red"), Channel::new("green")])
//!     .keep_shutter_open_across(["c"])
//!     .build()?;
//!
//! let events: Vec<MdaEvent> = seq.iter_events().collect::<AppResult<_>>()?;
//! assert_eq!(events.len(), 4);
//! assert!(events[0].keep_shutter_open);
//! # Ok::<(), SequenceError>(())
//! ```

pub mod axis;
pub mod config;
pub mod error;
pub mod estimate;
pub mod event;
pub mod logging;
pub mod sequence;
pub mod transform;

pub use axis::{Axis, AxisItem, AxisIterable, AxisValue};
pub use error::{AppResult, SequenceError};
pub use event::MdaEvent;
pub use sequence::{IterOptions, MdaSequence};

/// Common imports.
pub mod prelude {
    pub use crate::axis::{
        Axis, AxisItem, AxisIterable, AxisValue, Channel, GridPlan, Position, StagePositions,
        TimePlan, ZPlan,
    };
    pub use crate::error::{AppResult, SequenceError};
    pub use crate::event::{Action, MdaEvent};
    pub use crate::sequence::{IterOptions, MdaSequence};
    pub use crate::transform::{AxesBasedAf, TransformSpec};
}
