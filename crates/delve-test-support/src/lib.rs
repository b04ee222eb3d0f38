//! Shared test doubles and utilities for the Delve dungeon instance service.

mod clock;
mod dispatcher;
mod generation;
mod rng;

pub use clock::{FixedClock, ManualClock, fixed_now};
pub use dispatcher::{
    FailingDispatcher, PanickingDispatcher, RecordingDispatcher, RecordingMessenger,
};
pub use generation::{FailingGenerator, FixedGenerator};
pub use rng::{MockRng, SequenceRng};
