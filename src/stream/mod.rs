//! Stream combinators for event subscribers.

mod pace;

pub use pace::{Pace, PaceExt};
