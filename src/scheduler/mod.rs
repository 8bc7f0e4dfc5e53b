//! Background delivery scheduler.
//!
//! Once per tick, every destination is evaluated for both delivery types
//! and due deliveries are dispatched. Ticks never overlap.

mod runner;

pub use runner::{Scheduler, SchedulerHandle};
