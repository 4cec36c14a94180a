pub mod clock;
pub mod hasher;
pub mod locker;

// Trait-based abstraction for testability
pub mod executor;

// Re-export commonly used types and traits (used by test crate)
pub use clock::{Clock, FixedClock, SystemClock};
pub use executor::{DumpCommand, DumpError, DumpExecutor, ProcessExecutor};
