//! Timed acquisition: sampling clock, sample windows and the dual-source sampler.

pub mod clock;
pub mod sampler;
pub mod window;

pub use clock::{SampleClock, DEFAULT_FREQUENCY_HZ};
pub use sampler::{ChannelSettings, LeakageSampler};
pub use window::{Sample, SampleWindow, WindowStatistics};
