pub mod channels;
pub mod clock;
pub mod timers;

pub use channels::{event_channel, EventChannel};
pub use clock::{Clock, ManualClock, SystemClock};
pub use timers::TimerSet;
