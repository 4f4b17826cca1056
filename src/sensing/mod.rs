pub mod controller;
pub mod loop_worker;
pub mod scheduler;

pub use controller::SensingController;
pub use loop_worker::{recognition_loop, LoopConfig, LoopStats};
pub use scheduler::{FrameRateScheduler, ManualScheduler, ManualTicker, TickScheduler};
