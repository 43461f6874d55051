pub mod consent;
pub mod event;
pub mod navigation;
pub mod presence;
pub mod reactor;
pub mod scheduler;
pub mod state;
pub mod telemetry;
pub mod time;
