pub mod event;
pub mod frames;
pub mod names;

pub use event::Event;
pub use frames::{ConnectedNotice, Frame, HistoryItem, HistorySnapshot};
