pub mod command;
pub mod observer;
pub mod store;

pub use command::{TagCommand, TagResponse};
pub use observer::{Pop, QueueReceiver, TagObserver, notification_queue};
pub use store::TagStore;
