//! Notification adapters

mod logger;

pub use logger::LogNotifier;
