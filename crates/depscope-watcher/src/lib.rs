//! File watching and per-handler change dispatch

pub mod dispatch;
pub mod error;
pub mod watcher;

pub use dispatch::{Dispatcher, GoDispatcher, Handler, Verdict};
pub use error::WatchError;
pub use watcher::{FileWatcher, WatchEvent};
