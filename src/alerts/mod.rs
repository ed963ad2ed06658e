//! Alert System
//!
//! 異常イベントをアラートに変換し、非同期に永続化する。

mod dispatcher;
mod record;
#[cfg(feature = "sqlite")]
mod sqlite;
mod store;

pub use dispatcher::{AlertDispatcher, DispatchStats};
pub use record::{AlertLevel, AlertRecord};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteAlertStore;
pub use store::{AlertCounts, AlertQuery, AlertSink, AlertStore, InMemoryAlertStore};
