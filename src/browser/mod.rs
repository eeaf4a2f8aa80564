pub mod chrome;
pub mod navigator;
pub mod page;
pub mod snapshot;

pub use chrome::{ChromePage, ChromeSession};
pub use navigator::{navigate, wait_for_element};
pub use page::{BrowserPage, ElementHandle, ElementScript};
pub use snapshot::SnapshotPage;
