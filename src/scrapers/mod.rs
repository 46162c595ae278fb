pub mod browser;
pub mod challenge;
pub mod listings;
pub mod snapshot;
pub mod traits;
pub mod types;

#[cfg(test)]
pub mod testing;

pub use browser::ChromeProvider;
pub use listings::Harvester;
pub use snapshot::SnapshotProvider;
pub use traits::DriverProvider;
pub use types::ScrapeRequest;
