/// Host bridges for credentials and storage.
pub mod host;

/// Dashboard client.
pub mod client;

pub use self::client::{JsDashboardClient, StoreView};
