mod address;
mod history;
mod url_sync;

pub use address::{NavigableAddress, REGION_PARAM};
pub use history::{MemoryHistory, NavigationHistory};
pub use url_sync::UrlSync;
