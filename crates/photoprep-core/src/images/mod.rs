//! Images known to the client: registry, upload and server-side history.

mod history;
mod registry;
mod upload;

pub use history::HistoryService;
pub use registry::{ImageRegistry, ImageStatus, LocalId, ManagedImage, RemoteId};
pub use upload::ImageUploader;
