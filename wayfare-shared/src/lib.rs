pub mod models;
pub mod patch;
pub mod pii;

pub use models::events::{EntityDeletedFromVectorDbEvent, EntitySavedToVectorDbEvent, VectorSyncEvent};
pub use patch::Patch;
pub use pii::Masked;
