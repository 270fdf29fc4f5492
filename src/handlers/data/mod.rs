pub mod collection;
pub mod record;

pub use collection::{entity_get, entity_post};
pub use record::{record_delete, record_get, record_patch, record_put};
