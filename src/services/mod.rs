pub mod backfill;
pub mod entity_service;

pub use backfill::{BackfillOptions, BackfillReport, BackfillService};
pub use entity_service::{
    EntityService, ListQuery, Paginated, SearchResult, SearchStrategy, ServiceError, ServiceResult,
};
