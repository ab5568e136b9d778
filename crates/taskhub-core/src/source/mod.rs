pub mod contract;
pub mod enrichment;
pub mod references;
pub mod support;

pub use contract::{
    Action, AdapterResult, Comment, DEFAULT_PAGE_SIZE, FetchOptions, FetchResult, ItemDetail,
    Source,
};
pub use enrichment::{Enrichment, best_effort};
pub use references::ticket_references;
pub use support::{
    action_input, derive_task_id, missing_action_input, paginate, unsupported_action,
};
