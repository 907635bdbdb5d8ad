//! Rule-based partitioning of the sync root into instances

mod engine;
mod rule;

pub use engine::{DesiredAssignment, RuleEngine};
pub use rule::{DEFAULT_SORT_COUNT, SortCount, SortMethod, SyncRule};
