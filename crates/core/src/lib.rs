pub mod config;
pub mod error;
pub mod matching;
pub mod row;

pub use config::{Config, LinkSegment, MatchPolicy, RenderStrategy};
pub use error::*;
pub use matching::{MatchEngine, MatchEntry, MatchGroup, MatchPredicate};
pub use row::{CellValue, TenderRow, UserRow, UserTable};
