mod walker;

pub use walker::{WalkConfig, WalkEntry, WalkError, WalkStats, Walker, DEFAULT_EXCLUDED_DIRS};
