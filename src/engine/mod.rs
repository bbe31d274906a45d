//! Filter and aggregation engine.
//!
//! Pure functions over parsed matches; nothing here does I/O.

pub mod aggregate;
pub mod filter;
pub mod range;

pub use aggregate::{
    bucket_count, build_report, group_by_category, summary_count, summary_score, trim_boundary,
};
pub use filter::MatchFilter;
pub use range::{
    RangeToken, matches_differential, matches_minute, matches_total, matches_value, split_tokens,
};
