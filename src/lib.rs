//! Derived views over a loaded set of student exam records.
//!
//! The loader and the renderer live elsewhere: they hand over parsed rows
//! and take back rankings, group counts, pass tallies and per-group top
//! performers. Every operation borrows the records read-only.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod models;
pub mod views;

pub use aggregate::{
    count_by_category, group_averages, group_totals, pass_ratio_by_gender,
    rank_by_average_score, top_k_per_group,
};
pub use config::AggregationConfig;
pub use error::{AggregateError, Result};
pub use models::{
    CategoryField, Gender, GroupMap, Metric, PassRatio, PassTally, RankedStudent,
    RawStudentRow, StudentRecord,
};
pub use views::{performers_for_gender, SlideViews};
