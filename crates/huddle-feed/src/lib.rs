//! Message feed assembly for reverse-chronological chat streams.
//!
//! The store hands out pages newest-first; rendering wants day-bucketed
//! groups, oldest-first within a day, with consecutive messages from the
//! same author visually merged. Everything here is a pure derivation over
//! the currently loaded pages; nothing is persisted.

pub mod assembler;
mod entries;
pub mod paginator;
pub mod view;

pub use assembler::{COMPACT_THRESHOLD_SECS, DayBucket, DaySection, FeedAssembler, FeedEntry, FeedItem, date_label};
pub use paginator::{FeedStatus, Paginator};
pub use view::FeedView;
