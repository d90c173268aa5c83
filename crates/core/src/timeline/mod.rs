//! Issuance progress timeline.
//!
//! The timeline is an ordered log of stage records plus a single "current"
//! slot rendered after the log. Stages append items when they begin and
//! update them in place (keyed by id) as they progress.

mod store;
mod types;

pub use store::{TimelineSink, TimelineStore};
pub use types::{
    shorten, Description, Segment, TimelineItem, TimelineSnapshot, TimelineStatus, TimelineUpdate,
    CURRENT_ITEM_ID,
};
