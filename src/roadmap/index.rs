pub use crate::roadmap::distributor::distribute_resources;
pub use crate::roadmap::enricher::CuratedTable;
pub use crate::roadmap::outline::{DEFAULT_TOPIC, expand_sections, outline_from_model};
pub use crate::roadmap::parser::{
    SYNTHESIZED_WEEKS, build_weekly_plan, finalize_weeks, parse_weeks, synthesize_weeks,
};
pub use crate::roadmap::topics::{build_topic_plan, parse_topics};
