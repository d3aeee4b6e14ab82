mod problem;
mod raw_event;
mod signal;
mod source;
mod stats;
mod tag;

pub use problem::{
    NewProblem, NormalizedProblem, ProblemDetail, ProblemPage, ProblemQuery, ProblemWithTags,
    SortMode,
};
pub use raw_event::{IngestionStatus, RawEvent, RawEventCandidate};
pub use signal::SignalType;
pub use source::{Source, SourceStatus, SourceType};
pub use stats::IngestionStats;
pub use tag::{slugify, Tag, TagType};
