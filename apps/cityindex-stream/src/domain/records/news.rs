use chrono::{DateTime, Utc};
use serde::Serialize;

use super::StreamRecord;
use crate::domain::schema::{FieldKind, FieldSchema, FieldSpec, Record};

const NEWS_SCHEMA: &[FieldSpec] = &[
    FieldSpec::new("StoryId", FieldKind::Int),
    FieldSpec::new("Headline", FieldKind::Text),
    FieldSpec::new("PublishDate", FieldKind::Timestamp),
];

/// News headline.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct NewsHeadline {
    /// Story identifier, used to fetch the body over REST.
    pub story_id: Option<u64>,
    /// Headline text.
    pub headline: Option<String>,
    /// Publication time.
    pub publish_date: Option<DateTime<Utc>>,
}

impl StreamRecord for NewsHeadline {
    const SCHEMA: &'static FieldSchema = NEWS_SCHEMA;

    fn from_record(record: &Record) -> Self {
        Self {
            story_id: record.uint("StoryId"),
            headline: record.text("Headline").map(str::to_owned),
            publish_date: record.timestamp("PublishDate"),
        }
    }
}
