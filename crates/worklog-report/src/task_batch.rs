use std::collections::BTreeSet;
use std::fmt;

use serde::de::{Deserializer, Error as DeError, MapAccess, Visitor};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq)]
/// One calendar date key from a task record with its completion tally.
pub struct DateTally {
    pub date: String,
    pub tally: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
/// Completion record for one task, as reported by the extension.
pub struct TaskRecord {
    /// Calendar dates in payload order; only the keys drive the report.
    #[serde(deserialize_with = "deserialize_date_tallies")]
    pub dates: Vec<DateTally>,
    #[serde(rename = "taskCount")]
    pub task_count: i64,
    #[serde(rename = "time")]
    pub time_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One named entry of a task batch.
pub struct TaskBatchEntry {
    pub task_name: String,
    pub record: TaskRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// A full batch of task completions submitted together.
///
/// Deserialized from a JSON object; entry order follows the payload so report
/// line order is reproducible, and duplicate task names are rejected outright
/// rather than silently last-writer-wins merged.
pub struct TaskBatch {
    entries: Vec<TaskBatchEntry>,
}

impl TaskBatch {
    pub fn new(entries: Vec<TaskBatchEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[TaskBatchEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<'de> Deserialize<'de> for TaskBatch {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TaskBatchVisitor;

        impl<'de> Visitor<'de> for TaskBatchVisitor {
            type Value = TaskBatch;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a map of task name to task record")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                let mut seen = BTreeSet::new();
                while let Some((task_name, record)) =
                    access.next_entry::<String, TaskRecord>()?
                {
                    if !seen.insert(task_name.clone()) {
                        return Err(A::Error::custom(format!(
                            "duplicate task name '{task_name}' in batch"
                        )));
                    }
                    entries.push(TaskBatchEntry { task_name, record });
                }
                Ok(TaskBatch { entries })
            }
        }

        deserializer.deserialize_map(TaskBatchVisitor)
    }
}

fn deserialize_date_tallies<'de, D>(deserializer: D) -> Result<Vec<DateTally>, D::Error>
where
    D: Deserializer<'de>,
{
    struct DateTalliesVisitor;

    impl<'de> Visitor<'de> for DateTalliesVisitor {
        type Value = Vec<DateTally>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a map of date string to non-negative tally")
        }

        fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut tallies = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((date, tally)) = access.next_entry::<String, u64>()? {
                tallies.push(DateTally { date, tally });
            }
            Ok(tallies)
        }
    }

    deserializer.deserialize_map(DateTalliesVisitor)
}
