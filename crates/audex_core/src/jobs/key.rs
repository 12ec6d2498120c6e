//! Stable identity of a set of jobs.

use std::collections::BTreeSet;
use std::fmt;

use super::types::Job;

/// MD5 hex digest over the sorted, de-duplicated job ids.
///
/// Statuses are excluded, so progress and status updates during a run keep
/// the key unchanged while adding or removing a job changes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobSetKey(String);

impl JobSetKey {
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let sorted: BTreeSet<String> = ids.into_iter().map(|s| s.as_ref().to_string()).collect();
        let joined = sorted.into_iter().collect::<Vec<_>>().join("\n");
        Self(format!("{:x}", md5::compute(joined.as_bytes())))
    }

    pub fn from_jobs(jobs: &[Job]) -> Self {
        Self::from_ids(jobs.iter().map(|j| j.id.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobSetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
