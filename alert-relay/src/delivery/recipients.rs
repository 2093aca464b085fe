//! Group to phone-number resolution.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::info;

use crate::Result;
use crate::clients::directory::PhoneDirectory;
use crate::metrics::MetricsCollector;

/// Shortest accepted phone number.
pub const MIN_NUMBER_LENGTH: usize = 10;

/// Unique, all-digit numbers of at least [`MIN_NUMBER_LENGTH`] digits from a
/// directory answer, sorted.
///
/// Values shorter than one number are skipped outright; quotes are stripped
/// and each value is split on commas.
pub fn dedupe_filter(groups: &BTreeMap<String, String>) -> Vec<String> {
    let numbers: BTreeSet<String> = groups
        .values()
        .filter(|line| line.len() >= MIN_NUMBER_LENGTH)
        .flat_map(|line| {
            line.replace(['"', '\''], "")
                .split(',')
                .map(|n| n.trim().to_string())
                .collect::<Vec<_>>()
        })
        .filter(|n| is_valid_number(n))
        .collect();

    numbers.into_iter().collect()
}

pub fn is_valid_number(number: &str) -> bool {
    number.len() >= MIN_NUMBER_LENGTH && number.chars().all(|c| c.is_ascii_digit())
}

/// Resolves a directory group to its members' numbers.
pub struct RecipientResolver {
    directory: Arc<dyn PhoneDirectory>,
    metrics: Arc<MetricsCollector>,
}

impl RecipientResolver {
    pub fn new(directory: Arc<dyn PhoneDirectory>, metrics: Arc<MetricsCollector>) -> Self {
        Self { directory, metrics }
    }

    /// Also records the resolved member count for the group.
    pub async fn resolve(&self, group: &str) -> Result<Vec<String>> {
        let groups = self.directory.lookup(&[group.to_string()]).await?;
        let numbers = dedupe_filter(&groups);

        self.metrics.set_group_members(group, numbers.len());
        info!(group = %group, members = numbers.len(), "Resolved recipients");
        Ok(numbers)
    }
}
