//! Partial and final aggregates
//!
//! A [`PartialAggregate`] is owned by exactly one worker while it folds
//! records, then moved to the merger. Combining partials only uses sums,
//! set unions and `(count, first_seen)` merges, so the result does not depend
//! on which worker saw which batch or in which order partials arrive.

use crate::extract::ExtractedFields;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Occurrence count of a first name and the earliest sequence number it was seen at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameTally {
    pub count: u64,
    pub first_seen: u64,
}

impl NameTally {
    pub fn new(first_seen: u64) -> Self {
        Self {
            count: 1,
            first_seen,
        }
    }

    /// Record one more occurrence at `seq`
    pub fn observe(&mut self, seq: u64) {
        self.count += 1;
        self.first_seen = self.first_seen.min(seq);
    }

    pub fn combine(self, other: Self) -> Self {
        Self {
            count: self.count.saturating_add(other.count),
            first_seen: self.first_seen.min(other.first_seen),
        }
    }

    /// Higher count wins; equal counts go to the name seen first
    pub fn outranks(&self, other: &NameTally) -> bool {
        self.count > other.count
            || (self.count == other.count && self.first_seen < other.first_seen)
    }
}

/// Statistics accumulated by a single worker
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialAggregate {
    pub record_count: u64,
    pub malformed_records: u64,
    pub month_frequency: HashMap<String, u64>,
    pub seen_full_names: HashSet<String>,
    pub first_names: HashMap<String, NameTally>,
}

impl PartialAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one extracted record with its canonical sequence number
    pub fn observe(&mut self, seq: u64, fields: ExtractedFields) {
        let ExtractedFields {
            first_name,
            normalized_full_name,
            month,
        } = fields;

        self.record_count += 1;
        *self.month_frequency.entry(month).or_insert(0) += 1;
        self.seen_full_names.insert(normalized_full_name);
        self.first_names
            .entry(first_name)
            .and_modify(|tally| tally.observe(seq))
            .or_insert_with(|| NameTally::new(seq));
    }

    pub fn record_malformed(&mut self) {
        self.malformed_records += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.record_count == 0 && self.malformed_records == 0
    }

    /// Combine two partials. Commutative and associative.
    pub fn merge(mut self, mut other: Self) -> Self {
        // Fold the smaller name set into the larger one
        if self.seen_full_names.len() < other.seen_full_names.len() {
            std::mem::swap(&mut self, &mut other);
        }

        self.record_count += other.record_count;
        self.malformed_records += other.malformed_records;

        for (month, count) in other.month_frequency {
            *self.month_frequency.entry(month).or_insert(0) += count;
        }

        self.seen_full_names.extend(other.seen_full_names);

        for (name, tally) in other.first_names {
            self.first_names
                .entry(name)
                .and_modify(|existing| *existing = existing.combine(tally))
                .or_insert(tally);
        }

        self
    }

    /// Most frequent first name, ties broken by earliest first occurrence
    pub fn mode(&self) -> Option<(&str, NameTally)> {
        self.first_names
            .iter()
            .fold(None, |best: Option<(&str, NameTally)>, (name, tally)| match best {
                Some((_, leader)) if !tally.outranks(&leader) => best,
                _ => Some((name.as_str(), *tally)),
            })
    }

    pub fn finalize(self, status: RunStatus) -> FinalAggregate {
        let (most_common_first_name, most_common_first_name_count) = self
            .mode()
            .map(|(name, tally)| (name.to_string(), tally.count))
            .unwrap_or_default();

        FinalAggregate {
            total_records: self.record_count,
            malformed_records: self.malformed_records,
            month_frequency: self.month_frequency.into_iter().collect(),
            distinct_people_count: self.seen_full_names.len() as u64,
            most_common_first_name,
            most_common_first_name_count,
            status,
        }
    }
}

/// Merge any number of partials into one
pub fn merge_partials<I>(partials: I) -> PartialAggregate
where
    I: IntoIterator<Item = PartialAggregate>,
{
    partials
        .into_iter()
        .fold(PartialAggregate::new(), PartialAggregate::merge)
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Complete,
    /// Cancellation was requested; the aggregate covers only part of the input
    Cancelled,
}

/// Result of one run over a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalAggregate {
    pub total_records: u64,
    pub malformed_records: u64,
    pub month_frequency: BTreeMap<String, u64>,
    pub distinct_people_count: u64,
    pub most_common_first_name: String,
    pub most_common_first_name_count: u64,
    pub status: RunStatus,
}

impl FinalAggregate {
    pub fn empty(status: RunStatus) -> Self {
        PartialAggregate::new().finalize(status)
    }

    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Complete
    }

    pub fn month_total(&self) -> u64 {
        self.month_frequency.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(first: &str, full: &str, month: &str) -> ExtractedFields {
        ExtractedFields {
            first_name: first.to_string(),
            normalized_full_name: full.to_string(),
            month: month.to_string(),
        }
    }

    fn partial(rows: &[(u64, &str, &str, &str)]) -> PartialAggregate {
        let mut partial = PartialAggregate::new();
        for (seq, first, full, month) in rows {
            partial.observe(*seq, fields(first, full, month));
        }
        partial
    }

    #[test]
    fn test_observe_counts_everything() {
        let p = partial(&[
            (0, "John", "Doe,JohnQ", "01"),
            (1, "John", "Doe,JohnQ", "02"),
            (2, "Jane", "Roe,Jane", "01"),
        ]);

        assert_eq!(p.record_count, 3);
        assert_eq!(p.month_frequency["01"], 2);
        assert_eq!(p.seen_full_names.len(), 2);
        assert_eq!(
            p.first_names["John"],
            NameTally {
                count: 2,
                first_seen: 0
            }
        );
    }

    #[test]
    fn test_merge_deduplicates_full_names() {
        let a = partial(&[(0, "John", "Doe,John", "01")]);
        let b = partial(&[(1, "John", "Doe,John", "01"), (2, "Jane", "Roe,Jane", "03")]);

        let merged = a.merge(b).finalize(RunStatus::Complete);
        assert_eq!(merged.total_records, 3);
        assert_eq!(merged.distinct_people_count, 2);
        assert_eq!(merged.month_frequency.get("01"), Some(&2));
        assert_eq!(merged.month_total(), merged.total_records);
    }

    #[test]
    fn test_merge_is_commutative_and_associative() {
        let a = partial(&[(0, "Ann", "A,Ann", "01"), (5, "Bob", "B,Bob", "02")]);
        let b = partial(&[(1, "Bob", "B,Bob", "02"), (3, "Cy", "C,Cy", "--")]);
        let mut c = partial(&[(2, "Ann", "A,Ann2", "01")]);
        c.record_malformed();

        assert_eq!(a.clone().merge(b.clone()), b.clone().merge(a.clone()));
        assert_eq!(
            a.clone().merge(b.clone()).merge(c.clone()),
            a.merge(b.merge(c))
        );
    }

    #[test]
    fn test_mode_tie_goes_to_earliest_first_occurrence() {
        // Jane reaches two occurrences before John does, but John appeared first
        let p = partial(&[
            (0, "John", "Doe,John", "01"),
            (1, "Jane", "Roe,Jane", "01"),
            (2, "Jane", "Roe,Jane", "01"),
            (3, "John", "Doe,John", "01"),
        ]);
        let (name, tally) = p.mode().unwrap();
        assert_eq!(name, "John");
        assert_eq!(tally.count, 2);
    }

    #[test]
    fn test_mode_tie_survives_split_partials() {
        let late_first = partial(&[(7, "Jane", "Roe,Jane", "01")]);
        let early_first = partial(&[(4, "John", "Doe,John", "01")]);

        let one = late_first.clone().merge(early_first.clone());
        let two = early_first.merge(late_first);
        assert_eq!(one.mode().unwrap().0, "John");
        assert_eq!(two.mode().unwrap().0, "John");
    }

    #[test]
    fn test_empty_finalize() {
        let result = FinalAggregate::empty(RunStatus::Complete);
        assert_eq!(result.total_records, 0);
        assert!(result.month_frequency.is_empty());
        assert_eq!(result.distinct_people_count, 0);
        assert_eq!(result.most_common_first_name, "");
        assert_eq!(result.most_common_first_name_count, 0);
        assert!(result.is_complete());
    }

    #[test]
    fn test_merge_partials_of_nothing_is_empty() {
        assert!(merge_partials(Vec::new()).is_empty());
    }
}
