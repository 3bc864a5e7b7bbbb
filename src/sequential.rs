//! Sequential baseline
//!
//! A single pass over the source that keeps a running leader for the first
//! name mode. It shares the extractor and the tie-break rule with the
//! concurrent pipeline but none of its aggregation code.

use crate::aggregate::{FinalAggregate, NameTally, RunStatus};
use crate::error::{Result, TallyError};
use crate::extract::{extract, FirstNamePolicy};
use crate::source::RecordReader;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Instant;
use tokio::io::AsyncBufRead;
use tracing::{info, trace};

/// Tally `source` on the calling task
pub async fn run_sequential<R>(source: R) -> Result<FinalAggregate>
where
    R: AsyncBufRead + Unpin,
{
    run_sequential_with(source, FirstNamePolicy::default()).await
}

pub async fn run_sequential_with<R>(source: R, policy: FirstNamePolicy) -> Result<FinalAggregate>
where
    R: AsyncBufRead + Unpin,
{
    let started = Instant::now();
    let mut records = RecordReader::new(source);

    let mut seq: u64 = 0;
    let mut total_records = 0;
    let mut malformed_records = 0;
    let mut month_frequency: BTreeMap<String, u64> = BTreeMap::new();
    let mut people: HashSet<String> = HashSet::new();
    let mut first_names: HashMap<String, NameTally> = HashMap::new();
    let mut leader: Option<String> = None;

    while let Some(record) = records.next_record().await.map_err(TallyError::SourceRead)? {
        let current = seq;
        seq += 1;

        let fields = match extract(&record, policy) {
            Ok(fields) => fields,
            Err(e) => {
                trace!(seq = current, error = %e, "Skipping malformed record");
                malformed_records += 1;
                continue;
            }
        };

        total_records += 1;
        *month_frequency.entry(fields.month).or_insert(0) += 1;
        people.insert(fields.normalized_full_name);

        let tally = *first_names
            .entry(fields.first_name.clone())
            .and_modify(|tally| tally.observe(current))
            .or_insert_with(|| NameTally::new(current));

        let takes_lead = match leader.as_ref().and_then(|name| first_names.get(name)) {
            Some(best) => tally.outranks(best),
            None => true,
        };
        if takes_lead {
            leader = Some(fields.first_name);
        }
    }

    let (most_common_first_name, most_common_first_name_count) = leader
        .and_then(|name| first_names.get(&name).map(|tally| (name, tally.count)))
        .unwrap_or_default();

    info!(
        records = total_records,
        malformed = malformed_records,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Sequential run complete"
    );

    Ok(FinalAggregate {
        total_records,
        malformed_records,
        month_frequency,
        distinct_people_count: people.len() as u64,
        most_common_first_name,
        most_common_first_name_count,
        status: RunStatus::Complete,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn record(name: &str, date: &str) -> String {
        format!("A|B|C|D|E|F|G|{name}|I|J|K|L|M|{date}")
    }

    async fn tally(lines: Vec<String>) -> FinalAggregate {
        run_sequential(Cursor::new(lines.join("\n").into_bytes()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_repeated_person() {
        let result = tally(vec![
            record("Doe, John Q", "01152023"),
            record("Doe, John Q", "02012023"),
            record("Doe, John Q", "01152023"),
        ])
        .await;

        assert_eq!(result.total_records, 3);
        assert_eq!(
            result.month_frequency,
            BTreeMap::from([("01".to_string(), 2), ("02".to_string(), 1)])
        );
        assert_eq!(result.distinct_people_count, 1);
        assert_eq!(result.most_common_first_name, "John");
        assert_eq!(result.most_common_first_name_count, 3);
    }

    #[tokio::test]
    async fn test_leader_keeps_earliest_on_tie() {
        // Jane reaches two first, John was seen first
        let result = tally(vec![
            record("Doe, John", "01152023"),
            record("Roe, Jane", "01152023"),
            record("Roe, Jane", "01152023"),
            record("Doe, John", "01152023"),
        ])
        .await;

        assert_eq!(result.most_common_first_name, "John");
        assert_eq!(result.most_common_first_name_count, 2);
    }

    #[tokio::test]
    async fn test_malformed_records_are_skipped() {
        let result = tally(vec![
            "garbage".to_string(),
            String::new(),
            record("Doe, John", "bad"),
        ])
        .await;

        assert_eq!(result.total_records, 1);
        assert_eq!(result.malformed_records, 2);
        assert_eq!(result.month_frequency.get("--"), Some(&1));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let result = run_sequential(Cursor::new(Vec::<u8>::new())).await.unwrap();
        assert_eq!(result, FinalAggregate::empty(RunStatus::Complete));
    }
}
