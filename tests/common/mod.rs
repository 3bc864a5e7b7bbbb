//! Common test utilities for building record sources

#![allow(dead_code)]

use std::io::Cursor;

/// Build a 21-field contribution record with the given name and date fields
pub fn record(name: &str, date: &str) -> String {
    let mut fields = vec![
        "C00629618", "N", "TER", "P", "201701230300133512", "15C", "IND", "", "PEORIA",
        "AZ", "85382", "", "RETIRED", "", "40", "H6CA34245", "SA01251735122", "1141239", "",
        "", "4020820171370029335",
    ];
    fields[7] = name;
    fields[13] = date;
    fields.join("|")
}

/// In-memory source over newline-terminated records
pub fn source<S: AsRef<str>>(records: &[S]) -> Cursor<Vec<u8>> {
    let mut text = String::new();
    for record in records {
        text.push_str(record.as_ref());
        text.push('\n');
    }
    Cursor::new(text.into_bytes())
}

/// A deterministic mixed workload with repeated names, ties and bad lines
pub fn sample_records(count: usize) -> Vec<String> {
    const LAST: [&str; 5] = ["DOE", "ROE", "SMITH", "NGUYEN", "GARCIA"];
    const FIRST: [&str; 7] = ["JOHN", "JANE", "MARIA", "WEI", "AHMED", "OLGA", "JOHN Q"];

    (0..count)
        .map(|i| match i % 23 {
            0 => "truncated|line".to_string(),
            7 => record("MADONNA", "07042019"),
            11 => record(&format!("{}, {}", LAST[i % 5], FIRST[i % 7]), "2019"),
            _ => {
                let month = (i % 12) + 1;
                record(
                    &format!("{}, {}", LAST[i % 5], FIRST[(i / 3) % 7]),
                    &format!("{month:02}152019"),
                )
            }
        })
        .collect()
}
