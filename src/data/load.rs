//! Participant data loading.
//!
//! Two layouts are accepted:
//!
//! - CSV with a header row and columns `participant_id`, `sequence`,
//!   `prediction` (or `prediction_raw`). Other columns are ignored.
//!   Participants appear in order of their first row.
//! - JSON object `{ "<id>": [["01011010", "1"], ...] }`. Participants are
//!   ordered by id.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::types::{Bit, Datum, History, ParticipantRecord};

#[derive(Debug, Deserialize)]
struct InputRow {
    participant_id: String,
    sequence: String,
    #[serde(alias = "prediction_raw")]
    prediction: String,
}

/// Load participants from `path`; `.json` selects the JSON layout.
pub fn load_participants(path: &Path) -> Result<Vec<ParticipantRecord>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let reader = BufReader::new(file);
    let records = if super::is_json(path) {
        read_participants_json(reader)
    } else {
        read_participants_csv(reader)
    };
    records.with_context(|| format!("Failed to load participants from {}", path.display()))
}

pub fn read_participants_csv<R: Read>(reader: R) -> Result<Vec<ParticipantRecord>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut records: Vec<ParticipantRecord> = Vec::new();
    let mut index: FxHashMap<String, usize> = FxHashMap::default();

    for (i, row) in rdr.deserialize::<InputRow>().enumerate() {
        // Line 1 is the header.
        let line = i + 2;
        let row = row.with_context(|| format!("Malformed row at line {line}"))?;
        let datum = parse_datum(&row.sequence, &row.prediction)
            .with_context(|| format!("Invalid data for {} at line {line}", row.participant_id))?;

        let slot = *index.entry(row.participant_id.clone()).or_insert_with(|| {
            records.push(ParticipantRecord::new(row.participant_id.clone(), Vec::new()));
            records.len() - 1
        });
        records[slot].data.push(datum);
    }

    Ok(records)
}

pub fn read_participants_json<R: Read>(reader: R) -> Result<Vec<ParticipantRecord>> {
    let raw: std::collections::BTreeMap<String, Vec<(String, String)>> =
        serde_json::from_reader(reader).context("Malformed participant JSON")?;

    raw.into_iter()
        .map(|(id, pairs)| {
            let data = pairs
                .iter()
                .enumerate()
                .map(|(i, (sequence, prediction))| {
                    parse_datum(sequence, prediction)
                        .with_context(|| format!("Invalid entry {i} for {id}"))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(ParticipantRecord::new(id, data))
        })
        .collect()
}

fn parse_datum(sequence: &str, prediction: &str) -> Result<Datum> {
    let history: History = sequence
        .parse()
        .with_context(|| format!("bad sequence {sequence:?}"))?;
    let observed: Bit = prediction
        .parse()
        .with_context(|| format!("bad prediction {prediction:?}"))?;
    Ok(Datum::new(history, observed))
}
