//! Full pipeline on synthetic participants.

use bitrule::config::ConfigOverrides;
use bitrule::data::{load_participants, read_rows, write_rows};
use bitrule::driver::{fit_all, fit_participant, into_rows};
use bitrule::{Expr, Grammar, History, ParticipantRecord, SearchConfig};
use bitrule::types::Datum;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn copy_last_participant(id: &str, n: usize, seed: u64) -> ParticipantRecord {
    let mut rng = StdRng::seed_from_u64(seed);
    let data = (0..n)
        .map(|_| {
            let x = History::from_byte(rng.r#gen());
            Datum::new(x, x.get(7))
        })
        .collect();
    ParticipantRecord::new(id, data)
}

fn config(steps: usize, top_n: usize) -> SearchConfig {
    SearchConfig::default().with_overrides(ConfigOverrides {
        steps: Some(steps),
        top_n: Some(top_n),
        workers: Some(2),
        ..Default::default()
    })
}

#[test]
fn test_recovers_copy_last_bit() {
    let record = copy_last_participant("copier", 50, 2024);
    let fit = fit_participant(&record, Grammar::standard(), &config(50_000, 5));

    assert!(fit.rows.len() <= 5);
    let best = fit.best().expect("at least one rule retained");
    assert_eq!(best.rule_text, "get_(x, 7)");

    let max = fit
        .rows
        .iter()
        .map(|r| r.posterior)
        .fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(best.posterior, max);

    let program: Expr = best.rule_text.parse().unwrap();
    for x in History::all() {
        assert_eq!(program.answer(&x), Some(x.get(7)));
    }
}

#[test]
fn test_csv_in_csv_out() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("predictions.csv");
    let output = dir.path().join("rules.csv");

    let mut text = String::from("participant_id,sequence,prediction\n");
    for id in ["s2", "s1"] {
        for d in copy_last_participant(id, 12, id.len() as u64 + 3).data {
            text.push_str(&format!("{id},{},{}\n", d.history, d.observed));
        }
    }
    std::fs::write(&input, text).unwrap();

    let records = load_participants(&input).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, "s2");

    let fits = fit_all(&records, Grammar::standard(), &config(2_000, 3), |_| {}).unwrap();
    let rows = into_rows(fits);
    write_rows(&output, &rows).unwrap();

    let back = read_rows(&output).unwrap();
    assert_eq!(back.len(), rows.len());
    assert_eq!(back[0].participant_id, "s2");
    assert!(back.iter().all(|r| r.rule_text.parse::<Expr>().is_ok()));
    assert!(back.iter().filter(|r| r.participant_id == "s1").count() <= 3);
}
