//! Verification and quarantine over a dataset on disk.

mod common;

use common::kline_row;
use std::fs;
use std::path::{Path, PathBuf};
use tickvault_core::config::{AcquisitionConfig, AssetClass, TimePeriod};
use tickvault_core::verify::schema::SchemaTable;
use tickvault_core::verify::{Verdict, Verifier};

fn config(root: &Path, asset: AssetClass, data_type: &str) -> AcquisitionConfig {
    let mut config = AcquisitionConfig::new(asset, TimePeriod::Daily, data_type, "1m");
    config.destination_dir = root.to_path_buf();
    config
}

fn write(root: &Path, asset: &str, symbol: &str, name: &str, body: &str) -> PathBuf {
    let dir = root.join(asset).join(symbol).join("1m");
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path
}

fn syms(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn well_formed_klines_are_valid() {
    let root = tempfile::tempdir().unwrap();
    let path = write(
        root.path(),
        "um",
        "BTCUSDT",
        "BTCUSDT-1m-2024-01-01.csv",
        &kline_row(1_704_067_200_000),
    );
    let verifier = Verifier::new(&config(root.path(), AssetClass::Um, "klines"), &SchemaTable::builtin());

    assert_eq!(verifier.check_file(&path).unwrap(), Verdict::Valid);
    let report = verifier.verify(&syms(&["BTCUSDT"]));
    assert_eq!(report.files_checked, 1);
    assert_eq!(report.valid, 1);
    assert!(report.is_clean());
    assert!(path.exists());
}

#[test]
fn eleven_columns_are_quarantined() {
    let root = tempfile::tempdir().unwrap();
    let path = write(
        root.path(),
        "um",
        "BTCUSDT",
        "BTCUSDT-1m-2024-01-01.csv",
        "1704067200000,1,2,3,4,5,6,7,8,9,10\n",
    );
    let verifier = Verifier::new(&config(root.path(), AssetClass::Um, "klines"), &SchemaTable::builtin());

    assert_eq!(
        verifier.check_file(&path).unwrap(),
        Verdict::SchemaMismatch {
            expected: 12,
            actual: 11
        }
    );
    let report = verifier.verify(&syms(&["BTCUSDT"]));

    assert_eq!(report.quarantined, 1);
    assert!(!path.exists());
    assert!(root.path().join("quarantine/BTCUSDT-1m-2024-01-01.csv").exists());
    assert_eq!(report.rejected[0].reason, "schema mismatch: expected 12 columns, got 11");

    let ledger = verifier.quarantine().records().unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].symbol, "BTCUSDT");
}

#[test]
fn empty_file_is_quarantined() {
    let root = tempfile::tempdir().unwrap();
    let path = write(root.path(), "spot", "ETHUSDT", "ETHUSDT-1m-2024-03-01.csv", "");
    let verifier = Verifier::new(&config(root.path(), AssetClass::Spot, "klines"), &SchemaTable::builtin());

    assert_eq!(verifier.check_file(&path).unwrap(), Verdict::EmptyFile);
    let report = verifier.verify(&syms(&["ETHUSDT"]));
    assert_eq!(report.quarantined, 1);
    assert!(root.path().join("quarantine/ETHUSDT-1m-2024-03-01.csv").exists());
}

#[test]
fn spot_file_after_cutover_needs_microseconds() {
    let root = tempfile::tempdir().unwrap();
    let millis = write(
        root.path(),
        "spot",
        "BTCUSDT",
        "BTCUSDT-1m-2025-02-01.csv",
        &kline_row(1_738_368_000_000),
    );
    let verifier = Verifier::new(&config(root.path(), AssetClass::Spot, "klines"), &SchemaTable::builtin());

    assert_eq!(
        verifier.check_file(&millis).unwrap(),
        Verdict::InvalidTimestamp {
            value: "1738368000000".into()
        }
    );

    let micros = write(
        root.path(),
        "spot",
        "BTCUSDT",
        "BTCUSDT-1m-2025-02-02.csv",
        "1738454400000000,1,2,3,4,5,1738454459999999,7,8,9,10,0\n",
    );
    assert_eq!(verifier.check_file(&micros).unwrap(), Verdict::Valid);
}

#[test]
fn futures_after_cutover_stay_in_milliseconds() {
    let root = tempfile::tempdir().unwrap();
    let path = write(
        root.path(),
        "cm",
        "BTCUSD_PERP",
        "BTCUSD_PERP-1m-2025-02-01.csv",
        &kline_row(1_738_368_000_000),
    );
    let verifier = Verifier::new(&config(root.path(), AssetClass::Cm, "klines"), &SchemaTable::builtin());
    assert_eq!(verifier.check_file(&path).unwrap(), Verdict::Valid);
}

#[test]
fn column_name_row_is_tolerated() {
    let root = tempfile::tempdir().unwrap();
    let header = "open_time,open,high,low,close,volume,close_time,quote_volume,count,taker_buy_volume,taker_buy_quote_volume,ignore\n";
    let with_data = write(
        root.path(),
        "um",
        "BTCUSDT",
        "BTCUSDT-1m-2024-01-01.csv",
        &format!("{header}{}", kline_row(1_704_067_200_000)),
    );
    let header_only = write(root.path(), "um", "BTCUSDT", "BTCUSDT-1m-2024-01-02.csv", header);
    let verifier = Verifier::new(&config(root.path(), AssetClass::Um, "klines"), &SchemaTable::builtin());

    assert_eq!(verifier.check_file(&with_data).unwrap(), Verdict::Valid);
    assert_eq!(verifier.check_file(&header_only).unwrap(), Verdict::EmptyFile);
}

#[test]
fn repeated_rejects_never_overwrite_each_other() {
    let root = tempfile::tempdir().unwrap();
    let cfg = config(root.path(), AssetClass::Um, "klines");
    let verifier = Verifier::new(&cfg, &SchemaTable::builtin());

    for _ in 0..2 {
        write(root.path(), "um", "BTCUSDT", "BTCUSDT-1m-2024-01-01.csv", "");
        verifier.verify(&syms(&["BTCUSDT"]));
    }

    let q = root.path().join("quarantine");
    assert!(q.join("BTCUSDT-1m-2024-01-01.csv").exists());
    assert!(q.join("BTCUSDT-1m-2024-01-01.1.csv").exists());
    assert_eq!(verifier.quarantine().records().unwrap().len(), 2);
}

#[test]
fn gaps_are_reported_for_valid_files_only() {
    let root = tempfile::tempdir().unwrap();
    for (day, body) in [
        ("01", kline_row(1_704_067_200_000)),
        ("02", String::new()),
        ("04", kline_row(1_704_326_400_000)),
    ] {
        write(
            root.path(),
            "um",
            "BTCUSDT",
            &format!("BTCUSDT-1m-2024-01-{day}.csv"),
            &body,
        );
    }
    let verifier = Verifier::new(&config(root.path(), AssetClass::Um, "klines"), &SchemaTable::builtin());
    let report = verifier.verify(&syms(&["BTCUSDT", "NOFILES"]));

    assert_eq!(report.files_checked, 3);
    assert_eq!(report.valid, 2);
    assert_eq!(report.quarantined, 1);
    assert_eq!(report.continuity.len(), 1);
    assert_eq!(report.continuity[0].missing.len(), 2);
    assert_eq!(report.gap_count(), 2);
}

#[test]
fn schema_override_file_changes_expectation() {
    let root = tempfile::tempdir().unwrap();
    let table = root.path().join("schema.toml");
    fs::write(&table, "[klines]\nspot = 13\nderivative = 13\n").unwrap();
    let mut cfg = config(root.path(), AssetClass::Um, "klines");
    cfg.schema_table = Some(table);

    let path = write(
        root.path(),
        "um",
        "BTCUSDT",
        "BTCUSDT-1m-2024-01-01.csv",
        &kline_row(1_704_067_200_000),
    );
    let verifier = Verifier::from_config(&cfg).unwrap();
    assert_eq!(
        verifier.check_file(&path).unwrap(),
        Verdict::SchemaMismatch {
            expected: 13,
            actual: 12
        }
    );
}

#[test]
fn unknown_data_type_checks_timestamp_only() {
    let root = tempfile::tempdir().unwrap();
    let path = write(
        root.path(),
        "um",
        "BTCUSDT",
        "BTCUSDT-1m-2024-01-01.csv",
        "1704067200000,1.5,2\n",
    );
    let verifier = Verifier::new(&config(root.path(), AssetClass::Um, "fundingRate"), &SchemaTable::builtin());
    assert_eq!(verifier.check_file(&path).unwrap(), Verdict::Valid);
}

#[test]
fn failed_relocation_and_unreadable_files_do_not_stop_verification() {
    let root = tempfile::tempdir().unwrap();
    // A regular file where the quarantine directory should go.
    fs::write(root.path().join("quarantine"), "not a directory").unwrap();

    let empty = write(root.path(), "um", "BTCUSDT", "BTCUSDT-1m-2024-01-01.csv", "");
    write(
        root.path(),
        "um",
        "BTCUSDT",
        "BTCUSDT-1m-2024-01-02.csv",
        &kline_row(1_704_153_600_000),
    );
    let unreadable = write(root.path(), "um", "ETHUSDT", "ETHUSDT-1m-2024-01-01.csv", "");
    fs::write(&unreadable, b"\xff\xfe\xfd,1,2\n").unwrap();
    write(
        root.path(),
        "um",
        "ETHUSDT",
        "ETHUSDT-1m-2024-01-02.csv",
        &kline_row(1_704_153_600_000),
    );

    let verifier = Verifier::new(&config(root.path(), AssetClass::Um, "klines"), &SchemaTable::builtin());
    let report = verifier.verify(&syms(&["BTCUSDT", "ETHUSDT"]));

    assert_eq!(report.files_checked, 4);
    assert_eq!(report.valid, 2);
    assert_eq!(report.quarantined, 0);
    assert_eq!(report.quarantine_failures, 1);
    assert_eq!(report.read_errors, 1);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].reason, "empty file");
    assert!(!report.is_clean());

    // Both problem files stay where they were.
    assert!(empty.exists());
    assert!(unreadable.exists());
    assert!(root.path().join("quarantine").is_file());
}
