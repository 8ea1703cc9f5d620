//! Download/extract pipeline against an in-memory archive server.

mod common;

use common::{fetcher, fetcher_with_retries, kline_row, zip_bytes, MockTransport};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tickvault_core::config::{AcquisitionConfig, AssetClass, TimePeriod};
use tickvault_core::error::DataError;
use tickvault_core::pipeline::extract::ExtractOutcome;
use tickvault_core::pipeline::progress::{PipelineObserver, TracingObserver};
use tickvault_core::pipeline::{AcquisitionPipeline, PipelineReport};

const DOWNLOAD: &str = "https://data.test";

fn config(root: &Path) -> AcquisitionConfig {
    let mut config = AcquisitionConfig::new(AssetClass::Um, TimePeriod::Daily, "klines", "1m");
    config.destination_dir = root.to_path_buf();
    config.endpoints.download_base_url = DOWNLOAD.into();
    config.max_workers = 4;
    config.max_extract_workers = 2;
    config.extract_queue_depth = 1;
    config
}

fn archive_url(symbol: &str, date: &str) -> String {
    format!("{DOWNLOAD}/data/futures/um/daily/klines/{symbol}/1m/{symbol}-1m-{date}.zip")
}

fn archive_for(symbol: &str, date: &str) -> Vec<u8> {
    zip_bytes(&[(
        format!("{symbol}-1m-{date}.csv").as_str(),
        kline_row(1_704_067_200_000).as_str(),
    )])
}

#[derive(Default)]
struct Counting {
    started: AtomicUsize,
    downloads: Mutex<Vec<(String, bool)>>,
    extracts: Mutex<Vec<(String, bool)>>,
    finished: Mutex<Option<PipelineReport>>,
}

impl PipelineObserver for Counting {
    fn on_start(&self, total_urls: usize) {
        self.started.store(total_urls, Ordering::SeqCst);
    }

    fn on_download(&self, url: &str, result: &Result<usize, DataError>) {
        self.downloads.lock().unwrap().push((url.to_string(), result.is_ok()));
    }

    fn on_extract(&self, url: &str, result: &Result<ExtractOutcome, DataError>) {
        self.extracts.lock().unwrap().push((url.to_string(), result.is_ok()));
    }

    fn on_finish(&self, report: &PipelineReport) {
        *self.finished.lock().unwrap() = Some(report.clone());
    }
}

#[test]
fn one_permanent_failure_does_not_stop_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let good_a = archive_url("BTCUSDT", "2024-01-01");
    let good_b = archive_url("ETHUSDT", "2024-01-01");
    let bad = archive_url("XRPUSDT", "2024-01-01");

    let transport = Arc::new(
        MockTransport::new()
            .serve(&good_a, archive_for("BTCUSDT", "2024-01-01"))
            .serve(&good_b, archive_for("ETHUSDT", "2024-01-01"))
            .route({
                let bad = bad.clone();
                move |req| (req.url == bad).then(|| Err(DataError::Network("reset".into())))
            }),
    );
    let cfg = config(dir.path());
    let pipeline = AcquisitionPipeline::new(fetcher_with_retries(&transport, 2), &cfg).unwrap();
    let observer = Counting::default();

    let report = pipeline.run(&[good_a, bad.clone(), good_b], &observer);

    assert_eq!(report.urls, 3);
    assert_eq!(report.downloaded, 2);
    assert_eq!(report.download_failures, 1);
    assert_eq!(report.extracted, 2);
    assert_eq!(report.files_written, 2);
    assert_eq!(transport.count_for(&bad), 3);

    let root = dir.path().join("um");
    assert!(root.join("BTCUSDT/1m/BTCUSDT-1m-2024-01-01.csv").exists());
    assert!(root.join("ETHUSDT/1m/ETHUSDT-1m-2024-01-01.csv").exists());
    assert!(!root.join("XRPUSDT/1m/XRPUSDT-1m-2024-01-01.csv").exists());

    assert_eq!(observer.started.load(Ordering::SeqCst), 3);
    assert_eq!(observer.downloads.lock().unwrap().len(), 3);
    assert_eq!(observer.extracts.lock().unwrap().len(), 2);
    assert_eq!(observer.finished.lock().unwrap().as_ref(), Some(&report));
}

#[test]
fn rerun_writes_nothing_new() {
    let dir = tempfile::tempdir().unwrap();
    let urls: Vec<String> = ["2024-01-01", "2024-01-02", "2024-01-03"]
        .iter()
        .map(|d| archive_url("BTCUSDT", d))
        .collect();
    let mut transport = MockTransport::new();
    for (url, date) in urls.iter().zip(["2024-01-01", "2024-01-02", "2024-01-03"]) {
        transport = transport.serve(url, archive_for("BTCUSDT", date));
    }
    let transport = Arc::new(transport);
    let cfg = config(dir.path());
    let pipeline = AcquisitionPipeline::new(fetcher(&transport), &cfg).unwrap();

    let first = pipeline.run(&urls, &TracingObserver);
    let second = pipeline.run(&urls, &TracingObserver);

    assert_eq!(first.files_written, 3);
    assert_eq!(second.files_written, 0);
    assert_eq!(second.files_skipped, 3);
    assert_eq!(second.failures(), 0);

    let files = std::fs::read_dir(dir.path().join("um/BTCUSDT/1m")).unwrap().count();
    assert_eq!(files, 3);
}

#[test]
fn corrupt_archive_is_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let good = archive_url("BTCUSDT", "2024-01-01");
    let corrupt = archive_url("BTCUSDT", "2024-01-02");
    let transport = Arc::new(
        MockTransport::new()
            .serve(&good, archive_for("BTCUSDT", "2024-01-01"))
            .serve(&corrupt, b"PK\x03\x04 truncated".to_vec()),
    );
    let cfg = config(dir.path());
    let pipeline = AcquisitionPipeline::new(fetcher(&transport), &cfg).unwrap();

    let report = pipeline.run(&[good, corrupt], &TracingObserver);

    assert_eq!(report.downloaded, 2);
    assert_eq!(report.extracted, 1);
    assert_eq!(report.extract_failures, 1);
    assert!(dir.path().join("um/BTCUSDT/1m/BTCUSDT-1m-2024-01-01.csv").exists());
}

#[test]
fn url_for_another_asset_class_is_rejected_before_download() {
    let dir = tempfile::tempdir().unwrap();
    let spot_url =
        format!("{DOWNLOAD}/data/spot/daily/klines/BTCUSDT/1m/BTCUSDT-1m-2024-01-01.zip");
    let transport = Arc::new(MockTransport::new());
    let cfg = config(dir.path());
    let pipeline = AcquisitionPipeline::new(fetcher(&transport), &cfg).unwrap();

    let report = pipeline.run(&[spot_url], &TracingObserver);

    assert_eq!(report.download_failures, 1);
    assert!(transport.requests().is_empty());
}

#[test]
fn many_archives_drain_through_a_narrow_queue() {
    let dir = tempfile::tempdir().unwrap();
    let dates: Vec<String> = (1..=28).map(|d| format!("2024-02-{d:02}")).collect();
    let urls: Vec<String> = dates.iter().map(|d| archive_url("BTCUSDT", d)).collect();
    let transport = Arc::new(MockTransport::new().route(|req| {
        let file = req.url.rsplit('/').next()?;
        let stem = file.strip_suffix(".zip")?;
        Some(Ok(zip_bytes(&[(
            format!("{stem}.csv").as_str(),
            kline_row(1_706_745_600_000).as_str(),
        )])))
    }));
    let cfg = config(dir.path());
    let pipeline = AcquisitionPipeline::new(fetcher(&transport), &cfg).unwrap();

    let report = pipeline.run(&urls, &TracingObserver);

    assert_eq!(report.extracted, 28);
    assert_eq!(report.files_written, 28);
    assert_eq!(
        std::fs::read_dir(dir.path().join("um/BTCUSDT/1m")).unwrap().count(),
        28
    );
}
