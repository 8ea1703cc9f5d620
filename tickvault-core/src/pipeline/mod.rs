//! Two-stage acquisition pipeline.
//!
//! Downloads run on one rayon pool, extraction on another. Downloaded archive
//! bytes are handed across a bounded channel, so a slow extract stage applies
//! backpressure to the downloaders instead of letting archives pile up in
//! memory. Every task is isolated: a failed URL is logged, counted, and
//! dropped without affecting any other URL.
//!
//! `run` returns only after every download has finished and every archive
//! that was handed to the extract stage has been processed.

pub mod extract;
pub mod progress;

use crate::config::AcquisitionConfig;
use crate::error::DataError;
use crate::layout::{DatasetLayout, UrlTemplate, MEMBER_EXTENSION};
use crate::retry::RetryableFetcher;
use crate::transport::Request;
use extract::{extract_archive, ExtractOutcome};
use progress::PipelineObserver;
use rayon::prelude::*;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use tracing::{error, info, warn};

/// Counters for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub urls: usize,
    pub downloaded: usize,
    pub download_failures: usize,
    pub extracted: usize,
    pub extract_failures: usize,
    pub files_written: usize,
    pub files_skipped: usize,
}

impl PipelineReport {
    pub fn failures(&self) -> usize {
        self.download_failures + self.extract_failures
    }
}

#[derive(Default)]
struct Tally {
    downloaded: AtomicUsize,
    download_failures: AtomicUsize,
    extracted: AtomicUsize,
    extract_failures: AtomicUsize,
    files_written: AtomicUsize,
    files_skipped: AtomicUsize,
}

impl Tally {
    fn bump(counter: &AtomicUsize, by: usize) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    fn report(&self, urls: usize) -> PipelineReport {
        PipelineReport {
            urls,
            downloaded: self.downloaded.load(Ordering::Relaxed),
            download_failures: self.download_failures.load(Ordering::Relaxed),
            extracted: self.extracted.load(Ordering::Relaxed),
            extract_failures: self.extract_failures.load(Ordering::Relaxed),
            files_written: self.files_written.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
        }
    }
}

/// An archive held in memory between the two stages.
struct Downloaded {
    url: String,
    dest: PathBuf,
    bytes: Vec<u8>,
}

pub struct AcquisitionPipeline {
    fetcher: RetryableFetcher,
    template: UrlTemplate,
    layout: DatasetLayout,
    download_pool: rayon::ThreadPool,
    extract_pool: rayon::ThreadPool,
    queue_depth: usize,
}

fn build_pool(threads: usize, prefix: &'static str) -> Result<rayon::ThreadPool, DataError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .thread_name(move |i| format!("{prefix}-{i}"))
        .build()
        .map_err(|e| DataError::Io(std::io::Error::other(e)))
}

impl AcquisitionPipeline {
    pub fn new(fetcher: RetryableFetcher, config: &AcquisitionConfig) -> Result<Self, DataError> {
        Ok(Self {
            fetcher,
            template: UrlTemplate::new(&config.endpoints.download_base_url, config.asset_class)?,
            layout: config.layout(),
            download_pool: build_pool(config.max_workers, "tickvault-download")?,
            extract_pool: build_pool(config.max_extract_workers, "tickvault-extract")?,
            queue_depth: config.extract_queue_depth.max(1),
        })
    }

    /// Download and extract every URL. An empty list is a successful no-op.
    pub fn run(&self, urls: &[String], observer: &dyn PipelineObserver) -> PipelineReport {
        let tally = Tally::default();
        observer.on_start(urls.len());

        if urls.is_empty() {
            info!("no archive urls to process");
            let report = tally.report(0);
            observer.on_finish(&report);
            return report;
        }

        let (tx, rx) = mpsc::sync_channel::<Downloaded>(self.queue_depth);
        let tally_ref = &tally;

        std::thread::scope(|scope| {
            let extract_stage = scope.spawn(move || {
                self.extract_pool.install(|| {
                    rx.into_iter()
                        .par_bridge()
                        .for_each(|archive| self.extract_one(archive, tally_ref, observer));
                })
            });

            self.download_pool.install(|| {
                urls.par_iter().for_each_with(tx, |tx, url| {
                    if let Some(archive) = self.download_one(url, tally_ref, observer) {
                        if let Err(mpsc::SendError(archive)) = tx.send(archive) {
                            error!(url = %archive.url, "extract stage is gone; archive dropped");
                            Tally::bump(&tally_ref.extract_failures, 1);
                        }
                    }
                });
            });

            // All senders are dropped once the download stage returns, which
            // closes the channel and lets the extract stage drain and exit.
            if extract_stage.join().is_err() {
                error!("extract stage panicked");
            }
        });

        let report = tally.report(urls.len());
        observer.on_finish(&report);
        report
    }

    fn download_one(
        &self,
        url: &str,
        tally: &Tally,
        observer: &dyn PipelineObserver,
    ) -> Option<Downloaded> {
        let result = self.template.parse(url).and_then(|archive| {
            let dest = self.layout.archive_dir(&archive);
            std::fs::create_dir_all(&dest)?;
            let bytes = self.fetcher.fetch(&Request::get(url))?;
            Ok((dest, bytes))
        });

        match result {
            Ok((dest, bytes)) => {
                Tally::bump(&tally.downloaded, 1);
                observer.on_download(url, &Ok(bytes.len()));
                Some(Downloaded {
                    url: url.to_string(),
                    dest,
                    bytes,
                })
            }
            Err(e) => {
                warn!(url, error = %e, "download failed");
                Tally::bump(&tally.download_failures, 1);
                observer.on_download(url, &Err(e));
                None
            }
        }
    }

    fn extract_one(&self, archive: Downloaded, tally: &Tally, observer: &dyn PipelineObserver) {
        let result = extract_archive(&archive.bytes, &archive.dest, MEMBER_EXTENSION, &archive.url);
        match &result {
            Ok(ExtractOutcome { written, skipped }) => {
                Tally::bump(&tally.extracted, 1);
                Tally::bump(&tally.files_written, *written);
                Tally::bump(&tally.files_skipped, *skipped);
            }
            Err(e) => {
                warn!(url = %archive.url, error = %e, "extraction failed");
                Tally::bump(&tally.extract_failures, 1);
            }
        }
        observer.on_extract(&archive.url, &result);
    }
}
