//! Bounded worker pool for batch conversion.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crossbeam_channel::bounded;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};

use super::{convert, ConversionResult};
use crate::error::{Error, Result};
use crate::options::ConversionOptions;

/// One document to convert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionJob {
    /// Job identifier, also the name of the job's output directory
    pub id: String,
    /// Source document
    pub source_path: PathBuf,
}

impl ConversionJob {
    /// Create a job.
    pub fn new(id: impl Into<String>, source_path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            source_path: source_path.into(),
        }
    }
}

/// Result of one job in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOutcome {
    /// Job identifier
    pub id: String,
    /// Directory the job wrote into
    pub target_dir: PathBuf,
    /// Conversion result
    pub result: ConversionResult,
}

/// Runs conversion jobs on a fixed number of threads.
///
/// Jobs are independent: one failing job never cancels the others, and
/// failed jobs are not retried.
#[derive(Debug)]
pub struct WorkerPool {
    pool: ThreadPool,
    concurrency: usize,
}

impl WorkerPool {
    /// Create a pool with `concurrency` worker threads.
    pub fn new(concurrency: usize) -> Result<Self> {
        if concurrency == 0 {
            return Err(Error::InvalidOptions(
                "concurrency must be at least 1".to_string(),
            ));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(concurrency)
            .thread_name(|i| format!("undoc-worker-{}", i))
            .build()
            .map_err(|e| Error::Other(format!("failed to start worker pool: {}", e)))?;
        Ok(Self { pool, concurrency })
    }

    /// Create a pool sized by `options.concurrency`.
    pub fn from_options(options: &ConversionOptions) -> Result<Self> {
        Self::new(options.concurrency)
    }

    /// Number of worker threads.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Convert every job into its own directory under `target_root`.
    ///
    /// Results are returned in job order.
    pub fn convert_all(
        &self,
        jobs: &[ConversionJob],
        target_root: &Path,
        options: &ConversionOptions,
    ) -> Vec<JobOutcome> {
        let dirs = job_dirs(jobs, target_root);
        let (tx, rx) = bounded::<(usize, ConversionResult)>(jobs.len().max(1));
        log::info!(
            "Converting {} jobs on {} workers",
            jobs.len(),
            self.concurrency
        );

        self.pool.scope(|scope| {
            for (index, (job, dir)) in jobs.iter().zip(&dirs).enumerate() {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    let result = convert(&job.source_path, dir, options);
                    if tx.send((index, result)).is_err() {
                        log::warn!("Result of job '{}' dropped", job.id);
                    }
                });
            }
        });
        drop(tx);

        let mut results: Vec<(usize, ConversionResult)> = rx.iter().collect();
        results.sort_by_key(|(index, _)| *index);

        let failed = results.iter().filter(|(_, r)| !r.success).count();
        log::info!("Batch finished: {} succeeded, {} failed", results.len() - failed, failed);

        results
            .into_iter()
            .map(|(index, result)| JobOutcome {
                id: jobs[index].id.clone(),
                target_dir: dirs[index].clone(),
                result,
            })
            .collect()
    }
}

/// Exclusive output directory per job; ids are made path-safe and unique.
fn job_dirs(jobs: &[ConversionJob], target_root: &Path) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    jobs.iter()
        .enumerate()
        .map(|(index, job)| {
            let mut name: String = job
                .id
                .chars()
                .map(|c| {
                    if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                        c
                    } else {
                        '_'
                    }
                })
                .collect();
            if name.trim_matches('.').is_empty() {
                name = format!("job-{}", index);
            }
            let mut suffix = index;
            let mut unique = name.clone();
            while !seen.insert(unique.clone()) {
                unique = format!("{}-{}", name, suffix);
                suffix += 1;
            }
            target_root.join(unique)
        })
        .collect()
}
