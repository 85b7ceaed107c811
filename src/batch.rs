//! Batch Processing
//!
//! Runs many documents through one shared pipeline on a fixed set of worker
//! threads fed by a job channel. Results come back in submission order.

use crossbeam_channel::unbounded;
use image::DynamicImage;
use std::time::Instant;
use tracing::{debug, info};

use crate::analysis::{DocumentModelKind, RawAnalysisResult};
use crate::annotate::ElementFilter;
use crate::app::{DocumentPipeline, DocumentReport};
use crate::error::Result;

/// One document queued for processing
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub name: String,
    pub raw: RawAnalysisResult,
    /// Model branch; detected from the result when absent
    pub kind: Option<DocumentModelKind>,
    pub image: Option<DynamicImage>,
}

/// Outcome of one queued document
#[derive(Debug)]
pub struct BatchResult {
    /// Position of the job in the submitted list
    pub id: usize,
    pub name: String,
    pub report: Result<DocumentReport>,
}

/// Apply `work` to every job on `workers` threads
///
/// A failing job never affects its siblings. The output order matches the
/// input order regardless of completion order.
pub fn run_jobs<J, R, F>(jobs: Vec<J>, workers: usize, work: F) -> Vec<R>
where
    J: Send,
    R: Send,
    F: Fn(J) -> R + Sync,
{
    let total = jobs.len();
    let workers = workers.clamp(1, total.max(1));
    let (job_sender, job_receiver) = unbounded::<(usize, J)>();
    let (result_sender, result_receiver) = unbounded::<(usize, R)>();

    for job in jobs.into_iter().enumerate() {
        // Receiver is alive until the scope below ends
        let _ = job_sender.send(job);
    }
    drop(job_sender);

    std::thread::scope(|scope| {
        for worker in 0..workers {
            let job_receiver = job_receiver.clone();
            let result_sender = result_sender.clone();
            let work = &work;
            scope.spawn(move || {
                debug!("Batch worker {} starting", worker);
                for (id, job) in job_receiver.iter() {
                    let _ = result_sender.send((id, work(job)));
                }
                debug!("Batch worker {} exiting", worker);
            });
        }
    });
    drop(result_sender);

    let mut results: Vec<(usize, R)> = result_receiver.iter().collect();
    results.sort_by_key(|(id, _)| *id);
    results.into_iter().map(|(_, result)| result).collect()
}

/// Process in-memory documents concurrently through one pipeline
pub fn process_batch(
    pipeline: &DocumentPipeline,
    jobs: Vec<BatchJob>,
    filter: &ElementFilter,
    workers: usize,
) -> Vec<BatchResult> {
    let start = Instant::now();
    let total = jobs.len();
    let indexed: Vec<(usize, BatchJob)> = jobs.into_iter().enumerate().collect();

    let results = run_jobs(indexed, workers, |(id, job)| BatchResult {
        id,
        report: pipeline.process(job.raw, job.kind, job.image.as_ref(), filter),
        name: job.name,
    });

    let failed = results.iter().filter(|r| r.report.is_err()).count();
    info!(
        "Processed {} documents ({} failed) with {} workers in {:?}",
        total,
        failed,
        workers,
        start.elapsed()
    );
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::error::AnnotateError;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    fn pipeline() -> DocumentPipeline {
        let mut config = AppConfig::default();
        config.render.draw_labels = false;
        DocumentPipeline::from_config(&config).unwrap()
    }

    fn job(name: &str, json: &str) -> BatchJob {
        BatchJob {
            name: name.to_string(),
            raw: RawAnalysisResult::from_json_str(json).unwrap(),
            kind: None,
            image: None,
        }
    }

    #[test]
    fn test_results_in_submission_order() {
        let delays: Vec<u64> = vec![30, 1, 20, 5, 10, 0];
        let results = run_jobs(delays.clone(), 3, |delay| {
            std::thread::sleep(Duration::from_millis(delay));
            delay
        });
        assert_eq!(results, delays);
    }

    #[test]
    fn test_work_spreads_across_workers() {
        let threads = Mutex::new(HashSet::new());
        run_jobs((0..8).collect::<Vec<u32>>(), 4, |_| {
            threads.lock().unwrap().insert(std::thread::current().id());
            std::thread::sleep(Duration::from_millis(20));
        });
        assert!(threads.lock().unwrap().len() > 1);
    }

    #[test]
    fn test_empty_batch() {
        let results: Vec<u32> = run_jobs(Vec::<u32>::new(), 4, |x| x);
        assert!(results.is_empty());
    }

    #[test]
    fn test_failing_document_isolated() {
        let jobs = vec![
            job(
                "invoice",
                r#"{"modelId": "prebuilt-invoice", "documents": [{"fields": {
                    "VendorName": {"valueString": "Acme", "confidence": 0.9}}}]}"#,
            ),
            job("receipt", r#"{"modelId": "prebuilt-receipt"}"#),
            job("layout", r#"{"modelId": "prebuilt-layout", "pages": []}"#),
        ];

        let results = process_batch(&pipeline(), jobs, &ElementFilter::all(), 2);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].name, "invoice");
        assert_eq!(results[0].report.as_ref().unwrap().elements.len(), 1);
        assert!(matches!(results[1].report, Err(AnnotateError::UnknownDocumentModel(_))));
        assert_eq!(results[2].id, 2);
        assert!(results[2].report.as_ref().unwrap().elements.is_empty());
    }
}
