//! Concurrency stress helpers.
//!
//! These drive a [`CryptoFactory`] from many threads at once and report
//! how often the master key store was consulted.

use crate::fixtures::DemoFixture;
use colkms_core::{MasterKeyLookup, WrappedKey};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Master key resolutions during the run.
    pub store_calls: usize,
    /// Total duration.
    pub duration: Duration,
}

impl StressTestResult {
    /// Operations per second.
    pub fn ops_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.total_ops as f64 / secs
        } else {
            0.0
        }
    }
}

/// Configuration for stress runs.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of concurrent threads.
    pub threads: usize,
    /// Contexts each thread creates.
    pub contexts_per_thread: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 8,
            contexts_per_thread: 50,
        }
    }
}

/// Creates encryption contexts for the demo plan from many threads at once.
///
/// Returns the run result and the distinct footer tokens observed. With a
/// cache lifetime longer than the run, exactly one footer token exists.
pub fn stress_encryption_contexts(
    fixture: &Arc<DemoFixture>,
    config: &StressConfig,
) -> (StressTestResult, Vec<WrappedKey>) {
    fixture.store.reset_counts();
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(config.threads));

    let start = Instant::now();
    let handles: Vec<_> = (0..config.threads)
        .map(|_| {
            let fixture = Arc::clone(fixture);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let barrier = Arc::clone(&barrier);
            let rounds = config.contexts_per_thread;

            thread::spawn(move || {
                barrier.wait();
                let mut tokens = Vec::new();
                for _ in 0..rounds {
                    match fixture.factory.file_encryption_context(fixture.demo_plan()) {
                        Ok(context) => {
                            if let Some(footer) = context.footer_key() {
                                tokens.push(footer.wrapped().clone());
                            }
                            successful.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(_) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
                tokens
            })
        })
        .collect();

    let mut tokens: Vec<WrappedKey> = Vec::new();
    for handle in handles {
        for token in handle.join().expect("Thread panicked") {
            if !tokens.contains(&token) {
                tokens.push(token);
            }
        }
    }

    let successful = successful.load(Ordering::Relaxed);
    let failed = failed.load(Ordering::Relaxed);
    let result = StressTestResult {
        total_ops: successful + failed,
        successful_ops: successful,
        failed_ops: failed,
        store_calls: fixture.store.resolve_count(),
        duration: start.elapsed(),
    };
    (result, tokens)
}

/// Writes once, then reads the same key metadata from many threads.
pub fn stress_decryption_contexts(
    fixture: &Arc<DemoFixture>,
    config: &StressConfig,
) -> StressTestResult {
    let metadata = fixture
        .factory
        .file_encryption_context(fixture.demo_plan())
        .and_then(|context| context.finish())
        .expect("demo write succeeds");
    let metadata = Arc::new(metadata);
    fixture.store.reset_counts();

    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(config.threads));

    let start = Instant::now();
    let handles: Vec<_> = (0..config.threads)
        .map(|_| {
            let fixture = Arc::clone(fixture);
            let metadata = Arc::clone(&metadata);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let barrier = Arc::clone(&barrier);
            let rounds = config.contexts_per_thread;

            thread::spawn(move || {
                barrier.wait();
                for _ in 0..rounds {
                    let counter = match fixture
                        .factory
                        .file_decryption_context(&metadata, &MasterKeyLookup::FromMetadata)
                    {
                        Ok(_) => &successful,
                        Err(_) => &failed,
                    };
                    counter.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    let successful = successful.load(Ordering::Relaxed);
    let failed = failed.load(Ordering::Relaxed);
    StressTestResult {
        total_ops: successful + failed,
        successful_ops: successful,
        failed_ops: failed,
        store_calls: fixture.store.resolve_count(),
        duration: start.elapsed(),
    }
}
