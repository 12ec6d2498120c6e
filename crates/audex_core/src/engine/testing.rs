//! Scripted test doubles for the engine seams.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::errors::{EngineError, EngineResult, FetchError};
use super::traits::{ArtifactFetcher, EngineFactory, MediaEngine, RatioCallback};
use super::types::{EngineSource, LocalArtifact};

#[derive(Clone)]
enum ExecFailure {
    Command(String),
    Fatal(String),
}

/// In-memory engine whose command behavior is scripted per test.
pub struct FakeEngine {
    files: Mutex<HashMap<String, Vec<u8>>>,
    operations: Mutex<Vec<String>>,
    progress: Mutex<Vec<f64>>,
    output: Mutex<Vec<u8>>,
    exec_delay: Mutex<Duration>,
    exec_failure: Mutex<Option<ExecFailure>>,
    self_test_failure: Mutex<Option<String>>,
    truncate_writes: AtomicBool,
    skip_output: AtomicBool,
    fail_deletes: AtomicBool,
    terminated: AtomicBool,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            files: Mutex::new(HashMap::new()),
            operations: Mutex::new(Vec::new()),
            progress: Mutex::new(Vec::new()),
            output: Mutex::new(b"fake-audio".to_vec()),
            exec_delay: Mutex::new(Duration::ZERO),
            exec_failure: Mutex::new(None),
            self_test_failure: Mutex::new(None),
            truncate_writes: AtomicBool::new(false),
            skip_output: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            terminated: AtomicBool::new(false),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        })
    }

    /// Bytes written to the output file by each successful exec.
    pub fn set_output(&self, data: Vec<u8>) {
        *self.output.lock() = data;
    }

    /// Ratios reported through the progress callback during exec.
    pub fn set_progress(&self, ratios: Vec<f64>) {
        *self.progress.lock() = ratios;
    }

    /// How long exec runs before finishing.
    pub fn set_exec_delay(&self, delay: Duration) {
        *self.exec_delay.lock() = delay;
    }

    /// Make every codec command fail with `message` on stderr.
    pub fn fail_exec(&self, message: &str) {
        *self.exec_failure.lock() = Some(ExecFailure::Command(message.to_string()));
    }

    /// Make every codec command kill the engine.
    pub fn fail_exec_fatally(&self, message: &str) {
        *self.exec_failure.lock() = Some(ExecFailure::Fatal(message.to_string()));
    }

    pub fn fail_self_test(&self, message: &str) {
        *self.self_test_failure.lock() = Some(message.to_string());
    }

    /// Store only half of every written file.
    pub fn truncate_writes(&self) {
        self.truncate_writes.store(true, Ordering::SeqCst);
    }

    /// Let commands succeed without creating their output file.
    pub fn skip_output(&self) {
        self.skip_output.store(true, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }

    /// Names currently present in the filesystem.
    pub fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.files.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Every operation in call order, e.g. `write:input_...`.
    pub fn operations(&self) -> Vec<String> {
        self.operations.lock().clone()
    }

    pub fn exec_count(&self) -> usize {
        self.operations
            .lock()
            .iter()
            .filter(|op| op.starts_with("exec"))
            .count()
    }

    pub fn was_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Highest number of overlapping operations observed.
    pub fn max_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn enter(&self) -> ActiveGuard<'_> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        ActiveGuard(&self.active)
    }
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl MediaEngine for FakeEngine {
    async fn write_file(&self, name: &str, data: &[u8]) -> EngineResult<()> {
        let _active = self.enter();
        self.operations.lock().push(format!("write:{}", name));
        let stored = if self.truncate_writes.load(Ordering::SeqCst) {
            data[..data.len() / 2].to_vec()
        } else {
            data.to_vec()
        };
        self.files.lock().insert(name.to_string(), stored);
        Ok(())
    }

    async fn read_file(&self, name: &str) -> EngineResult<Vec<u8>> {
        let _active = self.enter();
        self.operations.lock().push(format!("read:{}", name));
        self.files
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(name.to_string()))
    }

    async fn delete_file(&self, name: &str) -> EngineResult<()> {
        let _active = self.enter();
        self.operations.lock().push(format!("delete:{}", name));
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(EngineError::io(
                format!("deleting {}", name),
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked"),
            ));
        }
        self.files
            .lock()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| EngineError::NotFound(name.to_string()))
    }

    async fn exec(&self, args: &[String], on_progress: RatioCallback<'_>) -> EngineResult<()> {
        let _active = self.enter();

        if args.iter().any(|a| a == "-version") {
            self.operations.lock().push("exec:self-test".to_string());
            return match self.self_test_failure.lock().clone() {
                Some(message) => Err(EngineError::command_failed(1, message)),
                None => Ok(()),
            };
        }

        self.operations.lock().push(format!("exec:{}", args.join(" ")));

        let input = args
            .iter()
            .position(|a| a == "-i")
            .and_then(|i| args.get(i + 1))
            .cloned()
            .unwrap_or_default();
        if !self.files.lock().contains_key(&input) {
            return Err(EngineError::command_failed(
                1,
                format!("{}: No such file or directory", input),
            ));
        }

        let ratios = self.progress.lock().clone();
        let delay = *self.exec_delay.lock();
        if ratios.is_empty() {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        } else {
            let step = delay / ratios.len() as u32;
            for ratio in ratios {
                on_progress(ratio);
                if !step.is_zero() {
                    tokio::time::sleep(step).await;
                }
            }
        }

        match self.exec_failure.lock().clone() {
            Some(ExecFailure::Command(message)) => return Err(EngineError::command_failed(1, message)),
            Some(ExecFailure::Fatal(message)) => return Err(EngineError::terminated(message)),
            None => {}
        }

        if self.skip_output.load(Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(output) = args.last() {
            let data = self.output.lock().clone();
            self.files.lock().insert(output.clone(), data);
        }
        Ok(())
    }

    async fn terminate(&self) {
        self.terminated.store(true, Ordering::SeqCst);
    }
}

/// Factory returning pre-built fakes per source name.
pub struct FakeFactory {
    direct: Mutex<HashMap<String, Arc<FakeEngine>>>,
    staged: Mutex<HashMap<String, Arc<FakeEngine>>>,
    direct_calls: Mutex<Vec<String>>,
    staged_calls: Mutex<Vec<(String, Vec<LocalArtifact>)>>,
}

impl FakeFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            direct: Mutex::new(HashMap::new()),
            staged: Mutex::new(HashMap::new()),
            direct_calls: Mutex::new(Vec::new()),
            staged_calls: Mutex::new(Vec::new()),
        })
    }

    /// Direct init of `source` succeeds with `engine`.
    pub fn direct_ok(&self, source: &str, engine: Arc<FakeEngine>) {
        self.direct.lock().insert(source.to_string(), engine);
    }

    /// Staged init of `source` succeeds with `engine`.
    pub fn staged_ok(&self, source: &str, engine: Arc<FakeEngine>) {
        self.staged.lock().insert(source.to_string(), engine);
    }

    pub fn direct_calls(&self) -> Vec<String> {
        self.direct_calls.lock().clone()
    }

    pub fn staged_calls(&self) -> Vec<(String, Vec<LocalArtifact>)> {
        self.staged_calls.lock().clone()
    }
}

#[async_trait]
impl EngineFactory for FakeFactory {
    async fn init_direct(&self, source: &EngineSource) -> EngineResult<Arc<dyn MediaEngine>> {
        self.direct_calls.lock().push(source.name.clone());
        match self.direct.lock().get(&source.name) {
            Some(engine) => Ok(engine.clone() as Arc<dyn MediaEngine>),
            None => Err(EngineError::unavailable(format!("{} not installed", source.name))),
        }
    }

    async fn init_staged(
        &self,
        source: &EngineSource,
        artifacts: &[LocalArtifact],
    ) -> EngineResult<Arc<dyn MediaEngine>> {
        self.staged_calls
            .lock()
            .push((source.name.clone(), artifacts.to_vec()));
        match self.staged.lock().get(&source.name) {
            Some(engine) => Ok(engine.clone() as Arc<dyn MediaEngine>),
            None => Err(EngineError::unavailable(format!(
                "{} artifacts rejected",
                source.name
            ))),
        }
    }
}

/// Fetcher serving canned bytes, optionally failing the first N calls.
pub struct FakeFetcher {
    served: Mutex<HashMap<String, Vec<u8>>>,
    failures: Mutex<HashMap<String, u32>>,
    calls: Mutex<HashMap<String, u32>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self {
            served: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn serve(&self, location: &str, data: Vec<u8>) {
        self.served.lock().insert(location.to_string(), data);
    }

    pub fn fail_times(&self, location: &str, times: u32) {
        self.failures.lock().insert(location.to_string(), times);
    }

    pub fn calls(&self, location: &str) -> u32 {
        self.calls.lock().get(location).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ArtifactFetcher for FakeFetcher {
    async fn fetch(
        &self,
        location: &str,
        on_progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<Vec<u8>, FetchError> {
        *self.calls.lock().entry(location.to_string()).or_insert(0) += 1;

        {
            let mut failures = self.failures.lock();
            if let Some(remaining) = failures.get_mut(location) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(FetchError::Status {
                        status: 503,
                        location: location.to_string(),
                    });
                }
            }
        }

        match self.served.lock().get(location) {
            Some(data) => {
                on_progress(100);
                Ok(data.clone())
            }
            None => Err(FetchError::Status {
                status: 404,
                location: location.to_string(),
            }),
        }
    }
}
