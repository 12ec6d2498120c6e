//! FFmpeg subprocess engine.
//!
//! Each instance owns a private scratch directory that serves as its
//! filesystem. Commands run with the scratch directory as working directory,
//! so file arguments are plain names inside it. Progress is parsed from the
//! `Duration:` header and the `time=` field of ffmpeg's stderr status lines.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use super::errors::{EngineError, EngineResult};
use super::traits::{EngineFactory, MediaEngine, RatioCallback};
use super::types::{EngineSource, LocalArtifact};

/// Number of stderr lines kept for error messages.
const STDERR_TAIL_LINES: usize = 20;

/// Engine backed by an ffmpeg executable.
pub struct ProcessEngine {
    program: PathBuf,
    scratch: PathBuf,
    terminated: AtomicBool,
}

impl ProcessEngine {
    /// Create an instance running `program` with a fresh scratch directory
    /// under `scratch_root`.
    pub async fn create(program: PathBuf, scratch_root: &Path) -> EngineResult<Self> {
        let scratch = scratch_root.join(format!("engine-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&scratch)
            .await
            .map_err(|e| EngineError::io(format!("creating {}", scratch.display()), e))?;

        tracing::debug!(
            "Created engine instance for {} in {}",
            program.display(),
            scratch.display()
        );

        Ok(Self {
            program,
            scratch,
            terminated: AtomicBool::new(false),
        })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch
    }

    fn ensure_alive(&self) -> EngineResult<()> {
        if self.terminated.load(Ordering::SeqCst) {
            return Err(EngineError::terminated("instance was terminated"));
        }
        Ok(())
    }

    fn resolve(&self, name: &str) -> EngineResult<PathBuf> {
        validate_name(name)?;
        Ok(self.scratch.join(name))
    }
}

/// Reject names that are not a single plain component.
fn validate_name(name: &str) -> EngineResult<()> {
    if name.is_empty()
        || name == "."
        || name.contains("..")
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
    {
        return Err(EngineError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[async_trait]
impl MediaEngine for ProcessEngine {
    async fn write_file(&self, name: &str, data: &[u8]) -> EngineResult<()> {
        self.ensure_alive()?;
        let path = self.resolve(name)?;
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| EngineError::io(format!("writing {}", name), e))
    }

    async fn read_file(&self, name: &str) -> EngineResult<Vec<u8>> {
        self.ensure_alive()?;
        let path = self.resolve(name)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(EngineError::NotFound(name.to_string()))
            }
            Err(e) => Err(EngineError::io(format!("reading {}", name), e)),
        }
    }

    async fn delete_file(&self, name: &str) -> EngineResult<()> {
        self.ensure_alive()?;
        let path = self.resolve(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(EngineError::NotFound(name.to_string()))
            }
            Err(e) => Err(EngineError::io(format!("deleting {}", name), e)),
        }
    }

    async fn exec(&self, args: &[String], on_progress: RatioCallback<'_>) -> EngineResult<()> {
        self.ensure_alive()?;

        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .current_dir(&self.scratch)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!("Running engine: {} {}", self.program.display(), args.join(" "));

        let mut child = cmd.spawn().map_err(|e| {
            EngineError::terminated(format!("failed to spawn {}: {}", self.program.display(), e))
        })?;

        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::terminated("failed to capture engine stderr"))?;

        let mut monitor = StderrMonitor::default();
        let mut buf = [0u8; 4096];
        loop {
            let n = stderr
                .read(&mut buf)
                .await
                .map_err(|e| EngineError::io("reading engine stderr", e))?;
            if n == 0 {
                break;
            }
            monitor.feed(&buf[..n], on_progress);
        }
        monitor.finish(on_progress);

        let status = child
            .wait()
            .await
            .map_err(|e| EngineError::terminated(format!("engine process error: {}", e)))?;

        if status.success() {
            return Ok(());
        }

        match status.code() {
            Some(code) => Err(EngineError::command_failed(code, monitor.tail())),
            // No exit code means the process was killed by a signal.
            None => Err(EngineError::terminated(format!(
                "engine killed by signal: {}",
                monitor.tail()
            ))),
        }
    }

    async fn terminate(&self) {
        if self.terminated.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = tokio::fs::remove_dir_all(&self.scratch).await {
            tracing::warn!(
                "Failed to remove engine scratch dir {}: {}",
                self.scratch.display(),
                e
            );
        }
    }
}

/// Incremental stderr parser: splits lines on `\r` or `\n`, keeps a tail
/// for error messages and turns `time=` values into ratios.
#[derive(Default)]
struct StderrMonitor {
    pending: String,
    tail: VecDeque<String>,
    duration: Option<f64>,
}

impl StderrMonitor {
    fn feed(&mut self, chunk: &[u8], on_progress: RatioCallback<'_>) {
        self.pending.push_str(&String::from_utf8_lossy(chunk));
        while let Some(pos) = self.pending.find(['\r', '\n']) {
            let line: String = self.pending.drain(..=pos).collect();
            self.line(line.trim_end_matches(['\r', '\n']), on_progress);
        }
    }

    fn finish(&mut self, on_progress: RatioCallback<'_>) {
        let rest = std::mem::take(&mut self.pending);
        self.line(&rest, on_progress);
    }

    fn line(&mut self, line: &str, on_progress: RatioCallback<'_>) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        if self.duration.is_none() {
            if let Some(total) = parse_duration_header(line) {
                self.duration = Some(total);
            }
        }
        if let (Some(total), Some(elapsed)) = (self.duration, parse_time_field(line)) {
            if total > 0.0 {
                on_progress((elapsed / total).clamp(0.0, 1.0));
            }
        }

        if self.tail.len() == STDERR_TAIL_LINES {
            self.tail.pop_front();
        }
        self.tail.push_back(line.to_string());
    }

    fn tail(&self) -> String {
        self.tail.iter().cloned().collect::<Vec<_>>().join("\n")
    }
}

/// Parse `HH:MM:SS.xx` into seconds.
fn parse_timestamp(value: &str) -> Option<f64> {
    let mut parts = value.trim().split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || hours < 0.0 || minutes < 0.0 || seconds < 0.0 {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// `Duration: 00:01:02.50, start: ...` gives the input length in seconds.
fn parse_duration_header(line: &str) -> Option<f64> {
    let rest = line.strip_prefix("Duration:")?;
    let value = rest.split(',').next()?;
    parse_timestamp(value)
}

/// `... time=00:00:12.34 bitrate=...` gives the position reached.
fn parse_time_field(line: &str) -> Option<f64> {
    let start = line.find("time=")? + "time=".len();
    let value = line[start..].split_whitespace().next()?;
    parse_timestamp(value)
}

/// Creates [`ProcessEngine`] instances.
pub struct ProcessEngineFactory {
    scratch_root: PathBuf,
}

impl ProcessEngineFactory {
    pub fn new(scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            scratch_root: scratch_root.into(),
        }
    }

    async fn instantiate(&self, program: PathBuf) -> EngineResult<Arc<dyn MediaEngine>> {
        let engine = ProcessEngine::create(program, &self.scratch_root).await?;
        Ok(Arc::new(engine))
    }
}

#[async_trait]
impl EngineFactory for ProcessEngineFactory {
    async fn init_direct(&self, source: &EngineSource) -> EngineResult<Arc<dyn MediaEngine>> {
        if source.is_remote() {
            return Err(EngineError::unavailable(format!(
                "{} is remote and must be staged",
                source.location
            )));
        }
        let location = source
            .location
            .strip_prefix("file://")
            .unwrap_or(&source.location);
        let program = resolve_program(location, source.artifacts.first().map(String::as_str))?;
        self.instantiate(program).await
    }

    async fn init_staged(
        &self,
        source: &EngineSource,
        artifacts: &[LocalArtifact],
    ) -> EngineResult<Arc<dyn MediaEngine>> {
        let executable = artifacts.first().ok_or_else(|| {
            EngineError::unavailable(format!("{} staged no artifacts", source.name))
        })?;
        if !executable.path.is_file() {
            return Err(EngineError::unavailable(format!(
                "staged artifact missing: {}",
                executable.path.display()
            )));
        }
        self.instantiate(executable.path.clone()).await
    }
}

/// Resolve a local location to an executable path.
///
/// A directory is joined with the first artifact (or `ffmpeg`); a path with
/// separators must exist; a bare name is searched on `PATH`.
fn resolve_program(location: &str, first_artifact: Option<&str>) -> EngineResult<PathBuf> {
    let path = Path::new(location);

    if path.is_dir() {
        let candidate = path.join(first_artifact.unwrap_or("ffmpeg"));
        return if candidate.is_file() {
            Ok(candidate)
        } else {
            Err(EngineError::unavailable(format!(
                "{} not found",
                candidate.display()
            )))
        };
    }

    if path.components().count() > 1 || path.is_absolute() {
        return if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(EngineError::unavailable(format!("{} not found", location)))
        };
    }

    search_path(location)
        .ok_or_else(|| EngineError::unavailable(format!("{} not found on PATH", location)))
}

fn search_path(program: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths).find_map(|dir| {
        let candidate = dir.join(format!("{}{}", program, std::env::consts::EXE_SUFFIX));
        candidate.is_file().then_some(candidate)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn parses_timestamps() {
        assert_eq!(parse_timestamp("00:00:10.50"), Some(10.5));
        assert_eq!(parse_timestamp("01:02:03"), Some(3723.0));
        assert_eq!(parse_timestamp("N/A"), None);
        assert_eq!(parse_timestamp("1:2:3:4"), None);
    }

    #[test]
    fn reads_duration_and_time_fields() {
        assert_eq!(
            parse_duration_header("Duration: 00:01:40.00, start: 0.000000, bitrate: 128 kb/s"),
            Some(100.0)
        );
        assert_eq!(
            parse_time_field("size=     256kB time=00:00:25.00 bitrate= 83.9kbits/s speed=50x"),
            Some(25.0)
        );
        assert_eq!(parse_time_field("time=N/A bitrate=N/A"), None);
    }

    #[test]
    fn monitor_reports_ratios_across_chunks() {
        let seen = Mutex::new(Vec::new());
        let report = |r: f64| seen.lock().push(r);
        let mut monitor = StderrMonitor::default();

        monitor.feed(b"  Duration: 00:00:10.00, start: 0.0\n", &report);
        monitor.feed(b"size=1kB time=00:00:0", &report);
        monitor.feed(b"2.50 bitrate=1k\rsize=2kB time=00:00:05.00 bitrate=1k\r", &report);
        monitor.feed(b"size=3kB time=00:00:20.00 bitrate=1k", &report);
        monitor.finish(&report);

        assert_eq!(*seen.lock(), vec![0.25, 0.5, 1.0]);
    }

    #[test]
    fn monitor_keeps_bounded_tail() {
        let mut monitor = StderrMonitor::default();
        for i in 0..30 {
            monitor.feed(format!("line {}\n", i).as_bytes(), &|_r: f64| {});
        }
        let tail = monitor.tail();
        assert_eq!(tail.lines().count(), STDERR_TAIL_LINES);
        assert!(tail.starts_with("line 10"));
        assert!(tail.ends_with("line 29"));
    }

    #[test]
    fn rejects_names_outside_scratch() {
        assert!(validate_name("input_1.mp4").is_ok());
        for bad in ["", ".", "..", "../etc/passwd", "a/b", "a\\b"] {
            assert!(matches!(validate_name(bad), Err(EngineError::InvalidName(_))), "{bad}");
        }
    }

    #[tokio::test]
    async fn scratch_filesystem_round_trip_and_terminate() {
        let root = tempfile::tempdir().unwrap();
        let engine = ProcessEngine::create(PathBuf::from("ffmpeg"), root.path())
            .await
            .unwrap();

        engine.write_file("clip.mp4", b"data").await.unwrap();
        assert_eq!(engine.read_file("clip.mp4").await.unwrap(), b"data");
        engine.delete_file("clip.mp4").await.unwrap();
        assert!(matches!(
            engine.read_file("clip.mp4").await,
            Err(EngineError::NotFound(_))
        ));

        let scratch = engine.scratch_dir().to_path_buf();
        engine.terminate().await;
        assert!(!scratch.exists());
        assert!(matches!(
            engine.write_file("x", b"y").await,
            Err(EngineError::Terminated(_))
        ));
    }

    #[tokio::test]
    async fn direct_init_rejects_remote_and_missing_locations() {
        let root = tempfile::tempdir().unwrap();
        let factory = ProcessEngineFactory::new(root.path());

        let remote = EngineSource::new("cdn", "https://cdn.example/ffmpeg", vec!["ffmpeg".into()]);
        assert!(matches!(
            factory.init_direct(&remote).await,
            Err(EngineError::Unavailable(_))
        ));

        let missing = EngineSource::new("local", root.path().join("nope/ffmpeg").display().to_string(), vec![]);
        assert!(matches!(
            factory.init_direct(&missing).await,
            Err(EngineError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn direct_init_resolves_directory_with_artifact() {
        let root = tempfile::tempdir().unwrap();
        let bin = root.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::write(bin.join("ffmpeg"), b"#!/bin/sh\n").unwrap();

        let factory = ProcessEngineFactory::new(root.path().join("scratch"));
        let source = EngineSource::new("local", bin.display().to_string(), vec!["ffmpeg".into()]);
        assert!(factory.init_direct(&source).await.is_ok());
    }
}
