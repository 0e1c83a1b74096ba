// THEORY:
// The `EventLogger` turns accepted centroid observations into an append-only,
// timestamped trajectory log.
//
// Key architectural principles:
// 1.  **Session Toggle**: Logging happens only while a session is open. A session is
//     opened by asking a `SinkFactory` for a fresh writer and closed by dropping it.
//     While closed, observations are ignored outright: nothing is buffered and
//     nothing is replayed on reopen.
// 2.  **Header Per Session**: Every successful open writes the header row first,
//     even when appending to a file that already has one. Reopening the same file
//     therefore leaves several header rows in it; readers are expected to skip them.
// 3.  **Contiguous Identities**: The id counter starts at 1, lives for the whole
//     process, and only advances when a record has actually been written. Ids are
//     never reused and never reloaded from an existing file.
// 4.  **Elapsed Time, Not Wall Clock**: Timestamps are the stream time handed in by
//     the caller (time since the stream started), split into whole minutes, seconds
//     within the minute and milliseconds within the second. Fields are not
//     zero-padded.
// 5.  **Degraded Mode**: If the sink cannot be opened or a write fails, the error is
//     returned and the session is left closed. Frame processing is unaffected.

use crate::core_modules::blob::BlobObservation;
use crate::error::{Result, TrailError};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// First row written after every session open.
pub const LOG_HEADER: &str = "ID, X, Y, Time";

/// Elapsed stream time split the way the log prints it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogTimestamp {
    pub minutes: u64,
    pub seconds: u64,
    pub milliseconds: u32,
}

impl LogTimestamp {
    pub fn from_elapsed(elapsed: Duration) -> Self {
        let whole = elapsed.as_secs();
        Self {
            minutes: whole / 60,
            seconds: whole % 60,
            milliseconds: elapsed.subsec_millis(),
        }
    }
}

impl fmt::Display for LogTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}.{}", self.minutes, self.seconds, self.milliseconds)
    }
}

/// One line of the trajectory log. Immutable once written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRecord {
    pub id: u64,
    /// Centroid x, truncated toward zero.
    pub x: i32,
    /// Centroid y, truncated toward zero.
    pub y: i32,
    pub time: LogTimestamp,
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}, {}", self.id, self.x, self.y, self.time)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closed,
}

/// Produces a writer each time a logging session opens.
pub trait SinkFactory {
    type Sink: Write;

    fn open_sink(&mut self) -> io::Result<Self::Sink>;

    /// Human-readable name of the destination, for diagnostics.
    fn describe(&self) -> String;
}

/// Opens (creating if needed) a file in append mode.
#[derive(Debug, Clone)]
pub struct AppendFile {
    path: PathBuf,
}

impl AppendFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SinkFactory for AppendFile {
    type Sink = File;

    fn open_sink(&mut self) -> io::Result<File> {
        OpenOptions::new().create(true).append(true).open(&self.path)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// An in-memory, cloneable log destination. Every clone appends to the same buffer.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded as UTF-8.
    pub fn contents(&self) -> String {
        match self.inner.lock() {
            Ok(buf) => String::from_utf8_lossy(&buf).into_owned(),
            Err(poisoned) => String::from_utf8_lossy(&poisoned.into_inner()).into_owned(),
        }
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut buf = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("log buffer lock poisoned"))?;
        buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SinkFactory for SharedBuffer {
    type Sink = SharedBuffer;

    fn open_sink(&mut self) -> io::Result<SharedBuffer> {
        Ok(self.clone())
    }

    fn describe(&self) -> String {
        "in-memory buffer".to_string()
    }
}

/// Emits one record per accepted observation while a session is open.
pub struct EventLogger<F: SinkFactory = AppendFile> {
    factory: F,
    sink: Option<F::Sink>,
    next_id: u64,
}

impl<F: SinkFactory> EventLogger<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            sink: None,
            next_id: 1,
        }
    }

    pub fn is_open(&self) -> bool {
        self.sink.is_some()
    }

    pub fn state(&self) -> SessionState {
        if self.is_open() { SessionState::Open } else { SessionState::Closed }
    }

    /// The id the next emitted record will carry.
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Opens a session and writes the header. Opening an already open session is
    /// a no-op.
    pub fn open(&mut self) -> Result<()> {
        if self.is_open() {
            return Ok(());
        }
        let sink_name = self.factory.describe();
        let mut sink = self
            .factory
            .open_sink()
            .map_err(|source| TrailError::LogSinkUnavailable {
                path: sink_name.clone(),
                source,
            })?;
        write_line(&mut sink, LOG_HEADER).map_err(|source| TrailError::LogSinkUnavailable {
            path: sink_name.clone(),
            source,
        })?;
        self.sink = Some(sink);
        tracing::info!(sink = %sink_name, "log session opened");
        Ok(())
    }

    /// Flushes and closes the session. Closing a closed session is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut sink) = self.sink.take() {
            sink.flush().map_err(TrailError::LogWrite)?;
            tracing::info!(sink = %self.factory.describe(), "log session closed");
        }
        Ok(())
    }

    /// Opens a closed session or closes an open one, returning the new state.
    pub fn toggle(&mut self) -> Result<SessionState> {
        if self.is_open() {
            self.close()?;
        } else {
            self.open()?;
        }
        Ok(self.state())
    }

    /// Writes a record for `observation` if a session is open.
    ///
    /// Returns `Ok(None)` while closed. On a write failure the session is closed and
    /// the id is not consumed.
    pub fn log_if_open(&mut self, observation: &BlobObservation, session_time: Duration) -> Result<Option<LogRecord>> {
        let Some(sink) = self.sink.as_mut() else {
            return Ok(None);
        };

        let record = LogRecord {
            id: self.next_id,
            x: observation.centroid.0 as i32,
            y: observation.centroid.1 as i32,
            time: LogTimestamp::from_elapsed(session_time),
        };

        if let Err(err) = write_line(sink, &record.to_string()) {
            self.sink = None;
            return Err(TrailError::LogWrite(err));
        }

        self.next_id += 1;
        tracing::info!(
            id = record.id,
            x = record.x,
            y = record.y,
            time = %record.time,
            "centroid logged"
        );
        Ok(Some(record))
    }
}

/// Writes `line` plus its terminator in one `write_all`, so a failing sink never
/// receives a partial row from a separate formatting call.
fn write_line<W: Write>(sink: &mut W, line: &str) -> io::Result<()> {
    let mut row = String::with_capacity(line.len() + 1);
    row.push_str(line);
    row.push('\n');
    sink.write_all(row.as_bytes())?;
    sink.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(x: f64, y: f64) -> BlobObservation {
        BlobObservation {
            area: 200.0,
            aspect_ratio: None,
            centroid: (x, y),
        }
    }

    /// A factory whose sinks always fail.
    struct Unwritable;

    impl SinkFactory for Unwritable {
        type Sink = Vec<u8>;

        fn open_sink(&mut self) -> io::Result<Vec<u8>> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        }

        fn describe(&self) -> String {
            "unwritable".into()
        }
    }

    /// Accepts a fixed number of `write` calls per session, then rejects the rest.
    /// Everything accepted lands in a shared buffer.
    struct LimitedSink {
        calls_left: usize,
        accepted: SharedBuffer,
    }

    impl Write for LimitedSink {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            if self.calls_left == 0 {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
            }
            self.calls_left -= 1;
            self.accepted.write(data)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct LimitedFactory {
        calls_per_session: usize,
        accepted: SharedBuffer,
    }

    impl SinkFactory for LimitedFactory {
        type Sink = LimitedSink;

        fn open_sink(&mut self) -> io::Result<LimitedSink> {
            Ok(LimitedSink {
                calls_left: self.calls_per_session,
                accepted: self.accepted.clone(),
            })
        }

        fn describe(&self) -> String {
            "limited".into()
        }
    }

    #[test]
    fn timestamp_splits_elapsed_time() {
        let t = LogTimestamp::from_elapsed(Duration::from_millis(125_042));
        assert_eq!(t, LogTimestamp { minutes: 2, seconds: 5, milliseconds: 42 });
        assert_eq!(t.to_string(), "2:5.42");
        assert_eq!(LogTimestamp::from_elapsed(Duration::ZERO).to_string(), "0:0.0");
    }

    #[test]
    fn record_format_matches_log_layout() {
        let record = LogRecord {
            id: 7,
            x: 12,
            y: 340,
            time: LogTimestamp::from_elapsed(Duration::from_millis(61_500)),
        };
        assert_eq!(record.to_string(), "7, 12, 340, 1:1.500");
    }

    #[test]
    fn closed_session_emits_nothing_and_keeps_the_counter() {
        let buffer = SharedBuffer::new();
        let mut logger = EventLogger::new(buffer.clone());
        for i in 0..10 {
            let out = logger.log_if_open(&obs(i as f64, 1.0), Duration::from_secs(i)).unwrap();
            assert!(out.is_none());
        }
        assert_eq!(logger.next_id(), 1);
        assert!(buffer.contents().is_empty());
    }

    #[test]
    fn open_session_emits_contiguous_ids() {
        let buffer = SharedBuffer::new();
        let mut logger = EventLogger::new(buffer.clone());
        logger.open().unwrap();
        let ids: Vec<u64> = (0..5)
            .map(|i| {
                logger
                    .log_if_open(&obs(10.7, 20.2), Duration::from_millis(i * 100))
                    .unwrap()
                    .unwrap()
                    .id
            })
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);

        let contents = buffer.contents();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], LOG_HEADER);
        assert_eq!(lines[1], "1, 10, 20, 0:0.0");
        assert_eq!(lines[5], "5, 10, 20, 0:0.400");
    }

    #[test]
    fn ids_continue_across_sessions_and_headers_repeat() {
        let buffer = SharedBuffer::new();
        let mut logger = EventLogger::new(buffer.clone());
        assert_eq!(logger.toggle().unwrap(), SessionState::Open);
        logger.log_if_open(&obs(1.0, 1.0), Duration::ZERO).unwrap();
        assert_eq!(logger.toggle().unwrap(), SessionState::Closed);
        assert!(logger.log_if_open(&obs(2.0, 2.0), Duration::ZERO).unwrap().is_none());
        assert_eq!(logger.toggle().unwrap(), SessionState::Open);
        let record = logger.log_if_open(&obs(3.0, 3.0), Duration::ZERO).unwrap().unwrap();
        assert_eq!(record.id, 2);

        let contents = buffer.contents();
        assert_eq!(contents.lines().filter(|l| *l == LOG_HEADER).count(), 2);
    }

    #[test]
    fn unavailable_sink_leaves_the_session_closed() {
        let mut logger = EventLogger::new(Unwritable);
        let err = logger.open().unwrap_err();
        assert!(matches!(err, TrailError::LogSinkUnavailable { .. }));
        assert_eq!(logger.state(), SessionState::Closed);
    }

    #[test]
    fn write_failure_closes_the_session_without_consuming_an_id() {
        let accepted = SharedBuffer::new();
        let mut logger = EventLogger::new(LimitedFactory {
            calls_per_session: 1,
            accepted: accepted.clone(),
        });
        logger.open().unwrap();
        let err = logger.log_if_open(&obs(12.0, 34.0), Duration::ZERO).unwrap_err();
        assert!(matches!(err, TrailError::LogWrite(_)));
        assert!(!logger.is_open());
        assert_eq!(logger.next_id(), 1);
        assert!(logger.log_if_open(&obs(12.0, 34.0), Duration::ZERO).unwrap().is_none());
        assert_eq!(accepted.contents(), "ID, X, Y, Time\n");
    }

    #[test]
    fn rejected_record_leaves_only_complete_lines() {
        let accepted = SharedBuffer::new();
        let mut logger = EventLogger::new(LimitedFactory {
            calls_per_session: 2,
            accepted: accepted.clone(),
        });
        logger.open().unwrap();
        logger.log_if_open(&obs(1.0, 2.0), Duration::ZERO).unwrap();
        assert!(logger.log_if_open(&obs(12.0, 34.0), Duration::ZERO).is_err());

        logger.open().unwrap();
        let record = logger.log_if_open(&obs(5.0, 6.0), Duration::from_secs(1)).unwrap().unwrap();
        assert_eq!(record.id, 2);

        assert_eq!(
            accepted.contents(),
            "ID, X, Y, Time\n1, 1, 2, 0:0.0\nID, X, Y, Time\n2, 5, 6, 0:1.0\n"
        );
    }

    #[test]
    fn append_file_keeps_previous_sessions() {
        let path = std::env::temp_dir().join(format!("trail_vision_log_{}.csv", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let mut logger = EventLogger::new(AppendFile::new(&path));
        logger.open().unwrap();
        logger.log_if_open(&obs(5.0, 6.0), Duration::from_secs(1)).unwrap();
        logger.close().unwrap();
        logger.open().unwrap();
        logger.log_if_open(&obs(7.0, 8.0), Duration::from_secs(2)).unwrap();
        logger.close().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "ID, X, Y, Time\n1, 5, 6, 0:1.0\nID, X, Y, Time\n2, 7, 8, 0:2.0\n");
        let _ = std::fs::remove_file(&path);
    }
}
