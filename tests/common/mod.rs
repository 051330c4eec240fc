#![allow(dead_code)]

use anyhow::{anyhow, Result};
use futures::future::BoxFuture;
use pingback::clock::Clock;
use pingback::descriptor::Request;
use pingback::http::Transport;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::subscriber::DefaultGuard;

/// One scripted transport result
pub enum Reply {
    Ok(Value),
    Fail(&'static str),
    /// Resolves whenever the test sends through the paired sender
    Gate(oneshot::Receiver<Result<Value, String>>),
}

/// Transport that plays back scripted replies and records every call
///
/// Once the script is exhausted every call succeeds with `{}`.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    calls: Arc<Mutex<Vec<(Request, Instant)>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, reply: Reply) -> &Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn fail_times(&self, n: usize) -> &Self {
        for _ in 0..n {
            self.push(Reply::Fail("collector unavailable"));
        }
        self
    }

    /// Queues a reply the test resolves later
    pub fn gate(&self) -> oneshot::Sender<Result<Value, String>> {
        let (tx, rx) = oneshot::channel();
        self.push(Reply::Gate(rx));
        tx
    }

    pub fn calls(&self) -> Vec<Request> {
        self.calls.lock().unwrap().iter().map(|(r, _)| r.clone()).collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Virtual instants at which calls were made
    pub fn instants(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }

    /// Virtual time elapsed between consecutive calls, in milliseconds
    pub fn gaps_ms(&self) -> Vec<u128> {
        let calls = self.calls.lock().unwrap();
        calls
            .windows(2)
            .map(|pair| pair[1].1.duration_since(pair[0].1).as_millis())
            .collect()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: Request) -> BoxFuture<'static, Result<Value>> {
        self.calls.lock().unwrap().push((request, Instant::now()));
        let reply = self.replies.lock().unwrap().pop_front();
        Box::pin(async move {
            match reply {
                None => Ok(json!({})),
                Some(Reply::Ok(value)) => Ok(value),
                Some(Reply::Fail(msg)) => Err(anyhow!(msg)),
                Some(Reply::Gate(rx)) => match rx.await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(msg)) => Err(anyhow!(msg)),
                    Err(_) => Err(anyhow!("gate dropped")),
                },
            }
        })
    }
}

/// Clock returning `start`, `start + 1`, ... and counting how often it was read
#[derive(Debug)]
pub struct CountingClock {
    next: AtomicI64,
    reads: AtomicUsize,
}

impl CountingClock {
    pub fn new(start: i64) -> Arc<Self> {
        Arc::new(Self {
            next: AtomicI64::new(start),
            reads: AtomicUsize::new(0),
        })
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl Clock for CountingClock {
    fn timestamp_ms(&self) -> i64 {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}

/// Captures formatted log lines of the current thread
#[derive(Clone, Default)]
pub struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for CaptureWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LogCapture {
    /// Installs a capturing subscriber for as long as the guard lives
    ///
    /// Tests run on tokio's current-thread runtime, so spawned controller
    /// tasks log through the same thread-local subscriber.
    pub fn install() -> (Self, DefaultGuard) {
        let capture = Self::default();
        let buf = Arc::clone(&capture.buf);
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || CaptureWriter(Arc::clone(&buf)))
            .with_ansi(false)
            .with_target(false)
            .with_max_level(tracing::Level::INFO)
            .without_time()
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn lines(&self) -> Vec<String> {
        let buf = self.buf.lock().unwrap();
        String::from_utf8_lossy(&buf).lines().map(str::to_string).collect()
    }

    /// Lines containing `needle`
    pub fn matching(&self, needle: &str) -> Vec<String> {
        self.lines().into_iter().filter(|l| l.contains(needle)).collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        !self.matching(needle).is_empty()
    }

    /// Position of the first line containing `needle`
    pub fn position(&self, needle: &str) -> Option<usize> {
        self.lines().iter().position(|l| l.contains(needle))
    }

    pub fn last(&self) -> Option<String> {
        self.lines().pop()
    }
}

/// Asserts virtual-time gaps, allowing for millisecond rounding of timer deadlines
pub fn assert_gaps(actual: &[u128], expected: &[u128]) {
    assert_eq!(actual.len(), expected.len(), "gaps {:?} vs {:?}", actual, expected);
    for (got, want) in actual.iter().zip(expected) {
        assert!(
            *got >= *want && *got <= *want + 1,
            "gaps {:?} do not match {:?}",
            actual,
            expected
        );
    }
}

/// Lets spawned tasks run until they block
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
