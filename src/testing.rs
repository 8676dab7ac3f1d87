//! Test doubles shared by the unit tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use crate::error::{Error, Result};
use crate::network::{NetworkRecord, NetworkTool, RouteFlag};

enum ListMode {
    Returning(std::result::Result<Vec<NetworkRecord>, String>),
    Pending,
    /// Answers popped one per call, each returned after its delay.
    Scripted(Mutex<VecDeque<(Duration, Vec<NetworkRecord>)>>),
}

/// Scriptable stand-in for the external network tool.
pub struct FakeTool {
    list: ListMode,
    set_error: Option<String>,
    gate: Option<Arc<Notify>>,
    pub list_calls: AtomicUsize,
    pub set_calls: Mutex<Vec<(String, RouteFlag, bool)>>,
}

impl FakeTool {
    fn with_mode(list: ListMode) -> Self {
        Self {
            list,
            set_error: None,
            gate: None,
            list_calls: AtomicUsize::new(0),
            set_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn returning(networks: Vec<NetworkRecord>) -> Self {
        Self::with_mode(ListMode::Returning(Ok(networks)))
    }

    pub fn failing(message: &str) -> Self {
        Self::with_mode(ListMode::Returning(Err(message.to_string())))
    }

    /// `list_networks` never completes.
    pub fn pending() -> Self {
        Self::with_mode(ListMode::Pending)
    }

    /// Each `list_networks` call takes the next scripted answer after its delay.
    pub fn scripted(answers: Vec<(Duration, Vec<NetworkRecord>)>) -> Self {
        Self::with_mode(ListMode::Scripted(Mutex::new(answers.into())))
    }

    /// `list_networks` waits for `gate` to be notified before answering.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn failing_set(mut self, message: &str) -> Self {
        self.set_error = Some(message.to_string());
        self
    }

    pub fn list_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NetworkTool for FakeTool {
    async fn list_networks(&self) -> Result<Vec<NetworkRecord>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match &self.list {
            ListMode::Returning(Ok(networks)) => Ok(networks.clone()),
            ListMode::Returning(Err(message)) => Err(Error::Tool(message.clone())),
            ListMode::Pending => std::future::pending().await,
            ListMode::Scripted(answers) => {
                let next = answers.lock().unwrap().pop_front();
                match next {
                    Some((delay, networks)) => {
                        tokio::time::sleep(delay).await;
                        Ok(networks)
                    }
                    None => Ok(Vec::new()),
                }
            }
        }
    }

    async fn set_flag(&self, network_id: &str, flag: RouteFlag, value: bool) -> Result<()> {
        self.set_calls
            .lock()
            .unwrap()
            .push((network_id.to_string(), flag, value));
        match &self.set_error {
            Some(message) => Err(Error::Tool(message.clone())),
            None => Ok(()),
        }
    }
}

/// In-memory log sink for asserting on `tracing` output.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    pub fn lines_containing(&self, needle: &str) -> Vec<String> {
        self.contents()
            .lines()
            .filter(|line| line.contains(needle))
            .map(str::to_string)
            .collect()
    }

    /// Runs `f` with a thread-local subscriber writing into this capture.
    pub fn scoped<T>(&self, f: impl FnOnce() -> T) -> T {
        let sink = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || sink.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .finish();
        tracing::subscriber::with_default(subscriber, f)
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
