use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error};

use crate::client::LoadError;
use crate::data::FeedSource;
use crate::model::Post;

pub type LoadResult = Result<Vec<Post>, LoadError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// A fetch was started.
    Started,
    /// A fetch is already running; one follow-up fetch is queued behind it.
    Queued,
}

/// Runs fetches against a [`FeedSource`] on a worker thread, at most one at a
/// time. Requests made while a fetch is running collapse into a single
/// follow-up fetch.
pub struct Loader {
    source: Arc<dyn FeedSource>,
    tx: Sender<LoadResult>,
    rx: Receiver<LoadResult>,
    in_flight: bool,
    queued: bool,
    requested: u64,
    started: u64,
}

impl Loader {
    pub fn new(source: Arc<dyn FeedSource>) -> Self {
        let (tx, rx) = unbounded();
        Self {
            source,
            tx,
            rx,
            in_flight: false,
            queued: false,
            requested: 0,
            started: 0,
        }
    }

    pub fn request(&mut self) -> Request {
        self.requested += 1;
        if self.in_flight {
            self.queued = true;
            return Request::Queued;
        }
        self.spawn();
        Request::Started
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight || self.queued
    }

    /// Number of `request` calls, including coalesced ones.
    pub fn requested(&self) -> u64 {
        self.requested
    }

    /// Number of fetches actually started.
    pub fn started(&self) -> u64 {
        self.started
    }

    /// Non-blocking: returns a finished fetch, if any.
    pub fn poll(&mut self) -> Option<LoadResult> {
        let result = self.rx.try_recv().ok()?;
        self.finish();
        Some(result)
    }

    /// Blocks up to `timeout` for the running fetch.
    pub fn wait(&mut self, timeout: Duration) -> Option<LoadResult> {
        if !self.in_flight {
            return None;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(result) => {
                self.finish();
                Some(result)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    fn finish(&mut self) {
        self.in_flight = false;
        if self.queued {
            self.queued = false;
            self.spawn();
        }
    }

    fn spawn(&mut self) {
        self.in_flight = true;
        self.started += 1;
        debug!("loader: starting fetch #{}", self.started);
        let source = self.source.clone();
        let tx = self.tx.clone();
        thread::spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| source.fetch()))
                .unwrap_or_else(|_| {
                    error!("loader: feed source panicked");
                    Err(LoadError::Transport("feed source panicked".into()))
                });
            let _ = tx.send(result);
        });
    }
}
