//! In-memory `Transfer` for tests
//!
//! `RecordingTransfer` never spawns a process. Copies write a small file
//! at the destination so downstream code finds something on disk.

use crate::transfer::Transfer;
use crate::{Error, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferCall {
    Copy { src: String, dst: String },
    Sync { src: String, dst: String },
    List { uri: String },
}

#[derive(Default)]
struct State {
    calls: Vec<TransferCall>,
    fail_copies: bool,
    fail_sync_at: Option<usize>,
    cancel_after_syncs: Option<(usize, CancellationToken)>,
}

#[derive(Default)]
pub struct RecordingTransfer {
    content: Vec<u8>,
    listing: String,
    state: Mutex<State>,
}

impl RecordingTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written by every copy
    pub fn with_content(mut self, content: &[u8]) -> Self {
        self.content = content.to_vec();
        self
    }

    /// Text returned by `list`
    pub fn with_listing<S: Into<String>>(mut self, listing: S) -> Self {
        self.listing = listing.into();
        self
    }

    pub fn fail_copies(&self, fail: bool) {
        self.lock().fail_copies = fail;
    }

    /// The n-th sync (1-based) fails
    pub fn fail_sync_at(&self, n: usize) {
        self.lock().fail_sync_at = Some(n);
    }

    /// Cancel `token` once `n` syncs have completed
    pub fn cancel_after_syncs(&self, n: usize, token: CancellationToken) {
        self.lock().cancel_after_syncs = Some((n, token));
    }

    pub fn calls(&self) -> Vec<TransferCall> {
        self.lock().calls.clone()
    }

    pub fn copy_count(&self) -> usize {
        self.count(|c| matches!(c, TransferCall::Copy { .. }))
    }

    pub fn sync_count(&self) -> usize {
        self.count(|c| matches!(c, TransferCall::Sync { .. }))
    }

    fn count(&self, pred: impl Fn(&TransferCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| pred(c)).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn failed(command: String) -> Error {
        Error::TransferFailed {
            command,
            status: "exit code 1".to_string(),
            stderr: "simulated failure".to_string(),
        }
    }
}

#[async_trait]
impl Transfer for RecordingTransfer {
    async fn copy(&self, src: &str, dst: &str) -> Result<()> {
        let fail = {
            let mut state = self.lock();
            state.calls.push(TransferCall::Copy {
                src: src.to_string(),
                dst: dst.to_string(),
            });
            state.fail_copies
        };
        if fail {
            return Err(Self::failed(format!("aws s3 cp {src} {dst}")));
        }
        let dst = Path::new(dst);
        if let Some(parent) = dst.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dst, &self.content).await?;
        Ok(())
    }

    async fn sync(&self, src: &str, dst: &str) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(TransferCall::Sync {
            src: src.to_string(),
            dst: dst.to_string(),
        });
        let n = state
            .calls
            .iter()
            .filter(|c| matches!(c, TransferCall::Sync { .. }))
            .count();
        if state.fail_sync_at == Some(n) {
            return Err(Self::failed(format!("aws s3 sync {src} {dst}")));
        }
        if let Some((after, token)) = &state.cancel_after_syncs {
            if n >= *after {
                token.cancel();
            }
        }
        Ok(())
    }

    async fn list(&self, uri: &str) -> Result<String> {
        self.lock().calls.push(TransferCall::List {
            uri: uri.to_string(),
        });
        Ok(self.listing.clone())
    }
}
