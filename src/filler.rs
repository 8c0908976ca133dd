//! Background frame decoding.
//!
//! The presentation side hands the worker batches of indices over a bounded queue and
//! never waits on it. The worker decodes in order and answers each index with a
//! [`FillCompletion`] on a second bounded queue, which the cache drains under its own
//! lock. The worker only reaches the cache through a [`WeakProxy`], so it can neither
//! keep the cache alive nor write into it after teardown.

use crate::anim_log;
use crate::cache::FrameCache;
use crate::diagnostics::LogLevel;
use crate::guard::WeakProxy;
use crate::predraw::prepare_frame;
use crate::provider::{Frame, FrameProvider};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub const FILLER_THREAD_NAME: &str = "wk-frame-filler";

#[derive(Debug)]
pub(crate) enum FillCommand {
    Fill(Vec<usize>),
    Shutdown,
}

#[derive(Debug)]
pub(crate) enum FillOutcome {
    Decoded(Frame),
    Failed,
    /// Already cached or no longer inside the window when the worker got to it.
    Discarded,
}

#[derive(Debug)]
pub(crate) struct FillCompletion {
    pub index: usize,
    pub outcome: FillOutcome,
}

/// Presentation-side end of the request queue.
#[derive(Debug)]
pub(crate) struct BackgroundFiller {
    requests: SyncSender<FillCommand>,
}

impl BackgroundFiller {
    pub fn new(requests: SyncSender<FillCommand>) -> Self {
        Self { requests }
    }

    /// Never blocks; a full queue rejects the batch.
    pub fn request(&self, batch: Vec<usize>) -> Result<(), TrySendError<FillCommand>> {
        self.requests.try_send(FillCommand::Fill(batch))
    }

    pub fn shutdown(&self) {
        let _ = self.requests.try_send(FillCommand::Shutdown);
    }
}

pub(crate) struct FillWorker {
    pub requests: Receiver<FillCommand>,
    pub completions: SyncSender<FillCompletion>,
    pub cache: WeakProxy<FrameCache>,
    pub provider: Arc<dyn FrameProvider>,
    pub predrawing: bool,
}

impl FillWorker {
    pub fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(FILLER_THREAD_NAME.into())
            .spawn(move || self.run())
    }

    fn run(self) {
        anim_log!(
            LogLevel::Debug,
            "Frame filler started for {} frames",
            self.provider.frame_count()
        );

        while let Ok(command) = self.requests.recv() {
            let batch = match command {
                FillCommand::Fill(batch) => batch,
                FillCommand::Shutdown => break,
            };
            if !self.fill(batch) {
                break;
            }
        }

        anim_log!(LogLevel::Debug, "Frame filler exiting");
    }

    /// Returns `false` once the cache has gone away.
    fn fill(&self, batch: Vec<usize>) -> bool {
        for index in batch {
            let wanted = match self.cache.with(|cache| cache.wants(index)) {
                Some(wanted) => wanted,
                None => return false,
            };

            let outcome = if wanted {
                self.decode(index)
            } else {
                FillOutcome::Discarded
            };

            if !self.cache.is_alive() {
                anim_log!(
                    LogLevel::Debug,
                    "Dropping frame {} decoded after teardown",
                    index
                );
                return false;
            }

            if self.completions.send(FillCompletion { index, outcome }).is_err() {
                return false;
            }
        }
        true
    }

    fn decode(&self, index: usize) -> FillOutcome {
        let provider = &self.provider;
        let decoded = panic::catch_unwind(AssertUnwindSafe(|| provider.decoded_frame(index)));

        match decoded {
            Ok(Ok(image)) => {
                anim_log!(LogLevel::Verbose, "Decoded frame {}", index);
                FillOutcome::Decoded(prepare_frame(image, self.predrawing))
            }
            Ok(Err(e)) => {
                anim_log!(LogLevel::Error, "Failed to decode frame {}: {}", index, e);
                FillOutcome::Failed
            }
            Err(_) => {
                anim_log!(LogLevel::Error, "Frame provider panicked decoding frame {}", index);
                FillOutcome::Failed
            }
        }
    }
}
