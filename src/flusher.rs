//! Background journal flusher
//!
//! Used with `SyncPolicy::Interval`: a dedicated thread runs a flush callback
//! on every tick until it is stopped or the callback reports that the store
//! has closed.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Sender};
use tracing::{debug, warn};

use crate::error::Result;

pub(crate) struct Flusher {
    /// Dropping this disconnects the thread's shutdown receiver
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl Flusher {
    /// Start a thread calling `tick` every `interval`
    ///
    /// The thread exits when `stop` is called or `tick` returns `false`.
    pub(crate) fn spawn<F>(interval: Duration, mut tick: F) -> Result<Self>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let (stop, shutdown) = channel::bounded::<()>(0);
        let ticker = channel::tick(interval);

        let handle = thread::Builder::new()
            .name("cairnkv-flusher".to_string())
            .spawn(move || {
                debug!(?interval, "flusher started");
                loop {
                    crossbeam::select! {
                        recv(ticker) -> _ => {
                            if !tick() {
                                break;
                            }
                        }
                        recv(shutdown) -> _ => break,
                    }
                }
                debug!("flusher stopped");
            })?;

        Ok(Self { stop, handle })
    }

    /// Signal the thread and wait for it to exit
    pub(crate) fn stop(self) {
        drop(self.stop);
        if self.handle.join().is_err() {
            warn!("flusher thread panicked");
        }
    }
}
