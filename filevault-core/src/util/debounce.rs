//! src/util/debounce.rs
//! ============================================================================
//! # Input Debouncing
//!
//! Trailing-edge debouncer for rapidly-changing input such as a search box.
//! Every new value resets the quiet-period timer; only the final value of a
//! burst is emitted once the input has been stable for the full period.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::trace;

/// Debouncing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebounceConfig {
    /// How long the input must stay unchanged before a value is emitted.
    #[serde(with = "humantime_serde")]
    pub quiet_period: Duration,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            // Wait 500ms after the last keystroke
            quiet_period: Duration::from_millis(500),
        }
    }
}

/// Trailing-edge debouncer.
///
/// Superseded values are discarded silently; there is no explicit cancel
/// entrypoint. Dropping the `Debouncer` (or the output receiver) shuts the
/// worker down.
#[derive(Debug)]
pub struct Debouncer<T> {
    input_tx: mpsc::UnboundedSender<T>,
}

impl<T: Send + 'static> Debouncer<T> {
    /// Create a debouncer and the receiver its settled values arrive on.
    #[must_use]
    pub fn new(config: DebounceConfig) -> (Self, mpsc::UnboundedReceiver<T>) {
        let (input_tx, mut input_rx) = mpsc::unbounded_channel::<T>();
        let (output_tx, output_rx) = mpsc::unbounded_channel::<T>();
        let quiet: Duration = config.quiet_period;

        tokio::spawn(async move {
            let mut pending: Option<T> = None;

            loop {
                match pending.take() {
                    // Idle: wait for the next value.
                    None => match input_rx.recv().await {
                        Some(value) => pending = Some(value),
                        None => break,
                    },

                    // Armed: a newer value resets the timer and replaces the
                    // held one; an elapsed timer emits it.
                    Some(value) => {
                        tokio::select! {
                            next = input_rx.recv() => match next {
                                Some(newer) => {
                                    trace!("debounce timer reset by newer input");
                                    pending = Some(newer);
                                }
                                None => break,
                            },
                            () = sleep(quiet) => {
                                if output_tx.send(value).is_err() {
                                    break;
                                }
                            }
                        }
                    }
                }
            }
        });

        (Self { input_tx }, output_rx)
    }

    /// Submit a new input value.
    pub fn push(&self, value: T) {
        let _ = self.input_tx.send(value);
    }
}
