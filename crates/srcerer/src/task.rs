// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Async task composition.
//!
//! Two small primitives drive every multi-step operation in srcerer:
//!
//! - [`Sequence`]: steps run one at a time, in push order. Steps may be
//!   appended through a [`SequenceHandle`] while the sequence is running.
//! - [`Join`]: steps are polled concurrently; the composition completes when
//!   every step has completed. An empty join completes immediately.
//!
//! A step is any future. Completing the future is the step's completion
//! signal. Neither primitive retries: a step that never completes stalls its
//! composition.

use futures_util::future::{join_all, BoxFuture};
use std::future::Future;
use tokio::sync::mpsc;

/// A boxed unit step.
pub type Step<'a> = BoxFuture<'a, ()>;

/// Ordered step runner.
///
/// ```rust,ignore
/// let seq = Sequence::new();
/// seq.push(async { load_manifest().await });
/// seq.push(async { compile().await });
/// seq.then(|| println!("done")).await;
/// ```
pub struct Sequence<'a> {
    tx: mpsc::UnboundedSender<Step<'a>>,
    rx: mpsc::UnboundedReceiver<Step<'a>>,
}

/// Cloneable handle for appending steps to a [`Sequence`].
///
/// Steps pushed while the sequence is running are executed after the steps
/// already queued. Steps pushed after the sequence finished are dropped.
#[derive(Clone)]
pub struct SequenceHandle<'a> {
    tx: mpsc::UnboundedSender<Step<'a>>,
}

impl<'a> SequenceHandle<'a> {
    /// Appends a step.
    pub fn push<F>(&self, step: F)
    where
        F: Future<Output = ()> + Send + 'a,
    {
        if self.tx.send(Box::pin(step)).is_err() {
            tracing::warn!("sequence already finished, step dropped");
        }
    }
}

impl<'a> Sequence<'a> {
    /// Creates an empty sequence.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// Returns a handle that can append steps, including from inside a
    /// running step.
    pub fn handle(&self) -> SequenceHandle<'a> {
        SequenceHandle {
            tx: self.tx.clone(),
        }
    }

    /// Appends a step.
    pub fn push<F>(&self, step: F)
    where
        F: Future<Output = ()> + Send + 'a,
    {
        // The receiver lives as long as `self`, so this send cannot fail.
        let _ = self.tx.send(Box::pin(step));
    }

    /// Runs queued steps one at a time until the queue is empty.
    ///
    /// Returns the number of steps that ran.
    pub async fn run(mut self) -> usize {
        let mut count = 0;
        while let Ok(step) = self.rx.try_recv() {
            step.await;
            count += 1;
        }
        count
    }

    /// Runs every queued step, then the terminal action.
    pub async fn then<T, F>(self, terminal: F) -> T
    where
        F: FnOnce() -> T,
    {
        self.run().await;
        terminal()
    }
}

impl Default for Sequence<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Fan-out/fan-in step runner.
///
/// Results are returned in push order, regardless of completion order.
pub struct Join<'a, T = ()> {
    steps: Vec<BoxFuture<'a, T>>,
}

impl<'a, T: 'a> Join<'a, T> {
    /// Creates an empty join.
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Adds a step.
    pub fn push<F>(&mut self, step: F)
    where
        F: Future<Output = T> + Send + 'a,
    {
        self.steps.push(Box::pin(step));
    }

    /// Number of queued steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether no step was queued.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Starts every step and waits for all of them.
    pub async fn run(self) -> Vec<T> {
        if self.steps.is_empty() {
            return Vec::new();
        }
        join_all(self.steps).await
    }

    /// Waits for every step, then hands the results to `action`.
    pub async fn then<R, F>(self, action: F) -> R
    where
        F: FnOnce(Vec<T>) -> R,
    {
        let results = self.run().await;
        action(results)
    }
}

impl<'a, T: 'a> Default for Join<'a, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T: 'a> FromIterator<BoxFuture<'a, T>> for Join<'a, T> {
    fn from_iter<I: IntoIterator<Item = BoxFuture<'a, T>>>(iter: I) -> Self {
        Self {
            steps: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn sequence_runs_steps_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let seq = Sequence::new();

        for i in 0..3 {
            let log = log.clone();
            seq.push(async move {
                // later steps sleep less; order must still hold
                tokio::time::sleep(Duration::from_millis(10 * (3 - i))).await;
                log.lock().unwrap().push(i);
            });
        }

        let ran = seq.run().await;
        assert_eq!(ran, 3);
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn sequence_accepts_steps_pushed_while_running() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let seq = Sequence::new();
        let handle = seq.handle();

        let first_log = log.clone();
        seq.push(async move {
            first_log.lock().unwrap().push("first");
            let late_log = first_log.clone();
            handle.push(async move {
                late_log.lock().unwrap().push("appended");
            });
        });
        let second_log = log.clone();
        seq.push(async move {
            second_log.lock().unwrap().push("second");
        });

        let terminal_log = log.clone();
        seq.then(move || terminal_log.lock().unwrap().push("terminal"))
            .await;

        assert_eq!(
            *log.lock().unwrap(),
            vec!["first", "second", "appended", "terminal"]
        );
    }

    #[tokio::test]
    async fn empty_sequence_runs_terminal() {
        let seq = Sequence::new();
        assert_eq!(seq.then(|| 7).await, 7);
    }

    #[tokio::test]
    async fn empty_join_resolves_immediately() {
        let join: Join<'_, u32> = Join::new();
        assert!(join.is_empty());
        let total = join.then(|results| results.len()).await;
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn join_polls_steps_concurrently() {
        // The first step can only finish once the second one ran.
        let (tx, rx) = oneshot::channel::<u32>();
        let mut join = Join::new();
        join.push(async move { rx.await.unwrap_or(0) });
        join.push(async move {
            let _ = tx.send(41);
            1
        });

        let results = tokio::time::timeout(Duration::from_secs(1), join.run())
            .await
            .expect("join stalled");
        assert_eq!(results, vec![41, 1]);
    }

    #[tokio::test]
    async fn join_keeps_push_order() {
        let mut join = Join::new();
        for (i, delay) in [30u64, 0, 15].into_iter().enumerate() {
            join.push(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                i
            });
        }
        assert_eq!(join.run().await, vec![0, 1, 2]);
    }
}
