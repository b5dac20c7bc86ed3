//! Request-scoped deadline and cancellation
//!
//! Every repository call takes a [`RequestContext`]. The store request races the
//! context's deadline and cancellation token; whichever finishes first decides
//! the outcome. An interrupted call says nothing about whether the store
//! applied the request.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// Why a request stopped before the store answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    DeadlineExceeded,
    Cancelled,
}

impl fmt::Display for Interruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeadlineExceeded => write!(f, "deadline exceeded"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Owner side of a cancellation signal
#[derive(Debug)]
pub struct CancellationSource {
    sender: watch::Sender<bool>,
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationSource {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    /// Hands out a token observing this source
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            receiver: self.sender.subscribe(),
        }
    }

    /// Fires every token; idempotent
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }
}

/// Observer side of a cancellation signal
///
/// A token whose source was dropped without firing never fires.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    receiver: watch::Receiver<bool>,
}

impl CancellationToken {
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once the source fires
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();

        let fired = receiver.wait_for(|cancelled| *cancelled).await.is_ok();

        if !fired {
            std::future::pending::<()>().await;
        }
    }
}

/// Deadline and cancellation supplied by the caller
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
    token: Option<CancellationToken>,
}

impl RequestContext {
    /// No deadline, no cancellation
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Sets the deadline; an earlier existing deadline wins
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.token
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Drives `future` until it completes, the deadline passes or the token fires
    pub async fn run<F>(&self, future: F) -> Result<F::Output, Interruption>
    where
        F: Future,
    {
        if self.is_cancelled() {
            return Err(Interruption::Cancelled);
        }

        if self.deadline.is_some_and(|deadline| deadline <= Instant::now()) {
            return Err(Interruption::DeadlineExceeded);
        }

        let cancelled = async {
            match &self.token {
                Some(token) => token.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };

        let bounded = async {
            match self.deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, future)
                    .await
                    .map_err(|_| Interruption::DeadlineExceeded),
                None => Ok(future.await),
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Err(Interruption::Cancelled),
            result = bounded => result,
        }
    }
}
