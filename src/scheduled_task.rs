use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use rocket::tokio::{
    self,
    task::{JoinError, JoinHandle},
    time::Duration,
};

/// A task that runs once at a given instant unless cancelled first.
pub struct ScheduledTask<T> {
    handle: JoinHandle<T>,
    run_at: DateTime<Utc>,
}

impl<T> ScheduledTask<T>
where
    T: Send + 'static,
{
    /// Spawn `task` to run at `run_at`, or immediately if that has passed.
    pub fn new<Fut>(task: Fut, run_at: DateTime<Utc>) -> Self
    where
        Fut: Future<Output = T> + Send + 'static,
    {
        let delay = duration_until(run_at);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await
        });
        Self { handle, run_at }
    }

    pub fn run_at(&self) -> DateTime<Utc> {
        self.run_at
    }

    /// Cancel the task. Returns true iff it had already completed.
    pub async fn cancel(self) -> bool {
        self.handle.abort();
        self.handle.await.is_ok()
    }
}

impl<T> Future for ScheduledTask<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx)
    }
}

/// Time from now until `instant`, zero if it has passed.
fn duration_until(instant: DateTime<Utc>) -> Duration {
    (instant - Utc::now()).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rocket::async_test]
    async fn runs_at_the_scheduled_instant() {
        let run_at = Utc::now() + chrono::Duration::milliseconds(50);
        let task = ScheduledTask::new(async { Utc::now() }, run_at);
        assert_eq!(task.run_at(), run_at);
        let ran_at = task.await.unwrap();
        assert!(ran_at >= run_at);
    }

    #[rocket::async_test]
    async fn past_instants_run_immediately() {
        let task = ScheduledTask::new(async { 7 }, Utc::now() - chrono::Duration::hours(1));
        assert_eq!(task.await.unwrap(), 7);
    }

    #[rocket::async_test]
    async fn cancelled_tasks_never_run() {
        let task = ScheduledTask::new(async { 7 }, Utc::now() + chrono::Duration::hours(1));
        assert!(!task.cancel().await);
    }
}
