//! Bounded worker pool
//!
//! Tasks run cooperatively on the calling task and are gated by a
//! `tokio::sync::Semaphore`. Every task runs to completion; a failing task never
//! cancels its siblings. Results come back in submission order.

use futures::future::join_all;
use std::future::Future;
use tokio::sync::Semaphore;

#[derive(Debug, Clone, Copy)]
pub struct BoundedPool {
    limit: usize,
}

impl BoundedPool {
    /// A limit of 0 is treated as 1
    pub fn new(limit: usize) -> Self {
        Self { limit: limit.max(1) }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Run `task` for every input with at most `limit` futures executing at once
    pub async fn run_all<I, F, Fut>(&self, inputs: I, task: F) -> Vec<Fut::Output>
    where
        I: IntoIterator,
        F: Fn(I::Item) -> Fut,
        Fut: Future,
    {
        let semaphore = Semaphore::new(self.limit);
        let semaphore = &semaphore;

        let pending = inputs.into_iter().map(|input| {
            let work = task(input);
            async move {
                // The semaphore is never closed, so acquire only fails if it is dropped
                let _permit = semaphore.acquire().await.ok();
                work.await
            }
        });

        join_all(pending).await
    }
}
