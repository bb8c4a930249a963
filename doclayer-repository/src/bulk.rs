//! Bulk execution engine.
//!
//! Every batched repository operation runs through one of two shapes:
//!
//! - [`itemized`] hands a [`BatchContext`] to a worker, which reports a
//!   success or a failure for every item by index. The engine then builds a
//!   [`BulkItemizedResponse`] in input order.
//! - [`counted`] hands the items to a worker that returns how many of them
//!   the store affected, producing a [`BulkCountedResponse`].
//!
//! Empty input never reaches the worker.

use crate::error::{RepositoryError, RepositoryResult};
use serde::Serialize;
use std::future::Future;
use tracing::warn;

/// Outcome of one item of an itemized batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkItemResult<T, R> {
    Success { input: T, result: R },
    Failure { input: T, error: RepositoryError },
}

impl<T, R> BulkItemResult<T, R> {
    pub fn input(&self) -> &T {
        match self {
            Self::Success { input, .. } | Self::Failure { input, .. } => input,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn result(&self) -> Option<&R> {
        match self {
            Self::Success { result, .. } => Some(result),
            Self::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&RepositoryError> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error, .. } => Some(error),
        }
    }

    /// Drops the input and keeps the outcome.
    pub fn into_result(self) -> RepositoryResult<R> {
        match self {
            Self::Success { result, .. } => Ok(result),
            Self::Failure { error, .. } => Err(error),
        }
    }
}

/// Per-item results of a batch, in input order.
///
/// `success + fail` always equals the number of inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItemizedResponse<T, R> {
    items: Vec<BulkItemResult<T, R>>,
    success: usize,
    fail: usize,
}

impl<T, R> BulkItemizedResponse<T, R> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            success: 0,
            fail: 0,
        }
    }

    fn from_items(items: Vec<BulkItemResult<T, R>>) -> Self {
        let success = items.iter().filter(|item| item.is_success()).count();
        let fail = items.len() - success;
        Self {
            items,
            success,
            fail,
        }
    }

    pub fn items(&self) -> &[BulkItemResult<T, R>] {
        &self.items
    }

    pub fn into_items(self) -> Vec<BulkItemResult<T, R>> {
        self.items
    }

    pub fn success(&self) -> usize {
        self.success
    }

    pub fn fail(&self) -> usize {
        self.fail
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn successes(&self) -> impl Iterator<Item = (&T, &R)> {
        self.items.iter().filter_map(|item| match item {
            BulkItemResult::Success { input, result } => Some((input, result)),
            BulkItemResult::Failure { .. } => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = (&T, &RepositoryError)> {
        self.items.iter().filter_map(|item| match item {
            BulkItemResult::Success { .. } => None,
            BulkItemResult::Failure { input, error } => Some((input, error)),
        })
    }

    /// The result of the only item, or `None` when the batch was not a
    /// single successful item.
    pub fn into_single(self) -> Option<R> {
        match self.into_single_outcome() {
            Ok(Ok(result)) => Some(result),
            _ => None,
        }
    }

    /// The outcome of the only item.
    ///
    /// Fails with [`RepositoryError::NotSingular`] when the batch does not
    /// hold exactly one item.
    pub fn into_single_outcome(self) -> RepositoryResult<RepositoryResult<R>> {
        if self.items.len() != 1 {
            return Err(RepositoryError::NotSingular {
                count: self.items.len(),
            });
        }
        let mut items = self.items;
        match items.pop() {
            Some(item) => Ok(item.into_result()),
            None => Err(RepositoryError::NotSingular { count: 0 }),
        }
    }
}

/// Aggregate result of a counted batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkCountedResponse {
    pub success: usize,
    pub fail: usize,
}

impl BulkCountedResponse {
    pub fn total(&self) -> usize {
        self.success + self.fail
    }
}

enum Outcome<R> {
    Success(R),
    Failure(RepositoryError),
}

/// Mutable batch state handed to an itemized worker.
///
/// The worker owns the context for the duration of the batch and returns it
/// when done. Reporting an index twice keeps the last report.
pub struct BatchContext<T, R> {
    items: Vec<T>,
    outcomes: Vec<Option<Outcome<R>>>,
}

impl<T, R> BatchContext<T, R> {
    fn new(items: Vec<T>) -> Self {
        let outcomes = items.iter().map(|_| None).collect();
        Self { items, outcomes }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Reports `index` as succeeded. An index outside the batch is logged
    /// and dropped.
    pub fn mark_success(&mut self, index: usize, result: R) {
        self.report(index, Outcome::Success(result));
    }

    pub fn mark_failure(&mut self, index: usize, error: RepositoryError) {
        self.report(index, Outcome::Failure(error));
    }

    fn report(&mut self, index: usize, outcome: Outcome<R>) {
        let len = self.outcomes.len();
        match self.outcomes.get_mut(index) {
            Some(slot) => *slot = Some(outcome),
            None => warn!("Batch worker reported index {} of a {}-item batch", index, len),
        }
    }

    pub fn is_reported(&self, index: usize) -> bool {
        self.outcomes.get(index).is_some_and(Option::is_some)
    }

    /// Indices that have not been reported yet.
    pub fn pending(&self) -> Vec<usize> {
        self.outcomes
            .iter()
            .enumerate()
            .filter(|(_, outcome)| outcome.is_none())
            .map(|(index, _)| index)
            .collect()
    }

    /// Marks every listed index as failed with a copy of `error`.
    pub fn fail_all(&mut self, indices: &[usize], error: &RepositoryError) {
        for &index in indices {
            self.mark_failure(index, error.clone());
        }
    }

    fn finish(self) -> RepositoryResult<BulkItemizedResponse<T, R>> {
        let mut items = Vec::with_capacity(self.items.len());
        for (index, (input, outcome)) in self.items.into_iter().zip(self.outcomes).enumerate() {
            let item = match outcome {
                Some(Outcome::Success(result)) => BulkItemResult::Success { input, result },
                Some(Outcome::Failure(error)) => BulkItemResult::Failure { input, error },
                None => return Err(RepositoryError::UnreportedItem { index }),
            };
            items.push(item);
        }
        Ok(BulkItemizedResponse::from_items(items))
    }
}

/// Runs an itemized batch.
///
/// Fails only when the worker leaves an item unreported.
pub async fn itemized<T, R, F, Fut>(
    items: Vec<T>,
    worker: F,
) -> RepositoryResult<BulkItemizedResponse<T, R>>
where
    F: FnOnce(BatchContext<T, R>) -> Fut,
    Fut: Future<Output = BatchContext<T, R>>,
{
    if items.is_empty() {
        return Ok(BulkItemizedResponse::empty());
    }
    worker(BatchContext::new(items)).await.finish()
}

/// Runs a counted batch. Worker errors propagate unchanged.
pub async fn counted<T, F, Fut>(items: Vec<T>, worker: F) -> RepositoryResult<BulkCountedResponse>
where
    F: FnOnce(Vec<T>) -> Fut,
    Fut: Future<Output = RepositoryResult<usize>>,
{
    if items.is_empty() {
        return Ok(BulkCountedResponse::default());
    }
    let total = items.len();
    let success = worker(items).await?.min(total);
    Ok(BulkCountedResponse {
        success,
        fail: total - success,
    })
}
