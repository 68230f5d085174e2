//! Deferred values resolved by asynchronous provisioning calls.
//!
//! An [`Output<T>`] is a clonable handle to a value that only becomes known
//! once an upstream cloud operation completes. Outputs are backed by memoized
//! shared futures, so the underlying operation runs at most once no matter how
//! many dependents consume the value. Combinators (`map`, `zip`, `then`) keep
//! track of which resources a value was derived from; the deployment graph
//! uses that provenance to record dependency edges.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;

/// Failure of a deferred-value resolution.
///
/// A provisioning failure keeps the identity of the resource that failed;
/// everything derived from it resolves to `Dependency` without its own
/// provisioning call ever being submitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("provisioning '{resource}' failed: {message}")]
    Provision { resource: String, message: String },

    #[error("'{resource}' not created: upstream '{upstream}' failed")]
    Dependency { resource: String, upstream: String },
}

impl ResolveError {
    /// The resource whose provisioning call originally failed.
    pub fn root(&self) -> &str {
        match self {
            ResolveError::Provision { resource, .. } => resource,
            ResolveError::Dependency { upstream, .. } => upstream,
        }
    }
}

type SharedFuture<T> = Shared<BoxFuture<'static, Result<T, ResolveError>>>;

/// A value that resolves once its upstream provisioning completes.
pub struct Output<T: Clone> {
    future: SharedFuture<T>,
    deps: Arc<BTreeSet<String>>,
}

impl<T: Clone> Clone for Output<T> {
    fn clone(&self) -> Self {
        Self {
            future: self.future.clone(),
            deps: Arc::clone(&self.deps),
        }
    }
}

impl<T> Output<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// An already-resolved value with no resource provenance.
    pub fn literal(value: T) -> Self {
        Self::with_deps(async move { Ok(value) }, BTreeSet::new())
    }

    /// Wrap a future together with the set of resource names it derives from.
    pub(crate) fn with_deps<F>(future: F, deps: BTreeSet<String>) -> Self
    where
        F: Future<Output = Result<T, ResolveError>> + Send + 'static,
    {
        Self {
            future: future.boxed().shared(),
            deps: Arc::new(deps),
        }
    }

    /// Logical names of the resources this value is derived from.
    pub fn dependencies(&self) -> &BTreeSet<String> {
        &self.deps
    }

    /// Wait for the value. Memoized: repeated calls never re-run the
    /// underlying operation.
    pub async fn resolve(&self) -> Result<T, ResolveError> {
        self.future.clone().await
    }

    /// Derive a new deferred value by applying `f` once the input resolves.
    pub fn map<U, F>(&self, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let future = self.future.clone();
        Output::with_deps(
            async move { Ok(f(future.await?)) },
            (*self.deps).clone(),
        )
    }

    /// Derive a new deferred value through an asynchronous, fallible
    /// continuation. Used for control-plane invokes that take a resolved
    /// input (e.g. listing the keys of a storage account by name).
    pub fn then<U, F, Fut>(&self, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<U, ResolveError>> + Send + 'static,
    {
        let future = self.future.clone();
        Output::with_deps(
            async move { f(future.await?).await },
            (*self.deps).clone(),
        )
    }

    /// Combine two deferred values; the result depends on both.
    pub fn zip<U>(&self, other: &Output<U>) -> Output<(T, U)>
    where
        U: Clone + Send + Sync + 'static,
    {
        let a = self.future.clone();
        let b = other.future.clone();
        let deps = union(&self.deps, other.dependencies());
        Output::with_deps(async move { Ok((a.await?, b.await?)) }, deps)
    }

    pub fn zip3<U, V>(&self, second: &Output<U>, third: &Output<V>) -> Output<(T, U, V)>
    where
        U: Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        self.zip(&second.zip(third))
            .map(|(a, (b, c))| (a, b, c))
    }

    pub fn zip4<U, V, W>(
        &self,
        second: &Output<U>,
        third: &Output<V>,
        fourth: &Output<W>,
    ) -> Output<(T, U, V, W)>
    where
        U: Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        W: Clone + Send + Sync + 'static,
    {
        self.zip(&second.zip(&third.zip(fourth)))
            .map(|(a, (b, (c, d)))| (a, b, c, d))
    }

    /// Collect a list of deferred values into one deferred list.
    pub fn join(outputs: Vec<Output<T>>) -> Output<Vec<T>> {
        let deps = outputs
            .iter()
            .fold(BTreeSet::new(), |acc, o| union_owned(acc, o.dependencies()));
        let futures: Vec<_> = outputs.into_iter().map(|o| o.future).collect();
        Output::with_deps(
            async move {
                let mut values = Vec::with_capacity(futures.len());
                for f in futures {
                    values.push(f.await?);
                }
                Ok(values)
            },
            deps,
        )
    }
}

impl From<String> for Output<String> {
    fn from(value: String) -> Self {
        Output::literal(value)
    }
}

impl From<&str> for Output<String> {
    fn from(value: &str) -> Self {
        Output::literal(value.to_string())
    }
}

fn union(a: &BTreeSet<String>, b: &BTreeSet<String>) -> BTreeSet<String> {
    a.iter().chain(b.iter()).cloned().collect()
}

fn union_owned(mut acc: BTreeSet<String>, more: &BTreeSet<String>) -> BTreeSet<String> {
    acc.extend(more.iter().cloned());
    acc
}
