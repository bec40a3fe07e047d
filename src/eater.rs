//! The consumer capability: something that eats one candy at a time.
//!
//! The service owns one worker per eater and calls [`CandyEater::eat`] with
//! every candy that worker picks up. An eat may take arbitrarily long and may
//! fail; the failure is never inspected.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::model::Candy;

/// Eats candies of type `C`.
#[async_trait]
pub trait CandyEater<C: Candy>: Send + Sync + 'static {
    /// Eat one candy. An `Err` counts as a failed eat; the flavour is
    /// released all the same.
    async fn eat(&self, candy: C) -> anyhow::Result<()>;
}

#[async_trait]
impl<C, E> CandyEater<C> for Arc<E>
where
    C: Candy,
    E: CandyEater<C> + ?Sized,
{
    async fn eat(&self, candy: C) -> anyhow::Result<()> {
        (**self).eat(candy).await
    }
}

/// Adapts an async closure into an eater.
pub struct FnEater<F>(F);

impl<F> FnEater<F> {
    pub fn new<C, Fut>(f: F) -> Self
    where
        F: Fn(C) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        Self(f)
    }
}

#[async_trait]
impl<C, F, Fut> CandyEater<C> for FnEater<F>
where
    C: Candy,
    F: Fn(C) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn eat(&self, candy: C) -> anyhow::Result<()> {
        (self.0)(candy).await
    }
}

/// Adapts a synchronous, blocking closure into an eater.
///
/// Each call runs on Tokio's blocking pool. Shutdown cannot interrupt a
/// blocking call that is already running; the runtime waits for it on exit.
pub struct BlockingEater<F>(Arc<F>);

impl<F> BlockingEater<F> {
    pub fn new<C>(f: F) -> Self
    where
        F: Fn(C) -> anyhow::Result<()>,
    {
        Self(Arc::new(f))
    }
}

#[async_trait]
impl<C, F> CandyEater<C> for BlockingEater<F>
where
    C: Candy,
    F: Fn(C) -> anyhow::Result<()> + Send + Sync + 'static,
{
    async fn eat(&self, candy: C) -> anyhow::Result<()> {
        let f = Arc::clone(&self.0);
        tokio::task::spawn_blocking(move || f(candy)).await?
    }
}
