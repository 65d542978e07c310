//! Asynchronous loading of the simulation module and its companion resource.
//!
//! A [`Loader`] owns two factories. Each run invokes both factories up front
//! and then waits for their results according to its [`LoadStrategy`]. The
//! loader keeps nothing once a run finishes: the handles are returned to the
//! caller, or dropped by [`Loader::run`].

mod error;
mod state;

use std::future::Future;

use futures::future;
use log::debug;

pub use error::LoadError;
pub use state::{LoadState, LoadTracker};

/// Asynchronous factory producing one artifact handle per invocation.
pub trait Factory {
    type Output;
    type Future: Future<Output = Result<Self::Output, LoadError>>;

    fn start(&self) -> Self::Future;
}

impl<F, Fut, T> Factory for F
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, LoadError>>,
{
    type Output = T;
    type Future = Fut;

    fn start(&self) -> Fut {
        self()
    }
}

/// How the two in-flight loads are awaited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadStrategy {
    /// Await the module, then the resource.
    ///
    /// The resource future is not polled until the module resolves. If the
    /// module never resolves, the resource outcome is never observed even
    /// when the underlying read has already finished.
    Sequential,
    /// Poll both together and finish once both are ready or either fails.
    #[default]
    Joined,
}

/// Both handles produced by a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<M, R> {
    pub module: M,
    pub resource: R,
}

pub struct Loader<MF, RF> {
    module: MF,
    resource: RF,
    strategy: LoadStrategy,
}

impl<MF, RF> Loader<MF, RF>
where
    MF: Factory,
    RF: Factory,
{
    pub fn new(module: MF, resource: RF) -> Self {
        Self {
            module,
            resource,
            strategy: LoadStrategy::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: LoadStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn strategy(&self) -> LoadStrategy {
        self.strategy
    }

    /// Loads both artifacts with a private tracker.
    pub async fn load(&self) -> Result<Loaded<MF::Output, RF::Output>, LoadError> {
        self.load_tracked(&LoadTracker::new()).await
    }

    /// Loads both artifacts, recording every state transition in `tracker`.
    ///
    /// The tracker should be fresh: a tracker that already reached a terminal
    /// state ignores further transitions.
    pub async fn load_tracked(
        &self,
        tracker: &LoadTracker,
    ) -> Result<Loaded<MF::Output, RF::Output>, LoadError> {
        let module = self.module.start();
        let resource = self.resource.start();
        tracker.advance(LoadState::LoadingModule);
        debug!("started module and resource loads ({:?})", self.strategy);

        let result = match self.strategy {
            LoadStrategy::Sequential => load_sequential(module, resource, tracker).await,
            LoadStrategy::Joined => load_joined(module, resource, tracker).await,
        };

        match &result {
            Ok(_) => tracker.advance(LoadState::Done),
            Err(err) => {
                debug!("load failed: {err}");
                tracker.advance(LoadState::Failed)
            }
        };
        result
    }

    /// Entry point form: loads both artifacts and discards the handles.
    pub async fn run(&self) -> Result<(), LoadError> {
        let _loaded = self.load().await?;
        Ok(())
    }
}

async fn load_sequential<M, R>(
    module: impl Future<Output = Result<M, LoadError>>,
    resource: impl Future<Output = Result<R, LoadError>>,
    tracker: &LoadTracker,
) -> Result<Loaded<M, R>, LoadError> {
    let module = module.await?;
    tracker.advance(LoadState::LoadingResource);
    let resource = resource.await?;
    Ok(Loaded { module, resource })
}

async fn load_joined<M, R>(
    module: impl Future<Output = Result<M, LoadError>>,
    resource: impl Future<Output = Result<R, LoadError>>,
    tracker: &LoadTracker,
) -> Result<Loaded<M, R>, LoadError> {
    let module = async {
        let module = module.await?;
        tracker.advance(LoadState::LoadingResource);
        Ok::<_, LoadError>(module)
    };
    let (module, resource) = future::try_join(module, resource).await?;
    Ok(Loaded { module, resource })
}
