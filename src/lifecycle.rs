use std::fmt;
use std::future::Future;

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use log::{error, warn};

use crate::loader::LoadError;

type EntryPoint = Box<dyn FnOnce() -> LocalBoxFuture<'static, Result<(), LoadError>>>;

/// Outcome of signalling the content-ready milestone.
#[derive(Debug)]
pub enum Dispatch {
    Completed,
    /// The entry point failed; the error already went through the host's
    /// unhandled-failure path.
    Failed(LoadError),
    AlreadyFired,
    NoEntryPoint,
}

/// Host side of the "content ready" milestone.
///
/// A single entry point is registered up front and invoked at most once when
/// the host signals that its initial content is ready.
#[derive(Default)]
pub struct Lifecycle {
    entry: Option<EntryPoint>,
    fired: bool,
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("registered", &self.entry.is_some())
            .field("fired", &self.fired)
            .finish()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the entry point, replacing any earlier registration.
    pub fn on_content_ready<F, Fut>(&mut self, entry: F)
    where
        F: FnOnce() -> Fut + 'static,
        Fut: Future<Output = Result<(), LoadError>> + 'static,
    {
        if self.entry.is_some() {
            warn!("replacing previously registered content-ready entry point");
        }
        self.entry = Some(Box::new(move || entry().boxed_local()));
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// Invokes the registered entry point and waits for it to finish.
    pub async fn signal_content_ready(&mut self) -> Dispatch {
        if self.fired {
            warn!("content-ready milestone signalled more than once; ignoring");
            return Dispatch::AlreadyFired;
        }
        let Some(entry) = self.entry.take() else {
            warn!("content-ready milestone reached with no entry point registered");
            return Dispatch::NoEntryPoint;
        };
        self.fired = true;

        match entry().await {
            Ok(()) => Dispatch::Completed,
            Err(err) => {
                report_unhandled(&err);
                Dispatch::Failed(err)
            }
        }
    }
}

/// Default path for entry point failures nobody handled.
fn report_unhandled(err: &LoadError) {
    error!("unhandled failure in content-ready entry point: {err}");
}
