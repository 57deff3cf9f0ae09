//! Event source abstraction
//!
//! An event source owns the platform hook. It hands every pointer event to the
//! registered classifier on its own dispatch thread and forwards the event only
//! when the verdict is `Allow`.
//!
//! Contract for implementations:
//! - Down is delivered before Up for a given press
//! - Move events are delivered while a button is held
//! - timestamps are monotonic
//! - `is_active` turns false if the dispatch thread ends by itself
//! - once `unregister` returns, the classifier is never called again and has
//!   been dropped

#[cfg(target_os = "linux")]
pub mod linux;

pub mod null;

use crate::button::{PointerEvent, Verdict};
use anyhow::Result;
use std::path::PathBuf;

/// Callback the source invokes synchronously for each event
pub type Classifier = Box<dyn FnMut(PointerEvent) -> Verdict + Send>;

pub trait EventSource: Send {
    /// Whether this source can intercept pointer input on this machine
    fn is_supported(&self) -> bool;

    /// Install the hook and start delivering events to `classifier`
    fn register(&mut self, classifier: Classifier) -> Result<()>;

    /// Remove the hook. Blocks until no classification is in flight.
    fn unregister(&mut self);

    /// Whether a registered hook is still delivering events. Turns false when
    /// the source stops on its own, e.g. after losing its device.
    fn is_active(&self) -> bool;

    /// Short human-readable name for logs
    fn name(&self) -> &'static str;
}

impl<S: EventSource + ?Sized> EventSource for Box<S> {
    fn is_supported(&self) -> bool {
        (**self).is_supported()
    }

    fn register(&mut self, classifier: Classifier) -> Result<()> {
        (**self).register(classifier)
    }

    fn unregister(&mut self) {
        (**self).unregister()
    }

    fn is_active(&self) -> bool {
        (**self).is_active()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Pick the event source for the current platform
pub fn platform_source(preferred_device: Option<PathBuf>) -> Box<dyn EventSource> {
    #[cfg(target_os = "linux")]
    {
        Box::new(linux::EvdevSource::new(preferred_device))
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = preferred_device;
        Box::new(null::UnsupportedSource)
    }
}
