//! Fallback source for platforms without pointer interception

use super::{Classifier, EventSource};
use anyhow::{Result, bail};

/// Reports itself unsupported and refuses every registration
pub struct UnsupportedSource;

impl EventSource for UnsupportedSource {
    fn is_supported(&self) -> bool {
        false
    }

    fn register(&mut self, _classifier: Classifier) -> Result<()> {
        bail!("pointer interception is not supported on this platform")
    }

    fn unregister(&mut self) {
        // No-op
    }

    fn is_active(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "unsupported"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::button::Verdict;

    #[test]
    fn test_unsupported_source_refuses_registration() {
        let mut source = UnsupportedSource;
        assert!(!source.is_supported());
        assert!(source.register(Box::new(|_| Verdict::Allow)).is_err());
        assert!(!source.is_active());
        source.unregister();
    }
}
