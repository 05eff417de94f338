//! Empty-topic placeholders.

use canopy_ledger::Ledger;
use std::sync::Arc;
use tracing::{info, warn};

/// Writes the "checked and empty" marker for a topic into every ledger.
///
/// Each ledger is handled on its own: a failure in one is logged and
/// does not keep the others from being written.
pub struct PlaceholderWriter<'a> {
    ledgers: &'a [Arc<dyn Ledger>],
}

impl<'a> PlaceholderWriter<'a> {
    pub fn new(ledgers: &'a [Arc<dyn Ledger>]) -> Self {
        Self { ledgers }
    }

    /// Ensures the placeholder exists. Returns how many ledgers received
    /// a new one and how many failed.
    pub async fn ensure_placeholder(&self, topic: &str) -> (usize, usize) {
        let mut created = 0;
        let mut failed = 0;

        for ledger in self.ledgers {
            match ledger.ensure_topic_exists(topic).await {
                Ok(true) => {
                    info!(topic = %topic, ledger = ledger.name(), "Placeholder written");
                    created += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(topic = %topic, ledger = ledger.name(), "Failed to write placeholder: {}", e);
                    failed += 1;
                }
            }
        }
        (created, failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_ledger::MemoryLedger;

    #[tokio::test]
    async fn test_one_failing_ledger_does_not_block_the_other() {
        let a = Arc::new(MemoryLedger::new("a"));
        let b = Arc::new(MemoryLedger::new("b"));
        a.set_failing(true);

        let ledgers: Vec<Arc<dyn Ledger>> = vec![a.clone(), b.clone()];
        let writer = PlaceholderWriter::new(&ledgers);

        assert_eq!(writer.ensure_placeholder("t").await, (1, 1));
        assert_eq!(b.count_for("t"), 1);

        a.set_failing(false);
        assert_eq!(writer.ensure_placeholder("t").await, (1, 0));
        assert_eq!(writer.ensure_placeholder("t").await, (0, 0));
    }
}
