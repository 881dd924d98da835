// Fan-out to several sinks

use super::ReportSink;
use crate::state::Snapshot;
use anyhow::Result;
use tracing::error;

/// Forwards every call to all wrapped sinks.
///
/// A failing sink does not stop the others. Each failure is logged and the
/// first one is returned once every sink has been called.
pub struct MultiSink {
    sinks: Vec<Box<dyn ReportSink>>,
}

impl MultiSink {
    pub fn new(sinks: Vec<Box<dyn ReportSink>>) -> Self {
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    fn fan_out(&self, what: &str, call: impl Fn(&dyn ReportSink) -> Result<()>) -> Result<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = call(sink.as_ref()) {
                error!("Report sink failed during {}: {:#}", what, e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl ReportSink for MultiSink {
    fn create_report_for(&self, snapshot: &Snapshot) -> Result<()> {
        self.fan_out("report creation", |sink| sink.create_report_for(snapshot))
    }

    fn done(&self) -> Result<()> {
        self.fan_out("finish", |sink| sink.done())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SpecInfo;
    use chrono::Utc;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl ReportSink for CountingSink {
        fn create_report_for(&self, _snapshot: &Snapshot) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("sink exploded");
            }
            Ok(())
        }

        fn done(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failure_does_not_stop_other_sinks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sink = MultiSink::new(vec![
            Box::new(CountingSink {
                calls: Arc::clone(&calls),
                fail: true,
            }),
            Box::new(CountingSink {
                calls: Arc::clone(&calls),
                fail: false,
            }),
        ]);
        let snapshot = Snapshot::new(Arc::new(SpecInfo::new("S")), Utc::now());

        let result = sink.create_report_for(&snapshot);

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(sink.done().is_ok());
    }
}
