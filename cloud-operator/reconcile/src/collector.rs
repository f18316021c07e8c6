use cloud_operator_core::report::{KubernetesReport, KubernetesReports};
use parking_lot::Mutex;
use std::sync::Arc;

/// Accumulates the reports of concurrently reconciled clusters.
#[derive(Clone, Debug, Default)]
pub struct ReportCollector(Arc<Mutex<Vec<KubernetesReport>>>);

// === impl ReportCollector ===

impl ReportCollector {
    pub fn add(&self, report: KubernetesReport) {
        self.0.lock().push(report);
    }

    /// Returns the reports added so far, in the order they were added.
    pub fn build(&self) -> KubernetesReports {
        let reports = self.0.lock().clone();
        KubernetesReports {
            total_count: reports.len(),
            error_count: reports.iter().filter(|r| r.error.is_some()).count(),
            reports,
        }
    }
}
