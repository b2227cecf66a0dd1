use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

#[derive(Clone, Debug, Default)]
pub struct Metrics {
    reconciles: Family<OutcomeLabels, Counter>,
    writes: Family<WriteLabels, Counter>,
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
struct OutcomeLabels {
    outcome: &'static str,
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
struct WriteLabels {
    op: &'static str,
    result: &'static str,
}

// === impl Metrics ===

impl Metrics {
    pub fn register(reg: &mut Registry) -> Self {
        let reconciles = Family::<OutcomeLabels, Counter>::default();
        reg.register(
            "reconcile",
            "Total number of reconciliation passes by outcome",
            reconciles.clone(),
        );

        let writes = Family::<WriteLabels, Counter>::default();
        reg.register(
            "rule_writes",
            "Total number of PrometheusRule writes by operation and result",
            writes.clone(),
        );

        Self { reconciles, writes }
    }

    pub(crate) fn reconciled(&self, outcome: &'static str) {
        self.reconciles
            .get_or_create(&OutcomeLabels { outcome })
            .inc();
    }

    pub(crate) fn wrote(&self, op: &'static str, ok: bool) {
        let result = if ok { "ok" } else { "error" };
        self.writes.get_or_create(&WriteLabels { op, result }).inc();
    }

    #[cfg(test)]
    pub(crate) fn reconcile_count(&self, outcome: &'static str) -> u64 {
        self.reconciles
            .get_or_create(&OutcomeLabels { outcome })
            .get()
    }

    #[cfg(test)]
    pub(crate) fn write_count(&self, op: &'static str, result: &'static str) -> u64 {
        self.writes.get_or_create(&WriteLabels { op, result }).get()
    }
}
