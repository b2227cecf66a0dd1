//! Generation of the Prometheus rules implementing an SLO class.

use crate::class::{LatencyTarget, SloClass};
use rpaas_slo_controller_k8s_api::{
    ObjectMeta, PrometheusRule, PrometheusRuleSpec, Rule, RuleGroup,
};
use std::collections::BTreeMap;

const RULE_NAME_PREFIX: &str = "slos-alerts-";

/// The inputs to rule generation for a single instance.
#[derive(Clone, Debug)]
pub struct Slo<'c> {
    pub name: String,
    pub class: &'c SloClass,
    pub team_owner: String,
    /// Annotations added to every generated alert.
    pub annotations: BTreeMap<String, String>,
}

/// Expands an SLO into the rule documents that implement it.
///
/// Implementations must be pure: identical inputs produce identical documents.
/// Documents are returned without a namespace, labels or owner; the reconciler
/// stamps those.
pub trait GenerateRules {
    fn generate(&self, slo: &Slo<'_>) -> Vec<PrometheusRule>;
}

/// Multi-window, multi-burn-rate alerts over the `slo:` recording rules.
#[derive(Clone, Debug, Default)]
pub struct MultiWindow(());

struct BurnWindow {
    long: &'static str,
    short: &'static str,
    factor: f64,
}

struct Severity {
    name: &'static str,
    pending: &'static str,
    windows: [BurnWindow; 2],
}

const PAGE: Severity = Severity {
    name: "page",
    pending: "2m",
    windows: [
        BurnWindow {
            long: "1h",
            short: "5m",
            factor: 14.4,
        },
        BurnWindow {
            long: "6h",
            short: "30m",
            factor: 6.0,
        },
    ],
};

const TICKET: Severity = Severity {
    name: "ticket",
    pending: "15m",
    windows: [
        BurnWindow {
            long: "1d",
            short: "2h",
            factor: 3.0,
        },
        BurnWindow {
            long: "3d",
            short: "6h",
            factor: 1.0,
        },
    ],
};

// === impl Slo ===

impl<'c> Slo<'c> {
    /// The SLO of the instance `name` in namespace `ns`.
    pub fn for_instance(ns: &str, name: &str, class: &'c SloClass) -> Self {
        Self {
            name: format!("tsuru.{ns}.{name}"),
            class,
            team_owner: String::new(),
            annotations: BTreeMap::new(),
        }
    }

    pub fn with_team_owner(mut self, team_owner: impl ToString) -> Self {
        self.team_owner = team_owner.to_string();
        self
    }

    pub fn with_annotations(mut self, annotations: BTreeMap<String, String>) -> Self {
        self.annotations = annotations;
        self
    }

    /// The name of the rule document generated for this SLO.
    pub fn rule_name(&self) -> String {
        format!("{RULE_NAME_PREFIX}{}", self.name)
    }
}

// === impl MultiWindow ===

impl GenerateRules for MultiWindow {
    fn generate(&self, slo: &Slo<'_>) -> Vec<PrometheusRule> {
        let mut rules = Vec::with_capacity(4);
        for severity in [&PAGE, &TICKET] {
            rules.push(error_rate_alert(slo, severity));
        }
        if !slo.class.latency.is_empty() {
            for severity in [&PAGE, &TICKET] {
                rules.push(latency_alert(slo, severity));
            }
        }

        vec![PrometheusRule {
            metadata: ObjectMeta {
                name: Some(slo.rule_name()),
                ..Default::default()
            },
            spec: PrometheusRuleSpec {
                groups: vec![RuleGroup {
                    name: slo.name.clone(),
                    interval: None,
                    rules,
                }],
            },
        }]
    }
}

fn error_rate_alert(slo: &Slo<'_>, severity: &Severity) -> Rule {
    let budget = error_budget(slo.class.availability);
    let expr = severity
        .windows
        .iter()
        .map(|w| {
            format!(
                "(slo:sli_error:ratio_rate{long}{{service=\"{svc}\"}} > ({factor} * {budget})) \
                 and (slo:sli_error:ratio_rate{short}{{service=\"{svc}\"}} > ({factor} * {budget}))",
                long = w.long,
                short = w.short,
                svc = slo.name,
                factor = w.factor,
            )
        })
        .collect::<Vec<_>>()
        .join(" or ");

    alert(
        slo,
        severity,
        "SLOErrorRateTooHigh",
        expr,
        format!("High error rate on {}", slo.name),
    )
}

fn latency_alert(slo: &Slo<'_>, severity: &Severity) -> Rule {
    let expr = slo
        .class
        .latency
        .iter()
        .flat_map(|target| {
            severity
                .windows
                .iter()
                .map(move |w| latency_clause(&slo.name, target, w))
        })
        .collect::<Vec<_>>()
        .join(" or ");

    alert(
        slo,
        severity,
        "SLOLatencyTooHigh",
        expr,
        format!("High latency on {}", slo.name),
    )
}

fn latency_clause(svc: &str, target: &LatencyTarget, w: &BurnWindow) -> String {
    let budget = error_budget(target.target);
    format!(
        "((1 - slo:sli_latency:ratio_rate{long}{{service=\"{svc}\", le=\"{le}\"}}) > ({factor} * {budget})) \
         and ((1 - slo:sli_latency:ratio_rate{short}{{service=\"{svc}\", le=\"{le}\"}}) > ({factor} * {budget}))",
        long = w.long,
        short = w.short,
        le = target.le,
        factor = w.factor,
    )
}

fn alert(slo: &Slo<'_>, severity: &Severity, name: &str, expr: String, summary: String) -> Rule {
    let labels = [
        ("severity", severity.name),
        ("slo_service", slo.name.as_str()),
        ("slo_class", slo.class.name.as_str()),
        ("tsuru_team_owner", slo.team_owner.as_str()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    let mut annotations = slo.annotations.clone();
    annotations.insert("summary".to_string(), summary);

    Rule {
        record: None,
        alert: Some(name.to_string()),
        expr,
        for_: Some(severity.pending.to_string()),
        labels: Some(labels),
        annotations: Some(annotations),
    }
}

/// Formats the allowed failure ratio of a percentage target, e.g. `99.9` as
/// `0.001`.
fn error_budget(target: f64) -> String {
    let budget = format!("{:.6}", (100.0 - target) / 100.0);
    budget.trim_end_matches('0').trim_end_matches('.').to_string()
}
