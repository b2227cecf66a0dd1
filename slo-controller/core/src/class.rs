//! The catalog of SLO classes an instance may declare.

use thiserror::Error;

/// A named service level objective.
#[derive(Clone, Debug, PartialEq)]
pub struct SloClass {
    pub name: String,
    /// Availability target, in percent.
    pub availability: f64,
    /// Latency objectives, ordered from the loosest to the tightest threshold.
    pub latency: Vec<LatencyTarget>,
}

/// The percentage of requests that must complete within `le` seconds.
#[derive(Clone, Debug, PartialEq)]
pub struct LatencyTarget {
    /// Histogram bucket boundary, as it appears in the `le` label.
    pub le: String,
    pub target: f64,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown SLO class: {0}")]
pub struct UnknownClass(pub String);

/// An immutable, ordered set of SLO classes.
#[derive(Clone, Debug, PartialEq)]
pub struct Catalog {
    classes: Vec<SloClass>,
}

// === impl SloClass ===

impl SloClass {
    pub fn new(name: impl ToString, availability: f64) -> Self {
        Self {
            name: name.to_string(),
            availability,
            latency: Vec::new(),
        }
    }

    pub fn with_latency(mut self, le: impl ToString, target: f64) -> Self {
        self.latency.push(LatencyTarget {
            le: le.to_string(),
            target,
        });
        self
    }
}

// === impl Catalog ===

impl Catalog {
    pub fn new(classes: impl IntoIterator<Item = SloClass>) -> Self {
        Self {
            classes: classes.into_iter().collect(),
        }
    }

    /// Finds the class named exactly `name`.
    pub fn find(&self, name: &str) -> Result<&SloClass, UnknownClass> {
        self.classes
            .iter()
            .find(|class| class.name == name)
            .ok_or_else(|| UnknownClass(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &SloClass> {
        self.classes.iter()
    }
}

impl Default for Catalog {
    /// The classes offered to rpaas instances.
    fn default() -> Self {
        Self::new([
            SloClass::new("critical_fast", 99.99)
                .with_latency("0.100", 99.0)
                .with_latency("0.050", 95.0),
            SloClass::new("critical", 99.99)
                .with_latency("0.200", 99.0)
                .with_latency("0.100", 95.0),
            SloClass::new("high_fast", 99.9)
                .with_latency("0.200", 99.0)
                .with_latency("0.100", 95.0),
            SloClass::new("high", 99.9)
                .with_latency("1.000", 99.0)
                .with_latency("0.500", 95.0),
            SloClass::new("high_slow", 99.9)
                .with_latency("5.000", 99.0)
                .with_latency("1.000", 95.0),
            SloClass::new("medium", 99.0),
            SloClass::new("low", 98.0),
        ])
    }
}
