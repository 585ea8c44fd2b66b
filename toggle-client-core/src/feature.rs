//! Runtime feature entities: gate construction, evaluation and usage counts.

use crate::model::{Context, DefinitionSet, FeatureDefinition};
use crate::strategy::{Predicate, StrategyRegistry};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Drained yes/no counters for one feature over one reporting window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageCount {
    pub yes: u64,
    pub no: u64,
}

/// Compile the gate list for a definition, in definition order.
///
/// An unknown strategy name is logged and contributes an always-false gate so
/// one bad entry never changes the shape of the gate list or fails the
/// feature.
pub fn build_gates(registry: &StrategyRegistry, definition: &FeatureDefinition) -> Vec<Predicate> {
    definition
        .strategies
        .iter()
        .map(|strategy_ref| match registry.get(&strategy_ref.name) {
            Some(strategy) => strategy.instantiate(&strategy_ref.parameters),
            None => {
                tracing::warn!(
                    feature = %definition.name,
                    strategy = %strategy_ref.name,
                    parameters = ?strategy_ref.parameters,
                    "unknown strategy, gate will never open"
                );
                Box::new(|_: &Context| false)
            }
        })
        .collect()
}

/// A feature definition coupled with its compiled gates and a live usage
/// counter. Exclusively owned by one feature table generation.
pub struct Feature {
    definition: FeatureDefinition,
    gates: Vec<Predicate>,
    yes: AtomicU64,
    no: AtomicU64,
}

impl Feature {
    pub fn new(registry: &StrategyRegistry, definition: FeatureDefinition) -> Self {
        let gates = build_gates(registry, &definition);
        Self {
            definition,
            gates,
            yes: AtomicU64::new(0),
            no: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Evaluate the feature for a context and count the decision.
    ///
    /// A disabled feature short-circuits to false without running any gate;
    /// otherwise the gates are ORed, so an empty gate list is false.
    pub fn evaluate(&self, context: &Context) -> bool {
        let result = self.definition.enabled && self.gates.iter().any(|gate| gate(context));
        if result {
            self.yes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.no.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Drain both counters atomically, returning the pre-reset values.
    ///
    /// Successive reports partition the call history: a concurrent increment
    /// lands either in this report or in the next one, never in neither.
    pub fn report(&self) -> UsageCount {
        UsageCount {
            yes: self.yes.swap(0, Ordering::AcqRel),
            no: self.no.swap(0, Ordering::AcqRel),
        }
    }
}

/// One generation of evaluable features, derived from a single definition set.
///
/// The table remembers which `Arc<DefinitionSet>` it was built from so the
/// orchestrator can detect change by pointer identity alone.
pub struct FeatureTable {
    source: Arc<DefinitionSet>,
    features: FxHashMap<String, Feature>,
}

impl FeatureTable {
    pub fn empty() -> Self {
        Self {
            source: Arc::new(DefinitionSet::default()),
            features: FxHashMap::default(),
        }
    }

    pub fn build(registry: &StrategyRegistry, source: Arc<DefinitionSet>) -> Self {
        let features = source
            .features
            .iter()
            .map(|definition| {
                (
                    definition.name.clone(),
                    Feature::new(registry, definition.clone()),
                )
            })
            .collect();
        Self { source, features }
    }

    /// The definition set this table was derived from.
    pub fn built_from(&self) -> &Arc<DefinitionSet> {
        &self.source
    }

    pub fn get(&self, name: &str) -> Option<&Feature> {
        self.features.get(name)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Drain every feature's counters for a metrics report.
    pub fn drain_counts(&self) -> FxHashMap<String, UsageCount> {
        self.features
            .iter()
            .map(|(name, feature)| (name.clone(), feature.report()))
            .collect()
    }
}
