//! Module Trait - Layer Composition Interface
//!
//! The capability interface every layer implements: forward evaluation,
//! deterministic parameter enumeration, state loading with partial-failure
//! semantics, and mesh rebinding. Layers compose through this interface
//! rather than inheriting shared state; a module tree is a strict
//! ownership hierarchy, so it cannot contain cycles.
//!
//! @version 0.1.0
//! @author TensorMesh Development Team

use std::collections::BTreeMap;

use tensormesh_distributed::DeviceMesh;
use tensormesh_serialize::StateDict;
use tensormesh_tensor::Tensor;
use tracing::debug;

use crate::error::{LoadError, NnResult};
use crate::parameter::Parameter;

// =============================================================================
// Load Reporting
// =============================================================================

/// One entry that failed to load.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadFailure {
    /// Dotted name of the offending entry.
    pub name: String,
    /// Why it failed.
    pub error: LoadError,
}

/// Outcome of `Module::load_state`.
///
/// Loading has partial-failure semantics: one bad entry never blocks the
/// rest, and the caller receives the full set of failed names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// Names applied successfully, in the order they were processed.
    pub applied: Vec<String>,
    /// Entries that could not be applied.
    pub failures: Vec<LoadFailure>,
}

impl LoadReport {
    /// Returns true when every entry was applied.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Records a successful entry.
    pub fn record_applied(&mut self, name: impl Into<String>) {
        self.applied.push(name.into());
    }

    /// Records a failed entry.
    pub fn record_failure(&mut self, name: impl Into<String>, error: LoadError) {
        let name = name.into();
        debug!(name = %name, error = %error, "state entry not applied");
        self.failures.push(LoadFailure { name, error });
    }

    /// Folds a child module's report into this one, re-prefixing names.
    pub fn absorb_prefixed(&mut self, prefix: &str, child: LoadReport) {
        self.applied
            .extend(child.applied.into_iter().map(|n| format!("{prefix}{n}")));
        self.failures.extend(child.failures.into_iter().map(|f| LoadFailure {
            name: format!("{prefix}{}", f.name),
            error: f.error,
        }));
    }
}

// =============================================================================
// Module Trait
// =============================================================================

/// Core trait for all layers.
///
/// Parameter enumeration is finite, restartable (every call walks the tree
/// afresh) and deterministic: parameters appear in insertion order, and
/// containers prefix child names with `"<child>."`.
pub trait Module: Send + Sync {
    /// Evaluates the layer on an input.
    fn forward(&self, input: &Tensor<f32>) -> NnResult<Tensor<f32>>;

    /// Enumerates `(name, parameter)` pairs in deterministic order.
    fn named_parameters(&self) -> Vec<(String, &Parameter)>;

    /// Enumerates `(name, parameter)` pairs mutably, same order as
    /// [`Module::named_parameters`].
    fn named_parameters_mut(&mut self) -> Vec<(String, &mut Parameter)>;

    /// Snapshots every parameter into a state dictionary.
    fn state_dict(&self) -> StateDict {
        let mut state = StateDict::new();
        for (name, param) in self.named_parameters() {
            state.insert(name, param.to_entry());
        }
        state
    }

    /// Applies a state dictionary, converting entry kinds to match each
    /// target parameter.
    ///
    /// Partial-failure semantics: every entry is attempted; the report
    /// lists what was applied and what failed with which error.
    fn load_state(&mut self, state: &StateDict) -> LoadReport {
        load_into_parameters(self.named_parameters_mut(), state)
    }

    /// Rebinds the module tree's communication group and shard layout.
    ///
    /// Idempotent; layers without distributed state accept any mesh.
    fn rebind(&mut self, _mesh: &DeviceMesh) -> NnResult<()> {
        Ok(())
    }

    /// Returns the total number of parameter elements.
    fn num_parameters(&self) -> usize {
        self.named_parameters()
            .iter()
            .map(|(_, p)| p.numel())
            .sum()
    }

    /// Returns the module name for debugging.
    fn name(&self) -> &'static str {
        core::any::type_name::<Self>()
    }
}

// =============================================================================
// Load Helper
// =============================================================================

/// Applies a state dictionary against a flat set of named parameters.
///
/// This is the default `load_state`; layers that accept more than their
/// local shapes (the sharded linears) route entries themselves.
pub fn load_into_parameters(
    params: Vec<(String, &mut Parameter)>,
    state: &StateDict,
) -> LoadReport {
    let mut report = LoadReport::default();
    let mut params: BTreeMap<String, &mut Parameter> = params.into_iter().collect();

    for (name, entry) in state.iter() {
        match params.get_mut(name) {
            None => report.record_failure(name, LoadError::NameNotFound),
            Some(param) => match param.assign(entry) {
                Ok(()) => report.record_applied(name),
                Err(error) => report.record_failure(name, error),
            },
        }
    }

    report
}

// =============================================================================
// Tests
// =============================================================================
