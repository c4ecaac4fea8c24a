//! Sequential - Ordered Module Container
//!
//! Chains child modules; children are owned exclusively by the container
//! and named by their index, so parameter paths look like `"0.weight"`.
//!
//! @version 0.1.0
//! @author TensorMesh Development Team

use tensormesh_distributed::DeviceMesh;
use tensormesh_serialize::StateDict;
use tensormesh_tensor::Tensor;

use crate::error::{LoadError, NnResult};
use crate::module::{LoadReport, Module};
use crate::parameter::Parameter;

// =============================================================================
// Sequential
// =============================================================================

/// A container applying child modules in order.
#[derive(Default)]
pub struct Sequential {
    children: Vec<Box<dyn Module>>,
}

impl Sequential {
    /// Creates an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a module, builder-style.
    #[must_use]
    pub fn add<M: Module + 'static>(mut self, module: M) -> Self {
        self.children.push(Box::new(module));
        self
    }

    /// Appends a module in place.
    pub fn push<M: Module + 'static>(&mut self, module: M) {
        self.children.push(Box::new(module));
    }

    /// Returns the number of children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Returns true if the container has no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Gets a child by index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&dyn Module> {
        self.children.get(index).map(AsRef::as_ref)
    }
}

impl Module for Sequential {
    fn forward(&self, input: &Tensor<f32>) -> NnResult<Tensor<f32>> {
        let mut x = input.clone();
        for child in &self.children {
            x = child.forward(&x)?;
        }
        Ok(x)
    }

    fn named_parameters(&self) -> Vec<(String, &Parameter)> {
        let mut params = Vec::new();
        for (i, child) in self.children.iter().enumerate() {
            for (name, param) in child.named_parameters() {
                params.push((format!("{i}.{name}"), param));
            }
        }
        params
    }

    fn named_parameters_mut(&mut self) -> Vec<(String, &mut Parameter)> {
        let mut params = Vec::new();
        for (i, child) in self.children.iter_mut().enumerate() {
            for (name, param) in child.named_parameters_mut() {
                params.push((format!("{i}.{name}"), param));
            }
        }
        params
    }

    fn load_state(&mut self, state: &StateDict) -> LoadReport {
        let mut report = LoadReport::default();

        // Route entries to children by their leading index so child
        // overrides (full-checkpoint slicing in the sharded layers) apply.
        let mut per_child: Vec<StateDict> = vec![StateDict::new(); self.children.len()];
        for (name, entry) in state.iter() {
            let routed = name.split_once('.').and_then(|(index, rest)| {
                index
                    .parse::<usize>()
                    .ok()
                    .filter(|&i| i < self.children.len())
                    .map(|i| (i, rest))
            });
            match routed {
                Some((i, rest)) => per_child[i].insert(rest, entry.clone()),
                None => report.record_failure(name, LoadError::NameNotFound),
            }
        }

        for (i, (child, sub)) in self.children.iter_mut().zip(per_child).enumerate() {
            if sub.is_empty() {
                continue;
            }
            let child_report = child.load_state(&sub);
            report.absorb_prefixed(&format!("{i}."), child_report);
        }

        report
    }

    fn rebind(&mut self, mesh: &DeviceMesh) -> NnResult<()> {
        for child in &mut self.children {
            child.rebind(mesh)?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Sequential"
    }
}

// =============================================================================
// Tests
// =============================================================================
