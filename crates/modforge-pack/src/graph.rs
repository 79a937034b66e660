//! # Model Dependency Graph
//!
//! The `extends` relation as explicit edges, sorted topologically so that a
//! base model is always emitted before the models extending it.
//!
//! Only edges between models of the same specification constrain the order;
//! an extension of a runtime entity depends on the module owning that entity,
//! which the manifest records in `depends`.
//!
//! Cycles are reported with [`AssemblyError::CyclicDependency`], never
//! resolved by recursion limits.

use std::collections::{BTreeMap, BTreeSet};

use modforge_spec::ModelSpec;

use crate::error::AssemblyError;

/// Dependency graph over the models of one specification.
#[derive(Debug, Clone)]
pub struct ModelGraph<'a> {
    models: &'a [ModelSpec],
    /// `dependents[i]`: indices of models extending model `i`.
    dependents: Vec<Vec<usize>>,
    /// `in_degree[i]`: 1 when model `i` extends another model of the specification.
    in_degree: Vec<usize>,
}

impl<'a> ModelGraph<'a> {
    pub fn new(models: &'a [ModelSpec]) -> Self {
        let index: BTreeMap<&str, usize> = models
            .iter()
            .enumerate()
            .map(|(i, m)| (m.name.as_str(), i))
            .collect();
        let mut dependents = vec![Vec::new(); models.len()];
        let mut in_degree = vec![0; models.len()];
        for (i, model) in models.iter().enumerate() {
            if let Some(&base) = model.extends.as_deref().and_then(|b| index.get(b)) {
                dependents[base].push(i);
                in_degree[i] += 1;
            }
        }
        Self {
            models,
            dependents,
            in_degree,
        }
    }

    /// Model indices in load order.
    ///
    /// Kahn's algorithm; among models ready at the same time the one declared
    /// first goes first, so an already-ordered specification keeps its order.
    pub fn load_order(&self) -> Result<Vec<usize>, AssemblyError> {
        let mut in_degree = self.in_degree.clone();
        let mut ready: BTreeSet<usize> = (0..self.models.len()).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(self.models.len());

        while let Some(next) = ready.pop_first() {
            order.push(next);
            for &dependent in &self.dependents[next] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() < self.models.len() {
            let models = (0..self.models.len())
                .filter(|&i| in_degree[i] > 0)
                .map(|i| self.models[i].name.clone())
                .collect();
            return Err(AssemblyError::CyclicDependency { models });
        }
        Ok(order)
    }

    /// Models in load order.
    pub fn sorted(&self) -> Result<Vec<&'a ModelSpec>, AssemblyError> {
        Ok(self.load_order()?.into_iter().map(|i| &self.models[i]).collect())
    }
}
