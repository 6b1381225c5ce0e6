//! Loads applied directly at nodes

use serde::{Deserialize, Serialize};

use crate::dof::Dof;

/// Nodal action in global axes `[FX, FY, FZ, MX, MY, MZ]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodalLoad {
    pub node: String,
    pub components: [f64; 6],
}

impl NodalLoad {
    pub fn new(node: &str, components: [f64; 6]) -> Self {
        Self { node: node.to_string(), components }
    }

    /// Single component along one DOF
    pub fn force(node: &str, dof: Dof, value: f64) -> Self {
        let mut components = [0.0; 6];
        components[dof.index()] = value;
        Self::new(node, components)
    }
}
