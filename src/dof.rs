//! Degree-of-freedom bookkeeping
//!
//! Every node owns six contiguous global indices `[DX, DY, DZ, RX, RY, RZ]`
//! in registration order. Restraint flags only ever switch a DOF from free to
//! constrained; once the mapping is finalized no node or restraint may change
//! for the rest of the run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{SolverError, SolverResult};

/// Number of DOFs per node
pub const DOFS_PER_NODE: usize = 6;

/// Local DOF at a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Dof {
    Dx,
    Dy,
    Dz,
    Rx,
    Ry,
    Rz,
}

impl Dof {
    pub const ALL: [Dof; 6] = [Dof::Dx, Dof::Dy, Dof::Dz, Dof::Rx, Dof::Ry, Dof::Rz];

    /// Offset within the node's 6-block
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_translation(self) -> bool {
        self.index() < 3
    }
}

/// Lifecycle of a [`DofManager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DofState {
    Uninitialized,
    /// Nodes are being registered
    Assigning,
    /// At least one restraint applied
    Constrained,
    /// Free/constrained partition frozen
    Finalized,
}

/// Assigns global DOF indices and tracks the free/constrained partition
#[derive(Debug, Clone)]
pub struct DofManager {
    state: DofState,
    node_offsets: BTreeMap<String, usize>,
    node_order: Vec<String>,
    restrained: Vec<bool>,
    prescribed: Vec<f64>,
    // Both kept sorted ascending
    free: Vec<usize>,
    constrained: Vec<usize>,
    // Global index -> position in `free`, built on finalize
    free_position: Vec<Option<usize>>,
}

impl Default for DofManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DofManager {
    pub fn new() -> Self {
        Self {
            state: DofState::Uninitialized,
            node_offsets: BTreeMap::new(),
            node_order: Vec::new(),
            restrained: Vec::new(),
            prescribed: Vec::new(),
            free: Vec::new(),
            constrained: Vec::new(),
            free_position: Vec::new(),
        }
    }

    pub fn state(&self) -> DofState {
        self.state
    }

    fn ensure_mutable(&self) -> SolverResult<()> {
        if self.state == DofState::Finalized {
            return Err(SolverError::DofMappingFinalized);
        }
        Ok(())
    }

    /// Allocate the next six contiguous indices for `node`
    pub fn assign_node_dofs(&mut self, node: &str) -> SolverResult<[usize; 6]> {
        self.ensure_mutable()?;
        if self.node_offsets.contains_key(node) {
            return Err(SolverError::DuplicateNode(node.to_string()));
        }

        let offset = self.restrained.len();
        self.node_offsets.insert(node.to_string(), offset);
        self.node_order.push(node.to_string());
        self.restrained.extend([false; DOFS_PER_NODE]);
        self.prescribed.extend([0.0; DOFS_PER_NODE]);
        // New indices are the largest so far; `free` stays sorted
        self.free.extend(offset..offset + DOFS_PER_NODE);

        if self.state == DofState::Uninitialized {
            self.state = DofState::Assigning;
        }
        Ok(std::array::from_fn(|i| offset + i))
    }

    /// Mark restrained DOFs of `node` as constrained.
    ///
    /// `false` flags leave the DOF as it was; a constrained DOF is never
    /// released again.
    pub fn apply_boundary_conditions(&mut self, node: &str, restraints: [bool; 6]) -> SolverResult<()> {
        self.ensure_mutable()?;
        let dofs = self.node_dofs(node)?;
        for (dof, restrained) in dofs.into_iter().zip(restraints) {
            if restrained && !self.restrained[dof] {
                self.restrained[dof] = true;
                if let Ok(pos) = self.free.binary_search(&dof) {
                    self.free.remove(pos);
                }
                if let Err(pos) = self.constrained.binary_search(&dof) {
                    self.constrained.insert(pos, dof);
                }
            }
        }
        if restraints.iter().any(|&r| r) {
            self.state = DofState::Constrained;
        }
        Ok(())
    }

    /// Enforced value on a DOF; the DOF is constrained as a side effect
    pub fn prescribe(&mut self, node: &str, dof: Dof, value: f64) -> SolverResult<()> {
        let mut flags = [false; 6];
        flags[dof.index()] = true;
        self.apply_boundary_conditions(node, flags)?;
        let index = self.node_dofs(node)?[dof.index()];
        self.prescribed[index] = value;
        Ok(())
    }

    /// Freeze the partition and build the compact free-DOF numbering
    pub fn finalize_dof_mapping(&mut self) {
        if self.state == DofState::Finalized {
            return;
        }
        let mut position = vec![None; self.restrained.len()];
        for (i, &dof) in self.free.iter().enumerate() {
            position[dof] = Some(i);
        }
        self.free_position = position;
        self.state = DofState::Finalized;
        log::debug!(
            "DOF mapping finalized: {} total, {} free, {} constrained",
            self.total_dofs(),
            self.free.len(),
            self.constrained.len()
        );
    }

    pub fn is_finalized(&self) -> bool {
        self.state == DofState::Finalized
    }

    /// The six global indices of `node`
    pub fn node_dofs(&self, node: &str) -> SolverResult<[usize; 6]> {
        let offset = self
            .node_offsets
            .get(node)
            .ok_or_else(|| SolverError::UnassignedNode(node.to_string()))?;
        Ok(std::array::from_fn(|i| offset + i))
    }

    /// Global index of one DOF at a node
    pub fn dof_index(&self, node: &str, dof: Dof) -> SolverResult<usize> {
        Ok(self.node_dofs(node)?[dof.index()])
    }

    /// The twelve global indices of a two-node element, i-node first
    pub fn element_dofs(&self, i_node: &str, j_node: &str) -> SolverResult<[usize; 12]> {
        let i = self.node_dofs(i_node)?;
        let j = self.node_dofs(j_node)?;
        Ok(std::array::from_fn(|k| if k < 6 { i[k] } else { j[k - 6] }))
    }

    pub fn total_dofs(&self) -> usize {
        self.restrained.len()
    }

    pub fn node_count(&self) -> usize {
        self.node_order.len()
    }

    /// Free global indices, ascending
    pub fn free_dofs(&self) -> &[usize] {
        &self.free
    }

    /// Constrained global indices, ascending
    pub fn constrained_dofs(&self) -> &[usize] {
        &self.constrained
    }

    pub fn is_restrained(&self, dof: usize) -> bool {
        self.restrained.get(dof).copied().unwrap_or(false)
    }

    /// Position of a global DOF in the compact free numbering
    pub fn free_position(&self, dof: usize) -> Option<usize> {
        self.free_position.get(dof).copied().flatten()
    }

    /// Prescribed value per global DOF (zero where none was given)
    pub fn prescribed_values(&self) -> &[f64] {
        &self.prescribed
    }

    pub fn has_settlements(&self) -> bool {
        self.prescribed.iter().any(|v| *v != 0.0)
    }

    /// Nodes in registration order
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.node_order.iter().map(String::as_str)
    }

    /// Node owning a global DOF and the local DOF at that node
    pub fn locate(&self, dof: usize) -> Option<(&str, Dof)> {
        let node = self.node_order.get(dof / DOFS_PER_NODE)?;
        Some((node.as_str(), Dof::ALL[dof % DOFS_PER_NODE]))
    }
}
