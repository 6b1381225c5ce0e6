//! Support conditions: rigid restraints, elastic springs, dashpots and
//! prescribed settlements per DOF

use serde::{Deserialize, Serialize};

use crate::dof::Dof;

/// Boundary condition at one node
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Support {
    /// Rigid restraint flags [DX, DY, DZ, RX, RY, RZ]
    pub restraints: [bool; 6],
    /// Spring stiffness per DOF; ignored where the DOF is rigidly restrained
    #[serde(default)]
    pub springs: [f64; 6],
    /// Dashpot coefficient per DOF, used by time history
    #[serde(default)]
    pub dampers: [f64; 6],
    /// Enforced displacement per restrained DOF
    #[serde(default)]
    pub settlements: [Option<f64>; 6],
}

impl Support {
    pub fn fixed() -> Self {
        Self::with_restraints([true; 6])
    }

    /// Translations restrained, rotations free
    pub fn pinned() -> Self {
        Self::with_restraints([true, true, true, false, false, false])
    }

    /// Single translational restraint
    pub fn roller(direction: Dof) -> Self {
        let mut restraints = [false; 6];
        restraints[direction.index()] = true;
        Self::with_restraints(restraints)
    }

    pub fn with_restraints(restraints: [bool; 6]) -> Self {
        Self { restraints, ..Default::default() }
    }

    /// Elastic support along one DOF
    pub fn with_spring(mut self, dof: Dof, stiffness: f64) -> Self {
        self.springs[dof.index()] = stiffness;
        self
    }

    pub fn with_damper(mut self, dof: Dof, coefficient: f64) -> Self {
        self.dampers[dof.index()] = coefficient;
        self
    }

    /// Prescribed settlement; restrains the DOF
    pub fn with_settlement(mut self, dof: Dof, value: f64) -> Self {
        self.restraints[dof.index()] = true;
        self.settlements[dof.index()] = Some(value);
        self
    }

    /// Springs acting on DOFs that are not rigidly restrained
    pub fn active_springs(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        (0..6).filter_map(move |i| {
            (!self.restraints[i] && self.springs[i] != 0.0).then_some((i, self.springs[i]))
        })
    }

    pub fn num_restrained(&self) -> usize {
        self.restraints.iter().filter(|&&r| r).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settlement_implies_restraint() {
        let support = Support::pinned().with_settlement(Dof::Rz, 0.002);
        assert_eq!(support.num_restrained(), 4);
        assert_eq!(support.settlements[5], Some(0.002));
    }

    #[test]
    fn springs_on_rigid_dofs_are_inactive() {
        let support = Support::roller(Dof::Dy)
            .with_spring(Dof::Dy, 1e6)
            .with_spring(Dof::Dx, 5e5);
        let active: Vec<_> = support.active_springs().collect();
        assert_eq!(active, vec![(0, 5e5)]);
    }
}
