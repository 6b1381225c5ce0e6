//! Linear-elastic material record

use serde::{Deserialize, Serialize};

use crate::error::{SolverError, SolverResult};

/// Isotropic material; immutable once referenced by an assembled matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Elastic modulus (Pa)
    pub e: f64,
    /// Shear modulus (Pa)
    pub g: f64,
    /// Poisson's ratio
    pub nu: f64,
    /// Density (kg/m³)
    pub rho: f64,
    /// Yield strength (Pa), used for plastic hinge detection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fy: Option<f64>,
}

impl Material {
    pub fn new(e: f64, g: f64, nu: f64, rho: f64) -> Self {
        Self { e, g, nu, rho, fy: None }
    }

    /// Shear modulus derived as `E / (2 (1 + nu))`
    pub fn isotropic(e: f64, nu: f64, rho: f64) -> Self {
        Self::new(e, e / (2.0 * (1.0 + nu)), nu, rho)
    }

    pub fn with_yield_strength(mut self, fy: f64) -> Self {
        self.fy = Some(fy);
        self
    }

    /// Structural steel, fy = 250 MPa
    pub fn steel() -> Self {
        Self::isotropic(200e9, 0.3, 7850.0).with_yield_strength(250e6)
    }

    /// Normal-weight concrete from its compressive strength `fc` (Pa),
    /// `E = 4700 sqrt(f'c[MPa])` MPa
    pub fn concrete(fc: f64) -> Self {
        let e = 4700.0 * (fc / 1e6).sqrt() * 1e6;
        Self::isotropic(e, 0.2, 2400.0)
    }

    pub(crate) fn validate(&self, name: &str) -> SolverResult<()> {
        if !(self.e > 0.0 && self.e.is_finite()) || !(self.g > 0.0 && self.g.is_finite()) {
            return Err(SolverError::InvalidInput(format!(
                "material '{name}' needs positive E and G"
            )));
        }
        if self.rho < 0.0 {
            return Err(SolverError::InvalidInput(format!(
                "material '{name}' has negative density"
            )));
        }
        Ok(())
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::steel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn isotropic_shear_modulus() {
        let mat = Material::isotropic(210e9, 0.3, 7850.0);
        assert_relative_eq!(mat.g, 210e9 / 2.6, max_relative = 1e-12);
        assert!(mat.fy.is_none());
    }

    #[test]
    fn zero_modulus_is_invalid() {
        let mat = Material::new(0.0, 1.0, 0.3, 0.0);
        assert!(mat.validate("bad").is_err());
        assert!(Material::concrete(30e6).validate("c30").is_ok());
    }
}
