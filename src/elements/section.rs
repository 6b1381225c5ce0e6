//! Cross-section properties of line elements

use serde::{Deserialize, Serialize};

use crate::error::{SolverError, SolverResult};

/// Section record; `iy`/`iz` are about the element's local y/z axes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Area (m²)
    pub a: f64,
    /// Moment of inertia about local y (m⁴)
    pub iy: f64,
    /// Moment of inertia about local z (m⁴)
    pub iz: f64,
    /// Torsional constant (m⁴)
    pub j: f64,
    /// Plastic modulus about local y (m³)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zy: Option<f64>,
    /// Plastic modulus about local z (m³)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zz: Option<f64>,
    /// Extreme-fibre distances used to derive elastic moduli `I / c`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
}

impl Section {
    pub fn new(a: f64, iy: f64, iz: f64, j: f64) -> Self {
        Self {
            a,
            iy,
            iz,
            j,
            zy: None,
            zz: None,
            depth: None,
            width: None,
        }
    }

    /// Solid rectangle; depth runs along local y, width along local z
    pub fn rectangular(width: f64, depth: f64) -> Self {
        let (long, short) = if width > depth { (width, depth) } else { (depth, width) };
        Self {
            a: width * depth,
            iy: depth * width.powi(3) / 12.0,
            iz: width * depth.powi(3) / 12.0,
            j: long * short.powi(3) * (1.0 / 3.0 - 0.21 * short / long * (1.0 - short.powi(4) / (12.0 * long.powi(4)))),
            zy: Some(depth * width * width / 4.0),
            zz: Some(width * depth * depth / 4.0),
            depth: Some(depth),
            width: Some(width),
        }
    }

    /// Solid circle
    pub fn circular(diameter: f64) -> Self {
        let r = diameter / 2.0;
        let i = std::f64::consts::PI * r.powi(4) / 4.0;
        let z = diameter.powi(3) / 6.0;
        Self {
            a: std::f64::consts::PI * r * r,
            iy: i,
            iz: i,
            j: 2.0 * i,
            zy: Some(z),
            zz: Some(z),
            depth: Some(diameter),
            width: Some(diameter),
        }
    }

    /// Doubly-symmetric I section with the web along local y (strong axis z)
    pub fn i_section(depth: f64, flange_width: f64, flange_thickness: f64, web_thickness: f64) -> Self {
        let (d, bf, tf, tw) = (depth, flange_width, flange_thickness, web_thickness);
        let hw = d - 2.0 * tf;
        Self {
            a: 2.0 * bf * tf + hw * tw,
            iy: (2.0 * tf * bf.powi(3) + hw * tw.powi(3)) / 12.0,
            iz: (bf * d.powi(3) - (bf - tw) * hw.powi(3)) / 12.0,
            j: (2.0 * bf * tf.powi(3) + hw * tw.powi(3)) / 3.0,
            zy: Some(tf * bf * bf / 2.0 + hw * tw * tw / 4.0),
            zz: Some(bf * tf * (d - tf) + tw * hw * hw / 4.0),
            depth: Some(d),
            width: Some(bf),
        }
    }

    pub fn with_plastic_moduli(mut self, zy: f64, zz: f64) -> Self {
        self.zy = Some(zy);
        self.zz = Some(zz);
        self
    }

    /// Polar moment `Iy + Iz`
    pub fn ip(&self) -> f64 {
        self.iy + self.iz
    }

    /// Elastic moduli `(Sy, Sz)` when the outline dimensions are known
    pub fn elastic_moduli(&self) -> Option<(f64, f64)> {
        let (w, d) = (self.width?, self.depth?);
        Some((2.0 * self.iy / w, 2.0 * self.iz / d))
    }

    /// Moduli used for hinge capacity: plastic, else elastic
    pub fn capacity_moduli(&self) -> Option<(f64, f64)> {
        match (self.zy, self.zz) {
            (Some(zy), Some(zz)) => Some((zy, zz)),
            _ => self.elastic_moduli(),
        }
    }

    pub(crate) fn validate(&self, name: &str) -> SolverResult<()> {
        let props = [self.a, self.iy, self.iz, self.j];
        if props.iter().any(|p| !p.is_finite() || *p < 0.0) || self.a <= 0.0 {
            return Err(SolverError::InvalidInput(format!(
                "section '{name}' needs positive area and non-negative inertias"
            )));
        }
        Ok(())
    }
}

impl Default for Section {
    fn default() -> Self {
        Self::rectangular(0.2, 0.2)
    }
}
