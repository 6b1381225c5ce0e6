//! Two-node line element (beam, column, brace or truss)

use serde::{Deserialize, Serialize};

/// Element type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    #[default]
    Beam,
    Column,
    Brace,
    /// Axial stiffness only
    Truss,
}

/// Member end releases in local coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberReleases {
    /// i-node releases [DX, DY, DZ, RX, RY, RZ]
    pub i_node: [bool; 6],
    /// j-node releases [DX, DY, DZ, RX, RY, RZ]
    pub j_node: [bool; 6],
}

impl MemberReleases {
    const MOMENTS: [bool; 6] = [false, false, false, false, true, true];

    /// Bending moment release at the i-node
    pub fn pin_i() -> Self {
        Self { i_node: Self::MOMENTS, j_node: [false; 6] }
    }

    /// Bending moment release at the j-node
    pub fn pin_j() -> Self {
        Self { i_node: [false; 6], j_node: Self::MOMENTS }
    }

    pub fn pin_both() -> Self {
        Self { i_node: Self::MOMENTS, j_node: Self::MOMENTS }
    }

    /// Flattened `[i_node..., j_node...]`
    pub fn as_array(&self) -> [bool; 12] {
        std::array::from_fn(|k| if k < 6 { self.i_node[k] } else { self.j_node[k - 6] })
    }

    pub fn any(&self) -> bool {
        self.i_node.iter().chain(self.j_node.iter()).any(|&r| r)
    }
}

/// A line element connecting two nodes of the same model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    #[serde(default)]
    pub element_type: ElementType,
    pub i_node: String,
    pub j_node: String,
    pub material: String,
    pub section: String,
    /// Orientation angle about local x (radians)
    #[serde(default)]
    pub rotation: f64,
    /// Overrides the default up vector used to orient local y
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_vector: Option<[f64; 3]>,
    #[serde(default)]
    pub releases: MemberReleases,
    /// Line mass (kg/m) replacing `rho * A`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mass_per_length: Option<f64>,
}

impl Element {
    pub fn new(i_node: &str, j_node: &str, material: &str, section: &str) -> Self {
        Self {
            element_type: ElementType::Beam,
            i_node: i_node.to_string(),
            j_node: j_node.to_string(),
            material: material.to_string(),
            section: section.to_string(),
            rotation: 0.0,
            reference_vector: None,
            releases: MemberReleases::default(),
            mass_per_length: None,
        }
    }

    /// Axial-only member
    pub fn truss(i_node: &str, j_node: &str, material: &str, section: &str) -> Self {
        Self::new(i_node, j_node, material, section).with_type(ElementType::Truss)
    }

    pub fn with_type(mut self, element_type: ElementType) -> Self {
        self.element_type = element_type;
        self
    }

    pub fn with_rotation(mut self, rotation: f64) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_reference_vector(mut self, reference: [f64; 3]) -> Self {
        self.reference_vector = Some(reference);
        self
    }

    pub fn with_releases(mut self, releases: MemberReleases) -> Self {
        self.releases = releases;
        self
    }

    pub fn with_mass_per_length(mut self, mass_per_length: f64) -> Self {
        self.mass_per_length = Some(mass_per_length);
        self
    }

    pub fn is_axial_only(&self) -> bool {
        self.element_type == ElementType::Truss
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_release_flags_rotations_only() {
        let arr = MemberReleases::pin_j().as_array();
        assert!(!arr[5]);
        assert!(!arr[6]);
        assert!(arr[10] && arr[11]);
        assert!(!MemberReleases::default().any());
    }

    #[test]
    fn element_type_deserializes_snake_case() {
        let json = r#"{"element_type": "truss", "i_node": "A", "j_node": "B",
                       "material": "steel", "section": "rod"}"#;
        let el: Element = serde_json::from_str(json).unwrap();
        assert!(el.is_axial_only());
        assert_eq!(el.rotation, 0.0);
    }
}
