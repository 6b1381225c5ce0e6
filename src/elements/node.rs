//! Node - a point in 3D space that owns six DOFs

use serde::{Deserialize, Serialize};

/// A structural node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Display label, independent of the identity key in the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Lumped translational mass added at the node (kg)
    #[serde(default)]
    pub mass: f64,
}

impl Node {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            label: None,
            mass: 0.0,
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }

    /// Coordinates as `[x, y, z]`
    pub fn coords(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    pub fn distance_to(&self, other: &Node) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_between_nodes() {
        let a = Node::new(1.0, 2.0, 2.0);
        let b = Node::new(1.0, 5.0, 6.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn optional_fields_default_when_absent() {
        let node: Node = serde_json::from_str(r#"{"x": 1.0, "y": 0.0, "z": -2.0}"#).unwrap();
        assert_eq!(node.coords(), [1.0, 0.0, -2.0]);
        assert!(node.label.is_none());
        assert_eq!(node.mass, 0.0);
    }
}
