//! Structural model - the inbound data contract of the solver
//!
//! A model is a plain snapshot: nodes, elements, materials, sections,
//! supports, loads and combinations keyed by caller-supplied names. Every
//! analysis run borrows it immutably and builds its own DOF mapping and
//! matrices, so independent runs never share mutable state.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::elements::{Element, Material, Node, Section, Support};
use crate::error::{SolverError, SolverResult};
use crate::geometry;
use crate::loads::{Load, LoadCombination, LoadKind, DEFAULT_COMBINATION};

/// Structural model of a 3D skeletal structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuralModel {
    #[serde(default)]
    pub nodes: BTreeMap<String, Node>,
    #[serde(default)]
    pub materials: BTreeMap<String, Material>,
    #[serde(default)]
    pub sections: BTreeMap<String, Section>,
    #[serde(default)]
    pub elements: BTreeMap<String, Element>,
    #[serde(default)]
    pub supports: BTreeMap<String, Support>,
    #[serde(default)]
    pub loads: Vec<Load>,
    #[serde(default)]
    pub combinations: BTreeMap<String, LoadCombination>,
}

impl StructuralModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, name: &str, node: Node) -> SolverResult<()> {
        if self.nodes.contains_key(name) {
            return Err(SolverError::DuplicateName(name.to_string()));
        }
        self.nodes.insert(name.to_string(), node);
        Ok(())
    }

    pub fn add_material(&mut self, name: &str, material: Material) -> SolverResult<()> {
        if self.materials.contains_key(name) {
            return Err(SolverError::DuplicateName(name.to_string()));
        }
        material.validate(name)?;
        self.materials.insert(name.to_string(), material);
        Ok(())
    }

    pub fn add_section(&mut self, name: &str, section: Section) -> SolverResult<()> {
        if self.sections.contains_key(name) {
            return Err(SolverError::DuplicateName(name.to_string()));
        }
        section.validate(name)?;
        self.sections.insert(name.to_string(), section);
        Ok(())
    }

    /// Add an element; both end nodes, the material and the section must
    /// already exist and the element must have non-zero length
    pub fn add_element(&mut self, name: &str, element: Element) -> SolverResult<()> {
        if self.elements.contains_key(name) {
            return Err(SolverError::DuplicateName(name.to_string()));
        }
        self.check_element(&element)?;
        self.elements.insert(name.to_string(), element);
        Ok(())
    }

    /// Add or replace the support at a node
    pub fn add_support(&mut self, node: &str, support: Support) -> SolverResult<()> {
        if !self.nodes.contains_key(node) {
            return Err(SolverError::NodeNotFound(node.to_string()));
        }
        self.supports.insert(node.to_string(), support);
        Ok(())
    }

    pub fn add_load(&mut self, load: Load) -> SolverResult<()> {
        self.check_load(&load)?;
        self.loads.push(load);
        Ok(())
    }

    pub fn add_combination(&mut self, combination: LoadCombination) -> SolverResult<()> {
        if self.combinations.contains_key(&combination.name) {
            return Err(SolverError::DuplicateName(combination.name.clone()));
        }
        self.combinations.insert(combination.name.clone(), combination);
        Ok(())
    }

    pub fn node(&self, name: &str) -> SolverResult<&Node> {
        self.nodes
            .get(name)
            .ok_or_else(|| SolverError::NodeNotFound(name.to_string()))
    }

    pub fn element(&self, name: &str) -> SolverResult<&Element> {
        self.elements
            .get(name)
            .ok_or_else(|| SolverError::ElementNotFound(name.to_string()))
    }

    pub fn material(&self, name: &str) -> SolverResult<&Material> {
        self.materials
            .get(name)
            .ok_or_else(|| SolverError::MaterialNotFound(name.to_string()))
    }

    pub fn section(&self, name: &str) -> SolverResult<&Section> {
        self.sections
            .get(name)
            .ok_or_else(|| SolverError::SectionNotFound(name.to_string()))
    }

    /// Length of a named element
    pub fn element_length(&self, name: &str) -> SolverResult<f64> {
        let element = self.element(name)?;
        geometry::element_length(
            &self.node(&element.i_node)?.coords(),
            &self.node(&element.j_node)?.coords(),
        )
    }

    /// Look up a combination; with none defined, the default
    /// `"Combo 1" = 1.0 x "Case 1"` is synthesized.
    ///
    /// `None` selects the first combination by name.
    pub fn resolve_combination(&self, name: Option<&str>) -> SolverResult<LoadCombination> {
        match name {
            Some(name) => match self.combinations.get(name) {
                Some(combo) => Ok(combo.clone()),
                None if self.combinations.is_empty() && name == DEFAULT_COMBINATION => {
                    Ok(LoadCombination::default_combination())
                }
                None => Err(SolverError::LoadCombinationNotFound(name.to_string())),
            },
            None => Ok(self
                .combinations
                .values()
                .next()
                .cloned()
                .unwrap_or_else(LoadCombination::default_combination)),
        }
    }

    /// Distinct load case names
    pub fn load_cases(&self) -> BTreeSet<&str> {
        self.loads.iter().map(|l| l.case.as_str()).collect()
    }

    /// Re-check every cross reference; used for models built by
    /// deserialization rather than through the `add_*` methods
    pub fn validate(&self) -> SolverResult<()> {
        if self.nodes.is_empty() {
            return Err(SolverError::InvalidInput("model has no nodes".into()));
        }
        for (name, material) in &self.materials {
            material.validate(name)?;
        }
        for (name, section) in &self.sections {
            section.validate(name)?;
        }
        for element in self.elements.values() {
            self.check_element(element)?;
        }
        for node in self.supports.keys() {
            self.node(node)?;
        }
        for load in &self.loads {
            self.check_load(load)?;
        }
        Ok(())
    }

    fn check_element(&self, element: &Element) -> SolverResult<()> {
        let i = self.node(&element.i_node)?;
        let j = self.node(&element.j_node)?;
        self.material(&element.material)?;
        self.section(&element.section)?;
        geometry::element_length(&i.coords(), &j.coords())?;
        Ok(())
    }

    fn check_load(&self, load: &Load) -> SolverResult<()> {
        match &load.kind {
            LoadKind::Nodal(l) => {
                self.node(&l.node)?;
            }
            LoadKind::Point(l) => {
                let length = self.element_length(&l.element)?;
                if !(0.0..=length).contains(&l.position) {
                    return Err(SolverError::InvalidInput(format!(
                        "point load at {} on '{}' is outside [0, {length}]",
                        l.position, l.element
                    )));
                }
            }
            LoadKind::Distributed(l) => {
                let length = self.element_length(&l.element)?;
                l.segments(length)?;
            }
            LoadKind::Area(l) => {
                self.element(&l.element)?;
            }
        }
        Ok(())
    }
}
