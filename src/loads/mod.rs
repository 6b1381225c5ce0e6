//! Loads, load combinations and the load assembler
//!
//! Every load belongs to one named case. Cases are never mixed implicitly:
//! a load vector is always built for an explicit [`LoadCombination`].

mod assembler;
mod combination;
mod element_load;
mod nodal;

use serde::{Deserialize, Serialize};

pub use assembler::{
    assemble_load_vector, distributed_to_nodal, element_fixed_end_forces, local_equivalent_loads,
    nodal_load_vector,
};
pub use combination::{LoadCombination, DEFAULT_CASE, DEFAULT_COMBINATION};
pub use element_load::{AreaLoad, DistributedLoad, Distribution, ElementPointLoad, LoadDirection};
pub use nodal::NodalLoad;

/// A load assigned to a load case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Load {
    pub case: String,
    #[serde(flatten)]
    pub kind: LoadKind,
}

/// Load payload keyed by kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadKind {
    /// Forces/moments applied directly at a node (global axes)
    Nodal(NodalLoad),
    /// Concentrated force or couple on an element span
    Point(ElementPointLoad),
    /// Line load on an element span
    Distributed(DistributedLoad),
    /// Pressure over a tributary width, carried by a line element
    Area(AreaLoad),
}

impl Load {
    pub fn new(case: &str, kind: LoadKind) -> Self {
        Self { case: case.to_string(), kind }
    }

    pub fn nodal(case: &str, load: NodalLoad) -> Self {
        Self::new(case, LoadKind::Nodal(load))
    }

    pub fn point(case: &str, load: ElementPointLoad) -> Self {
        Self::new(case, LoadKind::Point(load))
    }

    pub fn distributed(case: &str, load: DistributedLoad) -> Self {
        Self::new(case, LoadKind::Distributed(load))
    }

    pub fn area(case: &str, load: AreaLoad) -> Self {
        Self::new(case, LoadKind::Area(load))
    }

    /// Node targeted by a nodal load
    pub fn target_node(&self) -> Option<&str> {
        match &self.kind {
            LoadKind::Nodal(l) => Some(&l.node),
            _ => None,
        }
    }

    /// Element targeted by a span load
    pub fn target_element(&self) -> Option<&str> {
        match &self.kind {
            LoadKind::Nodal(_) => None,
            LoadKind::Point(l) => Some(&l.element),
            LoadKind::Distributed(l) => Some(&l.element),
            LoadKind::Area(l) => Some(&l.element),
        }
    }
}
