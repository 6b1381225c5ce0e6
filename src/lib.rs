//! Frame Solver - analysis engine for 3D skeletal structures
//!
//! Beams, columns, braces and trusses with six DOFs per node, supporting:
//! - Linear static analysis (dense or sparse PCG path, settlements, releases)
//! - P-Delta (second order) analysis
//! - Modal analysis with participation factors
//! - Response spectrum (SRSS / CQC / ABS)
//! - Time history by Newmark-β integration
//! - Incremental nonlinear static analysis with plastic hinge detection
//! - Linear buckling
//!
//! Every run goes through an [`AnalysisCase`](analysis::AnalysisCase) and
//! [`run_analysis`](analysis::run_analysis).
//!
//! ## Example
//! ```rust
//! use frame_solver::prelude::*;
//!
//! let mut model = StructuralModel::new();
//! model.add_material("Steel", Material::steel()).unwrap();
//! model.add_section("R200x400", Section::rectangular(0.2, 0.4)).unwrap();
//! model.add_node("N1", Node::new(0.0, 0.0, 0.0)).unwrap();
//! model.add_node("N2", Node::new(5.0, 0.0, 0.0)).unwrap();
//! model.add_element("M1", Element::new("N1", "N2", "Steel", "R200x400")).unwrap();
//! model.add_support("N1", Support::fixed()).unwrap();
//! model
//!     .add_load(Load::nodal("Case 1", NodalLoad::force("N2", Dof::Dy, -1000.0)))
//!     .unwrap();
//!
//! let mut case = AnalysisCase::for_type("gravity", "LINEAR_STATIC").unwrap();
//! let result = run_analysis(&mut case, &model, None, &CancelToken::new()).unwrap();
//! assert_eq!(case.status, AnalysisStatus::Completed);
//!
//! let tip = &result.payload.static_result().unwrap().displacements["N2"];
//! assert!(tip.dy < 0.0);
//! ```

pub mod analysis;
pub mod assembly;
pub mod dof;
pub mod elements;
pub mod error;
pub mod geometry;
pub mod loads;
pub mod math;
pub mod model;
pub mod results;

// Re-export common types
pub mod prelude {
    pub use crate::analysis::{
        run_analysis, AnalysisCase, AnalysisManager, AnalysisOptions, AnalysisParameters,
        AnalysisStatus, AnalysisType, CancelToken, Direction, Milestone,
    };
    pub use crate::dof::Dof;
    pub use crate::elements::{Element, ElementType, Material, MemberReleases, Node, Section, Support};
    pub use crate::error::{SolverError, SolverResult, SolverWarning};
    pub use crate::loads::{
        AreaLoad, DistributedLoad, ElementPointLoad, Load, LoadCombination, LoadDirection, NodalLoad,
    };
    pub use crate::model::StructuralModel;
    pub use crate::results::{AnalysisResult, ElementForces, NodeDisplacement, Reactions, ResultPayload};
}
