//! Structural model records: nodes, line elements, materials, sections, supports

mod element;
mod material;
mod node;
mod section;
mod support;

pub use element::{Element, ElementType, MemberReleases};
pub use material::Material;
pub use node::Node;
pub use section::Section;
pub use support::Support;
