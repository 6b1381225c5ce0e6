//! Load combinations: ordered `(case, factor)` lists

use serde::{Deserialize, Serialize};

/// Case used when a load does not name one
pub const DEFAULT_CASE: &str = "Case 1";
/// Combination synthesized for models that define none
pub const DEFAULT_COMBINATION: &str = "Combo 1";

/// Weighted sum of load cases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadCombination {
    pub name: String,
    pub factors: Vec<(String, f64)>,
}

impl LoadCombination {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), factors: Vec::new() }
    }

    /// One case at factor 1.0
    pub fn single(name: &str, case: &str) -> Self {
        Self::new(name).with_case(case, 1.0)
    }

    pub fn with_case(mut self, case: &str, factor: f64) -> Self {
        self.factors.push((case.to_string(), factor));
        self
    }

    /// `"Combo 1" = 1.0 x "Case 1"`
    pub fn default_combination() -> Self {
        Self::single(DEFAULT_COMBINATION, DEFAULT_CASE)
    }

    /// Total factor applied to `case`; zero when the case is not listed
    pub fn factor(&self, case: &str) -> f64 {
        self.factors
            .iter()
            .filter(|(name, _)| name == case)
            .map(|(_, f)| f)
            .sum()
    }

    pub fn includes(&self, case: &str) -> bool {
        self.factor(case).abs() > 1e-12
    }

    /// Case names in listing order
    pub fn cases(&self) -> impl Iterator<Item = &str> {
        self.factors.iter().map(|(name, _)| name.as_str())
    }
}
