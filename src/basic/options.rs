use serde::{Deserialize, Serialize};

use super::error::Result;

/// Iteration policy shared by the solvers.
///
/// Every field has a default, so a partial JSON object such as
/// `{"tolerance": 1e-6}` is a valid configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    /// Iteration cap; reaching it is a normal outcome.
    pub max_iter: usize,
    /// Stop once the round's maximum mismatch (p.u.) is at or below this.
    pub tolerance: f64,
    /// Gauss-Seidel acceleration factor, 1.0 disables it.
    pub acceleration: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iter: 20,
            tolerance: 1e-3,
            acceleration: 1.0,
        }
    }
}

impl SolverOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let opt = SolverOptions::from_json(r#"{"tolerance": 1e-6}"#).unwrap();
        assert_eq!(opt.tolerance, 1e-6);
        assert_eq!(opt.max_iter, 20);
        assert_eq!(opt.acceleration, 1.0);
    }

    #[test]
    fn test_bad_json_is_an_error() {
        assert!(SolverOptions::from_json(r#"{"max_iter": -1}"#).is_err());
    }
}
