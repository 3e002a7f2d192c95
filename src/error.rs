//! Error types for setup-time validation.
//!
//! Frame-time operations never fail; only building a grid or applying a
//! new configuration can be rejected.

use thiserror::Error;

/// Errors emitted when constructing the spatial grid.
#[derive(Debug, Error, PartialEq)]
pub enum GridError {
    /// World size or cell size that cannot produce a grid.
    #[error("invalid grid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Errors emitted when validating flocking or cache parameters.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// A parameter that must be a finite number is NaN or infinite.
    #[error("{0} must be a finite number")]
    NotFinite(&'static str),
    /// A parameter that must be non-negative is below zero.
    #[error("{0} must not be negative")]
    Negative(&'static str),
    /// A parameter that must be strictly positive is zero or below.
    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),
}

/// Errors emitted when building a whole simulation.
#[derive(Debug, Error, PartialEq)]
pub enum SimulationError {
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub(crate) fn require_non_negative(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::NotFinite(name));
    }
    if value < 0.0 {
        return Err(ConfigError::Negative(name));
    }
    Ok(())
}

pub(crate) fn require_positive(name: &'static str, value: f32) -> Result<(), ConfigError> {
    require_non_negative(name, value)?;
    if value == 0.0 {
        return Err(ConfigError::NotPositive(name));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_field() {
        let err = require_positive("max_speed", 0.0).unwrap_err();
        assert_eq!(err.to_string(), "max_speed must be greater than zero");

        let err = require_non_negative("seek_weight", f32::NAN).unwrap_err();
        assert_eq!(err, ConfigError::NotFinite("seek_weight"));
    }

    #[test]
    fn simulation_error_wraps_sources() {
        let err: SimulationError = GridError::InvalidConfig("cell_size must be a positive number").into();
        assert_eq!(
            err.to_string(),
            "invalid grid configuration: cell_size must be a positive number"
        );
    }
}
