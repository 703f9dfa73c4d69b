//! Detector geometry oracle.

use crate::error::{Error, Result};
use crate::hit::PseudoLayer;
use crate::vector::CartesianVector;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maps positions onto the calorimeter layer structure.
///
/// Implementations are read-only during reconstruction, so they can be
/// shared across threads.
pub trait GeometryOracle: Send + Sync {
    /// Pseudo-layer containing a position, `NotFound` if none does.
    fn pseudo_layer(&self, position: &CartesianVector) -> Result<PseudoLayer>;

    /// Whether a position lies outside the calorimeter footprint.
    fn is_outside_footprint(&self, position: &CartesianVector) -> bool;

    /// Whether a position lies in an instrumented gap (cracks between modules).
    fn is_in_gap_region(&self, position: &CartesianVector) -> bool;
}

/// Calorimeter planes stacked along |z| from an inner face.
///
/// Pseudo-layer 0 is the region in front of the first plane; planes are
/// numbered from 1. The footprint is a cylinder of `outer_radius` ending at
/// the back of the last plane. Gap regions are given as |z| intervals.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LayeredGeometry {
    /// |z| of the front face of layer 1 (mm).
    pub inner_z: f32,
    /// Thickness of one layer (mm).
    pub layer_thickness: f32,
    /// Number of instrumented layers.
    pub n_layers: PseudoLayer,
    /// Transverse extent of the footprint (mm).
    pub outer_radius: f32,
    /// |z| intervals treated as gaps.
    #[cfg_attr(feature = "serde", serde(default))]
    pub gap_regions: Vec<(f32, f32)>,
}

impl Default for LayeredGeometry {
    fn default() -> Self {
        Self {
            inner_z: 2_400.0,
            layer_thickness: 10.0,
            n_layers: 78,
            outer_radius: 3_000.0,
            gap_regions: Vec::new(),
        }
    }
}

impl LayeredGeometry {
    /// Creates a geometry after checking its dimensions.
    pub fn new(
        inner_z: f32,
        layer_thickness: f32,
        n_layers: PseudoLayer,
        outer_radius: f32,
    ) -> Result<Self> {
        let geometry = Self {
            inner_z,
            layer_thickness,
            n_layers,
            outer_radius,
            gap_regions: Vec::new(),
        };
        geometry.validate()?;
        Ok(geometry)
    }

    /// Adds a gap between two |z| values.
    #[must_use]
    pub fn with_gap_region(mut self, z_min: f32, z_max: f32) -> Self {
        self.gap_regions.push((z_min.min(z_max), z_min.max(z_max)));
        self
    }

    /// Checks that every dimension is physical.
    pub fn validate(&self) -> Result<()> {
        if !(self.inner_z >= 0.0 && self.layer_thickness > 0.0 && self.outer_radius > 0.0) {
            return Err(Error::InvalidParameter(format!(
                "non-physical geometry: inner_z={}, thickness={}, radius={}",
                self.inner_z, self.layer_thickness, self.outer_radius
            )));
        }
        if self.n_layers == 0 {
            return Err(Error::InvalidParameter(
                "geometry needs at least one layer".to_string(),
            ));
        }
        Ok(())
    }

    /// |z| of the back face of the last layer.
    #[must_use]
    pub fn outer_z(&self) -> f32 {
        self.inner_z + self.layer_thickness * self.n_layers as f32
    }

    /// Signed z at the centre of a layer, on the side given by `sign`.
    #[must_use]
    pub fn layer_centre_z(&self, layer: PseudoLayer, sign: f32) -> f32 {
        let depth = (layer.max(1) as f32 - 0.5) * self.layer_thickness;
        (self.inner_z + depth).copysign(sign)
    }
}

impl GeometryOracle for LayeredGeometry {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn pseudo_layer(&self, position: &CartesianVector) -> Result<PseudoLayer> {
        let abs_z = position.z.abs();

        if !abs_z.is_finite() {
            return Err(Error::NotFound(format!("pseudo-layer for z={}", position.z)));
        }
        if abs_z < self.inner_z {
            return Ok(0);
        }

        let depth = ((abs_z - self.inner_z) / self.layer_thickness).floor();
        if depth >= self.n_layers as f32 {
            return Err(Error::NotFound(format!(
                "pseudo-layer for z={} beyond layer {}",
                position.z, self.n_layers
            )));
        }
        Ok(depth as PseudoLayer + 1)
    }

    fn is_outside_footprint(&self, position: &CartesianVector) -> bool {
        position.transverse() > self.outer_radius || position.z.abs() > self.outer_z()
    }

    fn is_in_gap_region(&self, position: &CartesianVector) -> bool {
        let abs_z = position.z.abs();
        self.gap_regions
            .iter()
            .any(|&(z_min, z_max)| abs_z >= z_min && abs_z <= z_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pseudo_layer_assignment() {
        let geometry = LayeredGeometry::new(1_000.0, 10.0, 20, 500.0).unwrap();

        assert_eq!(geometry.pseudo_layer(&CartesianVector::new(0.0, 0.0, 500.0)).unwrap(), 0);
        assert_eq!(geometry.pseudo_layer(&CartesianVector::new(0.0, 0.0, 1_000.0)).unwrap(), 1);
        assert_eq!(geometry.pseudo_layer(&CartesianVector::new(0.0, 0.0, 1_015.0)).unwrap(), 2);
        // Symmetric in z
        assert_eq!(geometry.pseudo_layer(&CartesianVector::new(0.0, 0.0, -1_015.0)).unwrap(), 2);
        assert!(geometry
            .pseudo_layer(&CartesianVector::new(0.0, 0.0, 1_250.0))
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_pseudo_layer_far_beyond_calorimeter() {
        let geometry = LayeredGeometry::default();

        for z in [1.0e30_f32, -1.0e30, f32::MAX] {
            assert!(geometry
                .pseudo_layer(&CartesianVector::new(0.0, 0.0, z))
                .unwrap_err()
                .is_not_found());
        }
        assert!(geometry
            .pseudo_layer(&CartesianVector::new(0.0, 0.0, geometry.outer_z()))
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_footprint_and_gaps() {
        let geometry = LayeredGeometry::new(1_000.0, 10.0, 20, 500.0)
            .unwrap()
            .with_gap_region(1_060.0, 1_050.0);

        assert!(!geometry.is_outside_footprint(&CartesianVector::new(100.0, 0.0, 1_100.0)));
        assert!(geometry.is_outside_footprint(&CartesianVector::new(600.0, 0.0, 1_100.0)));
        assert!(geometry.is_outside_footprint(&CartesianVector::new(0.0, 0.0, 1_300.0)));

        assert!(geometry.is_in_gap_region(&CartesianVector::new(0.0, 0.0, -1_055.0)));
        assert!(!geometry.is_in_gap_region(&CartesianVector::new(0.0, 0.0, 1_045.0)));
    }

    #[test]
    fn test_layer_centre_round_trips() {
        let geometry = LayeredGeometry::default();
        for layer in [1, 10, 78] {
            let z = geometry.layer_centre_z(layer, -1.0);
            assert!(z < 0.0);
            assert_eq!(
                geometry.pseudo_layer(&CartesianVector::new(0.0, 0.0, z)).unwrap(),
                layer
            );
        }
    }

    #[test]
    fn test_invalid_geometry() {
        assert!(matches!(
            LayeredGeometry::new(1_000.0, 0.0, 20, 500.0),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            LayeredGeometry::new(1_000.0, 10.0, 0, 500.0),
            Err(Error::InvalidParameter(_))
        ));
    }
}
