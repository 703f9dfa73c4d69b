//! Helical track trajectories in a solenoidal field along z.

use std::f32::consts::TAU;

use crate::error::{Error, Result};
use crate::vector::CartesianVector;

/// Curvature constant: transverse momentum (GeV) per tesla per mm of radius.
pub const FCT: f32 = 2.997_924_6e-4;

/// Trajectory queries needed by the fragment-removal metrics.
pub trait HelixTrajectory: Send + Sync {
    /// Point the helix is anchored at.
    fn reference_point(&self) -> CartesianVector;

    /// Point on the helix at plane `z`, propagating from `reference_point`.
    fn point_in_z(&self, z: f32, reference_point: &CartesianVector) -> Result<CartesianVector>;

    /// Distance from a point to the helix.
    ///
    /// Components: x holds the transverse distance, y the distance along z,
    /// z the full 3D distance.
    fn distance_to_point(&self, point: &CartesianVector) -> Result<CartesianVector>;
}

/// Helix fitted from a track state in a uniform field `b_field` along +z.
#[derive(Debug, Clone, PartialEq)]
pub struct Helix {
    reference_point: CartesianVector,
    momentum: CartesianVector,
    charge: f32,
    radius: f32,
    tan_lambda: f32,
    x_centre: f32,
    y_centre: f32,
}

impl Helix {
    /// Builds the helix passing through `position` with `momentum`.
    ///
    /// Only the sign of `charge` is used.
    pub fn new(
        position: CartesianVector,
        momentum: CartesianVector,
        charge: f32,
        b_field: f32,
    ) -> Result<Self> {
        if !position.is_finite() || !momentum.is_finite() {
            return Err(Error::InvalidParameter(
                "helix state must be finite".to_string(),
            ));
        }
        if b_field.is_nan() || b_field <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "helix needs a positive field, got {b_field}"
            )));
        }
        if charge == 0.0 || !charge.is_finite() {
            return Err(Error::InvalidParameter(
                "helix needs a charged track".to_string(),
            ));
        }

        let pxy = momentum.transverse();
        if pxy <= 0.0 {
            return Err(Error::InvalidParameter(
                "helix needs non-zero transverse momentum".to_string(),
            ));
        }

        let charge = charge.signum();
        let radius = pxy / (FCT * b_field);

        // Positive charges turn clockwise seen from +z: centre lies to the right
        let x_centre = position.x + charge * radius * momentum.y / pxy;
        let y_centre = position.y - charge * radius * momentum.x / pxy;

        Ok(Self {
            reference_point: position,
            momentum,
            charge,
            radius,
            tan_lambda: momentum.z / pxy,
            x_centre,
            y_centre,
        })
    }

    /// Radius of curvature (mm).
    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Ratio of longitudinal to transverse momentum.
    #[inline]
    pub fn tan_lambda(&self) -> f32 {
        self.tan_lambda
    }

    /// Momentum at the reference point.
    #[inline]
    pub fn momentum(&self) -> CartesianVector {
        self.momentum
    }

    /// Sign of the charge.
    #[inline]
    pub fn charge(&self) -> f32 {
        self.charge
    }

    fn azimuth(&self, point: &CartesianVector) -> f32 {
        (point.y - self.y_centre).atan2(point.x - self.x_centre)
    }
}

impl HelixTrajectory for Helix {
    fn reference_point(&self) -> CartesianVector {
        self.reference_point
    }

    fn point_in_z(&self, z: f32, reference_point: &CartesianVector) -> Result<CartesianVector> {
        if self.tan_lambda.abs() < f32::EPSILON {
            return Err(Error::Failure(
                "helix does not advance along z".to_string(),
            ));
        }

        let phi = self.azimuth(reference_point)
            - self.charge * (z - reference_point.z) / (self.radius * self.tan_lambda);

        Ok(CartesianVector::new(
            self.x_centre + self.radius * phi.cos(),
            self.y_centre + self.radius * phi.sin(),
            z,
        ))
    }

    fn distance_to_point(&self, point: &CartesianVector) -> Result<CartesianVector> {
        if !point.is_finite() {
            return Err(Error::InvalidParameter(format!(
                "distance to non-finite point {point:?}"
            )));
        }

        let distance_xy =
            ((point.x - self.x_centre).hypot(point.y - self.y_centre) - self.radius).abs();

        // z on the helix at the point's azimuth, then the nearest turn
        let delta_phi = self.azimuth(point) - self.azimuth(&self.reference_point);
        let z_on_helix =
            self.reference_point.z - self.charge * delta_phi * self.radius * self.tan_lambda;
        let pitch = TAU * self.radius * self.tan_lambda.abs();

        let mut delta_z = point.z - z_on_helix;
        if pitch > 0.0 {
            delta_z -= pitch * (delta_z / pitch).round();
        } else {
            delta_z = point.z - self.reference_point.z;
        }
        let distance_z = delta_z.abs();

        Ok(CartesianVector::new(
            distance_xy,
            distance_z,
            distance_xy.hypot(distance_z),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn make_helix(charge: f32) -> Helix {
        Helix::new(
            CartesianVector::new(100.0, 0.0, 1_000.0),
            CartesianVector::new(1.0, 0.5, 2.0),
            charge,
            3.5,
        )
        .unwrap()
    }

    #[test]
    fn test_point_in_z_at_reference() {
        let helix = make_helix(1.0);
        let reference = helix.reference_point();
        let point = helix.point_in_z(reference.z, &reference).unwrap();
        assert_abs_diff_eq!(point.x, reference.x, epsilon = 1e-2);
        assert_abs_diff_eq!(point.y, reference.y, epsilon = 1e-2);
    }

    #[test]
    fn test_points_on_helix_have_zero_distance() {
        for charge in [1.0, -1.0] {
            let helix = make_helix(charge);
            let reference = helix.reference_point();
            for z in [1_050.0, 1_200.0, 1_600.0] {
                let point = helix.point_in_z(z, &reference).unwrap();
                let distance = helix.distance_to_point(&point).unwrap();
                assert_abs_diff_eq!(distance.z, 0.0, epsilon = 0.5);
            }
        }
    }

    #[test]
    fn test_initial_direction_follows_momentum() {
        let helix = make_helix(1.0);
        let reference = helix.reference_point();
        let step = helix.point_in_z(reference.z + 1.0, &reference).unwrap() - reference;
        let momentum = helix.momentum();
        // A 1 mm step in z follows the momentum direction
        assert!(step.cos_opening_angle(&momentum) > 0.999);
    }

    #[test]
    fn test_distance_components() {
        let helix = make_helix(-1.0);
        let reference = helix.reference_point();
        let offset = reference + CartesianVector::new(0.0, 0.0, 30.0);
        let distance = helix.distance_to_point(&offset).unwrap();
        assert!(distance.z > 0.0);
        assert_abs_diff_eq!(
            distance.z,
            distance.x.hypot(distance.y),
            epsilon = 1e-3
        );
    }

    #[test]
    fn test_invalid_helix_parameters() {
        let position = CartesianVector::new(0.0, 0.0, 0.0);
        assert!(Helix::new(position, CartesianVector::new(1.0, 0.0, 0.0), 1.0, 0.0).is_err());
        assert!(Helix::new(position, CartesianVector::new(1.0, 0.0, 0.0), 0.0, 3.5).is_err());
        assert!(Helix::new(position, CartesianVector::new(0.0, 0.0, 5.0), 1.0, 3.5).is_err());
    }

    #[test]
    fn test_flat_helix_cannot_reach_z_plane() {
        let helix = Helix::new(
            CartesianVector::ZERO,
            CartesianVector::new(1.0, 0.0, 0.0),
            1.0,
            3.5,
        )
        .unwrap();
        assert!(matches!(
            helix.point_in_z(10.0, &CartesianVector::ZERO),
            Err(Error::Failure(_))
        ));
    }
}
