//! Fragment-removal contact settings.
//!
//! Captured once at the start of a reconstruction pass and passed by
//! reference to every metric that needs a threshold.

use crate::error::{Error, Result};
use crate::hit::PseudoLayer;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Upper bound on helix sampling points for layer-crossing counts.
pub const MAX_SAMPLING_POINTS: u32 = 1000;

/// Thresholds used when comparing a daughter cluster with a parent.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ContactSettings {
    /// Cosine of the half-angle for the widest cone.
    pub cone_cosine_half_angle_1: f32,
    /// Cosine of the half-angle for the intermediate cone.
    pub cone_cosine_half_angle_2: f32,
    /// Cosine of the half-angle for the narrowest cone.
    pub cone_cosine_half_angle_3: f32,
    /// First close-hit distance (mm).
    pub close_hit_distance_1: f32,
    /// Second close-hit distance (mm).
    pub close_hit_distance_2: f32,
    /// Minimum cosine of the opening angle between initial directions for the
    /// hit-distance comparison to run.
    pub min_cos_opening_angle: f32,
    /// Contact-layer proximity cut, in cell widths.
    pub distance_threshold: f32,
    /// Parent MIP fraction above which the helix comparison range is extended.
    pub helix_comparison_mip_fraction_cut: f32,
    /// Layers compared beyond the daughter's inner layer.
    pub helix_comparison_start_offset: PseudoLayer,
    /// Layers compared beyond a MIP-like parent's outer layer.
    pub helix_comparison_start_offset_mip: PseudoLayer,
    /// Max occupied layers used in the helix comparison for non MIP-like parents.
    pub n_helix_comparison_layers: u32,
    /// Max layers a helix may cross between the track projection and the cluster.
    pub max_layers_crossed_by_helix: PseudoLayer,
    /// Max z separation between track projection and cluster (mm).
    pub max_track_cluster_delta_z: f32,
    /// Helix samples used when counting crossed layers.
    pub n_layers_crossed_sampling_points: u32,
}

impl Default for ContactSettings {
    fn default() -> Self {
        Self {
            cone_cosine_half_angle_1: 0.9,
            cone_cosine_half_angle_2: 0.95,
            cone_cosine_half_angle_3: 0.985,
            close_hit_distance_1: 100.0,
            close_hit_distance_2: 50.0,
            min_cos_opening_angle: 0.5,
            distance_threshold: 2.0,
            helix_comparison_mip_fraction_cut: 0.8,
            helix_comparison_start_offset: 20,
            helix_comparison_start_offset_mip: 20,
            n_helix_comparison_layers: 9,
            max_layers_crossed_by_helix: 100,
            max_track_cluster_delta_z: 250.0,
            n_layers_crossed_sampling_points: 100,
        }
    }
}

impl ContactSettings {
    /// Creates settings with the reference values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the three cone half-angle cosines, widest first.
    #[must_use]
    pub fn with_cone_cosine_half_angles(mut self, first: f32, second: f32, third: f32) -> Self {
        self.cone_cosine_half_angle_1 = first;
        self.cone_cosine_half_angle_2 = second;
        self.cone_cosine_half_angle_3 = third;
        self
    }

    /// Sets the two close-hit distances.
    #[must_use]
    pub fn with_close_hit_distances(mut self, first: f32, second: f32) -> Self {
        self.close_hit_distance_1 = first;
        self.close_hit_distance_2 = second;
        self
    }

    /// Sets the opening-angle preselection.
    #[must_use]
    pub fn with_min_cos_opening_angle(mut self, value: f32) -> Self {
        self.min_cos_opening_angle = value;
        self
    }

    /// Sets the contact-layer distance threshold.
    #[must_use]
    pub fn with_distance_threshold(mut self, value: f32) -> Self {
        self.distance_threshold = value;
        self
    }

    /// Sets the MIP fraction cut for the helix comparison.
    #[must_use]
    pub fn with_helix_comparison_mip_fraction_cut(mut self, value: f32) -> Self {
        self.helix_comparison_mip_fraction_cut = value;
        self
    }

    /// Sets the helix comparison layer offsets.
    #[must_use]
    pub fn with_helix_comparison_offsets(mut self, offset: PseudoLayer, offset_mip: PseudoLayer) -> Self {
        self.helix_comparison_start_offset = offset;
        self.helix_comparison_start_offset_mip = offset_mip;
        self
    }

    /// Sets the occupied-layer cap for non MIP-like parents.
    #[must_use]
    pub fn with_n_helix_comparison_layers(mut self, value: u32) -> Self {
        self.n_helix_comparison_layers = value;
        self
    }

    /// Sets the crossed-layer cap.
    #[must_use]
    pub fn with_max_layers_crossed_by_helix(mut self, value: PseudoLayer) -> Self {
        self.max_layers_crossed_by_helix = value;
        self
    }

    /// Sets the track/cluster z separation cut.
    #[must_use]
    pub fn with_max_track_cluster_delta_z(mut self, value: f32) -> Self {
        self.max_track_cluster_delta_z = value;
        self
    }

    /// Sets the helix sampling count.
    #[must_use]
    pub fn with_n_layers_crossed_sampling_points(mut self, value: u32) -> Self {
        self.n_layers_crossed_sampling_points = value;
        self
    }

    /// Checks every value against its physical range.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("cone_cosine_half_angle_1", self.cone_cosine_half_angle_1),
            ("cone_cosine_half_angle_2", self.cone_cosine_half_angle_2),
            ("cone_cosine_half_angle_3", self.cone_cosine_half_angle_3),
            ("min_cos_opening_angle", self.min_cos_opening_angle),
        ] {
            if !(-1.0..=1.0).contains(&value) {
                return Err(Error::InvalidParameter(format!(
                    "{name} must be a cosine, got {value}"
                )));
            }
        }

        for (name, value) in [
            ("close_hit_distance_1", self.close_hit_distance_1),
            ("close_hit_distance_2", self.close_hit_distance_2),
            ("distance_threshold", self.distance_threshold),
            ("max_track_cluster_delta_z", self.max_track_cluster_delta_z),
            (
                "helix_comparison_mip_fraction_cut",
                self.helix_comparison_mip_fraction_cut,
            ),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidParameter(format!(
                    "{name} must be non-negative, got {value}"
                )));
            }
        }

        if self.n_layers_crossed_sampling_points == 0
            || self.n_layers_crossed_sampling_points > MAX_SAMPLING_POINTS
        {
            return Err(Error::InvalidParameter(format!(
                "n_layers_crossed_sampling_points must be in 1..={MAX_SAMPLING_POINTS}, got {}",
                self.n_layers_crossed_sampling_points
            )));
        }

        Ok(())
    }
}

#[cfg(feature = "serde")]
impl ContactSettings {
    /// Parses and validates settings from JSON; missing fields keep defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self =
            serde_json::from_str(json).map_err(|err| Error::ConfigError(err.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reads settings from a JSON file.
    pub fn from_json_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}
