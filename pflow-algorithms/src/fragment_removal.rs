//! Geometric metrics comparing clusters with each other, with tracks and
//! with helix fits.
//!
//! Every function here is stateless; thresholds arrive as arguments.

use pflow_core::{
    CartesianVector, Cluster, Error, GeometryOracle, HelixTrajectory, PseudoLayer, Result, Track,
    MAX_SAMPLING_POINTS,
};

/// Layer count returned when a helix starts outside the calorimeter.
pub const MAX_LAYER: PseudoLayer = PseudoLayer::MAX;

/// Sampling steps shorter than this (mm) are treated as no movement.
const MIN_SAMPLING_STEP: f32 = 0.001;

/// Mean and closest distance from cluster hits to a helix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HelixDistance {
    /// Smallest hit-to-helix distance (mm).
    pub closest: f32,
    /// Mean hit-to-helix distance (mm).
    pub mean: f32,
}

/// Layer-by-layer contact between two clusters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContactDetails {
    /// Shared layers in which the clusters touch.
    pub n_contact_layers: u32,
    /// Touching layers over shared layers compared.
    pub contact_fraction: f32,
}

/// Fraction of hits in `cluster_i` with a hit of `cluster_j` closer than
/// `distance_threshold`. Zero when `cluster_i` is empty.
#[allow(clippy::cast_precision_loss)]
pub fn fraction_of_close_hits(cluster_i: &Cluster, cluster_j: &Cluster, distance_threshold: f32) -> f32 {
    let n_hits_i = cluster_i.n_hits();
    if n_hits_i == 0 {
        return 0.0;
    }

    let threshold_squared = distance_threshold * distance_threshold;
    let hits_j = cluster_j.ordered_hits();

    let n_close_hits = cluster_i
        .ordered_hits()
        .iter_hits()
        .filter(|hit_i| {
            let position_i = hit_i.position();
            hits_j
                .iter_hits()
                .any(|hit_j| position_i.distance_squared(&hit_j.position()) < threshold_squared)
        })
        .count();

    n_close_hits as f32 / n_hits_i as f32
}

/// Fraction of hits lying inside a cone.
///
/// A hit is inside when the cosine of the angle between `direction` and the
/// apex-to-hit vector is strictly greater than `cos_half_angle`.
#[allow(clippy::cast_precision_loss)]
pub fn fraction_of_hits_in_cone(
    cluster: &Cluster,
    apex: &CartesianVector,
    direction: &CartesianVector,
    cos_half_angle: f32,
) -> f32 {
    let n_hits = cluster.n_hits();
    if n_hits == 0 {
        return 0.0;
    }

    let n_in_cone = cluster
        .ordered_hits()
        .iter_hits()
        .filter(|hit| {
            let offset = hit.position() - *apex;
            direction.dot(&offset.unit_vector()) > cos_half_angle
        })
        .count();

    n_in_cone as f32 / n_hits as f32
}

/// Fraction of `cluster` hits in the cone of `parent`.
///
/// The cone follows the parent's leading track at the calorimeter; without
/// tracks it starts at the parent's shower-start centroid and points away
/// from the origin.
pub fn fraction_of_hits_in_parent_cone(
    cluster: &Cluster,
    parent: &Cluster,
    cos_half_angle: f32,
) -> Result<f32> {
    if let Some(track) = parent.leading_track() {
        return Ok(fraction_of_hits_in_track_cone(cluster, track, cos_half_angle));
    }

    let shower_start = parent.shower_start_layer().ok_or_else(|| {
        Error::InvalidParameter("parent cluster has neither hits nor tracks".to_string())
    })?;
    let centroid = parent.centroid(shower_start)?;

    Ok(fraction_of_hits_in_cone(
        cluster,
        &centroid,
        &centroid.unit_vector(),
        cos_half_angle,
    ))
}

/// Fraction of `cluster` hits in a cone along a track's calorimeter state.
pub fn fraction_of_hits_in_track_cone(cluster: &Cluster, track: &Track, cos_half_angle: f32) -> f32 {
    let state = track.state_at_calorimeter();
    fraction_of_hits_in_cone(
        cluster,
        &state.position,
        &state.momentum.unit_vector(),
        cos_half_angle,
    )
}

/// Counts the pseudo-layers a helix crosses between two z planes.
///
/// The helix is sampled at `n_sampling_points` steps. Samples outside the
/// footprint or without a pseudo-layer are skipped, and layer changes seen
/// inside a gap region are not counted. Returns [`MAX_LAYER`] when the first
/// sample is already outside the calorimeter.
#[allow(clippy::cast_precision_loss)]
pub fn n_layers_crossed<H, G>(
    helix: &H,
    geometry: &G,
    z_start: f32,
    z_end: f32,
    n_sampling_points: u32,
) -> Result<PseudoLayer>
where
    H: HelixTrajectory + ?Sized,
    G: GeometryOracle + ?Sized,
{
    if n_sampling_points == 0 || n_sampling_points > MAX_SAMPLING_POINTS {
        return Err(Error::InvalidParameter(format!(
            "sampling points must be in 1..={MAX_SAMPLING_POINTS}, got {n_sampling_points}"
        )));
    }

    let delta_z = (z_end - z_start) / n_sampling_points as f32;
    if delta_z.abs() < MIN_SAMPLING_STEP {
        return Ok(0);
    }

    let reference_point = helix.reference_point();
    let first_point = helix.point_in_z(z_start, &reference_point)?;
    let Some(mut current_layer) = layer_inside_footprint(geometry, &first_point) else {
        return Ok(MAX_LAYER);
    };

    let z_limit = (z_end + 0.5 * delta_z).abs();
    let mut layer_count: PseudoLayer = 0;

    for step in 0..=n_sampling_points {
        let z = z_start + step as f32 * delta_z;
        if z.abs() >= z_limit {
            break;
        }

        let point = helix.point_in_z(z, &reference_point)?;
        let Some(layer) = layer_inside_footprint(geometry, &point) else {
            continue;
        };

        if layer != current_layer {
            if !geometry.is_in_gap_region(&point) {
                layer_count = layer_count.saturating_add(layer.abs_diff(current_layer));
            }
            current_layer = layer;
        }
    }

    Ok(layer_count)
}

fn layer_inside_footprint<G>(geometry: &G, point: &CartesianVector) -> Option<PseudoLayer>
where
    G: GeometryOracle + ?Sized,
{
    if geometry.is_outside_footprint(point) {
        return None;
    }
    geometry.pseudo_layer(point).ok()
}

/// Distance from the hits of `cluster` in `[start_layer, end_layer]` to a helix.
///
/// Scanning stops once more than `max_occupied_layers` occupied layers have
/// been seen. Returns `NotFound` when no hit was visited.
#[allow(clippy::cast_precision_loss)]
pub fn cluster_helix_distance<H>(
    cluster: &Cluster,
    helix: &H,
    start_layer: PseudoLayer,
    end_layer: PseudoLayer,
    max_occupied_layers: u32,
) -> Result<HelixDistance>
where
    H: HelixTrajectory + ?Sized,
{
    if start_layer > end_layer {
        return Err(Error::InvalidParameter(format!(
            "helix comparison start layer {start_layer} is beyond end layer {end_layer}"
        )));
    }

    let mut n_hits = 0_usize;
    let mut n_occupied_layers = 0_u32;
    let mut sum_distance = 0.0_f32;
    let mut min_distance = f32::MAX;

    for (_, hits) in cluster.ordered_hits().range(start_layer, end_layer) {
        n_occupied_layers = n_occupied_layers.saturating_add(1);
        if n_occupied_layers > max_occupied_layers {
            break;
        }

        for hit in hits {
            let distance = helix.distance_to_point(&hit.position())?.z;
            min_distance = min_distance.min(distance);
            sum_distance += distance;
            n_hits += 1;
        }
    }

    if n_hits == 0 {
        return Err(Error::NotFound(format!(
            "cluster hits in layers {start_layer}..={end_layer}"
        )));
    }

    Ok(HelixDistance {
        closest: min_distance,
        mean: sum_distance / n_hits as f32,
    })
}

/// Counts the shared layers in which two clusters touch.
///
/// Layers between the later inner layer and the earlier outer layer holding
/// hits of both clusters are compared. A layer is in contact when some hit
/// pair is closer than `1.5 * cell_length_scale * distance_threshold`, using
/// the cell size of the `cluster_i` hit. Returns `NotFound` when no layer
/// was compared.
#[allow(clippy::cast_precision_loss)]
pub fn cluster_contact_details(
    cluster_i: &Cluster,
    cluster_j: &Cluster,
    distance_threshold: f32,
) -> Result<ContactDetails> {
    let bounds = cluster_i
        .inner_pseudo_layer()
        .zip(cluster_j.inner_pseudo_layer())
        .zip(cluster_i.outer_pseudo_layer().zip(cluster_j.outer_pseudo_layer()));
    let Some(((inner_i, inner_j), (outer_i, outer_j))) = bounds else {
        return Err(Error::NotFound("layers shared by an empty cluster".to_string()));
    };

    let start_layer = inner_i.max(inner_j);
    let end_layer = outer_i.min(outer_j);
    let hits_j = cluster_j.ordered_hits();

    let mut n_layers_compared = 0_u32;
    let mut n_layers_in_contact = 0_u32;

    if start_layer <= end_layer {
        for (layer, layer_hits_i) in cluster_i.ordered_hits().range(start_layer, end_layer) {
            let Some(layer_hits_j) = hits_j.get(layer) else {
                continue;
            };
            n_layers_compared += 1;

            let in_contact = layer_hits_i.iter().any(|hit_i| {
                let separation_cut = 1.5 * hit_i.cell_length_scale() * distance_threshold;
                let cut_squared = separation_cut * separation_cut;
                let position_i = hit_i.position();
                layer_hits_j
                    .iter()
                    .any(|hit_j| position_i.distance_squared(&hit_j.position()) < cut_squared)
            });

            if in_contact {
                n_layers_in_contact += 1;
            }
        }
    }

    if n_layers_compared == 0 {
        return Err(Error::NotFound(format!(
            "shared layers in {start_layer}..={end_layer}"
        )));
    }

    Ok(ContactDetails {
        n_contact_layers: n_layers_in_contact,
        contact_fraction: n_layers_in_contact as f32 / n_layers_compared as f32,
    })
}
