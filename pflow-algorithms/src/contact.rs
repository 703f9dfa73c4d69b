//! Daughter/parent comparison metrics used to decide fragment merges.

use pflow_core::{Cluster, ContactSettings, Error, GeometryOracle, Result};

use crate::fragment_removal::{
    cluster_contact_details, cluster_helix_distance, fraction_of_hits_in_parent_cone,
    n_layers_crossed, ContactDetails, HelixDistance,
};

/// Every metric comparing a daughter cluster with a candidate parent.
///
/// Computed once at construction; a changed cluster needs a new contact.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClusterContact {
    parent_cluster_energy: f32,
    cone_fraction_1: f32,
    cone_fraction_2: f32,
    cone_fraction_3: f32,
    n_contact_layers: u32,
    contact_fraction: f32,
    close_hit_fraction_1: f32,
    close_hit_fraction_2: f32,
    distance_to_closest_hit: f32,
    mean_distance_to_helix: f32,
    closest_distance_to_helix: f32,
    parent_track_energy: f32,
}

/// Outcome of the all-pairs hit scan.
struct HitDistanceSummary {
    distance_to_closest_hit: f32,
    close_hit_fraction_1: f32,
    close_hit_fraction_2: f32,
}

impl Default for HitDistanceSummary {
    fn default() -> Self {
        Self {
            distance_to_closest_hit: f32::MAX,
            close_hit_fraction_1: 0.0,
            close_hit_fraction_2: 0.0,
        }
    }
}

/// Outcome of the comparison with the parent's track helices.
struct HelixSummary {
    best: Option<HelixDistance>,
    parent_track_energy: f32,
}

impl ClusterContact {
    /// Compares `daughter` with `parent`.
    ///
    /// A missing shared layer range leaves the contact-layer metrics at zero
    /// and a parent track whose helix misses the daughter is skipped; every
    /// other error aborts the comparison.
    pub fn new<G>(
        daughter: &Cluster,
        parent: &Cluster,
        settings: &ContactSettings,
        geometry: &G,
    ) -> Result<Self>
    where
        G: GeometryOracle + ?Sized,
    {
        let cone_fraction_1 =
            fraction_of_hits_in_parent_cone(daughter, parent, settings.cone_cosine_half_angle_1)?;
        let cone_fraction_2 =
            fraction_of_hits_in_parent_cone(daughter, parent, settings.cone_cosine_half_angle_2)?;
        let cone_fraction_3 =
            fraction_of_hits_in_parent_cone(daughter, parent, settings.cone_cosine_half_angle_3)?;

        let contact = match cluster_contact_details(daughter, parent, settings.distance_threshold) {
            Ok(details) => details,
            Err(Error::NotFound(_)) => ContactDetails {
                n_contact_layers: 0,
                contact_fraction: 0.0,
            },
            Err(err) => return Err(err),
        };

        let hits = hit_distance_comparison(daughter, parent, settings)?;
        let helix = cluster_helix_comparison(daughter, parent, settings, geometry)?;
        let best_helix = helix.best.unwrap_or(HelixDistance {
            closest: f32::MAX,
            mean: f32::MAX,
        });

        Ok(Self {
            parent_cluster_energy: parent.hadronic_energy(),
            cone_fraction_1,
            cone_fraction_2,
            cone_fraction_3,
            n_contact_layers: contact.n_contact_layers,
            contact_fraction: contact.contact_fraction,
            close_hit_fraction_1: hits.close_hit_fraction_1,
            close_hit_fraction_2: hits.close_hit_fraction_2,
            distance_to_closest_hit: hits.distance_to_closest_hit,
            mean_distance_to_helix: best_helix.mean,
            closest_distance_to_helix: best_helix.closest,
            parent_track_energy: helix.parent_track_energy,
        })
    }

    /// Hadronic energy of the parent cluster.
    #[inline]
    pub fn parent_cluster_energy(&self) -> f32 {
        self.parent_cluster_energy
    }

    /// Daughter hits in the widest parent cone.
    #[inline]
    pub fn cone_fraction_1(&self) -> f32 {
        self.cone_fraction_1
    }

    /// Daughter hits in the intermediate parent cone.
    #[inline]
    pub fn cone_fraction_2(&self) -> f32 {
        self.cone_fraction_2
    }

    /// Daughter hits in the narrowest parent cone.
    #[inline]
    pub fn cone_fraction_3(&self) -> f32 {
        self.cone_fraction_3
    }

    /// Shared layers in which the clusters touch.
    #[inline]
    pub fn n_contact_layers(&self) -> u32 {
        self.n_contact_layers
    }

    /// Touching layers over shared layers.
    #[inline]
    pub fn contact_fraction(&self) -> f32 {
        self.contact_fraction
    }

    /// Daughter hits within the first close-hit distance of the parent.
    #[inline]
    pub fn close_hit_fraction_1(&self) -> f32 {
        self.close_hit_fraction_1
    }

    /// Daughter hits within the second close-hit distance of the parent.
    #[inline]
    pub fn close_hit_fraction_2(&self) -> f32 {
        self.close_hit_fraction_2
    }

    /// Closest daughter/parent hit separation; `f32::MAX` when not compared.
    #[inline]
    pub fn distance_to_closest_hit(&self) -> f32 {
        self.distance_to_closest_hit
    }

    /// Mean daughter distance to the best parent helix; `f32::MAX` if none.
    #[inline]
    pub fn mean_distance_to_helix(&self) -> f32 {
        self.mean_distance_to_helix
    }

    /// Closest daughter distance to the best parent helix; `f32::MAX` if none.
    #[inline]
    pub fn closest_distance_to_helix(&self) -> f32 {
        self.closest_distance_to_helix
    }

    /// Summed energy at closest approach of the parent's tracks.
    #[inline]
    pub fn parent_track_energy(&self) -> f32 {
        self.parent_track_energy
    }
}

#[allow(clippy::cast_precision_loss)]
fn hit_distance_comparison(
    daughter: &Cluster,
    parent: &Cluster,
    settings: &ContactSettings,
) -> Result<HitDistanceSummary> {
    let cos_opening_angle = daughter
        .initial_direction()
        .cos_opening_angle(&parent.initial_direction());

    if cos_opening_angle < settings.min_cos_opening_angle {
        log::debug!(
            "skipping hit distances: cos opening angle {cos_opening_angle} below {}",
            settings.min_cos_opening_angle
        );
        return Ok(HitDistanceSummary::default());
    }

    let n_daughter_hits = daughter.n_hits();
    if n_daughter_hits == 0 {
        return Err(Error::InvalidParameter(
            "daughter cluster has no hits".to_string(),
        ));
    }

    let close_1_squared = settings.close_hit_distance_1 * settings.close_hit_distance_1;
    let close_2_squared = settings.close_hit_distance_2 * settings.close_hit_distance_2;

    let mut n_close_hits_1 = 0_usize;
    let mut n_close_hits_2 = 0_usize;
    let mut min_distance_squared = f32::MAX;

    for daughter_hit in daughter.ordered_hits().iter_hits() {
        let position = daughter_hit.position();
        let mut is_close_1 = false;
        let mut is_close_2 = false;

        for parent_hit in parent.ordered_hits().iter_hits() {
            let distance_squared = position.distance_squared(&parent_hit.position());
            is_close_1 |= distance_squared < close_1_squared;
            is_close_2 |= distance_squared < close_2_squared;
            min_distance_squared = min_distance_squared.min(distance_squared);
        }

        n_close_hits_1 += usize::from(is_close_1);
        n_close_hits_2 += usize::from(is_close_2);
    }

    let distance_to_closest_hit = if parent.is_empty() {
        f32::MAX
    } else {
        min_distance_squared.sqrt()
    };

    Ok(HitDistanceSummary {
        distance_to_closest_hit,
        close_hit_fraction_1: n_close_hits_1 as f32 / n_daughter_hits as f32,
        close_hit_fraction_2: n_close_hits_2 as f32 / n_daughter_hits as f32,
    })
}

fn cluster_helix_comparison<G>(
    daughter: &Cluster,
    parent: &Cluster,
    settings: &ContactSettings,
    geometry: &G,
) -> Result<HelixSummary>
where
    G: GeometryOracle + ?Sized,
{
    let start_layer = daughter.inner_pseudo_layer().ok_or_else(|| {
        Error::InvalidParameter("daughter cluster has no hits".to_string())
    })?;

    // Track-like parents are compared over a longer range with no layer cap
    let pass_mip_fraction_cut =
        parent.mip_fraction() - settings.helix_comparison_mip_fraction_cut > f32::EPSILON;

    let short_end = start_layer.saturating_add(settings.helix_comparison_start_offset);
    let (end_layer, max_occupied_layers) = if pass_mip_fraction_cut {
        let mip_end = parent.outer_pseudo_layer().map_or(short_end, |outer| {
            outer.saturating_add(settings.helix_comparison_start_offset_mip)
        });
        (short_end.max(mip_end), u32::MAX)
    } else {
        (short_end, settings.n_helix_comparison_layers)
    };

    let cluster_z = daughter.centroid(start_layer)?.z;

    let mut summary = HelixSummary {
        best: None,
        parent_track_energy: 0.0,
    };

    for track in parent.associated_tracks() {
        summary.parent_track_energy += track.energy_at_dca();
        let track_z = track.state_at_calorimeter().position.z;

        if track_z.abs() > cluster_z.abs() + settings.max_track_cluster_delta_z
            || track_z * cluster_z < 0.0
        {
            log::trace!(
                "track {} at z={track_z} too far from cluster z={cluster_z}",
                track.uid().0
            );
            continue;
        }

        let helix = track.helix_fit_at_calorimeter()?;
        let n_layers = n_layers_crossed(
            helix,
            geometry,
            track_z,
            cluster_z,
            settings.n_layers_crossed_sampling_points,
        )?;

        if n_layers > settings.max_layers_crossed_by_helix {
            log::trace!(
                "track {} helix crosses {n_layers} layers before the cluster",
                track.uid().0
            );
            continue;
        }

        let distance = match cluster_helix_distance(
            daughter,
            helix,
            start_layer,
            end_layer,
            max_occupied_layers,
        ) {
            Ok(distance) => distance,
            Err(Error::NotFound(_)) => continue,
            Err(err) => return Err(err),
        };

        if summary
            .best
            .is_none_or(|best| distance.closest < best.closest)
        {
            summary.best = Some(distance);
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pflow_core::{
        CaloHitParameters, CaloHitStore, CartesianVector, HelixTrajectory, LayeredGeometry,
        PseudoLayer, Track, TrackParameters, TrackState,
    };
    use std::sync::Arc;

    fn make_cluster(
        store: &mut CaloHitStore,
        hits: &[(f32, f32, f32, PseudoLayer)],
        mip: bool,
    ) -> Cluster {
        let hits: Vec<_> = hits
            .iter()
            .map(|&(x, y, z, layer)| {
                store
                    .create(
                        &CaloHitParameters::new(CartesianVector::new(x, y, z), layer)
                            .with_energy(1.0)
                            .with_possible_mip(mip),
                    )
                    .unwrap()
            })
            .collect();
        Cluster::from_hits(hits).unwrap()
    }

    #[test]
    fn test_contact_without_tracks() {
        let mut store = CaloHitStore::new();
        let geometry = LayeredGeometry::default();
        let parent = make_cluster(
            &mut store,
            &[(0.0, 0.0, 2_405.0, 1), (0.0, 0.0, 2_415.0, 2), (0.0, 0.0, 2_425.0, 3)],
            false,
        );
        let daughter = make_cluster(
            &mut store,
            &[(20.0, 0.0, 2_415.0, 2), (80.0, 0.0, 2_425.0, 3)],
            false,
        );

        let contact =
            ClusterContact::new(&daughter, &parent, &ContactSettings::default(), &geometry)
                .unwrap();

        assert_relative_eq!(contact.parent_cluster_energy(), 3.0);
        assert_eq!(contact.n_contact_layers(), 1);
        assert_relative_eq!(contact.contact_fraction(), 0.5);
        assert_relative_eq!(contact.distance_to_closest_hit(), 20.0);
        assert_relative_eq!(contact.close_hit_fraction_1(), 1.0);
        assert_relative_eq!(contact.close_hit_fraction_2(), 0.5);
        assert_relative_eq!(contact.closest_distance_to_helix(), f32::MAX);
        assert_relative_eq!(contact.parent_track_energy(), 0.0);
    }

    #[test]
    fn test_opening_angle_preselection() {
        let mut store = CaloHitStore::new();
        let geometry = LayeredGeometry::default();
        let parent = make_cluster(&mut store, &[(0.0, 0.0, 2_405.0, 1)], false);
        let daughter = make_cluster(&mut store, &[(0.0, 0.0, 2_405.0, 1)], false)
            .with_initial_direction(CartesianVector::new(1.0, 0.0, 0.0));

        let contact =
            ClusterContact::new(&daughter, &parent, &ContactSettings::default(), &geometry)
                .unwrap();

        assert_relative_eq!(contact.distance_to_closest_hit(), f32::MAX);
        assert_relative_eq!(contact.close_hit_fraction_1(), 0.0);
        // Contact layers are still evaluated
        assert_eq!(contact.n_contact_layers(), 1);
    }

    #[test]
    fn test_disjoint_layers_keep_contact_defaults() {
        let mut store = CaloHitStore::new();
        let geometry = LayeredGeometry::default();
        let parent = make_cluster(&mut store, &[(0.0, 0.0, 2_405.0, 1)], false);
        let daughter = make_cluster(&mut store, &[(0.0, 10.0, 2_505.0, 11)], false);

        let contact =
            ClusterContact::new(&daughter, &parent, &ContactSettings::default(), &geometry)
                .unwrap();

        assert_eq!(contact.n_contact_layers(), 0);
        assert_relative_eq!(contact.contact_fraction(), 0.0);
        assert_relative_eq!(contact.distance_to_closest_hit(), 100.0_f32.hypot(10.0));
    }

    #[test]
    fn test_empty_daughter_is_rejected() {
        let mut store = CaloHitStore::new();
        let geometry = LayeredGeometry::default();
        let parent = make_cluster(&mut store, &[(0.0, 0.0, 2_405.0, 1)], false);
        let track = Arc::new(
            Track::new(&TrackParameters::new(
                1,
                TrackState::new(
                    CartesianVector::new(0.0, 0.0, 2_400.0),
                    CartesianVector::new(0.0, 0.1, 5.0),
                ),
                1.0,
                5.0,
            ))
            .unwrap(),
        );
        let daughter = Cluster::from_track(track);

        assert!(matches!(
            ClusterContact::new(&daughter, &parent, &ContactSettings::default(), &geometry),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_helix_comparison_sums_all_track_energy() {
        let mut store = CaloHitStore::new();
        let geometry = LayeredGeometry::default();

        let near = Arc::new(
            Track::new(&TrackParameters::new(
                1,
                TrackState::new(
                    CartesianVector::new(100.0, 0.0, 2_400.0),
                    CartesianVector::new(0.0, 0.5, 10.0),
                ),
                1.0,
                10.0,
            ))
            .unwrap(),
        );
        // Opposite endcap: contributes energy but no helix distance
        let opposite = Arc::new(
            Track::new(&TrackParameters::new(
                2,
                TrackState::new(
                    CartesianVector::new(100.0, 0.0, -2_400.0),
                    CartesianVector::new(0.0, 0.5, -10.0),
                ),
                -1.0,
                4.0,
            ))
            .unwrap(),
        );

        let mut parent = make_cluster(&mut store, &[(100.0, 0.0, 2_405.0, 1)], false);
        parent.add_track(Arc::clone(&near)).unwrap();
        parent.add_track(opposite).unwrap();

        let helix = near.helix_fit_at_calorimeter().unwrap();
        let reference = CartesianVector::new(100.0, 0.0, 2_400.0);
        let on_helix: Vec<_> = [2_435.0_f32, 2_445.0]
            .iter()
            .map(|&z| helix.point_in_z(z, &reference).unwrap())
            .collect();
        let daughter = make_cluster(
            &mut store,
            &[
                (on_helix[0].x, on_helix[0].y, on_helix[0].z, 4),
                (on_helix[1].x, on_helix[1].y, on_helix[1].z, 5),
            ],
            false,
        );

        let contact =
            ClusterContact::new(&daughter, &parent, &ContactSettings::default(), &geometry)
                .unwrap();

        assert_relative_eq!(contact.parent_track_energy(), 14.0);
        assert!(contact.closest_distance_to_helix() < 1.0);
        assert!(contact.mean_distance_to_helix() < 1.0);
    }
}
