//! Calorimeter clusters: hits grouped by layer plus associated tracks.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::hit::{CaloHit, PseudoLayer};
use crate::ordered::OrderedCaloHitList;
use crate::track::{Track, TrackId};
use crate::vector::CartesianVector;

/// A group of hits believed to come from one particle.
///
/// Energy totals and the MIP-hit count are kept up to date as hits are added
/// and removed. The initial direction is fixed when the cluster is seeded.
#[derive(Debug, Clone)]
pub struct Cluster {
    ordered_hits: OrderedCaloHitList,
    associated_tracks: BTreeMap<TrackId, Arc<Track>>,
    initial_direction: CartesianVector,
    energy: f32,
    hadronic_energy: f32,
    n_possible_mip_hits: usize,
}

impl Cluster {
    /// Seeds a cluster from hits; the initial direction points from the
    /// origin to the summed hit positions.
    pub fn from_hits<I>(hits: I) -> Result<Self>
    where
        I: IntoIterator<Item = Arc<CaloHit>>,
    {
        let mut cluster = Self::empty(CartesianVector::ZERO);
        let mut position_sum = CartesianVector::ZERO;

        for hit in hits {
            position_sum += hit.position();
            cluster.add_hit(hit)?;
        }

        if cluster.ordered_hits.is_empty() {
            return Err(Error::InvalidParameter(
                "cannot seed a cluster from no hits".to_string(),
            ));
        }

        cluster.initial_direction = position_sum.unit_vector();
        Ok(cluster)
    }

    /// Seeds an empty cluster from a track, taking its direction at the
    /// calorimeter.
    #[must_use]
    pub fn from_track(track: Arc<Track>) -> Self {
        let direction = track.state_at_calorimeter().momentum.unit_vector();
        let mut cluster = Self::empty(direction);
        cluster.associated_tracks.insert(track.uid(), track);
        cluster
    }

    fn empty(initial_direction: CartesianVector) -> Self {
        Self {
            ordered_hits: OrderedCaloHitList::new(),
            associated_tracks: BTreeMap::new(),
            initial_direction,
            energy: 0.0,
            hadronic_energy: 0.0,
            n_possible_mip_hits: 0,
        }
    }

    /// Overrides the initial direction.
    #[must_use]
    pub fn with_initial_direction(mut self, direction: CartesianVector) -> Self {
        self.initial_direction = direction.unit_vector();
        self
    }

    /// Adds a hit in its own pseudo-layer.
    pub fn add_hit(&mut self, hit: Arc<CaloHit>) -> Result<()> {
        let layer = hit.pseudo_layer();
        let (energy, hadronic_energy, is_mip) =
            (hit.energy(), hit.hadronic_energy(), hit.is_possible_mip());

        self.ordered_hits.add_hit(hit, layer)?;

        self.energy += energy;
        self.hadronic_energy += hadronic_energy;
        if is_mip {
            self.n_possible_mip_hits += 1;
        }
        Ok(())
    }

    /// Removes a hit; `NotFound` if it is not part of the cluster.
    pub fn remove_hit(&mut self, hit: &CaloHit) -> Result<()> {
        self.ordered_hits.remove_hit(hit, hit.pseudo_layer())?;

        self.energy -= hit.energy();
        self.hadronic_energy -= hit.hadronic_energy();
        if hit.is_possible_mip() {
            self.n_possible_mip_hits -= 1;
        }
        Ok(())
    }

    /// Associates a track; `AlreadyPresent` if it is already associated.
    pub fn add_track(&mut self, track: Arc<Track>) -> Result<()> {
        let uid = track.uid();
        if self.associated_tracks.contains_key(&uid) {
            return Err(Error::AlreadyPresent(format!("track {} on cluster", uid.0)));
        }
        self.associated_tracks.insert(uid, track);
        Ok(())
    }

    /// Drops a track association.
    pub fn remove_track(&mut self, uid: TrackId) -> Result<Arc<Track>> {
        self.associated_tracks
            .remove(&uid)
            .ok_or_else(|| Error::NotFound(format!("track {} on cluster", uid.0)))
    }

    /// Merges a fragment into this cluster: every hit and every track not
    /// already associated.
    ///
    /// Stops at the first hit that is already present.
    pub fn absorb(&mut self, fragment: &Self) -> Result<()> {
        for hit in fragment.ordered_hits.iter_hits() {
            self.add_hit(Arc::clone(hit))?;
        }
        for (uid, track) in &fragment.associated_tracks {
            self.associated_tracks
                .entry(*uid)
                .or_insert_with(|| Arc::clone(track));
        }
        Ok(())
    }

    /// Hits ordered by pseudo-layer.
    #[inline]
    pub fn ordered_hits(&self) -> &OrderedCaloHitList {
        &self.ordered_hits
    }

    /// Number of hits.
    pub fn n_hits(&self) -> usize {
        self.ordered_hits.n_hits()
    }

    /// Returns true if the cluster holds no hits.
    pub fn is_empty(&self) -> bool {
        self.ordered_hits.is_empty()
    }

    /// Summed input energy.
    #[inline]
    pub fn energy(&self) -> f32 {
        self.energy
    }

    /// Summed hadronic energy.
    #[inline]
    pub fn hadronic_energy(&self) -> f32 {
        self.hadronic_energy
    }

    /// Innermost occupied pseudo-layer.
    pub fn inner_pseudo_layer(&self) -> Option<PseudoLayer> {
        self.ordered_hits.inner_layer()
    }

    /// Outermost occupied pseudo-layer.
    pub fn outer_pseudo_layer(&self) -> Option<PseudoLayer> {
        self.ordered_hits.outer_layer()
    }

    /// First layer holding a hit that is not MIP-like.
    ///
    /// A cluster made only of MIP-like hits starts showering at its outer
    /// layer.
    pub fn shower_start_layer(&self) -> Option<PseudoLayer> {
        self.ordered_hits
            .iter()
            .find(|(_, hits)| hits.iter().any(|hit| !hit.is_possible_mip()))
            .map(|(layer, _)| layer)
            .or_else(|| self.outer_pseudo_layer())
    }

    /// Mean hit position in a layer.
    #[allow(clippy::cast_precision_loss)]
    pub fn centroid(&self, layer: PseudoLayer) -> Result<CartesianVector> {
        let hits = self.ordered_hits.hits_in_layer(layer)?;

        let mut sum = CartesianVector::ZERO;
        for hit in hits {
            sum += hit.position();
        }
        Ok(sum * (1.0 / hits.len() as f32))
    }

    /// Direction fixed when the cluster was seeded.
    #[inline]
    pub fn initial_direction(&self) -> CartesianVector {
        self.initial_direction
    }

    /// Fraction of hits flagged as possible MIPs; 0 for an empty cluster.
    #[allow(clippy::cast_precision_loss)]
    pub fn mip_fraction(&self) -> f32 {
        let n_hits = self.n_hits();
        if n_hits == 0 {
            return 0.0;
        }
        self.n_possible_mip_hits as f32 / n_hits as f32
    }

    /// Associated tracks, ordered by id.
    pub fn associated_tracks(&self) -> impl Iterator<Item = &Arc<Track>> + '_ {
        self.associated_tracks.values()
    }

    /// Number of associated tracks.
    pub fn n_associated_tracks(&self) -> usize {
        self.associated_tracks.len()
    }

    /// Associated track with the lowest id.
    pub fn leading_track(&self) -> Option<&Arc<Track>> {
        self.associated_tracks.values().next()
    }
}
