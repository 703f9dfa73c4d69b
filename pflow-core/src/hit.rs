//! Calorimeter hit types and the store that owns them.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::ordered::OrderedCaloHitList;
use crate::vector::CartesianVector;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Discrete depth index into the calorimeter.
pub type PseudoLayer = u32;

/// Unique identifier assigned to a hit by its [`CaloHitStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HitId(pub u32);

/// Input parameters describing a single calorimeter deposit.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CaloHitParameters {
    /// Cell centre position (mm).
    pub position: CartesianVector,
    /// Typical cell width (mm), used to scale proximity cuts.
    pub cell_length_scale: f32,
    /// Calibrated input energy (GeV).
    pub energy: f32,
    /// Hadronic-scale energy (GeV).
    pub hadronic_energy: f32,
    /// Pseudo-layer assigned by the detector geometry.
    pub pseudo_layer: PseudoLayer,
    /// Whether the hit is consistent with a minimum-ionizing deposit.
    pub is_possible_mip: bool,
}

impl Default for CaloHitParameters {
    fn default() -> Self {
        Self {
            position: CartesianVector::ZERO,
            cell_length_scale: 10.0,
            energy: 0.0,
            hadronic_energy: 0.0,
            pseudo_layer: 0,
            is_possible_mip: false,
        }
    }
}

impl CaloHitParameters {
    /// Creates parameters at a position and pseudo-layer with default cell size.
    #[must_use]
    pub fn new(position: CartesianVector, pseudo_layer: PseudoLayer) -> Self {
        Self {
            position,
            pseudo_layer,
            ..Self::default()
        }
    }

    /// Sets the cell length scale.
    #[must_use]
    pub fn with_cell_length_scale(mut self, scale: f32) -> Self {
        self.cell_length_scale = scale;
        self
    }

    /// Sets both the input and hadronic energy.
    #[must_use]
    pub fn with_energy(mut self, energy: f32) -> Self {
        self.energy = energy;
        self.hadronic_energy = energy;
        self
    }

    /// Sets the hadronic energy only.
    #[must_use]
    pub fn with_hadronic_energy(mut self, energy: f32) -> Self {
        self.hadronic_energy = energy;
        self
    }

    /// Flags the hit as MIP-like.
    #[must_use]
    pub fn with_possible_mip(mut self, is_possible_mip: bool) -> Self {
        self.is_possible_mip = is_possible_mip;
        self
    }

    fn validate(&self) -> Result<()> {
        if !self.position.is_finite() {
            return Err(Error::InvalidParameter(format!(
                "hit position is not finite: {:?}",
                self.position
            )));
        }
        if !self.cell_length_scale.is_finite() || self.cell_length_scale <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "cell length scale must be positive, got {}",
                self.cell_length_scale
            )));
        }
        if self.energy < 0.0 || self.hadronic_energy < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "hit energies must be non-negative, got {} / {}",
                self.energy, self.hadronic_energy
            )));
        }
        Ok(())
    }
}

/// An immutable calorimeter energy deposit.
///
/// Hits are shared between lists as `Arc<CaloHit>`. Equality, ordering and
/// hashing use the store-assigned [`HitId`] only.
///
/// Ids are unique within one [`CaloHitStore`]. Every hit placed in a list or
/// cluster must come from the same store, otherwise hits from different
/// stores with equal ids are treated as the same hit.
#[derive(Debug)]
pub struct CaloHit {
    id: HitId,
    position: CartesianVector,
    cell_length_scale: f32,
    energy: f32,
    hadronic_energy: f32,
    pseudo_layer: PseudoLayer,
    is_possible_mip: bool,
}

impl CaloHit {
    /// Store-assigned identifier.
    #[inline]
    pub fn id(&self) -> HitId {
        self.id
    }

    /// Cell centre position.
    #[inline]
    pub fn position(&self) -> CartesianVector {
        self.position
    }

    /// Typical cell width.
    #[inline]
    pub fn cell_length_scale(&self) -> f32 {
        self.cell_length_scale
    }

    /// Calibrated input energy.
    #[inline]
    pub fn energy(&self) -> f32 {
        self.energy
    }

    /// Hadronic-scale energy.
    #[inline]
    pub fn hadronic_energy(&self) -> f32 {
        self.hadronic_energy
    }

    /// Pseudo-layer assigned at creation.
    #[inline]
    pub fn pseudo_layer(&self) -> PseudoLayer {
        self.pseudo_layer
    }

    /// Whether the deposit looks minimum-ionizing.
    #[inline]
    pub fn is_possible_mip(&self) -> bool {
        self.is_possible_mip
    }
}

impl PartialEq for CaloHit {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CaloHit {}

impl PartialOrd for CaloHit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CaloHit {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Hash for CaloHit {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Registry that creates and owns every hit of an event.
///
/// Lists and clusters hold shared handles; the store keeps the input list,
/// ordered by pseudo-layer.
#[derive(Debug, Default)]
pub struct CaloHitStore {
    hits: Vec<Arc<CaloHit>>,
    input_list: OrderedCaloHitList,
    next_id: u32,
}

impl CaloHitStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a hit and registers it in the input list.
    pub fn create(&mut self, parameters: &CaloHitParameters) -> Result<Arc<CaloHit>> {
        parameters.validate()?;

        let id = HitId(self.next_id);
        self.next_id = self
            .next_id
            .checked_add(1)
            .ok_or_else(|| Error::Failure("hit id space exhausted".to_string()))?;

        let hit = Arc::new(CaloHit {
            id,
            position: parameters.position,
            cell_length_scale: parameters.cell_length_scale,
            energy: parameters.energy,
            hadronic_energy: parameters.hadronic_energy,
            pseudo_layer: parameters.pseudo_layer,
            is_possible_mip: parameters.is_possible_mip,
        });

        self.input_list
            .add_hit(Arc::clone(&hit), parameters.pseudo_layer)?;
        self.hits.push(Arc::clone(&hit));
        Ok(hit)
    }

    /// Looks up a hit by id.
    pub fn get(&self, id: HitId) -> Result<&Arc<CaloHit>> {
        // Ids are handed out in increasing order, so the vector stays sorted
        self.hits
            .binary_search_by_key(&id, |hit| hit.id())
            .map(|index| &self.hits[index])
            .map_err(|_| Error::NotFound(format!("hit {}", id.0)))
    }

    /// All hits of the event, ordered by pseudo-layer.
    pub fn input_list(&self) -> &OrderedCaloHitList {
        &self.input_list
    }

    /// Number of hits created.
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Returns true if no hit has been created.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Drops every hit, ready for the next event. Ids are never reused.
    pub fn reset(&mut self) -> Result<()> {
        self.hits.clear();
        self.input_list.reset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_assigns_sequential_ids() {
        let mut store = CaloHitStore::new();
        let a = store
            .create(&CaloHitParameters::new(CartesianVector::new(0.0, 0.0, 10.0), 1))
            .unwrap();
        let b = store
            .create(&CaloHitParameters::new(CartesianVector::new(0.0, 0.0, 20.0), 2))
            .unwrap();

        assert_eq!(a.id(), HitId(0));
        assert_eq!(b.id(), HitId(1));
        assert_eq!(store.len(), 2);
        assert_eq!(store.input_list().n_hits(), 2);
        assert_eq!(store.get(HitId(1)).unwrap().pseudo_layer(), 2);
        assert!(store.get(HitId(7)).unwrap_err().is_not_found());
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let mut store = CaloHitStore::new();
        let bad_scale = CaloHitParameters::new(CartesianVector::ZERO, 0).with_cell_length_scale(0.0);
        assert!(matches!(
            store.create(&bad_scale),
            Err(Error::InvalidParameter(_))
        ));

        let bad_position = CaloHitParameters::new(CartesianVector::new(f32::NAN, 0.0, 0.0), 0);
        assert!(matches!(
            store.create(&bad_position),
            Err(Error::InvalidParameter(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_identity_is_by_id() {
        let mut store = CaloHitStore::new();
        let params = CaloHitParameters::new(CartesianVector::new(1.0, 2.0, 3.0), 4);
        let a = store.create(&params).unwrap();
        let b = store.create(&params).unwrap();

        // Same geometry, distinct hits
        assert_ne!(a, b);
        assert_eq!(a, Arc::clone(&a));
    }

    #[test]
    fn test_ids_are_scoped_to_one_store() {
        let mut first = CaloHitStore::new();
        let mut second = CaloHitStore::new();
        let a = first
            .create(&CaloHitParameters::new(CartesianVector::new(0.0, 0.0, 10.0), 1))
            .unwrap();
        let b = second
            .create(&CaloHitParameters::new(CartesianVector::new(50.0, 0.0, 10.0), 1))
            .unwrap();

        assert_eq!(a.id(), b.id());
        assert_eq!(a, b);

        let mut list = OrderedCaloHitList::new();
        list.add_hit(a, 1).unwrap();
        assert!(matches!(list.add_hit(b, 1), Err(Error::AlreadyPresent(_))));
    }

    #[test]
    fn test_reset_clears_store() {
        let mut store = CaloHitStore::new();
        store
            .create(&CaloHitParameters::new(CartesianVector::ZERO, 3))
            .unwrap();
        store.reset().unwrap();
        assert!(store.is_empty());
        assert!(store.input_list().is_empty());

        let fresh = store
            .create(&CaloHitParameters::new(CartesianVector::ZERO, 3))
            .unwrap();
        assert_eq!(fresh.id(), HitId(1));
    }
}
