//! Layer-ordered container of calorimeter hits.

use std::collections::btree_map;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::hit::{CaloHit, PseudoLayer};

/// Set of hits sharing a pseudo-layer, ordered by hit id.
pub type CaloHitList = BTreeSet<Arc<CaloHit>>;

/// Hits grouped by pseudo-layer, iterated in ascending layer order.
///
/// Invariants:
/// - a hit appears at most once per layer;
/// - no layer maps to an empty set.
///
/// Cloning copies the per-layer sets and shares the hits themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedCaloHitList {
    layers: BTreeMap<PseudoLayer, CaloHitList>,
}

impl OrderedCaloHitList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a hit to a layer, creating the layer if needed.
    ///
    /// Returns `AlreadyPresent` if the hit is already registered in that layer.
    pub fn add_hit(&mut self, hit: Arc<CaloHit>, layer: PseudoLayer) -> Result<()> {
        let hits = self.layers.entry(layer).or_default();
        let id = hit.id();

        if hits.insert(hit) {
            Ok(())
        } else {
            Err(Error::AlreadyPresent(format!(
                "hit {} in pseudo-layer {layer}",
                id.0
            )))
        }
    }

    /// Removes a hit from a layer; an emptied layer is dropped.
    pub fn remove_hit(&mut self, hit: &CaloHit, layer: PseudoLayer) -> Result<()> {
        let btree_map::Entry::Occupied(mut entry) = self.layers.entry(layer) else {
            return Err(Error::NotFound(format!("pseudo-layer {layer}")));
        };

        if !entry.get_mut().remove(hit) {
            return Err(Error::NotFound(format!(
                "hit {} in pseudo-layer {layer}",
                hit.id().0
            )));
        }

        if entry.get().is_empty() {
            entry.remove();
        }

        Ok(())
    }

    /// Adds every (layer, hit) pair of `other`.
    ///
    /// Stops at the first failure; hits added before it are kept.
    pub fn merge(&mut self, other: &Self) -> Result<()> {
        for (layer, hit) in other.iter_layer_hits() {
            self.add_hit(Arc::clone(hit), layer)?;
        }
        Ok(())
    }

    /// Removes every (layer, hit) pair of `other`, ignoring pairs not present.
    pub fn subtract(&mut self, other: &Self) -> Result<()> {
        for (layer, hit) in other.iter_layer_hits() {
            match self.remove_hit(hit, layer) {
                Ok(()) | Err(Error::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Hits in a pseudo-layer, or `NotFound` if the layer is absent.
    pub fn hits_in_layer(&self, layer: PseudoLayer) -> Result<&CaloHitList> {
        self.layers
            .get(&layer)
            .ok_or_else(|| Error::NotFound(format!("pseudo-layer {layer}")))
    }

    /// Hits in a pseudo-layer, `None` if the layer is absent.
    #[inline]
    pub fn get(&self, layer: PseudoLayer) -> Option<&CaloHitList> {
        self.layers.get(&layer)
    }

    /// Returns true if the hit is registered in the given layer.
    pub fn contains(&self, hit: &CaloHit, layer: PseudoLayer) -> bool {
        self.layers
            .get(&layer)
            .is_some_and(|hits| hits.contains(hit))
    }

    /// Iterates over `(layer, hits)` in ascending layer order.
    pub fn iter(&self) -> impl Iterator<Item = (PseudoLayer, &CaloHitList)> + '_ {
        self.layers.iter().map(|(&layer, hits)| (layer, hits))
    }

    /// Iterates over occupied layers within `[start, end]`.
    pub fn range(
        &self,
        start: PseudoLayer,
        end: PseudoLayer,
    ) -> impl Iterator<Item = (PseudoLayer, &CaloHitList)> + '_ {
        self.layers
            .range(start..=end)
            .map(|(&layer, hits)| (layer, hits))
    }

    /// Iterates over every hit in ascending layer order.
    ///
    /// Each call starts a fresh traversal.
    pub fn iter_hits(&self) -> impl Iterator<Item = &Arc<CaloHit>> + '_ {
        self.layers.values().flatten()
    }

    fn iter_layer_hits(&self) -> impl Iterator<Item = (PseudoLayer, &Arc<CaloHit>)> + '_ {
        self.layers
            .iter()
            .flat_map(|(&layer, hits)| hits.iter().map(move |hit| (layer, hit)))
    }

    /// Eager snapshot of every hit in ascending layer order.
    #[must_use]
    pub fn to_hit_vec(&self) -> Vec<Arc<CaloHit>> {
        self.iter_hits().cloned().collect()
    }

    /// Drops every layer.
    pub fn reset(&mut self) -> Result<()> {
        self.layers.clear();

        if !self.layers.is_empty() {
            return Err(Error::Failure(
                "ordered hit list not empty after reset".to_string(),
            ));
        }
        Ok(())
    }

    /// Replaces the contents with a copy of `other`.
    pub fn assign_from(&mut self, other: &Self) -> Result<()> {
        if !self.layers.is_empty() {
            self.reset()?;
        }
        self.merge(other)
    }

    /// Number of occupied layers.
    #[inline]
    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }

    /// Total number of hits across all layers.
    pub fn n_hits(&self) -> usize {
        self.layers.values().map(BTreeSet::len).sum()
    }

    /// Returns true if no layer is occupied.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Lowest occupied pseudo-layer.
    pub fn inner_layer(&self) -> Option<PseudoLayer> {
        self.layers.keys().next().copied()
    }

    /// Highest occupied pseudo-layer.
    pub fn outer_layer(&self) -> Option<PseudoLayer> {
        self.layers.keys().next_back().copied()
    }
}

impl<'a> IntoIterator for &'a OrderedCaloHitList {
    type Item = (&'a PseudoLayer, &'a CaloHitList);
    type IntoIter = btree_map::Iter<'a, PseudoLayer, CaloHitList>;

    fn into_iter(self) -> Self::IntoIter {
        self.layers.iter()
    }
}
