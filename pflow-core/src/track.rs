//! Reconstructed tracks and their relationship bookkeeping.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, OnceLock};

use crate::error::{Error, Result};
use crate::helix::Helix;
use crate::vector::CartesianVector;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Unique track identifier supplied by the tracking system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackId(pub u64);

/// Position and momentum of a track at a reference surface.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackState {
    /// Position (mm).
    pub position: CartesianVector,
    /// Momentum (GeV).
    pub momentum: CartesianVector,
}

impl TrackState {
    /// Creates a track state.
    #[must_use]
    pub fn new(position: CartesianVector, momentum: CartesianVector) -> Self {
        Self { position, momentum }
    }
}

/// Input parameters for a reconstructed track.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackParameters {
    /// Unique identifier.
    pub uid: TrackId,
    /// State projected onto the calorimeter front face.
    pub state_at_calorimeter: TrackState,
    /// Charge in units of e.
    pub charge: f32,
    /// Energy at the distance of closest approach (GeV).
    pub energy_at_dca: f32,
    /// Solenoid field used for the helix fit (T).
    #[cfg_attr(feature = "serde", serde(default = "default_b_field"))]
    pub b_field: f32,
}

const DEFAULT_B_FIELD: f32 = 3.5;

#[cfg(feature = "serde")]
fn default_b_field() -> f32 {
    DEFAULT_B_FIELD
}

impl TrackParameters {
    /// Creates parameters with the default 3.5 T field.
    #[must_use]
    pub fn new(uid: u64, state_at_calorimeter: TrackState, charge: f32, energy_at_dca: f32) -> Self {
        Self {
            uid: TrackId(uid),
            state_at_calorimeter,
            charge,
            energy_at_dca,
            b_field: DEFAULT_B_FIELD,
        }
    }

    /// Sets the magnetic field.
    #[must_use]
    pub fn with_b_field(mut self, b_field: f32) -> Self {
        self.b_field = b_field;
        self
    }
}

/// A reconstructed charged-particle track.
///
/// The helix fit at the calorimeter is built on first use and cached.
#[derive(Debug, Clone)]
pub struct Track {
    uid: TrackId,
    state_at_calorimeter: TrackState,
    charge: f32,
    energy_at_dca: f32,
    b_field: f32,
    helix_at_calorimeter: OnceLock<Helix>,
    parents: BTreeSet<TrackId>,
    daughters: BTreeSet<TrackId>,
    siblings: BTreeSet<TrackId>,
}

impl Track {
    /// Creates a track without relations.
    pub fn new(parameters: &TrackParameters) -> Result<Self> {
        let state = parameters.state_at_calorimeter;
        if !state.position.is_finite() || !state.momentum.is_finite() {
            return Err(Error::InvalidParameter(format!(
                "track {} has a non-finite state",
                parameters.uid.0
            )));
        }
        if !parameters.energy_at_dca.is_finite() || parameters.energy_at_dca < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "track {} has invalid energy {}",
                parameters.uid.0, parameters.energy_at_dca
            )));
        }

        Ok(Self {
            uid: parameters.uid,
            state_at_calorimeter: state,
            charge: parameters.charge,
            energy_at_dca: parameters.energy_at_dca,
            b_field: parameters.b_field,
            helix_at_calorimeter: OnceLock::new(),
            parents: BTreeSet::new(),
            daughters: BTreeSet::new(),
            siblings: BTreeSet::new(),
        })
    }

    /// Unique identifier.
    #[inline]
    pub fn uid(&self) -> TrackId {
        self.uid
    }

    /// State at the calorimeter front face.
    #[inline]
    pub fn state_at_calorimeter(&self) -> &TrackState {
        &self.state_at_calorimeter
    }

    /// Charge in units of e.
    #[inline]
    pub fn charge(&self) -> f32 {
        self.charge
    }

    /// Energy at the distance of closest approach.
    #[inline]
    pub fn energy_at_dca(&self) -> f32 {
        self.energy_at_dca
    }

    /// Helix fit anchored at the calorimeter front face.
    pub fn helix_fit_at_calorimeter(&self) -> Result<&Helix> {
        if let Some(helix) = self.helix_at_calorimeter.get() {
            return Ok(helix);
        }

        let helix = Helix::new(
            self.state_at_calorimeter.position,
            self.state_at_calorimeter.momentum,
            self.charge,
            self.b_field,
        )?;
        Ok(self.helix_at_calorimeter.get_or_init(|| helix))
    }

    /// Tracks this one descends from.
    pub fn parents(&self) -> &BTreeSet<TrackId> {
        &self.parents
    }

    /// Tracks descending from this one.
    pub fn daughters(&self) -> &BTreeSet<TrackId> {
        &self.daughters
    }

    /// Tracks sharing a parent (e.g. both legs of a V0).
    pub fn siblings(&self) -> &BTreeSet<TrackId> {
        &self.siblings
    }
}

/// Creates tracks for an event and resolves their relations.
///
/// Relations are recorded by id while tracks are still being created and
/// applied by [`TrackRegistry::associate`]; the finished tracks are then
/// handed out as shared handles.
#[derive(Debug, Default)]
pub struct TrackRegistry {
    tracks: BTreeMap<TrackId, Track>,
    parent_daughter_relations: Vec<(TrackId, TrackId)>,
    sibling_relations: Vec<(TrackId, TrackId)>,
}

impl TrackRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a track; `AlreadyPresent` if the id is taken.
    pub fn create_track(&mut self, parameters: &TrackParameters) -> Result<TrackId> {
        if self.tracks.contains_key(&parameters.uid) {
            return Err(Error::AlreadyPresent(format!("track {}", parameters.uid.0)));
        }

        let track = Track::new(parameters)?;
        self.tracks.insert(parameters.uid, track);
        Ok(parameters.uid)
    }

    /// Records that `daughter` was produced by `parent`.
    pub fn set_parent_daughter(&mut self, parent: TrackId, daughter: TrackId) -> Result<()> {
        if parent == daughter {
            return Err(Error::InvalidParameter(format!(
                "track {} cannot be its own parent",
                parent.0
            )));
        }
        self.parent_daughter_relations.push((parent, daughter));
        Ok(())
    }

    /// Records that two tracks are siblings.
    pub fn set_siblings(&mut self, first: TrackId, second: TrackId) -> Result<()> {
        if first == second {
            return Err(Error::InvalidParameter(format!(
                "track {} cannot be its own sibling",
                first.0
            )));
        }
        self.sibling_relations.push((first, second));
        Ok(())
    }

    /// Applies every recorded relation to the tracks.
    ///
    /// Fails with `NotFound` if a relation names an unknown track; relations
    /// applied before the failure are kept.
    pub fn associate(&mut self) -> Result<()> {
        let parent_daughter = std::mem::take(&mut self.parent_daughter_relations);
        for (parent, daughter) in parent_daughter {
            self.require(parent)?;
            self.require(daughter)?;
            self.track_mut(parent)?.daughters.insert(daughter);
            self.track_mut(daughter)?.parents.insert(parent);
        }

        let siblings = std::mem::take(&mut self.sibling_relations);
        for (first, second) in siblings {
            self.require(first)?;
            self.require(second)?;
            self.track_mut(first)?.siblings.insert(second);
            self.track_mut(second)?.siblings.insert(first);
        }

        log::debug!("associated relations for {} tracks", self.tracks.len());
        Ok(())
    }

    /// Looks up a track.
    pub fn get(&self, uid: TrackId) -> Result<&Track> {
        self.tracks
            .get(&uid)
            .ok_or_else(|| Error::NotFound(format!("track {}", uid.0)))
    }

    /// Number of tracks.
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Returns true if no track has been created.
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Consumes the registry, returning shared tracks keyed by id.
    #[must_use]
    pub fn into_tracks(self) -> BTreeMap<TrackId, Arc<Track>> {
        self.tracks
            .into_iter()
            .map(|(uid, track)| (uid, Arc::new(track)))
            .collect()
    }

    fn require(&self, uid: TrackId) -> Result<()> {
        self.get(uid).map(|_| ())
    }

    fn track_mut(&mut self, uid: TrackId) -> Result<&mut Track> {
        self.tracks
            .get_mut(&uid)
            .ok_or_else(|| Error::NotFound(format!("track {}", uid.0)))
    }
}
