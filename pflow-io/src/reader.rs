//! JSON event reader.
//!
//! An event file lists hits, tracks and clusters; clusters refer to hits by
//! their index in the hit list and to tracks by uid.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use pflow_core::{
    CaloHitParameters, CaloHitStore, Cluster, GeometryOracle, LayeredGeometry, Track, TrackId,
    TrackParameters, TrackRegistry,
};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Track relations recorded in an event file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationDescription {
    /// `(parent, daughter)` uid pairs.
    pub parent_daughter: Vec<(u64, u64)>,
    /// Sibling uid pairs.
    pub siblings: Vec<(u64, u64)>,
}

/// A cluster as stored in an event file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterDescription {
    /// Indices into the event hit list.
    pub hits: Vec<usize>,
    /// Uids of associated tracks.
    pub tracks: Vec<u64>,
}

/// Contents of an event file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventDescription {
    /// Detector geometry; the reference layout when omitted.
    pub geometry: LayeredGeometry,
    /// Every hit of the event.
    pub hits: Vec<CaloHitParameters>,
    /// Every track of the event.
    pub tracks: Vec<TrackParameters>,
    /// Track relations.
    pub relations: RelationDescription,
    /// Clusters built from the hits and tracks above.
    pub clusters: Vec<ClusterDescription>,
}

/// An event ready for fragment-removal metrics.
#[derive(Debug)]
pub struct Event {
    /// Owner of every hit.
    pub store: CaloHitStore,
    /// Tracks keyed by uid.
    pub tracks: BTreeMap<TrackId, Arc<Track>>,
    /// Clusters in file order.
    pub clusters: Vec<Cluster>,
    /// Detector geometry.
    pub geometry: LayeredGeometry,
}

impl EventDescription {
    /// Parses an event description from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Creates the hits, tracks and clusters described.
    pub fn build(&self) -> Result<Event> {
        self.geometry.validate()?;
        self.count_layer_mismatches();

        let mut store = CaloHitStore::new();
        let hits = self
            .hits
            .iter()
            .map(|parameters| store.create(parameters))
            .collect::<pflow_core::Result<Vec<_>>>()?;

        let mut registry = TrackRegistry::new();
        for parameters in &self.tracks {
            registry.create_track(parameters)?;
        }
        for &(parent, daughter) in &self.relations.parent_daughter {
            registry.set_parent_daughter(TrackId(parent), TrackId(daughter))?;
        }
        for &(first, second) in &self.relations.siblings {
            registry.set_siblings(TrackId(first), TrackId(second))?;
        }
        registry.associate()?;
        let tracks = registry.into_tracks();

        let clusters = self
            .clusters
            .iter()
            .enumerate()
            .map(|(index, description)| build_cluster(index, description, &hits, &tracks))
            .collect::<Result<Vec<_>>>()?;

        log::debug!(
            "built event: {} hits, {} tracks, {} clusters",
            store.len(),
            tracks.len(),
            clusters.len()
        );

        Ok(Event {
            store,
            tracks,
            clusters,
            geometry: self.geometry.clone(),
        })
    }

    /// Counts hits whose pseudo-layer disagrees with the geometry, warning for each.
    fn count_layer_mismatches(&self) -> usize {
        let mut n_mismatches = 0;
        for (index, parameters) in self.hits.iter().enumerate() {
            match self.geometry.pseudo_layer(&parameters.position) {
                Ok(layer) if layer == parameters.pseudo_layer => {}
                Ok(layer) => {
                    n_mismatches += 1;
                    log::warn!(
                        "hit {index} is in pseudo-layer {} but the geometry places it in {layer}",
                        parameters.pseudo_layer
                    );
                }
                Err(err) => {
                    n_mismatches += 1;
                    log::warn!(
                        "hit {index} is in pseudo-layer {} but the geometry has none: {err}",
                        parameters.pseudo_layer
                    );
                }
            }
        }
        n_mismatches
    }
}

fn build_cluster(
    index: usize,
    description: &ClusterDescription,
    hits: &[Arc<pflow_core::CaloHit>],
    tracks: &BTreeMap<TrackId, Arc<Track>>,
) -> Result<Cluster> {
    let cluster_hits = description
        .hits
        .iter()
        .map(|&hit_index| {
            hits.get(hit_index).cloned().ok_or_else(|| {
                Error::InvalidFormat(format!(
                    "cluster {index} refers to hit {hit_index} of {}",
                    hits.len()
                ))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let cluster_tracks = description
        .tracks
        .iter()
        .map(|&uid| {
            tracks.get(&TrackId(uid)).cloned().ok_or_else(|| {
                Error::InvalidFormat(format!("cluster {index} refers to unknown track {uid}"))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut cluster_tracks = cluster_tracks.into_iter();
    let mut cluster = if cluster_hits.is_empty() {
        let seed = cluster_tracks.next().ok_or_else(|| {
            Error::InvalidFormat(format!("cluster {index} has neither hits nor tracks"))
        })?;
        Cluster::from_track(seed)
    } else {
        Cluster::from_hits(cluster_hits)?
    };

    for track in cluster_tracks {
        cluster.add_track(track)?;
    }
    Ok(cluster)
}

/// Reader for JSON event files.
pub struct EventFileReader {
    description: EventDescription,
}

impl EventFileReader {
    /// Opens and parses an event file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let description = EventDescription::from_json_str(&json)?;
        Ok(Self { description })
    }

    /// Parsed file contents.
    pub fn description(&self) -> &EventDescription {
        &self.description
    }

    /// Builds the event.
    pub fn read_event(&self) -> Result<Event> {
        self.description.build()
    }
}
