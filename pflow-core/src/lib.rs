//! pflow-core: Core types for particle-flow calorimeter reconstruction.
//!
//! This crate provides the hit containers, clusters, tracks, helices and
//! settings that the fragment-removal metrics operate on.
//!

pub mod cluster;
pub mod error;
pub mod geometry;
pub mod helix;
pub mod hit;
pub mod ordered;
pub mod settings;
pub mod track;
pub mod vector;

pub use cluster::Cluster;
pub use error::{Error, Result};
pub use geometry::{GeometryOracle, LayeredGeometry};
pub use helix::{Helix, HelixTrajectory, FCT};
pub use hit::{CaloHit, CaloHitParameters, CaloHitStore, HitId, PseudoLayer};
pub use ordered::{CaloHitList, OrderedCaloHitList};
pub use settings::{ContactSettings, MAX_SAMPLING_POINTS};
pub use track::{Track, TrackId, TrackParameters, TrackRegistry, TrackState};
pub use vector::CartesianVector;
