//! pflow-algorithms: Fragment-removal metrics for particle-flow clusters.
//!
//! This crate provides:
//! - **fragment_removal** - stateless cluster/track/helix proximity metrics
//! - **ClusterContact** - all metrics for one daughter/parent pair
//! - **processing** - parallel evaluation over every candidate pair
//!
#![warn(missing_docs)]

mod contact;
pub mod fragment_removal;
mod processing;

pub use contact::ClusterContact;
pub use fragment_removal::{
    cluster_contact_details, cluster_helix_distance, fraction_of_close_hits,
    fraction_of_hits_in_cone, fraction_of_hits_in_parent_cone, fraction_of_hits_in_track_cone,
    n_layers_crossed, ContactDetails, HelixDistance, MAX_LAYER,
};
pub use processing::{
    candidate_pairs, evaluate_contacts, evaluate_contacts_ok, ContactPair, ContactRecord,
};
