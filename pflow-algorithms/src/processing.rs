//! Batch evaluation of daughter/parent contacts over an event's clusters.

use pflow_core::error::{Error, Result};
use pflow_core::{Cluster, ContactSettings, GeometryOracle};
use rayon::prelude::*;

use crate::ClusterContact;

/// Indices of a daughter and a candidate parent in a cluster slice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContactPair {
    /// Cluster that may be merged away.
    pub daughter: usize,
    /// Cluster it may be merged into.
    pub parent: usize,
}

impl ContactPair {
    /// Creates a pair.
    #[must_use]
    pub fn new(daughter: usize, parent: usize) -> Self {
        Self { daughter, parent }
    }
}

/// Result of evaluating one pair.
#[derive(Debug)]
pub struct ContactRecord {
    /// Pair that was evaluated.
    pub pair: ContactPair,
    /// Contact, or the error that aborted it.
    pub result: Result<ClusterContact>,
}

/// Every ordered pair of distinct clusters among `n_clusters`.
#[must_use]
pub fn candidate_pairs(n_clusters: usize) -> Vec<ContactPair> {
    (0..n_clusters)
        .flat_map(|daughter| {
            (0..n_clusters)
                .filter(move |&parent| parent != daughter)
                .map(move |parent| ContactPair::new(daughter, parent))
        })
        .collect()
}

/// Builds a contact for every pair in parallel, keeping the order of `pairs`.
pub fn evaluate_contacts<G>(
    clusters: &[Cluster],
    pairs: &[ContactPair],
    settings: &ContactSettings,
    geometry: &G,
) -> Vec<ContactRecord>
where
    G: GeometryOracle + ?Sized,
{
    pairs
        .par_iter()
        .map(|&pair| ContactRecord {
            pair,
            result: evaluate_pair(clusters, pair, settings, geometry),
        })
        .collect()
}

/// Like [`evaluate_contacts`], dropping failed pairs after logging them.
pub fn evaluate_contacts_ok<G>(
    clusters: &[Cluster],
    pairs: &[ContactPair],
    settings: &ContactSettings,
    geometry: &G,
) -> Vec<(ContactPair, ClusterContact)>
where
    G: GeometryOracle + ?Sized,
{
    evaluate_contacts(clusters, pairs, settings, geometry)
        .into_iter()
        .filter_map(|record| match record.result {
            Ok(contact) => Some((record.pair, contact)),
            Err(err) => {
                log::warn!(
                    "contact daughter={} parent={} failed: {err}",
                    record.pair.daughter,
                    record.pair.parent
                );
                None
            }
        })
        .collect()
}

fn evaluate_pair<G>(
    clusters: &[Cluster],
    pair: ContactPair,
    settings: &ContactSettings,
    geometry: &G,
) -> Result<ClusterContact>
where
    G: GeometryOracle + ?Sized,
{
    let lookup = |index: usize| {
        clusters.get(index).ok_or_else(|| {
            Error::InvalidParameter(format!(
                "cluster index {index} out of range for {} clusters",
                clusters.len()
            ))
        })
    };

    ClusterContact::new(lookup(pair.daughter)?, lookup(pair.parent)?, settings, geometry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pflow_core::{CaloHitParameters, CaloHitStore, CartesianVector, LayeredGeometry};

    fn make_clusters() -> Vec<Cluster> {
        let mut store = CaloHitStore::new();
        [0.0_f32, 40.0, 400.0]
            .iter()
            .map(|&x| {
                let hits = (1..=3)
                    .map(|layer| {
                        let z = 2_395.0 + 10.0 * layer as f32;
                        store
                            .create(
                                &CaloHitParameters::new(CartesianVector::new(x, 0.0, z), layer)
                                    .with_energy(1.0),
                            )
                            .unwrap()
                    })
                    .collect::<Vec<_>>();
                Cluster::from_hits(hits).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_candidate_pairs() {
        let pairs = candidate_pairs(3);
        assert_eq!(pairs.len(), 6);
        assert!(pairs.iter().all(|pair| pair.daughter != pair.parent));
        assert_eq!(pairs[0], ContactPair::new(0, 1));
        assert!(candidate_pairs(1).is_empty());
    }

    #[test]
    fn test_results_follow_pair_order() {
        let clusters = make_clusters();
        let geometry = LayeredGeometry::default();
        let settings = ContactSettings::default();
        let pairs = candidate_pairs(clusters.len());

        let records = evaluate_contacts(&clusters, &pairs, &settings, &geometry);
        assert_eq!(records.len(), pairs.len());
        for (record, pair) in records.iter().zip(&pairs) {
            assert_eq!(record.pair, *pair);
            let sequential =
                ClusterContact::new(&clusters[pair.daughter], &clusters[pair.parent], &settings, &geometry)
                    .unwrap();
            assert_eq!(record.result.as_ref().unwrap(), &sequential);
        }
    }

    #[test]
    fn test_out_of_range_pair() {
        let clusters = make_clusters();
        let geometry = LayeredGeometry::default();
        let settings = ContactSettings::default();
        let pairs = [ContactPair::new(0, 1), ContactPair::new(0, 7)];

        let records = evaluate_contacts(&clusters, &pairs, &settings, &geometry);
        assert!(records[0].result.is_ok());
        assert!(matches!(records[1].result, Err(Error::InvalidParameter(_))));

        let ok = evaluate_contacts_ok(&clusters, &pairs, &settings, &geometry);
        assert_eq!(ok.len(), 1);
        assert_eq!(ok[0].0, ContactPair::new(0, 1));
    }
}
