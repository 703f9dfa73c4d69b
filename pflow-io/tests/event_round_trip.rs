use pflow_algorithms::{candidate_pairs, evaluate_contacts};
use pflow_core::{
    CaloHitParameters, CartesianVector, ContactSettings, LayeredGeometry, TrackParameters,
    TrackState,
};
use pflow_io::{
    ClusterDescription, ContactFileWriter, EventDescription, EventFileReader, RelationDescription,
};
use tempfile::tempdir;

fn make_description() -> EventDescription {
    let geometry = LayeredGeometry::default();
    let mut hits = Vec::new();

    // Parent shower along +z, fragment slightly off to the side
    for layer in 1..=8 {
        let z = geometry.layer_centre_z(layer, 1.0);
        hits.push(
            CaloHitParameters::new(CartesianVector::new(100.0, 0.0, z), layer).with_energy(0.8),
        );
    }
    for layer in 3..=5 {
        let z = geometry.layer_centre_z(layer, 1.0);
        hits.push(
            CaloHitParameters::new(CartesianVector::new(160.0, 0.0, z), layer).with_energy(0.2),
        );
    }

    EventDescription {
        geometry,
        hits,
        tracks: vec![TrackParameters::new(
            1,
            TrackState::new(
                CartesianVector::new(100.0, 0.0, 2_400.0),
                CartesianVector::new(0.0, 0.5, 10.0),
            ),
            1.0,
            10.0,
        )],
        relations: RelationDescription::default(),
        clusters: vec![
            ClusterDescription {
                hits: (0..8).collect(),
                tracks: vec![1],
            },
            ClusterDescription {
                hits: (8..11).collect(),
                tracks: Vec::new(),
            },
        ],
    }
}

#[test]
fn test_event_file_to_contacts_file() {
    let dir = tempdir().unwrap();
    let event_path = dir.path().join("event.json");
    let output_path = dir.path().join("contacts.json");

    let json = serde_json::to_string_pretty(&make_description()).unwrap();
    std::fs::write(&event_path, json).unwrap();

    let reader = EventFileReader::open(&event_path).unwrap();
    assert_eq!(reader.description(), &make_description());
    let event = reader.read_event().unwrap();
    assert_eq!(event.clusters.len(), 2);

    let pairs = candidate_pairs(event.clusters.len());
    let records = evaluate_contacts(
        &event.clusters,
        &pairs,
        &ContactSettings::default(),
        &event.geometry,
    );
    assert!(records.iter().all(|record| record.result.is_ok()));

    let fragment_contact = records
        .iter()
        .find(|record| record.pair.daughter == 1)
        .and_then(|record| record.result.as_ref().ok())
        .unwrap();
    assert_eq!(fragment_contact.n_contact_layers(), 0);
    assert!((fragment_contact.parent_track_energy() - 10.0).abs() < 1e-6);
    assert!((fragment_contact.close_hit_fraction_1() - 1.0).abs() < 1e-6);

    let mut writer = ContactFileWriter::create(&output_path).unwrap();
    writer.write_contacts_json(&records).unwrap();

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output_path).unwrap()).unwrap();
    assert_eq!(written.as_array().unwrap().len(), 2);
    assert_eq!(written[1]["daughter"], 1);
}
