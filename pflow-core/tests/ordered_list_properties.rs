use std::sync::Arc;

use pflow_core::{
    CaloHit, CaloHitParameters, CaloHitStore, CartesianVector, OrderedCaloHitList, PseudoLayer,
};

fn populate(store: &mut CaloHitStore, layers: &[PseudoLayer]) -> Vec<(Arc<CaloHit>, PseudoLayer)> {
    layers
        .iter()
        .enumerate()
        .map(|(i, &layer)| {
            let position = CartesianVector::new(i as f32, 0.0, 2_400.0 + 10.0 * layer as f32);
            let hit = store
                .create(&CaloHitParameters::new(position, layer).with_energy(0.1))
                .unwrap();
            (hit, layer)
        })
        .collect()
}

fn list_of(hits: &[(Arc<CaloHit>, PseudoLayer)]) -> OrderedCaloHitList {
    let mut list = OrderedCaloHitList::new();
    for (hit, layer) in hits {
        list.add_hit(Arc::clone(hit), *layer).unwrap();
    }
    list
}

fn assert_no_empty_layers(list: &OrderedCaloHitList) {
    for (layer, hits) in list.iter() {
        assert!(!hits.is_empty(), "layer {layer} is empty");
    }
}

#[test]
fn test_add_then_remove_restores_membership() {
    let mut store = CaloHitStore::new();
    let hits = populate(&mut store, &[1, 1, 3, 4, 4, 4]);
    let extra = populate(&mut store, &[2, 4, 9]);
    let mut list = list_of(&hits);
    let before = list.clone();

    for (hit, layer) in &extra {
        list.add_hit(Arc::clone(hit), *layer).unwrap();
        assert!(list.contains(hit, *layer));
        list.remove_hit(hit, *layer).unwrap();
        assert_eq!(list, before);
        assert_no_empty_layers(&list);
    }
}

#[test]
fn test_merge_then_subtract_is_identity_for_disjoint_lists() {
    let mut store = CaloHitStore::new();
    let a = list_of(&populate(&mut store, &[1, 2, 2, 5]));
    let b = list_of(&populate(&mut store, &[2, 3, 5, 7, 7]));

    let mut merged = a.clone();
    merged.merge(&b).unwrap();
    assert_eq!(merged.n_hits(), a.n_hits() + b.n_hits());
    assert_eq!(merged.outer_layer(), Some(7));

    merged.subtract(&b).unwrap();
    assert_eq!(merged, a);
    assert_no_empty_layers(&merged);
}

#[test]
fn test_store_input_list_matches_hits() {
    let mut store = CaloHitStore::new();
    let hits = populate(&mut store, &[3, 1, 2, 1]);

    let input = store.input_list();
    assert_eq!(input.n_hits(), hits.len());
    let layers: Vec<PseudoLayer> = input.iter().map(|(layer, _)| layer).collect();
    assert_eq!(layers, vec![1, 2, 3]);

    // Flattened traversal follows layer order
    let flattened: Vec<PseudoLayer> = input.iter_hits().map(|hit| hit.pseudo_layer()).collect();
    assert!(flattened.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(input.to_hit_vec().len(), 4);
}
