//! Property tests for expansion, presence and selection.

use std::collections::BTreeSet;

use openwings_reconcile::selector::rank_records;
use openwings_reconcile::{
    Classification, Expansion, ExpansionMode, HoldingRecord, Presence, PresenceCell, SynonymEdge,
    SynonymExpander, SynonymGraph, Taxon,
};
use proptest::prelude::*;

// -- Strategy helpers --

fn arb_taxon() -> impl Strategy<Value = Taxon> {
    // Small alphabets so edges share names often
    (
        prop::sample::select(vec!["Passer", "Corvus", "Anas", "Zosterops"]),
        prop::sample::select(vec!["alba", "nova", "domesticus", "indicus", "varia"]),
    )
        .prop_map(|(g, s)| Taxon::new(g, s))
}

fn arb_edges() -> impl Strategy<Value = Vec<SynonymEdge>> {
    prop::collection::vec(
        (1u16..=7, arb_taxon(), arb_taxon()).prop_map(|(scheme, c, a)| SynonymEdge::new(scheme, c, a)),
        0..20,
    )
}

fn arb_mode() -> impl Strategy<Value = ExpansionMode> {
    prop_oneof![Just(ExpansionMode::TwoHop), Just(ExpansionMode::Closure)]
}

fn arb_record() -> impl Strategy<Value = HoldingRecord> {
    (
        0u32..1000,
        prop::option::of(0i32..3),
        prop::option::of(prop::sample::select(vec!["female", "male", "unknown"])),
        prop::option::of(1950i32..2024),
    )
        .prop_map(|(catalog, rank, sex, year)| {
            let mut record = HoldingRecord::new("tissues", Taxon::new("Passer", "domesticus"))
                .with_catalog_number(catalog.to_string());
            record.rank = rank;
            record.sex = sex.map(String::from);
            record.year = year;
            record
        })
}

/// Classification the way the reconciler would see it given the graph.
fn classify(graph: &SynonymGraph, taxon: &Taxon, reference: bool) -> Classification {
    if reference {
        Classification::Reference(taxon.clone())
    } else {
        Classification::NonReference {
            taxon: taxon.clone(),
            canonicals: graph.canonical_names(taxon),
        }
    }
}

proptest! {
    #[test]
    fn expansion_contains_the_taxon_itself(
        edges in arb_edges(),
        taxon in arb_taxon(),
        reference in any::<bool>(),
        mode in arb_mode(),
    ) {
        let graph = SynonymGraph::from_edges(&edges);
        let expansion = SynonymExpander::new(&graph, mode).expand(&classify(&graph, &taxon, reference));
        prop_assert!(expansion.contains(&taxon));
        prop_assert_eq!(expansion.subject, taxon);
    }

    #[test]
    fn every_edge_is_reachable_in_both_directions(edges in arb_edges(), mode in arb_mode()) {
        let graph = SynonymGraph::from_edges(&edges);
        let expander = SynonymExpander::new(&graph, mode);
        for edge in &edges {
            let forward = expander.expand(&Classification::Reference(edge.canonical.clone()));
            prop_assert!(forward.contains(&edge.alternate));

            // The alternate may itself be on the reference list
            for reference in [false, true] {
                let backward = expander.expand(&classify(&graph, &edge.alternate, reference));
                prop_assert!(backward.contains(&edge.canonical));
            }
        }
    }

    #[test]
    fn closure_is_a_superset_of_two_hop(edges in arb_edges(), taxon in arb_taxon(), reference in any::<bool>()) {
        let graph = SynonymGraph::from_edges(&edges);
        let classification = classify(&graph, &taxon, reference);
        let two_hop = SynonymExpander::new(&graph, ExpansionMode::TwoHop).expand(&classification);
        let closure = SynonymExpander::new(&graph, ExpansionMode::Closure).expand(&classification);
        prop_assert!(two_hop.variants.is_subset(&closure.variants));
    }

    #[test]
    fn adding_a_variant_record_only_turns_presence_on(
        alternates in prop::collection::btree_set(arb_taxon(), 0..4),
        pick in any::<prop::sample::Index>(),
        existing in prop::collection::vec(arb_taxon(), 0..4),
    ) {
        let subject = Taxon::new("Passer", "domesticus");
        let mut variants: BTreeSet<Taxon> = alternates;
        variants.insert(subject.clone());
        let expansion = Expansion { subject, variants };

        let records: Vec<HoldingRecord> = existing
            .into_iter()
            .map(|t| HoldingRecord::new("a", t))
            .collect();
        let before = PresenceCell::reduce("a", &expansion, &records);

        let added: Vec<&Taxon> = expansion.variants.iter().collect();
        let variant = pick.get(&added);
        let mut more = records.clone();
        more.push(HoldingRecord::new("a", (*variant).clone()));
        let after = PresenceCell::reduce("a", &expansion, &more);

        prop_assert_eq!(after.presence, Presence::Present);
        if before.presence == Presence::Present {
            prop_assert!(after.record_count > before.record_count);
        }
    }

    #[test]
    fn selection_truncates_and_ignores_arrival_order(
        records in prop::collection::vec(arb_record(), 0..40),
        max in 1usize..30,
    ) {
        let mut reversed = records.clone();
        reversed.reverse();

        let first = rank_records(records.clone(), max);
        let second = rank_records(reversed, max);

        prop_assert_eq!(first.len(), records.len().min(max));
        prop_assert_eq!(first, second);
    }
}
