//! SynonymExpander - variant sets for querying holdings
//!
//! Two-hop rule (default):
//! - reference taxon T: `{T} ∪ alternates(T) ∪ canonicals(T)`
//! - non-reference taxon T: `{T} ∪ canonicals(T) ∪ alternates(canonicals(T))`
//!
//! The current reference data never chains one scheme through another, so two
//! hops reach every equivalent name. [`ExpansionMode::Closure`] walks the
//! relation to a fixed point for data where that no longer holds.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};

use super::graph::SynonymGraph;
use crate::classify::Classification;
use crate::taxon::Taxon;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpansionMode {
    /// canonical ↔ alternate, one level of indirection for non-reference names
    #[default]
    TwoHop,
    /// Breadth-first traversal in both directions until no new names appear
    Closure,
}

/// The variant set used to query every source for one subject taxon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expansion {
    /// The taxon the variants were expanded from (the report's join key).
    pub subject: Taxon,
    /// All names to query, including `subject`. Sorted and de-duplicated.
    pub variants: BTreeSet<Taxon>,
}

impl Expansion {
    /// An expansion holding only the subject itself.
    pub fn identity(subject: Taxon) -> Self {
        let variants = BTreeSet::from([subject.clone()]);
        Self { subject, variants }
    }

    /// Variants other than the subject.
    pub fn alternates(&self) -> impl Iterator<Item = &Taxon> {
        self.variants.iter().filter(move |v| **v != self.subject)
    }

    pub fn has_alternates(&self) -> bool {
        self.variants.len() > 1
    }

    pub fn contains(&self, taxon: &Taxon) -> bool {
        self.variants.contains(taxon)
    }

    /// Variants in query order.
    pub fn to_query(&self) -> Vec<Taxon> {
        self.variants.iter().cloned().collect()
    }
}

/// Computes variant sets against a read-only graph.
#[derive(Debug, Clone, Copy)]
pub struct SynonymExpander<'g> {
    graph: &'g SynonymGraph,
    mode: ExpansionMode,
}

impl<'g> SynonymExpander<'g> {
    pub fn new(graph: &'g SynonymGraph, mode: ExpansionMode) -> Self {
        Self { graph, mode }
    }

    /// Expand a classified taxon.
    pub fn expand(&self, classification: &Classification) -> Expansion {
        let expansion = match (self.mode, classification) {
            (ExpansionMode::Closure, c) => self.closure(c.taxon()),
            (ExpansionMode::TwoHop, Classification::Reference(taxon)) => {
                self.expand_reference(taxon)
            }
            (ExpansionMode::TwoHop, Classification::NonReference { taxon, .. }) => {
                self.expand_non_reference(taxon)
            }
        };
        tracing::debug!(
            taxon = %expansion.subject,
            variants = expansion.variants.len(),
            "Expanded taxon"
        );
        expansion
    }

    /// `{T} ∪ alternates(T) ∪ canonicals(T)`
    ///
    /// A reference name can itself be the alternate of another reference name
    /// under some scheme; records filed under that name count for it too.
    pub fn expand_reference(&self, taxon: &Taxon) -> Expansion {
        let mut expansion = Expansion::identity(taxon.clone());
        expansion.variants.extend(self.graph.alternate_names(taxon));
        expansion.variants.extend(self.graph.canonical_names(taxon));
        expansion
    }

    /// `{T} ∪ canonicals(T) ∪ alternates(canonicals(T))`
    ///
    /// The input name is always kept: it is queryable by its own literal name
    /// whether or not any canonical exists.
    pub fn expand_non_reference(&self, taxon: &Taxon) -> Expansion {
        let mut expansion = Expansion::identity(taxon.clone());
        for canonical in self.graph.canonical_names(taxon) {
            expansion
                .variants
                .extend(self.graph.alternate_names(&canonical));
            expansion.variants.insert(canonical);
        }
        expansion
    }

    /// Fixed-point traversal over both edge directions.
    pub fn closure(&self, taxon: &Taxon) -> Expansion {
        let mut expansion = Expansion::identity(taxon.clone());
        let mut queue = VecDeque::from([taxon.clone()]);

        while let Some(current) = queue.pop_front() {
            let neighbours = self
                .graph
                .alternates_of(&current)
                .chain(self.graph.canonicals_of(&current))
                .map(|l| &l.taxon);
            for next in neighbours {
                if expansion.variants.insert(next.clone()) {
                    queue.push_back(next.clone());
                }
            }
        }
        expansion
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxon::SynonymEdge;

    fn t(g: &str, s: &str) -> Taxon {
        Taxon::new(g, s)
    }

    fn sparrow_graph() -> SynonymGraph {
        SynonymGraph::from_edges(&vec![
            SynonymEdge::new(1, t("Passer", "domesticus"), t("Passer", "indicus")),
            SynonymEdge::new(2, t("Passer", "domesticus"), t("Pyrgita", "domestica")),
            SynonymEdge::new(3, t("Passer", "italiae"), t("Passer", "indicus")),
        ])
    }

    #[test]
    fn reference_expansion_includes_self_and_alternates() {
        let graph = sparrow_graph();
        let expander = SynonymExpander::new(&graph, ExpansionMode::TwoHop);
        let e = expander.expand(&Classification::Reference(t("Passer", "domesticus")));

        assert_eq!(
            e.variants,
            BTreeSet::from([
                t("Passer", "domesticus"),
                t("Passer", "indicus"),
                t("Pyrgita", "domestica"),
            ])
        );
        assert_eq!(e.alternates().count(), 2);
    }

    #[test]
    fn reference_that_is_also_an_alternate_reaches_its_canonicals() {
        let graph = sparrow_graph();
        let expander = SynonymExpander::new(&graph, ExpansionMode::TwoHop);
        let e = expander.expand_reference(&t("Passer", "indicus"));

        assert_eq!(
            e.variants,
            BTreeSet::from([
                t("Passer", "domesticus"),
                t("Passer", "indicus"),
                t("Passer", "italiae"),
            ])
        );
        // Alternates of those canonicals are a further hop away.
        assert!(!e.contains(&t("Pyrgita", "domestica")));
    }

    #[test]
    fn reference_without_edges_expands_to_itself() {
        let graph = SynonymGraph::default();
        let expander = SynonymExpander::new(&graph, ExpansionMode::TwoHop);
        let e = expander.expand_reference(&t("Corvus", "corax"));
        assert_eq!(e.variants, BTreeSet::from([t("Corvus", "corax")]));
        assert!(!e.has_alternates());
    }

    #[test]
    fn non_reference_expansion_goes_two_hops() {
        let graph = sparrow_graph();
        let expander = SynonymExpander::new(&graph, ExpansionMode::TwoHop);
        let e = expander.expand_non_reference(&t("Pyrgita", "domestica"));

        // Pyrgita domestica -> Passer domesticus -> Passer indicus
        assert_eq!(
            e.variants,
            BTreeSet::from([
                t("Passer", "domesticus"),
                t("Passer", "indicus"),
                t("Pyrgita", "domestica"),
            ])
        );
        // Passer italiae is three hops away and is not reached.
        assert!(!e.contains(&t("Passer", "italiae")));
    }

    #[test]
    fn closure_reaches_fixed_point() {
        let graph = sparrow_graph();
        let expander = SynonymExpander::new(&graph, ExpansionMode::Closure);
        let e = expander.expand(&Classification::Reference(t("Pyrgita", "domestica")));
        assert!(e.contains(&t("Passer", "italiae")));
        assert_eq!(e.variants.len(), 4);
    }

    #[test]
    fn unknown_non_reference_keeps_literal_name() {
        let graph = sparrow_graph();
        let expander = SynonymExpander::new(&graph, ExpansionMode::TwoHop);
        let e = expander.expand_non_reference(&t("Nonesuch", "fictus"));
        assert_eq!(e.to_query(), vec![t("Nonesuch", "fictus")]);
    }
}
