//! IOC World Bird List ingestion
//!
//! Reads the master XML list (`ioclist > list > order > family > genus >
//! species`) into [`ReferenceTaxon`]s. Subspecies are ignored. Order names are
//! title-cased; authorities lose their commas and enclosing parentheses.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ReconcileError, Result};
use crate::taxon::{ReferenceTaxon, Taxon};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IocList {
    pub version: String,
    pub year: String,
    pub taxa: Vec<ReferenceTaxon>,
}

/// Longest value seen per column, in characters. Used to size storage
/// columns before loading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldWidths {
    pub order: usize,
    pub family: usize,
    pub genus: usize,
    pub species: usize,
    pub authority: usize,
    pub common_name: usize,
    pub breeding_regions: usize,
}

impl FieldWidths {
    fn observe(&mut self, taxon: &ReferenceTaxon) {
        fn widen(slot: &mut usize, value: &str) {
            *slot = (*slot).max(value.chars().count());
        }
        widen(&mut self.order, &taxon.order);
        widen(&mut self.family, &taxon.family);
        widen(&mut self.genus, &taxon.taxon.genus);
        widen(&mut self.species, &taxon.taxon.species);
        widen(&mut self.authority, taxon.authority.as_deref().unwrap_or(""));
        widen(&mut self.common_name, taxon.common_name.as_deref().unwrap_or(""));
        widen(
            &mut self.breeding_regions,
            taxon.breeding_regions.as_deref().unwrap_or(""),
        );
    }
}

impl IocList {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut list = IocList {
            version: String::new(),
            year: String::new(),
            taxa: Vec::new(),
        };
        let mut path: Vec<String> = Vec::new();
        let mut text = String::new();
        let mut order = String::new();
        let mut family = String::new();
        let mut genus = String::new();
        let mut species: Option<SpeciesDraft> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    let name = element_name(&e);
                    match name.as_str() {
                        "ioclist" => {
                            list.version = attribute(&e, "version")?.unwrap_or_default();
                            list.year = attribute(&e, "year")?.unwrap_or_default();
                        }
                        "species" if parent(&path) == Some("genus") => {
                            species = Some(SpeciesDraft {
                                extinct: attribute(&e, "extinct")?.as_deref() == Some("yes"),
                                ..Default::default()
                            });
                        }
                        _ => {}
                    }
                    text.clear();
                    path.push(name);
                }
                Event::Text(e) => text.push_str(&e.unescape()?),
                Event::CData(e) => text.push_str(&String::from_utf8_lossy(&e)),
                Event::End(_) => {
                    let Some(name) = path.pop() else {
                        return Err(ReconcileError::Config("unbalanced IOC list".into()));
                    };
                    let value = text.trim().to_string();
                    text.clear();

                    match (name.as_str(), parent(&path)) {
                        ("latin_name", Some("order")) => order = title_case(&value),
                        ("latin_name", Some("family")) => family = value,
                        ("latin_name", Some("genus")) => genus = value,
                        ("latin_name", Some("species")) => {
                            if let Some(draft) = species.as_mut() {
                                draft.name = value;
                            }
                        }
                        ("authority", Some("species")) => {
                            if let Some(draft) = species.as_mut() {
                                draft.authority = Some(clean_authority(&value));
                            }
                        }
                        ("english_name", Some("species")) => {
                            if let Some(draft) = species.as_mut() {
                                draft.common_name = Some(value);
                            }
                        }
                        ("breeding_regions", Some("species")) => {
                            if let Some(draft) = species.as_mut() {
                                draft.breeding_regions = Some(value);
                            }
                        }
                        ("species", Some("genus")) => {
                            if let Some(draft) = species.take() {
                                list.taxa.push(draft.finish(&order, &family, &genus));
                            }
                        }
                        _ => {}
                    }
                }
                Event::Eof if path.is_empty() => break,
                Event::Eof => {
                    return Err(ReconcileError::Config("unbalanced IOC list".into()));
                }
                _ => {}
            }
        }

        tracing::info!(
            version = %list.version,
            year = %list.year,
            species = list.taxa.len(),
            "Parsed IOC list"
        );
        Ok(list)
    }

    pub fn field_widths(&self) -> FieldWidths {
        let mut widths = FieldWidths::default();
        for taxon in &self.taxa {
            widths.observe(taxon);
        }
        widths
    }
}

#[derive(Default)]
struct SpeciesDraft {
    name: String,
    authority: Option<String>,
    common_name: Option<String>,
    breeding_regions: Option<String>,
    extinct: bool,
}

impl SpeciesDraft {
    fn finish(self, order: &str, family: &str, genus: &str) -> ReferenceTaxon {
        ReferenceTaxon {
            order: order.to_string(),
            family: family.to_string(),
            taxon: Taxon::new(genus, self.name),
            authority: self.authority,
            common_name: self.common_name,
            breeding_regions: self.breeding_regions,
            extinct: self.extinct,
        }
    }
}

fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn parent(path: &[String]) -> Option<&str> {
    path.last().map(String::as_str)
}

fn attribute(e: &BytesStart<'_>, key: &str) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_ref() == key.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn title_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// `(Linnaeus, 1758)` -> `Linnaeus 1758`
fn clean_authority(value: &str) -> String {
    value
        .replace(',', "")
        .trim_matches(|c| c == '(' || c == ')')
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<ioclist version="7.3" year="2017">
  <list>
    <order>
      <latin_name>PASSERIFORMES</latin_name>
      <family>
        <latin_name>Passeridae</latin_name>
        <english_name>Old World Sparrows</english_name>
        <genus>
          <latin_name>Passer</latin_name>
          <species>
            <latin_name>domesticus</latin_name>
            <authority>(Linnaeus, 1758)</authority>
            <english_name>House Sparrow</english_name>
            <breeding_regions>EU, AS</breeding_regions>
            <subspecies>
              <latin_name>indicus</latin_name>
              <authority>Jardine &amp; Selby, 1831</authority>
            </subspecies>
          </species>
          <species extinct="yes">
            <latin_name>fictus</latin_name>
            <authority>Nobody, 1900</authority>
            <english_name>Lost Sparrow</english_name>
            <breeding_regions>OC</breeding_regions>
          </species>
        </genus>
      </family>
    </order>
  </list>
</ioclist>"#;

    #[test]
    fn parses_species_and_ignores_subspecies() {
        let list = IocList::parse(SAMPLE).unwrap();
        assert_eq!(list.version, "7.3");
        assert_eq!(list.year, "2017");
        assert_eq!(list.taxa.len(), 2);

        let sparrow = &list.taxa[0];
        assert_eq!(sparrow.order, "Passeriformes");
        assert_eq!(sparrow.family, "Passeridae");
        assert_eq!(sparrow.taxon, Taxon::new("Passer", "domesticus"));
        assert_eq!(sparrow.authority.as_deref(), Some("Linnaeus 1758"));
        assert_eq!(sparrow.common_name.as_deref(), Some("House Sparrow"));
        assert_eq!(sparrow.breeding_regions.as_deref(), Some("EU, AS"));
        assert!(!sparrow.extinct);
    }

    #[test]
    fn extinct_flag_is_per_species() {
        let list = IocList::parse(SAMPLE).unwrap();
        assert!(list.taxa[1].extinct);
        assert!(!list.taxa[0].extinct);
    }

    #[test]
    fn field_widths_track_longest_values() {
        let widths = IocList::parse(SAMPLE).unwrap().field_widths();
        assert_eq!(widths.order, "Passeriformes".len());
        assert_eq!(widths.species, "domesticus".len());
        assert_eq!(widths.common_name, "House Sparrow".len());
        assert_eq!(widths.authority, "Linnaeus 1758".len());
    }

    #[test]
    fn cleans_authority() {
        assert_eq!(clean_authority("(Linnaeus, 1758)"), "Linnaeus 1758");
        assert_eq!(clean_authority("Vieillot, 1818"), "Vieillot 1818");
    }

    #[test]
    fn title_cases_orders() {
        assert_eq!(title_case("PASSERIFORMES"), "Passeriformes");
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(IocList::parse("<ioclist><list></ioclist>").is_err());
    }

    #[test]
    fn truncated_list_is_an_error() {
        let cut = SAMPLE.find("</species>").unwrap() + "</species>".len();
        let err = IocList::parse(&SAMPLE[..cut]).unwrap_err();
        assert!(matches!(err, ReconcileError::Config(_)));
    }
}
