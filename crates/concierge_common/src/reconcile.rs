//! Citation reconciliation against the supplied evidence set.
//!
//! The central invariant of the core: a citation reaches the caller only if
//! its URL was in the evidence given to the model, or if the model produced
//! a complete title+URL pair of its own (static links such as the external
//! booking page).

use crate::types::{truncate_chars, EvidenceRecord, Source};
use std::collections::HashMap;

/// Maximum excerpt length when backfilling from evidence content.
const EXCERPT_CHARS: usize = 200;

/// Validate and repair the model's cited sources.
///
/// - URL matches supplied evidence: kept, with title/excerpt backfilled from
///   the matched record when the model omitted them.
/// - No match but both title and URL present: passed through as-is.
/// - Anything else: dropped.
///
/// A substantive answer with zero surviving sources falls back to citing the
/// full supplied evidence set, so the caller always sees an evidence trail.
pub fn reconcile(model_sources: &[Source], evidence: &[EvidenceRecord]) -> Vec<Source> {
    let by_url: HashMap<&str, &EvidenceRecord> =
        evidence.iter().map(|r| (r.url.as_str(), r)).collect();

    let mut reconciled: Vec<Source> = Vec::with_capacity(model_sources.len());
    for cited in model_sources {
        match by_url.get(cited.url.as_str()) {
            Some(record) => {
                let title = if cited.title.trim().is_empty() {
                    record.title.clone()
                } else {
                    cited.title.clone()
                };
                let excerpt = cited
                    .excerpt
                    .clone()
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| truncate_chars(&record.content, EXCERPT_CHARS));
                reconciled.push(Source {
                    title,
                    url: record.url.clone(),
                    excerpt: Some(excerpt),
                });
            }
            None => {
                if !cited.title.trim().is_empty() && !cited.url.trim().is_empty() {
                    reconciled.push(cited.clone());
                } else {
                    tracing::debug!("Dropping uncorroborated citation: {:?}", cited.url);
                }
            }
        }
    }

    if reconciled.is_empty() {
        return evidence
            .iter()
            .map(|r| {
                Source::new(r.title.clone(), r.url.clone())
                    .with_excerpt(truncate_chars(&r.content, EXCERPT_CHARS))
            })
            .collect();
    }

    reconciled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evidence() -> Vec<EvidenceRecord> {
        vec![
            EvidenceRecord::new(
                "contacto",
                "Contacto",
                "/contacto",
                "Telefono de recepcion: +34 977 000 111.",
                vec![],
            ),
            EvidenceRecord::new("tarifas", "Tarifas", "/tarifas", "Desde 28 EUR/noche.", vec![]),
        ]
    }

    #[test]
    fn test_matched_source_backfills_excerpt() {
        let cited = vec![Source::new("Contacto", "/contacto")];
        let out = reconcile(&cited, &evidence());
        assert_eq!(out.len(), 1);
        assert!(out[0].excerpt.as_deref().unwrap().contains("977 000 111"));
    }

    #[test]
    fn test_matched_source_backfills_title() {
        let cited = vec![Source::new("", "/tarifas")];
        let out = reconcile(&cited, &evidence());
        assert_eq!(out[0].title, "Tarifas");
    }

    #[test]
    fn test_complete_unmatched_pair_passes_through() {
        let cited = vec![Source::new("Reservar online", "https://booking.example/costa-serena")];
        let out = reconcile(&cited, &evidence());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].url, "https://booking.example/costa-serena");
        assert!(out[0].excerpt.is_none());
    }

    #[test]
    fn test_incomplete_unmatched_source_dropped_then_fallback() {
        // The invented citation is dropped; with nothing left, the full
        // evidence set is cited instead.
        let cited = vec![Source::new("", "/inventado")];
        let out = reconcile(&cited, &evidence());
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|s| s.excerpt.is_some()));
    }

    #[test]
    fn test_zero_sources_cites_full_evidence() {
        let out = reconcile(&[], &evidence());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].url, "/contacto");
    }

    #[test]
    fn test_never_returns_unmatched_url_without_title() {
        let cited = vec![
            Source::new("Contacto", "/contacto"),
            Source::new("", "/fuera-de-evidencia"),
        ];
        let out = reconcile(&cited, &evidence());
        assert!(out.iter().all(|s| s.url != "/fuera-de-evidencia"));
    }

    #[test]
    fn test_excerpt_truncated() {
        let long = EvidenceRecord::new("x", "X", "/x", "y".repeat(1000), vec![]);
        let out = reconcile(&[Source::new("X", "/x")], &[long]);
        assert!(out[0].excerpt.as_deref().unwrap().chars().count() <= 200);
    }
}
