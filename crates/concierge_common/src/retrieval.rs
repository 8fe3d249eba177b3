//! Deterministic keyword retrieval over evidence records.
//!
//! Tokenizes the query, widens it through a one-level synonym table, and
//! scores every candidate by weighted field overlap. Running the same query
//! twice over the same records yields identical output.

use crate::types::EvidenceRecord;

/// Score weights per matched field.
const TITLE_WEIGHT: i32 = 4;
const TAG_WEIGHT: i32 = 3;
const BODY_WEIGHT: i32 = 1;
const URL_WEIGHT: i32 = 1;

/// Lowercase and strip diacritics so "teléfono" and "telefono" meet.
pub fn fold(text: &str) -> String {
    text.chars()
        .flat_map(|c| c.to_lowercase())
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            'ç' => 'c',
            _ => c,
        })
        .collect()
}

/// Function words that carry no retrieval signal.
const STOPWORDS: &[&str] = &[
    "de", "del", "el", "la", "lo", "los", "las", "un", "una", "unos", "unas", "al", "y", "o",
    "u", "en", "es", "son", "esta", "estan", "que", "como", "para", "por", "con", "sin", "se",
    "su", "sus", "mi", "mis", "tu", "tus", "le", "hay", "the", "a", "an", "and", "or", "of",
    "to", "in", "on", "for", "is", "are", "it", "at", "do", "you", "i",
];

/// Split a query into folded tokens on non-alphanumeric runs, dropping
/// empties and stopwords. An all-stopword query tokenizes to nothing.
pub fn tokenize(query: &str) -> Vec<String> {
    fold(query)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty() && !STOPWORDS.contains(t))
        .map(|t| t.to_string())
        .collect()
}

/// Synonyms for a folded token. One level deep only: expanding a synonym's
/// synonym is deliberately not done.
fn synonyms_for(token: &str) -> &'static [&'static str] {
    match token {
        "telefono" => &["numero", "whatsapp", "contacto"],
        "numero" => &["telefono", "contacto"],
        "whatsapp" => &["telefono", "contacto"],
        "email" | "correo" => &["contacto"],
        "precio" | "precios" => &["tarifa", "tarifas", "coste"],
        "tarifa" | "tarifas" => &["precio", "precios"],
        "cuanto" => &["precio", "tarifa"],
        "reserva" | "reservar" | "reservas" => &["disponibilidad", "booking"],
        "disponibilidad" => &["reserva"],
        "horario" | "horarios" => &["apertura", "cierre", "hora"],
        "abierto" | "abre" | "cierra" => &["horario"],
        "perro" | "perros" => &["mascota", "mascotas", "animal"],
        "mascota" | "mascotas" => &["perro", "animal"],
        "parcela" | "parcelas" => &["tienda", "caravana", "camping"],
        "bungalow" | "bungalows" => &["alojamiento", "cabana"],
        "alojamiento" | "alojamientos" => &["bungalow", "parcela"],
        "piscina" => &["nadar", "agua"],
        "nadar" => &["piscina"],
        "llegar" | "direccion" | "ubicacion" => &["mapa", "como-llegar"],
        "wifi" | "internet" => &["conexion"],
        "nino" | "ninos" => &["infantil", "familia"],
        _ => &[],
    }
}

/// Union the tokens with their mapped synonyms, keeping first-seen order.
pub fn expand(tokens: &[String]) -> Vec<String> {
    let mut expanded: Vec<String> = Vec::with_capacity(tokens.len());
    for token in tokens {
        if !expanded.contains(token) {
            expanded.push(token.clone());
        }
        for syn in synonyms_for(token) {
            let syn = syn.to_string();
            if !expanded.contains(&syn) {
                expanded.push(syn);
            }
        }
    }
    expanded
}

/// Weighted field-overlap score for one record. Zero means no overlap.
pub fn score_record(record: &EvidenceRecord, tokens: &[String]) -> i32 {
    let title = fold(&record.title);
    let url = fold(&record.url);
    let content = fold(&record.content);
    let tags: Vec<String> = record.tags.iter().map(|t| fold(t)).collect();

    let mut score = 0;
    for token in tokens {
        if title.contains(token.as_str()) {
            score += TITLE_WEIGHT;
        }
        if tags.iter().any(|t| t.contains(token.as_str())) {
            score += TAG_WEIGHT;
        }
        if content.contains(token.as_str()) {
            score += BODY_WEIGHT;
        }
        if url.contains(token.as_str()) {
            score += URL_WEIGHT;
        }
    }
    score
}

/// Retrieve the top `k` records for a query.
///
/// Deterministic: descending score, ties broken by ascending record id.
/// Records scoring zero are excluded entirely. An empty query returns an
/// empty result; the caller supplies its own fallback evidence.
pub fn retrieve(records: &[EvidenceRecord], query: &str, k: usize) -> Vec<EvidenceRecord> {
    let tokens = expand(&tokenize(query));
    if tokens.is_empty() {
        return vec![];
    }

    let mut scored: Vec<(i32, &EvidenceRecord)> = records
        .iter()
        .map(|r| (score_record(r, &tokens), r))
        .filter(|(score, _)| *score > 0)
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.id.cmp(&b.1.id)));

    scored.into_iter().take(k).map(|(_, r)| r.clone()).collect()
}
