//! Prompt building for the answer orchestrator.

use concierge_common::answer::NOT_FOUND_SENTINEL;
use concierge_common::types::{ChatMessage, EvidenceRecord, Role};

/// Answer rules appended to every system instruction.
const ANSWER_RULES: &str = r#"
=== REGLAS (OBLIGATORIAS) ===
1. Responde SOLO con la informacion de las fuentes numeradas del mensaje.
2. Cita unicamente URLs que aparezcan en esas fuentes.
3. Si las fuentes no cubren la pregunta, responde exactamente NO_INFORMATION.
4. Responde en el idioma que se te indica, con frases cortas y tono cercano.
5. No inventes precios, horarios ni telefonos.

Termina SIEMPRE con un unico objeto JSON:
{"answer": "...", "sources": [{"title": "...", "url": "..."}]}
"#;

/// Build the system instruction: persona, rules, temporal context, and the
/// first-turn vs continuing branch.
pub fn build_system_instruction(
    lang: &str,
    history_is_empty: bool,
    current_date: Option<&str>,
    current_time: Option<&str>,
) -> String {
    let mut prompt = String::with_capacity(1024);

    prompt.push_str(
        "Eres Serena, la recepcionista virtual del Camping Costa Serena. \
         Ayudas a los visitantes de la web con informacion del camping.\n",
    );

    if history_is_empty {
        prompt.push_str("Es el primer mensaje de la conversacion: saluda brevemente antes de responder.\n");
    } else {
        prompt.push_str("La conversacion ya ha empezado: no vuelvas a saludar.\n");
    }

    prompt.push_str(&format!("Responde en el idioma: {}.\n", lang));

    if let Some(date) = current_date {
        prompt.push_str(&format!("Fecha actual: {}.\n", date));
    }
    if let Some(time) = current_time {
        prompt.push_str(&format!("Hora actual: {}.\n", time));
    }

    prompt.push_str(ANSWER_RULES);
    prompt
}

/// Serialize history, evidence, and the question into the user message.
///
/// Evidence entries are numbered so the model can reference them; the
/// history arrives already clamped by the caller.
pub fn build_user_message(
    question: &str,
    history: &[ChatMessage],
    evidence: &[EvidenceRecord],
) -> String {
    let mut message = String::with_capacity(2048);

    if !history.is_empty() {
        message.push_str("=== CONVERSACION PREVIA ===\n");
        for entry in history {
            let who = match entry.role {
                Role::User => "Visitante",
                Role::Assistant => "Serena",
            };
            message.push_str(&format!("{}: {}\n", who, entry.content));
        }
        message.push('\n');
    }

    message.push_str("=== FUENTES ===\n");
    for (index, record) in evidence.iter().enumerate() {
        message.push_str(&format!(
            "[{}] {} — {}\n{}\n\n",
            index + 1,
            record.title,
            record.url,
            record.content
        ));
    }

    message.push_str(&format!("=== PREGUNTA ===\n{}\n", question));
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_turn_greets() {
        let prompt = build_system_instruction("es", true, None, None);
        assert!(prompt.contains("saluda brevemente"));

        let prompt = build_system_instruction("es", false, None, None);
        assert!(prompt.contains("no vuelvas a saludar"));
    }

    #[test]
    fn test_temporal_context_included() {
        let prompt = build_system_instruction("en", true, Some("2025-07-12"), Some("18:30"));
        assert!(prompt.contains("2025-07-12"));
        assert!(prompt.contains("18:30"));
    }

    #[test]
    fn test_rules_mention_sentinel() {
        let prompt = build_system_instruction("es", true, None, None);
        assert!(prompt.contains(NOT_FOUND_SENTINEL));
    }

    #[test]
    fn test_user_message_numbers_evidence() {
        let evidence = vec![
            EvidenceRecord::new("contacto", "Contacto", "/contacto", "tel", vec![]),
            EvidenceRecord::new("tarifas", "Tarifas", "/tarifas", "precios", vec![]),
        ];
        let message = build_user_message("¿telefono?", &[], &evidence);
        assert!(message.contains("[1] Contacto — /contacto"));
        assert!(message.contains("[2] Tarifas — /tarifas"));
        assert!(message.contains("=== PREGUNTA ===\n¿telefono?"));
        assert!(!message.contains("CONVERSACION PREVIA"));
    }

    #[test]
    fn test_user_message_serializes_history() {
        let history = vec![
            ChatMessage::user("hola"),
            ChatMessage::assistant("buenas tardes"),
        ];
        let message = build_user_message("¿precio?", &history, &[]);
        assert!(message.contains("Visitante: hola"));
        assert!(message.contains("Serena: buenas tardes"));
    }
}
