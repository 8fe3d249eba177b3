//! Localized user-facing messages.
//!
//! The chat UI renders whatever `answer` it receives, so every failure mode
//! needs a presentable sentence in the requested language. Spanish is the
//! site's default.

/// Normalize a caller-supplied language code to a supported one.
fn normalize(lang: &str) -> &'static str {
    match lang.to_ascii_lowercase().as_str() {
        s if s.starts_with("en") => "en",
        _ => "es",
    }
}

/// Canonical answer when evidence does not cover the question.
pub fn no_information(lang: &str) -> &'static str {
    match normalize(lang) {
        "en" => {
            "I could not find that information on our site. Please contact \
             reception and we will be happy to help."
        }
        _ => {
            "No he encontrado esa informacion en nuestra web. Ponte en \
             contacto con recepcion y te ayudaremos encantados."
        }
    }
}

/// Rejection for an empty or invalid request body.
pub fn invalid_request(lang: &str) -> &'static str {
    match normalize(lang) {
        "en" => "Please write a question so I can help you.",
        _ => "Escribe una pregunta para que pueda ayudarte.",
    }
}

/// Message too long.
pub fn message_too_long(lang: &str) -> &'static str {
    match normalize(lang) {
        "en" => "Your message is too long. Please shorten it and try again.",
        _ => "Tu mensaje es demasiado largo. Acortalo e intentalo de nuevo.",
    }
}

/// Origin or challenge rejection.
pub fn not_allowed(lang: &str) -> &'static str {
    match normalize(lang) {
        "en" => "This request could not be verified. Please reload the page and try again.",
        _ => "No hemos podido verificar tu solicitud. Recarga la pagina e intentalo de nuevo.",
    }
}

/// Rate-limit rejection.
pub fn rate_limited(lang: &str) -> &'static str {
    match normalize(lang) {
        "en" => "Too many requests in a short time. Please wait a moment.",
        _ => "Demasiadas consultas seguidas. Espera un momento, por favor.",
    }
}

/// Generic upstream failure after retries were exhausted.
pub fn service_trouble(lang: &str) -> &'static str {
    match normalize(lang) {
        "en" => {
            "I am having trouble answering right now. Please try again in a \
             few minutes."
        }
        _ => {
            "Ahora mismo no puedo responder. Intentalo de nuevo en unos \
             minutos, por favor."
        }
    }
}
