//! Static knowledge base: the site's topic catalog.
//!
//! Compiled once at process start and read-only afterwards. These records
//! double as the citation allowlist for model answers.

use crate::types::EvidenceRecord;

/// Id of the site-summary record. When present in a merged evidence set it
/// is promoted to the front so the model always sees the site overview
/// first.
pub const SITE_SUMMARY_ID: &str = "site-summary";

/// Fixed catalog of short topic records.
pub struct KnowledgeBase {
    records: Vec<EvidenceRecord>,
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self { records: catalog() }
    }

    pub fn records(&self) -> &[EvidenceRecord] {
        &self.records
    }

    /// Minimal grounding subset used when retrieval comes back empty:
    /// the site summary plus the key static pages.
    pub fn core_evidence(&self) -> Vec<EvidenceRecord> {
        const CORE_IDS: [&str; 4] = [SITE_SUMMARY_ID, "contacto", "tarifas", "reservas"];
        self.records
            .iter()
            .filter(|r| CORE_IDS.contains(&r.id.as_str()))
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&EvidenceRecord> {
        self.records.iter().find(|r| r.id == id)
    }
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::new()
    }
}

fn tags(list: &[&str]) -> Vec<String> {
    list.iter().map(|t| t.to_string()).collect()
}

fn catalog() -> Vec<EvidenceRecord> {
    vec![
        EvidenceRecord::new(
            SITE_SUMMARY_ID,
            "Camping Costa Serena",
            "/",
            "Camping familiar en primera linea de mar en la Costa Dorada. \
             Parcelas amplias, bungalows climatizados, piscina exterior, \
             restaurante y animacion infantil de junio a septiembre. \
             Abierto de marzo a octubre.",
            tags(&["camping", "resumen", "costa"]),
        ),
        EvidenceRecord::new(
            "contacto",
            "Contacto",
            "/contacto",
            "Telefono de recepcion: +34 977 000 111. WhatsApp: +34 600 000 222. \
             Email: info@costaserena.example. Atendemos de 9:00 a 21:00.",
            tags(&["telefono", "whatsapp", "email"]),
        )
        .with_section("informacion"),
        EvidenceRecord::new(
            "tarifas",
            "Tarifas",
            "/tarifas",
            "Parcela estandar desde 28 EUR/noche en temporada baja y 52 EUR/noche \
             en temporada alta. Bungalow 4 plazas desde 95 EUR/noche. \
             Ninos menores de 4 anos gratis. Descuentos para estancias largas.",
            tags(&["precio", "tarifa", "descuento"]),
        )
        .with_section("informacion"),
        EvidenceRecord::new(
            "reservas",
            "Reservas",
            "/reservas",
            "Reserva online con confirmacion inmediata. Se pide una paga y senal \
             del 30%. Cancelacion gratuita hasta 7 dias antes de la llegada.",
            tags(&["reserva", "disponibilidad", "cancelacion"]),
        )
        .with_section("informacion"),
        EvidenceRecord::new(
            "horarios",
            "Horarios",
            "/horarios",
            "Recepcion: 8:00 a 22:00. Entrada a partir de las 14:00, salida antes \
             de las 12:00. Puerta con barrera cerrada de 0:00 a 7:00.",
            tags(&["horario", "apertura", "entrada", "salida"]),
        )
        .with_section("informacion"),
        EvidenceRecord::new(
            "alojamientos",
            "Parcelas y bungalows",
            "/alojamientos",
            "Parcelas de 70 a 100 m2 con toma electrica de 10A. Bungalows de 2, 4 \
             y 6 plazas con cocina, bano y aire acondicionado. Ropa de cama incluida.",
            tags(&["parcela", "bungalow", "caravana", "tienda"]),
        )
        .with_section("alojamiento"),
        EvidenceRecord::new(
            "servicios",
            "Servicios",
            "/servicios",
            "Supermercado, restaurante, lavanderia, wifi en todo el recinto, \
             alquiler de bicicletas y zona de barbacoas.",
            tags(&["wifi", "restaurante", "lavanderia"]),
        )
        .with_section("servicios"),
        EvidenceRecord::new(
            "piscina",
            "Piscina",
            "/piscina",
            "Piscina exterior con zona infantil, abierta de mayo a septiembre de \
             10:00 a 20:00. Gorro no necesario. Socorrista en julio y agosto.",
            tags(&["piscina", "nadar", "infantil"]),
        )
        .with_section("servicios"),
        EvidenceRecord::new(
            "mascotas",
            "Mascotas",
            "/normas/mascotas",
            "Se admiten perros en parcelas (maximo 2, siempre atados) con un \
             suplemento de 4 EUR/noche. No se admiten mascotas en los bungalows.",
            tags(&["mascota", "perro", "normas"]),
        )
        .with_section("normas"),
        EvidenceRecord::new(
            "normas",
            "Normas del camping",
            "/normas",
            "Silencio de 0:00 a 8:00. Velocidad maxima 10 km/h. Visitas deben \
             registrarse en recepcion. Prohibido hacer fuego fuera de las barbacoas.",
            tags(&["normas", "silencio", "visitas"]),
        )
        .with_section("normas"),
        EvidenceRecord::new(
            "como-llegar",
            "Como llegar",
            "/como-llegar",
            "Salida 38 de la AP-7, direccion playa. A 3 km de la estacion de tren. \
             Autobus urbano L2 con parada frente a la entrada. GPS: 41.07, 1.14.",
            tags(&["direccion", "ubicacion", "mapa"]),
        )
        .with_section("informacion"),
        EvidenceRecord::new(
            "actividades",
            "Actividades y animacion",
            "/actividades",
            "Club infantil de junio a septiembre, aquagym, torneos deportivos y \
             musica en vivo los sabados de verano. Excursiones en kayak opcionales.",
            tags(&["animacion", "infantil", "deporte"]),
        )
        .with_section("servicios"),
    ]
}
