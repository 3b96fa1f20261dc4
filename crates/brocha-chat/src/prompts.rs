//! Fixed prompts and customer-facing replies.
//!
//! Everything the customer reads is Spanish; so are the instructions sent to
//! the generator, since the model answers in the language it is prompted in.

/// Reply for any fault during a dialogue run.
pub const APOLOGY: &str = "Ocurrió un error. Por favor, intenta nuevamente.";

/// Reply when the intent could not be decided.
pub const CLARIFICATION: &str = "No pude entender tu consulta. ¿Podrías reformularla?";

/// Reply when no knowledge passage survives the relevance filter.
pub const NO_INFORMATION: &str =
    "Lo siento, no encontré información específica sobre eso. ¿Podrías reformular tu pregunta?";

/// Reply when the catalog query returns nothing.
pub const NO_PRODUCTS: &str = "No encontré productos que coincidan con tu búsqueda.";

/// Header of a catalog listing.
pub const PRODUCTS_HEADER: &str = "Productos encontrados:";

/// Prefix of a catalog failure reply; the cause follows.
pub const DATABASE_ERROR_PREFIX: &str = "Error consultando la base de datos: ";

pub const JSON_ROUTER: &str = r#"Clasifica el mensaje de un cliente de una pinturería en una de tres categorías:
1. CHAT: saludos, despedidas, agradecimientos o charla informal.
2. RAG: preguntas sobre teoría de pinturas, técnicas, consejos o herramientas.
3. SQL: preguntas sobre productos concretos, precios, stock, marcas o categorías.

Ejemplos SQL:
- "¿Cuánto cuesta la pintura Alba?"
- "¿Tienen pinturas látex?"
- "¿Qué marcas de esmalte tienen?"
- "¿Hay ofertas en pinturas?"

Ejemplos RAG:
- "¿Qué tipos de pintura hay?"
- "¿Qué herramientas se usan para pintar?"
- "¿Cuál es la diferencia entre pintura interior y exterior?"

Responde únicamente con JSON en este formato:
{"type": "CHAT|RAG|SQL", "confidence": 0.0, "metadata": {"keywords": [], "entities": []}}"#;

pub const SMALL_TALK_GATE: &str = "Clasifica si el mensaje es charla casual o una consulta.
Charla casual incluye saludos, despedidas, agradecimientos y conversación informal.
Consulta incluye preguntas sobre productos o guías y búsqueda de información.

Responde SOLO con 'small_talk' o 'consulta'.";

pub const COLLECTION_GATE: &str = "Clasifica si el mensaje necesita información de guías o de productos.

Guías: tutoriales, técnicas de pintura, consejos, pasos a seguir, cómo hacer algo.
Productos: productos concretos, precios, características, comparaciones, disponibilidad.

Responde SOLO con 'guias' o 'productos'.";

pub const FRIENDLY_PERSONA: &str = "Eres el asistente de una pinturería. Responde en español de manera \
amigable y profesional, con el tono cordial y cercano de una tienda de barrio. Si el cliente \
pregunta por productos, precios o técnicas, invítalo a hacer la consulta concreta.";

/// Instructions for one relevance judgment.
pub fn relevance_judgment(question: &str, passage: &str) -> String {
    format!(
        "Evalúa qué tan relevante es el contexto para responder la pregunta.\n\n\
         Pregunta: {}\n\
         Contexto: {}\n\n\
         Responde únicamente con un número entre 0 y 1.",
        question, passage
    )
}

pub const RELEVANCE_QUESTION: &str = "¿Qué tan relevante es este contexto?";

/// Instructions for the final knowledge-base answer.
pub fn expert_answer(history_context: &str, documents: &str) -> String {
    format!(
        "Eres un experto en pinturas y técnicas de pintura. Responde en español usando \
         la documentación y el historial. Si la documentación no alcanza para responder, \
         indica que no tienes esa información.\n\n\
         Historial de la conversación:\n{}\n\n\
         Documentación relevante:\n{}",
        if history_context.trim().is_empty() {
            "(sin historial)"
        } else {
            history_context
        },
        documents
    )
}
