// Prompt module
// Builds the LLM prompt from the question, retrieved context and property
// identifier. Two mutually exclusive modes: grounded (answer only from the
// supplied context) and general knowledge (act as a local expert for the
// property's locality).


use tracing::debug;

/// Label used when no property identifier accompanies the question.
pub const DEFAULT_PROPERTY_LABEL: &str = "the current property";

/// Locality derived from substrings of the property identifier, checked in a
/// fixed priority order so an identifier matching several keywords resolves
/// deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locality {
    Bali,
    Dubai,
    Unknown,
}

const BALI_KEYWORDS: [&str; 5] = ["bali", "nelayan", "seminyak", "ubud", "canggu"];

impl Locality {
    #[inline]
    pub fn detect(property_id: &str) -> Self {
        let pid = property_id.to_lowercase();
        if BALI_KEYWORDS.iter().any(|keyword| pid.contains(keyword)) {
            Locality::Bali
        } else if pid.contains("dubai") {
            Locality::Dubai
        } else {
            Locality::Unknown
        }
    }

    #[inline]
    pub fn label(self) -> &'static str {
        match self {
            Locality::Bali => "Bali",
            Locality::Dubai => "Dubai",
            Locality::Unknown => "the current location",
        }
    }
}

/// Compose the full prompt for a guest question.
///
/// Grounded mode is selected when at least one context chunk is non-blank
/// after trimming; otherwise the prompt falls back to general knowledge about
/// the property's locality.
#[inline]
pub fn compose_prompt(
    question: &str,
    context_chunks: &[String],
    property_id: Option<&str>,
) -> String {
    let property_label = property_id.unwrap_or(DEFAULT_PROPERTY_LABEL);
    let has_context = context_chunks.iter().any(|chunk| !chunk.trim().is_empty());

    let mut parts = vec![
        "You are a friendly, polite, and helpful assistant for short-term rental guests."
            .to_string(),
    ];

    if let Some(id) = property_id {
        parts.push(format!(
            "You are currently assisting a guest staying at property '{id}'."
        ));
    }

    if has_context {
        parts.push(
            "Your primary goal is to answer guest questions based *only* on the provided \
             'Property Information Context' below."
                .to_string(),
        );
        parts.push(
            "If the answer is not found in the property context, clearly state that you don't \
             have that specific information from the property details available."
                .to_string(),
        );
        let context = context_chunks.join("\n\n---\n\n");
        parts.push(format!(
            "\nProperty Information Context for '{property_label}':\n---\n{context}\n---"
        ));
    } else {
        let city = Locality::detect(property_id.unwrap_or_default()).label();
        debug!("Determined city '{}' for property '{}'", city, property_label);

        parts.push(format!(
            "No specific property information was found for '{property_label}' related to the \
             guest's question."
        ));
        parts.push(format!(
            "In this case, OR if the question is clearly a general question about {city} \
             (e.g. best beaches, local restaurants, activities), act as a knowledgeable local \
             expert for {city} and answer using your general knowledge."
        ));
        parts.push(format!(
            "If the question is not about the property OR {city}, and you don't know the answer, \
             clearly state that you don't have information on that topic."
        ));
    }

    parts.push(
        "Do not make up answers or use external knowledge beyond what has been specified. \
         Be concise and directly answer the question if possible."
            .to_string(),
    );
    parts.push(format!("\nGuest Question: {question}"));
    parts.push("\nAnswer:".to_string());

    parts.join("\n")
}
