//! Grounding-context assembly.
//!
//! Pure functions that turn classified labels, conversation history, or
//! retrieved place records into the message lists handed to the
//! generative model. Each pipeline has a fixed system instruction; the
//! grounding data is serialized into the user turn.

use crate::error::{CoreError, CoreResult};
use crate::generate::Message;
use crate::memory::ConversationMemory;
use crate::models::{PlaceRecord, PlanRequest};

/// System instruction for the hieroglyph translation pipeline.
const TRANSLATION_GUIDE: &str = "You are an AI Egyptologist specializing in linguistic and \
cultural interpretation of ancient Egyptian hieroglyphics. You receive the classified names of \
one or more hieroglyphic symbols from an image recognition model. Synthesize the classified \
symbols into a fluent, meaningful sentence reflecting their literal and contextual \
significance, weighing the phonetic, symbolic, and grammatical role of each glyph. Enrich the \
reading with the cultural and ceremonial context it would have carried, but keep the final \
translation concise: clarity over length.";

/// System instruction for the chat pipeline.
const CHAT_GUIDE: &str = "You are a chatbot specializing in Ancient Egyptian history. Answer \
only questions related to pharaonic figures, ancient Egyptian stories, historical sites, \
Egyptian identity, pyramids, and ancient Egyptian history. If you don't know the answer, \
respond with: \"I have not been provided with sufficient information on this topic.\" Always \
reply in English only, using a concise and easy-to-understand style.";

/// System instruction for the itinerary pipeline, including the shape
/// the JSON-mode reply must take.
const ITINERARY_GUIDE: &str = "You are an award-winning local guide. Generate a day-by-day \
itinerary with realistic timings, logical routing, transport hints and cultural notes, using \
the candidate historical places provided. Respond with a single JSON object of the shape \
{\"city\": string, \"days\": integer, \"plan\": [{\"day\": integer, \"date\": \"YYYY-MM-DD\", \
\"entries\": [{\"time\": \"HH:MM\", \"place_name\": string, \"activity\": string, \
\"notes\": string (optional)}]}]} where plan has exactly one element per requested day and \
every entry has a non-empty time, place_name, and activity.";

/// Join classified symbol labels into the grounding context string:
/// comma-delimited, classification order preserved.
pub fn symbol_context(labels: &[String]) -> String {
    labels.join(", ")
}

/// Messages for the translation pipeline.
pub fn translation_messages(labels: &[String]) -> Vec<Message> {
    vec![
        Message::system(TRANSLATION_GUIDE),
        Message::user(format!("Context: {}", symbol_context(labels))),
    ]
}

/// Fold an optional caller-supplied context into the user turn.
pub fn chat_user_turn(question: &str, context: Option<&str>) -> String {
    match context {
        Some(ctx) if !ctx.trim().is_empty() => {
            format!("Context: {}\nQuestion: {}", ctx.trim(), question.trim())
        }
        _ => format!("Question: {}", question.trim()),
    }
}

/// Messages for the chat pipeline: the domain restriction, the bounded
/// history, then the new user turn. The memory itself is not touched —
/// the caller appends turns only once generation succeeds.
pub fn chat_messages(memory: &ConversationMemory, user_turn: &str) -> Vec<Message> {
    let mut messages = Vec::with_capacity(memory.len() + 2);
    messages.push(Message::system(CHAT_GUIDE));
    for turn in memory.turns() {
        messages.push(Message {
            role: turn.role.as_str().to_string(),
            content: turn.content.clone(),
        });
    }
    messages.push(Message::user(user_turn));
    messages
}

/// Messages for the itinerary pipeline: traveler preferences and the
/// retrieved candidate places, both as JSON, appended to the guide
/// instruction.
pub fn itinerary_messages(
    request: &PlanRequest,
    places: &[PlaceRecord],
) -> CoreResult<Vec<Message>> {
    let prefs = serde_json::to_string(request)
        .map_err(|e| CoreError::Generation(format!("serialize preferences: {}", e)))?;
    let candidates = serde_json::to_string(places)
        .map_err(|e| CoreError::Generation(format!("serialize places: {}", e)))?;

    let user = format!(
        "Traveller preferences JSON:\n{}\nCandidate historical places JSON:\n{}",
        prefs, candidates
    );

    Ok(vec![Message::system(ITINERARY_GUIDE), Message::user(user)])
}
