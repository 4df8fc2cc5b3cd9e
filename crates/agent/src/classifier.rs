use serde_json::{Map, Value};
use tracing::warn;

use dicta_core::domain::execution::{Intent, TEXT_PARAM};

use crate::llm::{ChatClient, ChatMessage, LlmError};

/// Model results below this confidence degrade to the catch-all intent.
pub const CONFIDENCE_THRESHOLD: f64 = 0.7;

const CLASSIFY_SYSTEM: &str = r#"Je bent een intent-classificatie engine. Analyseer de Nederlandse transcriptie en bepaal de intentie.

Mogelijke intenties:
- "whatsapp": Gebruiker wil een WhatsApp-bericht sturen. Extraheer "contact" (naam) en "bericht" (inhoud).
- "artikel": Gebruiker wil een artikel of tekst laten schrijven/herschrijven. Extraheer "onderwerp" (kort) en "brontekst" (de originele tekst).
- "aantekening": Alles wat niet in bovenstaande categorieën valt, of als je twijfelt.

Antwoord ALLEEN met valide JSON in dit formaat:
{"intent": "whatsapp|artikel|aantekening", "params": {...}, "confidence": 0.0-1.0}

Voorbeelden:

Invoer: "stuur een whatsapp aan Peter dat ik wat later kom"
Uitvoer: {"intent": "whatsapp", "params": {"contact": "Peter", "bericht": "ik kom wat later"}, "confidence": 0.95}

Invoer: "stuur een berichtje naar Maria ik sta in de file"
Uitvoer: {"intent": "whatsapp", "params": {"contact": "Maria", "bericht": "ik sta in de file"}, "confidence": 0.9}

Invoer: "maak een artikel van deze tekst over duurzame energie in Nederland"
Uitvoer: {"intent": "artikel", "params": {"onderwerp": "duurzame energie in Nederland", "brontekst": "deze tekst over duurzame energie in Nederland"}, "confidence": 0.9}

Invoer: "vergeet niet melk te kopen"
Uitvoer: {"intent": "aantekening", "params": {"tekst": "vergeet niet melk te kopen"}, "confidence": 0.85}

Invoer: "schrijf op dat de vergadering verplaatst is naar dinsdag"
Uitvoer: {"intent": "aantekening", "params": {"tekst": "de vergadering is verplaatst naar dinsdag"}, "confidence": 0.85}"#;

/// Outcome of classifying one transcript. Transient; never persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct Classification {
    pub intent: Intent,
    pub params: Map<String, Value>,
    pub confidence: f64,
}

/// Transcript-to-intent classifier with a validation/fallback policy.
///
/// The model call goes through the configured chat client (which retries
/// transient failures itself); anything unreliable in the model's *output*
/// degrades to the catch-all intent locally. Infrastructure failures are
/// returned as errors, never masked by the fallback.
#[derive(Clone)]
pub struct IntentClassifier<C> {
    client: C,
    model: String,
}

impl<C: ChatClient> IntentClassifier<C> {
    pub fn new(client: C, model: impl Into<String>) -> Self {
        Self { client, model: model.into() }
    }

    pub async fn classify(&self, transcript: &str) -> Result<Classification, LlmError> {
        let messages =
            [ChatMessage::system(CLASSIFY_SYSTEM), ChatMessage::user(transcript)];
        let raw = self.client.chat(&self.model, &messages, true).await?;
        Ok(interpret(&raw, transcript))
    }
}

/// Validate raw model output and apply the fallback policy.
///
/// Fallback rules: unparseable JSON, a missing `intent` or `confidence`
/// field, or an intent outside the closed set fall back with full
/// confidence; a valid result below the threshold falls back preserving the
/// model's reported confidence. A missing `params` object is synthesized
/// from the transcript. Reported confidence is clamped into [0, 1].
pub fn interpret(raw: &str, transcript: &str) -> Classification {
    let Ok(value) = serde_json::from_str::<Value>(raw) else {
        warn!(event_name = "classify.fallback.unparseable", "model returned invalid JSON");
        return fallback(transcript, 1.0);
    };

    let intent_raw = value.get("intent").and_then(Value::as_str);
    let confidence = value.get("confidence").and_then(Value::as_f64);
    let (Some(intent_raw), Some(confidence)) = (intent_raw, confidence) else {
        warn!(event_name = "classify.fallback.missing_fields", "model output misses intent or confidence");
        return fallback(transcript, 1.0);
    };

    let Some(intent) = Intent::parse(intent_raw) else {
        warn!(
            event_name = "classify.fallback.unknown_intent",
            intent = intent_raw,
            "model proposed an intent outside the closed set"
        );
        return fallback(transcript, 1.0);
    };

    let confidence = confidence.clamp(0.0, 1.0);
    if confidence < CONFIDENCE_THRESHOLD {
        warn!(
            event_name = "classify.fallback.low_confidence",
            intent = intent.as_str(),
            confidence,
            "classification below threshold"
        );
        return fallback(transcript, confidence);
    }

    let params = match value.get("params").and_then(Value::as_object) {
        Some(params) => params.clone(),
        None => text_params(transcript),
    };

    Classification { intent, params, confidence }
}

fn fallback(transcript: &str, confidence: f64) -> Classification {
    Classification { intent: Intent::catch_all(), params: text_params(transcript), confidence }
}

fn text_params(transcript: &str) -> Map<String, Value> {
    let mut params = Map::new();
    params.insert(TEXT_PARAM.to_string(), Value::String(transcript.to_string()));
    params
}
