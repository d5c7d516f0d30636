//! Prompt templates and reply parsers for the reasoning oracle.
//!
//! The engine composes prompts from retrieved memories and working state,
//! then parses replies into the few typed fields it consumes — an action
//! descriptor, an address path, a numeric score, a short list of
//! questions or insights. Generation content is otherwise opaque.

use serde::Deserialize;

use crate::oracle::OracleFailure;
use crate::types::SpatialAddress;

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// Decide the agent's next action.
pub const DECIDE_ACTION: &str = r#"You are {agent_name}. {persona}
You are currently at {current_address} (tick {tick}).

What you perceive right now:
{percepts}

Relevant memories (most relevant first):
{memories}

Places you can go, by name:
{known_places}

Decide your next action. Return JSON:
{"action": "<short description>", "address": "<world:sector:arena:object path, or omit to stay>", "duration": <ticks, integer>}"#;

/// Extract a subject/predicate/object triple from an action description.
pub const EVENT_TRIPLE: &str = r#"Agent: {agent_name}
Action: {description}

Summarize this as a triple. Return JSON:
{"subject": "{agent_name}", "predicate": "<verb phrase>", "object": "<target>"}"#;

/// Rate how poignant an experience is for the agent.
pub const POIGNANCY: &str = r#"You are {agent_name}. {persona}
On a scale of 1 to 10, where 1 is mundane (brushing teeth, idling) and 10
is life-changing (a breakup, a triumph), rate the poignancy of this
{kind} for you:

"{description}"

Return JSON: {"score": <integer 1-10>}"#;

/// Generate focal questions from recent statements, for reflection.
pub const FOCAL_POINTS: &str = r#"Recent statements about {agent_name}'s life:
{statements}

Given only the information above, what are the {count} most salient
high-level questions we can answer about the subjects in the statements?
Return JSON: {"questions": ["<question>", ...]}"#;

/// Synthesize insights with evidence from numbered statements.
pub const INSIGHTS: &str = r#"Numbered statements about {agent_name}:
{statements}

What {count} high-level insights can you infer? Cite the statement
numbers that support each insight.
Return JSON: {"insights": [{"insight": "<text>", "evidence": [<number>, ...]}, ...]}"#;

/// Summarize a conversation into one remembered line.
pub const CHAT_SUMMARY: &str = r#"Conversation involving {agent_name}:
{conversation}

Summarize, in one sentence from {agent_name}'s perspective, what this
conversation was about."#;

/// Simple template interpolation: replaces `{key}` with the value.
#[must_use]
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{key}}}"), value);
    }
    result
}

// ---------------------------------------------------------------------------
// Typed replies
// ---------------------------------------------------------------------------

/// A parsed decision reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// Short description of the chosen action.
    pub action: String,
    /// Where to perform it; `None` means stay in place.
    pub address: Option<SpatialAddress>,
    /// Ticks the action should last; `None` falls back to the configured
    /// default duration.
    pub duration: Option<u32>,
}

/// One reflection insight plus the statement numbers supporting it.
#[derive(Debug, Clone, PartialEq)]
pub struct Insight {
    /// The synthesized thought.
    pub text: String,
    /// 1-based indexes into the numbered statement list the prompt
    /// presented.
    pub evidence: Vec<usize>,
}

// ---------------------------------------------------------------------------
// Parsers
// ---------------------------------------------------------------------------

/// Locate and decode the first JSON value in a reply. Models wrap JSON in
/// prose often enough that strict whole-string parsing is a losing game.
fn first_json_value(text: &str) -> Result<serde_json::Value, OracleFailure> {
    let start = text
        .find(['{', '['])
        .ok_or_else(|| OracleFailure::MalformedOutput(format!("no JSON in reply: {text:.60}")))?;
    let mut stream =
        serde_json::Deserializer::from_str(&text[start..]).into_iter::<serde_json::Value>();
    match stream.next() {
        Some(Ok(value)) => Ok(value),
        _ => Err(OracleFailure::MalformedOutput(format!(
            "undecodable JSON in reply: {text:.60}"
        ))),
    }
}

/// Parse a decision reply.
///
/// # Errors
///
/// Returns [`OracleFailure::MalformedOutput`] when no decodable decision
/// object is present or the action field is missing/empty.
pub fn parse_decision(text: &str) -> Result<Decision, OracleFailure> {
    #[derive(Deserialize)]
    struct Raw {
        action: String,
        #[serde(default)]
        address: Option<String>,
        #[serde(default)]
        duration: Option<u32>,
    }

    let value = first_json_value(text)?;
    let raw: Raw = serde_json::from_value(value)
        .map_err(|e| OracleFailure::MalformedOutput(format!("decision shape: {e}")))?;
    if raw.action.trim().is_empty() {
        return Err(OracleFailure::MalformedOutput("empty action".into()));
    }
    let address = match raw.address.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(path) => Some(SpatialAddress::parse(path).ok_or_else(|| {
            OracleFailure::MalformedOutput(format!("bad address path: {path}"))
        })?),
    };
    Ok(Decision {
        action: raw.action.trim().to_string(),
        address,
        duration: raw.duration,
    })
}

/// Parse a poignancy reply: a `{"score": n}` object, a bare number, or a
/// number embedded in prose. Clamping to the valid range is the store's
/// job; this only extracts.
///
/// # Errors
///
/// Returns [`OracleFailure::MalformedOutput`] when no number can be
/// found.
pub fn parse_poignancy(text: &str) -> Result<f32, OracleFailure> {
    if let Ok(value) = first_json_value(text) {
        if let Some(score) = value.get("score").and_then(serde_json::Value::as_f64) {
            return Ok(score as f32);
        }
        if let Some(score) = value.as_f64() {
            return Ok(score as f32);
        }
    }
    // Fall back to the first numeric token in the prose.
    text.split(|c: char| !c.is_ascii_digit() && c != '.')
        .find_map(|token| token.parse::<f32>().ok())
        .ok_or_else(|| OracleFailure::MalformedOutput(format!("no score in reply: {text:.60}")))
}

/// Parse an event-triple reply into `(subject, predicate, object)`.
///
/// # Errors
///
/// Returns [`OracleFailure::MalformedOutput`] for an undecodable triple.
pub fn parse_event_triple(text: &str) -> Result<(String, String, String), OracleFailure> {
    #[derive(Deserialize)]
    struct Raw {
        subject: String,
        predicate: String,
        object: String,
    }
    let raw: Raw = serde_json::from_value(first_json_value(text)?)
        .map_err(|e| OracleFailure::MalformedOutput(format!("triple shape: {e}")))?;
    Ok((raw.subject, raw.predicate, raw.object))
}

/// Parse a focal-points reply: `{"questions": [...]}` or a bare array.
///
/// # Errors
///
/// Returns [`OracleFailure::MalformedOutput`] when no string list can be
/// decoded.
pub fn parse_focal_points(text: &str) -> Result<Vec<String>, OracleFailure> {
    let value = first_json_value(text)?;
    let list = value
        .get("questions")
        .cloned()
        .or_else(|| value.is_array().then(|| value.clone()))
        .ok_or_else(|| OracleFailure::MalformedOutput("no questions list".into()))?;
    let questions: Vec<String> = serde_json::from_value(list)
        .map_err(|e| OracleFailure::MalformedOutput(format!("questions shape: {e}")))?;
    if questions.is_empty() {
        return Err(OracleFailure::MalformedOutput("empty questions list".into()));
    }
    Ok(questions)
}

/// Parse an insights reply: `{"insights": [{"insight", "evidence"}]}` or
/// a bare array of the same objects.
///
/// # Errors
///
/// Returns [`OracleFailure::MalformedOutput`] when no insight list can be
/// decoded.
pub fn parse_insights(text: &str) -> Result<Vec<Insight>, OracleFailure> {
    #[derive(Deserialize)]
    struct Raw {
        insight: String,
        #[serde(default)]
        evidence: Vec<usize>,
    }

    let value = first_json_value(text)?;
    let list = value
        .get("insights")
        .cloned()
        .or_else(|| value.is_array().then(|| value.clone()))
        .ok_or_else(|| OracleFailure::MalformedOutput("no insights list".into()))?;
    let raw: Vec<Raw> = serde_json::from_value(list)
        .map_err(|e| OracleFailure::MalformedOutput(format!("insights shape: {e}")))?;
    if raw.is_empty() {
        return Err(OracleFailure::MalformedOutput("empty insights list".into()));
    }
    Ok(raw
        .into_iter()
        .map(|r| Insight {
            text: r.insight,
            evidence: r.evidence,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_replaces_placeholders() {
        let rendered = render_template("{a} meets {b}", &[("a", "Ana"), ("b", "Tom")]);
        assert_eq!(rendered, "Ana meets Tom");
    }

    #[test]
    fn parse_decision_full() {
        let decision = parse_decision(
            r#"{"action": "drink coffee", "address": "ville:hobbs cafe:cafe:counter", "duration": 12}"#,
        )
        .expect("parse");
        assert_eq!(decision.action, "drink coffee");
        assert_eq!(decision.duration, Some(12));
        let address = decision.address.expect("address");
        assert_eq!(address.object.as_deref(), Some("counter"));
    }

    #[test]
    fn parse_decision_tolerates_surrounding_prose() {
        let decision = parse_decision(
            "Sure! Here is my decision:\n{\"action\": \"take a walk\"}\nHope that helps.",
        )
        .expect("parse");
        assert_eq!(decision.action, "take a walk");
        assert!(decision.address.is_none());
        assert!(decision.duration.is_none());
    }

    #[test]
    fn parse_decision_rejects_garbage() {
        assert!(parse_decision("I cannot decide right now").is_err());
        assert!(parse_decision(r#"{"action": ""}"#).is_err());
        assert!(parse_decision(r#"{"action": "walk", "address": "a::b"}"#).is_err());
    }

    #[test]
    fn parse_poignancy_accepts_object_number_and_prose() {
        assert_eq!(parse_poignancy(r#"{"score": 7}"#).expect("parse"), 7.0);
        assert_eq!(parse_poignancy("4").expect("parse"), 4.0);
        assert_eq!(parse_poignancy("I'd rate this about 6 out of 10").expect("parse"), 6.0);
        assert!(parse_poignancy("no idea").is_err());
    }

    #[test]
    fn parse_event_triple_shape() {
        let (s, p, o) = parse_event_triple(
            r#"{"subject": "Ana", "predicate": "is baking", "object": "bread"}"#,
        )
        .expect("parse");
        assert_eq!((s.as_str(), p.as_str(), o.as_str()), ("Ana", "is baking", "bread"));
        assert!(parse_event_triple(r#"{"subject": "Ana"}"#).is_err());
    }

    #[test]
    fn parse_focal_points_object_or_bare_array() {
        let qs = parse_focal_points(r#"{"questions": ["What does Ana value?", "Who is Tom?"]}"#)
            .expect("parse");
        assert_eq!(qs.len(), 2);
        let qs = parse_focal_points(r#"["Only one question?"]"#).expect("parse");
        assert_eq!(qs.len(), 1);
        assert!(parse_focal_points(r#"{"questions": []}"#).is_err());
    }

    #[test]
    fn parse_insights_with_evidence() {
        let insights = parse_insights(
            r#"{"insights": [{"insight": "Ana loves mornings", "evidence": [1, 3]}]}"#,
        )
        .expect("parse");
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].evidence, vec![1, 3]);
        assert!(parse_insights("[]").is_err());
    }
}
