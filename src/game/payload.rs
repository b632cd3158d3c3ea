use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// The structured reply the game master is asked for. Every part is optional
/// and off-shape parts are dropped, so partial replies still render.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GamePayload {
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub narration: Option<String>,
    #[serde(default, deserialize_with = "lenient_image", skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageDetails>,
    #[serde(default, deserialize_with = "lenient_actions")]
    pub actions: Vec<GameAction>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageDetails {
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub top: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub bottom: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

/// One suggested action. An entry without a usable description keeps its
/// slot so the remaining actions keep their numbers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameAction {
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Strings are kept; anything else counts as absent
fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        _ => None,
    })
}

fn lenient_image<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<ImageDetails>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        image @ Value::Object(_) => serde_json::from_value(image).ok(),
        _ => None,
    })
}

fn lenient_actions<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<GameAction>, D::Error> {
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .map(|item| match item {
            Value::Object(_) => serde_json::from_value(item).unwrap_or_default(),
            _ => GameAction::default(),
        })
        .collect())
}

/// Parse the whole reply, or failing that the span from the first `{` to the
/// last `}`. Only a JSON object counts as a payload.
pub fn parse_game_payload(raw: &str) -> Option<GamePayload> {
    if let Some(payload) = payload_from_json(raw) {
        return Some(payload);
    }
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    payload_from_json(&raw[start..=end])
}

fn payload_from_json(text: &str) -> Option<GamePayload> {
    match serde_json::from_str::<Value>(text).ok()? {
        object @ Value::Object(_) => serde_json::from_value(object).ok(),
        _ => None,
    }
}

/// Render a payload for the console: narration, image details, then numbered
/// actions. Absent sections are left out.
pub fn format_game_output(payload: &GamePayload) -> String {
    let mut output = Vec::new();

    if let Some(narration) = &payload.narration {
        output.push(format!("\nNarration: {}", narration));
    }

    if let Some(image) = &payload.image {
        output.push("\nImage Details:".to_string());
        if let Some(top) = &image.top {
            output.push(format!("Top Caption: {}", top));
        }
        if let Some(bottom) = &image.bottom {
            output.push(format!("Bottom Caption: {}", bottom));
        }
        if let Some(prompt) = &image.prompt {
            output.push(format!("Image Prompt: {}", prompt));
        }
    }

    if !payload.actions.is_empty() {
        output.push("\nAvailable Actions:".to_string());
        for (i, action) in payload.actions.iter().enumerate() {
            if let Some(description) = &action.description {
                output.push(format!("{}. {}", i + 1, description));
            }
        }
    }

    output.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FULL: &str = r#"{
        "narration": "You wake in a meadow.",
        "image": {"top": "Where am I?", "bottom": "A slime approaches", "prompt": "anime meadow, slime"},
        "actions": [{"description": "Run"}, {"description": "Fight"}]
    }"#;

    #[test]
    fn test_strict_parse() {
        let payload = parse_game_payload(FULL).unwrap();
        assert_eq!(payload.narration.as_deref(), Some("You wake in a meadow."));
        assert_eq!(payload.actions.len(), 2);
        assert_eq!(payload.image.unwrap().bottom.as_deref(), Some("A slime approaches"));
    }

    #[test]
    fn test_extracts_json_from_chatter() {
        let payload = parse_game_payload(r#"Sure! {"narration":"x","actions":[]} thanks"#).unwrap();
        assert_eq!(
            payload,
            GamePayload {
                narration: Some("x".to_string()),
                image: None,
                actions: vec![],
            }
        );
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert_eq!(parse_game_payload("The dragon says hello."), None);
        assert_eq!(parse_game_payload("} backwards {"), None);
        assert_eq!(parse_game_payload("{ broken json"), None);
        assert_eq!(parse_game_payload("[1, 2, 3]"), None);
    }

    #[test]
    fn test_format_full_payload() {
        let payload = parse_game_payload(FULL).unwrap();
        assert_eq!(
            format_game_output(&payload),
            "\nNarration: You wake in a meadow.\n\
             \nImage Details:\n\
             Top Caption: Where am I?\n\
             Bottom Caption: A slime approaches\n\
             Image Prompt: anime meadow, slime\n\
             \nAvailable Actions:\n\
             1. Run\n\
             2. Fight"
        );
    }

    #[test]
    fn test_format_omits_absent_sections() {
        let payload = GamePayload {
            narration: Some("Quiet.".to_string()),
            ..GamePayload::default()
        };
        assert_eq!(format_game_output(&payload), "\nNarration: Quiet.");
        assert_eq!(format_game_output(&GamePayload::default()), "");
    }

    #[test]
    fn test_off_shape_parts_are_dropped() {
        let payload = parse_game_payload(r#"{"narration":"x","actions":["Run","Fight"]}"#).unwrap();
        assert_eq!(payload.narration.as_deref(), Some("x"));
        assert_eq!(payload.actions, vec![GameAction::default(), GameAction::default()]);
        assert_eq!(format_game_output(&payload), "\nNarration: x\n\nAvailable Actions:");

        let payload = parse_game_payload(r#"{"narration":"x","actions":null}"#).unwrap();
        assert!(payload.actions.is_empty());

        let payload = parse_game_payload(r#"{"narration":"x","image":"a castle","actions":[]}"#).unwrap();
        assert_eq!(payload.image, None);
        assert_eq!(format_game_output(&payload), "\nNarration: x");

        let payload =
            parse_game_payload(r#"{"narration":null,"image":{"top":7,"prompt":"castle"},"actions":[{"description":3},"Hide",{"description":"Leave"}]}"#)
                .unwrap();
        assert_eq!(payload.narration, None);
        assert_eq!(
            payload.image,
            Some(ImageDetails {
                prompt: Some("castle".to_string()),
                ..ImageDetails::default()
            })
        );
        assert_eq!(
            format_game_output(&payload),
            "\nImage Details:\nImage Prompt: castle\n\nAvailable Actions:\n3. Leave"
        );
    }

    #[test]
    fn test_actions_without_description_keep_numbering() {
        let payload = parse_game_payload(r#"{"actions":[{"description":"Wait"},{},{"description":"Leave"}]}"#).unwrap();
        assert_eq!(
            format_game_output(&payload),
            "\nAvailable Actions:\n1. Wait\n3. Leave"
        );
    }
}
