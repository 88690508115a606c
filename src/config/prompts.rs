//! Companion persona
//!
//! The built-in persona is Calm AI. A different one can be loaded from a TOML
//! file pointed at by `CALM_PERSONA_FILE`.
//!
//! # Example Persona File
//!
//! ```toml
//! [persona]
//! name = "Sunny"
//!
//! [system_prompt]
//! content = """
//! You are **Sunny**, an upbeat friend...
//! """
//!
//! [closing]
//! content = "Keep it short and kind."
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;

/// A persona as written in a TOML file
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersonaFile {
    persona: PersonaInfo,
    system_prompt: Section,
    #[serde(default)]
    closing: Option<Section>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersonaInfo {
    name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Section {
    content: String,
}

/// Who the model is asked to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    /// Speaker label the prompt ends with
    pub name: String,
    /// Personality, tone, brevity and crisis guidance. Precedes the mood context.
    pub system_prompt: String,
    /// Reminder placed after the mood context
    pub closing: String,
}

impl Persona {
    pub fn calm_ai() -> Self {
        Self {
            name: builtin::NAME.to_string(),
            system_prompt: builtin::SYSTEM_PROMPT.to_string(),
            closing: builtin::CLOSING.to_string(),
        }
    }

    pub async fn load_from_file(path: &Path) -> Result<Self, PersonaError> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| PersonaError::IoError(e.to_string()))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, PersonaError> {
        let file: PersonaFile =
            toml::from_str(content).map_err(|e| PersonaError::ParseError(e.to_string()))?;

        if file.persona.name.trim().is_empty() {
            return Err(PersonaError::ParseError("persona.name must not be empty".into()));
        }

        Ok(Self {
            name: file.persona.name,
            system_prompt: file.system_prompt.content.trim().to_string(),
            closing: file
                .closing
                .map(|c| c.content.trim().to_string())
                .unwrap_or_default(),
        })
    }
}

impl Default for Persona {
    fn default() -> Self {
        Self::calm_ai()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PersonaError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Built-in Calm AI persona
pub mod builtin {
    pub const NAME: &str = "Calm AI";

    pub const SYSTEM_PROMPT: &str = r#"You are **Calm AI**, a warm, empathetic friend who's always there to listen and support.

Your personality:
- Speak like a real, caring friend - use "I" statements and show genuine concern
- Always validate feelings first before anything else
- Keep replies conversational and warm (2-4 sentences)
- Use gentle, comforting language
- End with **one soft emoji** when it feels natural: 🫂✨🤌💪💕

**Most important rule**: When someone shares difficult feelings:
1. FIRST - Acknowledge and validate their emotion
2. SECOND - Show genuine care and understanding
3. THIRD - Offer gentle support or a listening ear
4. ONLY if appropriate - gently mention resources as a "just in case" option

**Crisis response approach**:
Instead of immediately listing resources, say something like:
"I'm so sorry you're feeling this way right now. That sounds incredibly heavy to carry alone. I'm here with you, and I care about you. Would it help to talk about what's going on? 💖"

If the conversation continues to indicate serious crisis, then gently add:
"Just so you know, there are also people available 24/7 who can support you right now if that would help...""#;

    pub const CLOSING: &str = "Remember: You're a friend first, not a crisis hotline. Lead with heart, not resources. Keep every response short, real, and from the heart.";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_persona() {
        let toml_content = r#"
[persona]
name = "Sunny"

[system_prompt]
content = """
You are Sunny.
"""

[closing]
content = "Be brief."
"#;

        let persona = Persona::from_toml(toml_content).unwrap();
        assert_eq!(persona.name, "Sunny");
        assert_eq!(persona.system_prompt, "You are Sunny.");
        assert_eq!(persona.closing, "Be brief.");
    }

    #[test]
    fn test_closing_is_optional() {
        let toml_content = r#"
[persona]
name = "Minimal"

[system_prompt]
content = "Hello"
"#;

        let persona = Persona::from_toml(toml_content).unwrap();
        assert!(persona.closing.is_empty());
    }

    #[test]
    fn test_blank_name_rejected() {
        let toml_content = r#"
[persona]
name = "  "

[system_prompt]
content = "Hello"
"#;

        assert!(matches!(
            Persona::from_toml(toml_content),
            Err(PersonaError::ParseError(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = Persona::load_from_file(Path::new("/definitely/not/here.toml"))
            .await
            .unwrap_err();
        assert!(matches!(err, PersonaError::IoError(_)));
    }

    #[test]
    fn test_builtin_has_crisis_guidance() {
        let persona = Persona::default();
        assert_eq!(persona.name, "Calm AI");
        assert!(persona.system_prompt.contains("Crisis response approach"));
    }
}
