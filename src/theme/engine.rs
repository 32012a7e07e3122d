//! Theme derivation engine.
//!
//! Derives a [`ThemeDescriptor`] from conversation text without ever
//! blocking the primary chat path. All parse and transport failures are
//! converted into "no descriptor"; the previous cached theme stays
//! authoritative.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::llm::CompletionClient;
use crate::store::Message;
use crate::theme::descriptor::{ThemeCategory, ThemeDescriptor, ThemePalette};

/// Palette prompt; `{messages}` is replaced with the formatted tail.
const PALETTE_PROMPT: &str = r##"Based on conversation mood, output ONLY this JSON (no text):
{
  "id": "mood_theme",
  "name": "Theme Name",
  "primaryColor": "#hex",
  "secondaryColor": "#hex",
  "backgroundColor": "#hex",
  "textColor": "#hex",
  "accentColor": "#hex",
  "gradientStart": "#hex",
  "gradientEnd": "#hex",
  "messageUserBg": "#hex",
  "messageAssistantBg": "#hex",
  "borderColor": "#hex",
  "shadowColor": "rgba(r,g,b,0.3)",
  "icon": "emoji"
}

Conversation: {messages}"##;

/// Category prompt; `{labels}` and `{messages}` are replaced.
const CATEGORY_PROMPT: &str = "Analyze the emotional tone and context of this conversation. \
Respond with ONLY ONE word from this list:\n{labels}\n\n\
Consider:\n\
- Emotional tone (happy, sad, excited, calm)\n\
- Topic (love, work, exploration, problem-solving)\n\
- Conversational style (formal, casual, playful)\n\n\
Latest messages:\n{messages}\n\nTheme:";

/// Only this many characters of the newest message feed the palette prompt.
const PALETTE_SNIPPET_CHARS: usize = 60;

/// Number of trailing messages feeding the category prompt.
const CATEGORY_WINDOW: usize = 6;

/// Which descriptor variant this deployment produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeMode {
    /// Structured color palette via a streaming call.
    Palette,
    /// Mood label via a single non-streaming call.
    Category,
}

impl FromStr for ThemeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "palette" => Ok(Self::Palette),
            "category" => Ok(Self::Category),
            other => Err(format!("unknown theme mode: {other}")),
        }
    }
}

/// Cache entry recording the conversation size a descriptor was derived at.
#[derive(Debug, Clone)]
pub struct CachedTheme {
    /// The derived descriptor.
    pub descriptor: ThemeDescriptor,
    /// Message count at generation time.
    pub message_count: usize,
}

/// Derives theme descriptors from conversation content.
pub struct ThemeEngine {
    client: Arc<dyn CompletionClient>,
    model: String,
    mode: ThemeMode,
    timeout: Duration,
    cache: DashMap<String, CachedTheme>,
}

impl ThemeEngine {
    /// Create an engine for the given deployment mode.
    #[must_use]
    pub fn new(
        client: Arc<dyn CompletionClient>,
        model: impl Into<String>,
        mode: ThemeMode,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            mode,
            timeout,
            cache: DashMap::new(),
        }
    }

    /// Derive a descriptor from the full message history.
    ///
    /// Never fails outward: timeouts, transport errors, and unparsable
    /// output all yield `None`, meaning "retain previous theme".
    pub async fn derive(
        &self,
        conversation_id: &str,
        messages: &[Message],
    ) -> Option<ThemeDescriptor> {
        let derived = match tokio::time::timeout(self.timeout, self.derive_inner(messages)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("theme derivation timed out for {conversation_id}");
                None
            }
        };

        if let Some(descriptor) = &derived {
            self.cache.insert(
                conversation_id.to_owned(),
                CachedTheme {
                    descriptor: descriptor.clone(),
                    message_count: messages.len(),
                },
            );
        }
        derived
    }

    /// Last derived descriptor, if the conversation hasn't grown since.
    ///
    /// Lets a caller skip regeneration when nothing changed; the session
    /// orchestrator regenerates every assistant turn regardless.
    #[must_use]
    pub fn cached_if_fresh(
        &self,
        conversation_id: &str,
        message_count: usize,
    ) -> Option<ThemeDescriptor> {
        self.cache.get(conversation_id).and_then(|entry| {
            (entry.message_count == message_count).then(|| entry.descriptor.clone())
        })
    }

    async fn derive_inner(&self, messages: &[Message]) -> Option<ThemeDescriptor> {
        match self.mode {
            ThemeMode::Palette => self.derive_palette(messages).await,
            ThemeMode::Category => self.derive_category(messages).await,
        }
    }

    /// Streaming palette derivation.
    ///
    /// Prompts with only the newest message to minimize latency, then
    /// parses the accumulation after every fragment and short-circuits on
    /// the first JSON object that deserializes.
    async fn derive_palette(&self, messages: &[Message]) -> Option<ThemeDescriptor> {
        let last = messages.last()?;
        let snippet: String = last.content.chars().take(PALETTE_SNIPPET_CHARS).collect();
        let prompt = PALETTE_PROMPT.replace("{messages}", &format!("{}: {snippet}", last.role));

        let mut tokens = match self.client.generate_stream(&self.model, &prompt).await {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!("palette generation request failed: {e}");
                return None;
            }
        };

        let mut accumulated = String::new();
        while let Some(fragment) = tokens.recv().await {
            accumulated.push_str(&fragment);
            if let Some(palette) = parse_embedded_palette(&accumulated) {
                return Some(ThemeDescriptor::Palette(palette));
            }
        }

        // Stream ended with no successful parse: one last attempt over the
        // full buffer.
        match parse_embedded_palette(&accumulated) {
            Some(palette) => Some(ThemeDescriptor::Palette(palette)),
            None => {
                tracing::debug!(
                    "palette output unparsable ({} chars accumulated)",
                    accumulated.len()
                );
                None
            }
        }
    }

    /// Single-shot category derivation over the last few messages.
    async fn derive_category(&self, messages: &[Message]) -> Option<ThemeDescriptor> {
        if messages.is_empty() {
            return Some(ThemeDescriptor::Category(ThemeCategory::default()));
        }

        let start = messages.len().saturating_sub(CATEGORY_WINDOW);
        let tail = messages[start..]
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n");
        let labels = ThemeCategory::ALL
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let prompt = CATEGORY_PROMPT
            .replace("{labels}", &labels)
            .replace("{messages}", &tail);

        let raw = match self.client.generate(&self.model, &prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("category generation failed: {e}");
                return None;
            }
        };

        let normalized = raw.trim().to_lowercase();
        let category = ThemeCategory::from_label(&normalized).unwrap_or_default();
        Some(ThemeDescriptor::Category(category))
    }
}

/// Locate a balanced outermost `{...}` span and parse it as a palette.
///
/// The model may wrap its JSON in prose; everything around the object is
/// ignored.
fn parse_embedded_palette(buffer: &str) -> Option<ThemePalette> {
    if !buffer.contains('{') || !buffer.contains('}') {
        return None;
    }
    let span = extract_balanced_object(buffer)?;
    serde_json::from_str(span).ok()
}

/// Return the balanced `{...}` span starting at the first `{`, if closed.
///
/// Brace depth is tracked outside JSON string literals, with escape
/// handling, so braces inside string values don't end the span early.
fn extract_balanced_object(buffer: &str) -> Option<&str> {
    let start = buffer.find('{')?;
    let mut depth = 0_usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in buffer[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&buffer[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}
