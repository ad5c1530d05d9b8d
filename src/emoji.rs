use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{Result, SlackError};
use crate::slack::SlackReaction;

/// Reaction name to code-point reference (`&#x2705;`), loaded from the emoji side file.
#[derive(Debug, Clone, Default)]
pub struct EmojiTable {
    map: HashMap<String, String>,
}

impl EmojiTable {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            SlackError::Config(format!("could not open emoji file {}: {e}", path.display()))
        })?;
        let map: HashMap<String, String> = serde_json::from_str(&content).map_err(|e| {
            SlackError::Config(format!("could not decode emoji JSON {}: {e}", path.display()))
        })?;
        Ok(Self { map })
    }

    pub fn from_map(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(name).map(String::as_str)
    }

    /// Entries sorted by name.
    pub fn entries(&self) -> Vec<(&str, &str)> {
        let mut entries: Vec<(&str, &str)> = self
            .map
            .iter()
            .map(|(name, code)| (name.as_str(), code.as_str()))
            .collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries
    }

    /// Glyph for a reaction name. Unknown names are decoded as their own reference,
    /// and anything undecodable is shown raw.
    pub fn glyph(&self, name: &str) -> String {
        let source = self.get(name).unwrap_or(name);
        decode_code_point(source)
            .map(String::from)
            .unwrap_or_else(|_| source.to_string())
    }

    /// `" <glyph>:<count>"` per reaction, in server order.
    pub fn render_reactions(&self, reactions: &[SlackReaction]) -> String {
        reactions
            .iter()
            .map(|reaction| format!(" {}:{}", self.glyph(&reaction.name), reaction.count))
            .collect()
    }
}

/// Decode `&#x1F525;` (or bare `1F525`) into its character.
pub fn decode_code_point(reference: &str) -> Result<char> {
    let hex = reference.replace("&#x", "").replace(';', "");
    let value = u32::from_str_radix(hex.trim(), 16)
        .map_err(|_| SlackError::Decode(reference.to_string()))?;
    char::from_u32(value).ok_or_else(|| SlackError::Decode(reference.to_string()))
}
