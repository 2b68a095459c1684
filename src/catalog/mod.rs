use anyhow::{Context, Result};
use log::info;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::domain::{Character, CharacterId};

const BUNDLED_CHARACTERS: &str = include_str!("../../data/characters.json");

/// Read-only catalog of selectable characters
#[derive(Debug, Clone)]
pub struct CharacterCatalog {
    characters: Vec<Character>,
}

impl CharacterCatalog {
    /// Catalog shipped with the crate
    pub fn bundled() -> Result<Self> {
        Self::from_json(BUNDLED_CHARACTERS).context("Failed to parse bundled character catalog")
    }

    /// Load a catalog from a JSON array of `{id, name, emoji}` objects
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read character catalog {}", path.display()))?;

        let catalog = Self::from_json(&json)
            .with_context(|| format!("Failed to parse character catalog {}", path.display()))?;

        info!("Loaded {} characters from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let characters: Vec<Character> = serde_json::from_str(json)?;
        Self::new(characters)
    }

    pub fn new(characters: Vec<Character>) -> Result<Self> {
        let mut ids = HashSet::new();
        let mut names = HashSet::new();

        for character in &characters {
            if !ids.insert(character.id) {
                anyhow::bail!("Duplicate character id {}", character.id);
            }
            if !names.insert(character.name.to_lowercase()) {
                anyhow::bail!("Duplicate character name {}", character.name);
            }
        }

        Ok(Self { characters })
    }

    /// Case-insensitive exact name match
    pub fn find(&self, name: &str) -> Option<&Character> {
        let wanted = name.to_lowercase();
        self.characters
            .iter()
            .find(|c| c.name.to_lowercase() == wanted)
    }

    pub fn get(&self, id: CharacterId) -> Option<&Character> {
        self.characters.iter().find(|c| c.id == id)
    }

    pub fn all(&self) -> &[Character] {
        &self.characters
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }
}
