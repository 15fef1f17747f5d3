//! Franchise name → canonical team key (the site's URL slug).

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

/// Keys of the 32 current franchises, in the order batches are scheduled.
pub const CURRENT_TEAM_KEYS: &[&str] = &[
    "crd", "atl", "rav", "buf", "car", "chi", "cin", "cle", "dal", "den", "det", "gnb", "htx",
    "clt", "jax", "kan", "rai", "sdg", "ram", "mia", "min", "nwe", "nor", "nyg", "nyj", "phi",
    "pit", "sfo", "sea", "tam", "oti", "was",
];

/// Static table covering current names and historical/relocated franchises.
fn franchise_key(name: &str) -> Option<&'static str> {
    let key = match name {
        "Arizona Cardinals" | "Phoenix Cardinals" | "St. Louis Cardinals" => "crd",
        "Atlanta Falcons" => "atl",
        "Baltimore Ravens" => "rav",
        "Buffalo Bills" => "buf",
        "Carolina Panthers" => "car",
        "Chicago Bears" => "chi",
        "Cincinnati Bengals" => "cin",
        "Cleveland Browns" => "cle",
        "Dallas Cowboys" => "dal",
        "Denver Broncos" => "den",
        "Detroit Lions" => "det",
        "Green Bay Packers" => "gnb",
        "Houston Texans" => "htx",
        "Indianapolis Colts" | "Baltimore Colts" => "clt",
        "Jacksonville Jaguars" => "jax",
        "Kansas City Chiefs" => "kan",
        "Las Vegas Raiders" | "Oakland Raiders" | "Los Angeles Raiders" => "rai",
        "Los Angeles Chargers" | "San Diego Chargers" => "sdg",
        "Los Angeles Rams" | "St. Louis Rams" => "ram",
        "Miami Dolphins" => "mia",
        "Minnesota Vikings" => "min",
        "New England Patriots" | "Boston Patriots" => "nwe",
        "New Orleans Saints" => "nor",
        "New York Giants" => "nyg",
        "New York Jets" => "nyj",
        "Philadelphia Eagles" => "phi",
        "Pittsburgh Steelers" => "pit",
        "San Francisco 49ers" => "sfo",
        "Seattle Seahawks" => "sea",
        "Tampa Bay Buccaneers" => "tam",
        "Tennessee Titans" | "Tennessee Oilers" | "Houston Oilers" => "oti",
        "Washington Commanders" | "Washington Football Team" | "Washington Redskins" => "was",
        _ => return None,
    };
    Some(key)
}

/// Name normalizer: built-in franchise table plus optional aliases loaded
/// from a JSON lookup cache (`{"Display Name": "key"}`). Aliases win.
#[derive(Debug, Clone, Default)]
pub struct TeamDirectory {
    aliases: HashMap<String, String>,
}

impl TeamDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let aliases: HashMap<String, String> =
            serde_json::from_str(json).context("failed to parse team alias JSON")?;
        Ok(Self { aliases })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read team aliases: {}", path.display()))?;
        Self::from_json(&content)
    }

    /// Canonical key for a name. Unrecognized names pass through trimmed.
    pub fn canonical(&self, name: &str) -> String {
        let name = name.trim();
        if let Some(key) = self.aliases.get(name) {
            return key.clone();
        }
        franchise_key(name).map_or_else(|| name.to_string(), str::to_string)
    }
}
