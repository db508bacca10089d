//! Picking the right tables (and rows) for an entity on a page with many
//! similarly captioned tables.

use crate::config::MissingTablePolicy;
use crate::normalize::{LeagueAliasTable, normalize_league_name};
use crate::parser::{RawRow, RawTable};
use crate::similarity::Similarity;
use regex::{Regex, RegexBuilder};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum DisambiguationError {
    #[error("no table captioned for '{entity}' with category '{category}'")]
    MissingTable { entity: String, category: String },
    #[error("entity name is empty")]
    EmptyName,
    #[error("failed to build caption pattern")]
    Pattern(#[from] regex::Error),
}

/// An entity name with the organizational affixes it may carry in captions,
/// e.g. "FC" in front or "Football Club" behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityPattern {
    pub prefixes: Vec<String>,
    pub name: String,
    pub suffixes: Vec<String>,
}

impl EntityPattern {
    /// Uses the same affix set on both sides of the name.
    pub fn new(name: &str, affixes: &[String]) -> Self {
        Self {
            prefixes: affixes.to_vec(),
            name: name.to_string(),
            suffixes: affixes.to_vec(),
        }
    }

    /// Anchored at the start of the text; group `rest` holds whatever follows
    /// the name and its optional suffix.
    pub fn compile(&self) -> Result<CompiledEntity, DisambiguationError> {
        let name = words_pattern(&self.name);
        if name.is_empty() {
            return Err(DisambiguationError::EmptyName);
        }

        let mut pattern = String::from("^");
        if let Some(prefixes) = alternation(&self.prefixes) {
            pattern.push_str(&format!(r"(?:(?:{prefixes})\s+)?"));
        }
        pattern.push_str(&name);
        if let Some(suffixes) = alternation(&self.suffixes) {
            pattern.push_str(&format!(r"(?:\s+(?:{suffixes}))?"));
        }
        pattern.push_str(r"(?:\s+(?P<rest>.*))?$");

        let regex = RegexBuilder::new(&pattern).case_insensitive(true).build()?;
        Ok(CompiledEntity {
            name: self.name.clone(),
            regex,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CompiledEntity {
    name: String,
    regex: Regex,
}

impl CompiledEntity {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Text after the entity name when `text` starts with the entity,
    /// `Some("")` for an exact match.
    pub fn remainder<'t>(&self, text: &'t str) -> Option<&'t str> {
        let captures = self.regex.captures(text.trim())?;
        Some(captures.name("rest").map_or("", |m| m.as_str().trim()))
    }

    pub fn matches_exactly(&self, text: &str) -> bool {
        self.remainder(text).is_some_and(str::is_empty)
    }

    /// The caption names this entity and goes on with `category`. Anchoring
    /// the category right after the name keeps "Manchester" from claiming
    /// "Manchester City Player Stats".
    pub fn captions(&self, caption: &str, category: &str) -> bool {
        let Some(rest) = self.remainder(caption) else {
            return false;
        };
        starts_with_ignore_case(rest, category)
    }
}

/// One slot per requested category, in request order.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTable<'a> {
    pub category: String,
    pub table: Option<&'a RawTable>,
}

/// All tables captioned for the entity and category, in document order.
pub fn matching_tables<'a>(
    tables: &'a [RawTable],
    entity: &CompiledEntity,
    category: &str,
) -> Vec<&'a RawTable> {
    tables
        .iter()
        .filter(|table| {
            table
                .caption
                .as_deref()
                .is_some_and(|caption| entity.captions(caption, category))
        })
        .collect()
}

/// Fills one slot per category with the first qualifying table. Under
/// [`MissingTablePolicy::Fail`] an empty slot is an error; under `Skip` it
/// stays `None`.
pub fn select_tables<'a>(
    tables: &'a [RawTable],
    pattern: &EntityPattern,
    categories: &[String],
    policy: MissingTablePolicy,
) -> Result<Vec<CategoryTable<'a>>, DisambiguationError> {
    let entity = pattern.compile()?;
    let mut slots = Vec::with_capacity(categories.len());

    for category in categories {
        let found = matching_tables(tables, &entity, category);
        if found.len() > 1 {
            debug!(
                entity = entity.name(),
                category,
                candidates = found.len(),
                "several tables qualify; using the first"
            );
        }

        let table = found.first().copied();
        if table.is_none() {
            match policy {
                MissingTablePolicy::Fail => {
                    return Err(DisambiguationError::MissingTable {
                        entity: entity.name().to_string(),
                        category: category.clone(),
                    });
                }
                MissingTablePolicy::Skip => {
                    warn!(entity = entity.name(), category, "table missing; leaving slot empty");
                }
            }
        }

        slots.push(CategoryTable {
            category: category.clone(),
            table,
        });
    }

    Ok(slots)
}

/// Row-level filter driven by `data-stat` tags instead of captions. Every
/// configured check must pass.
pub struct RowFilter<'a> {
    scorer: &'a dyn Similarity,
    aliases: Option<(&'a LeagueAliasTable, f64)>,
    competition: Option<CompetitionCheck>,
    entity: Option<(String, CompiledEntity)>,
}

struct CompetitionCheck {
    stat: String,
    name: String,
    threshold: f64,
}

impl<'a> RowFilter<'a> {
    pub fn new(scorer: &'a dyn Similarity) -> Self {
        Self {
            scorer,
            aliases: None,
            competition: None,
            entity: None,
        }
    }

    /// Competition names on both sides go through this alias table first.
    pub fn with_aliases(mut self, aliases: &'a LeagueAliasTable, threshold: f64) -> Self {
        self.aliases = Some((aliases, threshold));
        self
    }

    /// The `stat` cell must score above `threshold` against `competition`.
    pub fn with_competition(mut self, stat: &str, competition: &str, threshold: f64) -> Self {
        let name = self.normalize_competition(competition);
        self.competition = Some(CompetitionCheck {
            stat: stat.to_string(),
            name,
            threshold,
        });
        self
    }

    /// The `stat` cell must name exactly this entity, affixes allowed.
    pub fn with_entity(
        mut self,
        stat: &str,
        pattern: &EntityPattern,
    ) -> Result<Self, DisambiguationError> {
        self.entity = Some((stat.to_string(), pattern.compile()?));
        Ok(self)
    }

    pub fn accepts(&self, row: &RawRow) -> bool {
        if let Some(check) = &self.competition {
            let Some(cell) = row.cell(&check.stat) else {
                return false;
            };
            let value = self.normalize_competition(&cell.text);
            let score = self.scorer.score(&value, &check.name);
            if score <= check.threshold {
                debug!(competition = %cell.text, score, "row excluded by competition");
                return false;
            }
        }

        if let Some((stat, entity)) = &self.entity {
            let Some(cell) = row.cell(stat) else {
                return false;
            };
            if !entity.matches_exactly(&cell.text) {
                debug!(value = %cell.text, entity = entity.name(), "row excluded by name");
                return false;
            }
        }

        true
    }

    fn normalize_competition(&self, value: &str) -> String {
        let value = match self.aliases {
            Some((aliases, threshold)) => {
                normalize_league_name(value, aliases, self.scorer, threshold)
            }
            None => value.to_string(),
        };
        value.trim().to_lowercase()
    }
}

// Words may be separated by whitespace or hyphens on either side, so the
// slug-derived "Saint Etienne" still finds "Saint-Etienne".
fn words_pattern(value: &str) -> String {
    value
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|word| !word.is_empty())
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"[\s-]+")
}

fn alternation(affixes: &[String]) -> Option<String> {
    let parts: Vec<String> = affixes
        .iter()
        .map(|affix| words_pattern(affix))
        .filter(|part| !part.is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join("|"))
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    let value: Vec<char> = value.chars().flat_map(char::to_lowercase).collect();
    let prefix: Vec<char> = prefix.chars().flat_map(char::to_lowercase).collect();
    !prefix.is_empty() && value.starts_with(&prefix)
}
