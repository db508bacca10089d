use crate::similarity::Similarity;
use tracing::debug;

/// Turns a free-text team name into the slug form used in file names and
/// caption lookups: "manchester united FC" -> "Manchester-United".
pub fn normalize_team_name(input: &str) -> String {
    input
        .split_whitespace()
        .filter(|token| !token.eq_ignore_ascii_case("fc"))
        .map(title_case)
        .collect::<Vec<_>>()
        .join("-")
}

/// Reverses the slug separator so the name can be matched against captions.
pub fn team_display_name(slug: &str) -> String {
    slug.replace('-', " ")
}

// Upper-cases the first letter of every alphanumeric run, lower-cases the rest.
fn title_case(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    let mut in_word = false;
    for c in token.chars() {
        if in_word {
            out.extend(c.to_lowercase());
        } else {
            let mut upper = c.to_uppercase();
            if let Some(first) = upper.next() {
                out.push(first);
            }
            for rest in upper {
                out.extend(rest.to_lowercase());
            }
        }
        in_word = c.is_alphanumeric();
    }
    out
}

/// Official competition names mapped to the short name they are known by.
/// Iteration order is the declaration order and decides ties.
#[derive(Debug, Clone)]
pub struct LeagueAliasTable {
    entries: Vec<(String, String)>,
}

impl LeagueAliasTable {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for LeagueAliasTable {
    fn default() -> Self {
        Self::new([
            ("Fußball-Bundesliga", "Bundesliga"),
            // ASCII spelling of the same competition
            ("Fussball-Bundesliga", "Bundesliga"),
            ("Premier League", "Premier League"),
            ("La Liga", "La Liga"),
            ("Serie A", "Serie A"),
            ("Ligue 1", "Ligue 1"),
            ("Eredivisie", "Eredivisie"),
            ("Primeira Liga", "Primeira Liga"),
            ("Major League Soccer", "MLS"),
            ("Campeonato Brasileiro Série A", "Brasileirão"),
            ("Liga Profesional de Fútbol Argentina", "Liga Profesional"),
            ("Belgian Pro League", "Pro League"),
            ("Scottish Premiership", "Premiership"),
            ("National Women's Soccer League", "NWSL"),
            ("Women's Super League", "WSL"),
        ])
    }
}

/// Maps `input` to its alias when some official name scores above
/// `threshold`; otherwise hands `input` back unchanged.
pub fn normalize_league_name(
    input: &str,
    aliases: &LeagueAliasTable,
    scorer: &dyn Similarity,
    threshold: f64,
) -> String {
    let query = input.trim().to_lowercase();

    let mut best: Option<(&str, &str, f64)> = None;
    for (official, alias) in aliases.iter() {
        let score = scorer.score(&query, &official.to_lowercase());
        if best.is_none_or(|(_, _, top)| score > top) {
            best = Some((official, alias, score));
        }
    }

    match best {
        Some((official, alias, score)) if score > threshold => {
            debug!(input, official, alias, score, "league alias applied");
            alias.to_string()
        }
        _ => input.to_string(),
    }
}
