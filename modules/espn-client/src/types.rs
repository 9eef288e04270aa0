use serde::Deserialize;

/// Response of the site search API. Only the fields used for resolving a
/// fighter are modeled; everything else is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResult {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub contents: Vec<SearchContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchContent {
    #[serde(default)]
    pub sport: Option<String>,
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub link: Option<SearchLink>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchLink {
    #[serde(default)]
    pub web: Option<String>,
}

/// A resolved fighter: where its stats document lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceHandle {
    /// Name the caller asked for.
    pub entity: String,
    /// Name as the source spells it.
    pub display_name: String,
    pub profile_url: String,
    pub stats_url: String,
}
