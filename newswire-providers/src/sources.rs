//! Feed source table
//!
//! Which RSS/Atom feeds to read for a given tier and category is data, not
//! code. The built-in table covers Italy, Europe and global outlets; a JSON
//! document of the same shape replaces it at startup.
//!
//! ```json
//! { "it": { "sports": [ { "name": "Gazzetta", "url": "https://..." } ] } }
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use newswire_core::{Category, Region};

/// One feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    /// Publisher name shown on articles
    pub name: String,
    pub url: String,
}

impl FeedSource {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
        }
    }
}

/// Feeds keyed by tier (`it`, `eu`, `global`, ...) and category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedTable {
    scopes: HashMap<String, HashMap<Category, Vec<FeedSource>>>,
}

impl FeedTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut table: Self = serde_json::from_str(json)?;
        // Keys are matched against Region::as_key, which is lowercase
        table.scopes = table
            .scopes
            .into_iter()
            .map(|(scope, feeds)| (scope.to_ascii_lowercase(), feeds))
            .collect();
        Ok(table)
    }

    pub fn with_feeds(mut self, region: &Region, category: Category, feeds: Vec<FeedSource>) -> Self {
        self.scopes
            .entry(region.as_key())
            .or_default()
            .entry(category)
            .or_default()
            .extend(feeds);
        self
    }

    /// Feeds for a tier and category. A category the tier doesn't list
    /// falls back to the tier's general feeds.
    pub fn feeds_for(&self, region: &Region, category: Category) -> &[FeedSource] {
        let Some(scope) = self.scopes.get(&region.as_key()) else {
            return &[];
        };
        scope
            .get(&category)
            .or_else(|| scope.get(&Category::General))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_scope(&self, region: &Region) -> bool {
        self.scopes.contains_key(&region.as_key())
    }

    /// Total number of feed rows
    pub fn len(&self) -> usize {
        self.scopes
            .values()
            .flat_map(|by_category| by_category.values())
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Built-in table: Italian outlets per category, European and global wires
    pub fn builtin() -> Self {
        let italy = Region::country("it");
        let f = FeedSource::new;

        Self::new()
            // Italy
            .with_feeds(
                &italy,
                Category::General,
                vec![
                    f("ANSA", "https://www.ansa.it/sito/ansait_rss.xml"),
                    f("Corriere della Sera", "https://xml2.corriereobjects.it/rss/homepage.xml"),
                    f("la Repubblica", "https://www.repubblica.it/rss/homepage/rss2.0.xml"),
                    f("Il Post", "https://www.ilpost.it/feed/"),
                    f("Sky TG24", "https://tg24.sky.it/rss/tg24.xml"),
                ],
            )
            .with_feeds(
                &italy,
                Category::World,
                vec![
                    f("ANSA", "https://www.ansa.it/sito/notizie/mondo/mondo_rss.xml"),
                    f("Corriere della Sera", "https://xml2.corriereobjects.it/rss/esteri.xml"),
                    f("la Repubblica", "https://www.repubblica.it/rss/esteri/rss2.0.xml"),
                ],
            )
            .with_feeds(
                &italy,
                Category::Politics,
                vec![
                    f("ANSA", "https://www.ansa.it/sito/notizie/politica/politica_rss.xml"),
                    f("Corriere della Sera", "https://xml2.corriereobjects.it/rss/politica.xml"),
                    f("la Repubblica", "https://www.repubblica.it/rss/politica/rss2.0.xml"),
                ],
            )
            .with_feeds(
                &italy,
                Category::Business,
                vec![
                    f("ANSA", "https://www.ansa.it/sito/notizie/economia/economia_rss.xml"),
                    f("Il Sole 24 Ore", "https://www.ilsole24ore.com/rss/italia.xml"),
                    f("Corriere della Sera", "https://xml2.corriereobjects.it/rss/economia.xml"),
                    f("Milano Finanza", "https://www.milanofinanza.it/rss"),
                ],
            )
            .with_feeds(
                &italy,
                Category::Technology,
                vec![
                    f("ANSA", "https://www.ansa.it/sito/notizie/tecnologia/tecnologia_rss.xml"),
                    f("Wired Italia", "https://www.wired.it/feed/rss"),
                    f("HDblog", "https://www.hdblog.it/feed/"),
                    f("DDay", "https://www.dday.it/rss"),
                ],
            )
            .with_feeds(
                &italy,
                Category::Science,
                vec![
                    f("ANSA", "https://www.ansa.it/canale_scienza_tecnica/notizie/scienzaetecnica_rss.xml"),
                    f("Le Scienze", "https://www.lescienze.it/rss/all/rss2.0.xml"),
                    f("Focus", "https://www.focus.it/rss"),
                ],
            )
            .with_feeds(
                &italy,
                Category::Health,
                vec![
                    f("ANSA", "https://www.ansa.it/canale_saluteebenessere/notizie/saluteebenessere_rss.xml"),
                    f("Corriere della Sera", "https://xml2.corriereobjects.it/rss/salute.xml"),
                    f("Quotidiano Sanità", "https://www.quotidianosanita.it/rss/rss.php"),
                ],
            )
            .with_feeds(
                &italy,
                Category::Sports,
                vec![
                    f("La Gazzetta dello Sport", "https://www.gazzetta.it/rss/home.xml"),
                    f("Corriere dello Sport", "https://www.corrieredellosport.it/rss"),
                    f("Tuttosport", "https://www.tuttosport.com/rss"),
                    f("ANSA", "https://www.ansa.it/sito/notizie/sport/sport_rss.xml"),
                ],
            )
            .with_feeds(
                &italy,
                Category::Entertainment,
                vec![
                    f("ANSA", "https://www.ansa.it/sito/notizie/cultura/cultura_rss.xml"),
                    f("Corriere della Sera", "https://xml2.corriereobjects.it/rss/spettacoli.xml"),
                    f("Rolling Stone Italia", "https://www.rollingstone.it/feed/"),
                ],
            )
            // Europe
            .with_feeds(
                &Region::Europe,
                Category::General,
                vec![
                    f("Euronews", "https://www.euronews.com/rss?format=mrss&level=theme&name=news"),
                    f("Politico Europe", "https://www.politico.eu/feed/"),
                    f("DW News", "https://rss.dw.com/rdf/rss-en-all"),
                    f("ANSA Europa", "https://www.ansa.it/europa/notizie/europa_rss.xml"),
                ],
            )
            .with_feeds(
                &Region::Europe,
                Category::Business,
                vec![
                    f("Euronews Business", "https://www.euronews.com/rss?format=mrss&level=vertical&name=business"),
                    f("DW Business", "https://rss.dw.com/rdf/rss-en-bus"),
                ],
            )
            // Global
            .with_feeds(
                &Region::Global,
                Category::General,
                vec![
                    f("BBC World", "https://feeds.bbci.co.uk/news/world/rss.xml"),
                    f("Guardian World", "https://www.theguardian.com/world/rss"),
                    f("Al Jazeera", "https://www.aljazeera.com/xml/rss/all.xml"),
                    f("NPR News", "https://feeds.npr.org/1001/rss.xml"),
                ],
            )
            .with_feeds(
                &Region::Global,
                Category::Business,
                vec![f(
                    "CNBC Top News",
                    "https://search.cnbc.com/rs/search/combinedcms/view.xml?partnerId=wrss01&id=100003114",
                )],
            )
            .with_feeds(
                &Region::Global,
                Category::Technology,
                vec![
                    f("MIT Technology Review", "https://www.technologyreview.com/feed/"),
                    f("Ars Technica", "https://feeds.arstechnica.com/arstechnica/index"),
                ],
            )
            .with_feeds(
                &Region::Global,
                Category::Science,
                vec![
                    f("NASA", "https://www.nasa.gov/rss/dyn/breaking_news.rss"),
                    f("BBC Science", "https://feeds.bbci.co.uk/news/science_and_environment/rss.xml"),
                ],
            )
            .with_feeds(
                &Region::Global,
                Category::Sports,
                vec![
                    f("ESPN", "https://www.espn.com/espn/rss/news"),
                    f("BBC Sport", "https://feeds.bbci.co.uk/sport/rss.xml"),
                ],
            )
    }
}
