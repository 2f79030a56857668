/// Search result disambiguation: exact title match, most recent year wins
use super::cascade::{LocatorCascade, Strategy};
use super::{Candidate, MovieQuery};
use crate::browser::{BrowserError, BrowserSession, ElementHandle, Locator};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

/// Attributes probed for a release year, in order
pub const YEAR_ATTRIBUTES: [&str; 4] = ["releaseyear", "startyear", "endyear", "year"];

static FOUR_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}").expect("valid regex"));

const DUMP_ATTRIBUTES_SCRIPT: &str = r#"
    var element = arguments[0];
    var attrs = {};
    for (var i = 0; i < element.attributes.length; i++) {
        var attr = element.attributes[i];
        attrs[attr.name] = attr.value;
    }
    return attrs;
"#;

pub struct CandidateResolver {
    max_results: usize,
    row_locators: Vec<Locator>,
    title: LocatorCascade,
    year_text_locators: Vec<Locator>,
}

impl CandidateResolver {
    pub fn new(max_results: usize) -> Self {
        Self {
            max_results,
            row_locators: vec![
                Locator::css(
                    "search-page-result[type='movie'] search-page-media-row[data-qa='data-row']",
                ),
                Locator::xpath("//search-page-media-row[@data-qa='data-row']"),
            ],
            title: LocatorCascade::new(
                "title",
                vec![
                    Strategy::text(Locator::css("a[slot='title']")),
                    Strategy::text(Locator::css("a[data-qa='info-name']")),
                ],
            ),
            year_text_locators: vec![
                Locator::xpath(".//span[@data-qa='info-year']"),
                Locator::xpath(".//span[contains(@class, 'year')]"),
                Locator::xpath(".//span[contains(text(), '(')]"),
            ],
        }
    }

    /// Find the best exact match for `query` on the current results page.
    pub async fn resolve<B: BrowserSession + ?Sized>(
        &self,
        session: &mut B,
        query: &MovieQuery,
    ) -> Result<Option<Candidate>, BrowserError> {
        let rows = self.collect_rows(&*session)?;
        info!("Found {} results for '{}'", rows.len(), query.search_text());

        let mut candidates = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            match self.read_candidate(session, index, row).await {
                Some(candidate) => candidates.push(candidate),
                None => warn!("    Result {}: could not find title element", index),
            }
        }

        Ok(select_most_recent(query, candidates))
    }

    fn collect_rows<B: BrowserSession + ?Sized>(
        &self,
        session: &B,
    ) -> Result<Vec<ElementHandle>, BrowserError> {
        let mut failures = 0;
        let mut last_error = None;
        for locator in &self.row_locators {
            match session.find_elements(locator, None) {
                Ok(rows) if !rows.is_empty() => {
                    debug!("Result rows located via {}", locator);
                    return Ok(rows.into_iter().take(self.max_results).collect());
                }
                Ok(_) => debug!("No result rows via {}", locator),
                Err(e) => {
                    debug!("Row locator {} failed: {}", locator, e);
                    failures += 1;
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) if failures == self.row_locators.len() => Err(e),
            _ => Ok(Vec::new()),
        }
    }

    async fn read_candidate<B: BrowserSession + ?Sized>(
        &self,
        session: &mut B,
        index: usize,
        row: &ElementHandle,
    ) -> Option<Candidate> {
        let attribute_year = self.year_from_attributes(&*session, index, row);
        if attribute_year.is_none() {
            self.dump_attributes(session, index, row).await;
        }

        let (handle, title) = self.title.first_match(&*session, Some(row))?;

        let year = attribute_year.or_else(|| self.year_from_text(&*session, index, &title, row));
        match year {
            Some(year) => debug!("    Result {}: '{}' ({})", index, title, year),
            None => debug!("    Result {}: '{}' (no year found)", index, title),
        }

        Some(Candidate {
            title,
            year,
            handle,
        })
    }

    fn year_from_attributes<B: BrowserSession + ?Sized>(
        &self,
        session: &B,
        index: usize,
        row: &ElementHandle,
    ) -> Option<u32> {
        for attribute in YEAR_ATTRIBUTES {
            match session.get_attribute(row, attribute) {
                Ok(Some(value)) => {
                    if let Some(year) = parse_year_attribute(&value) {
                        debug!(
                            "    Result {}: year from '{}' attribute: {}",
                            index, attribute, year
                        );
                        return Some(year);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("    Result {}: error getting year from attributes: {}", index, e);
                    return None;
                }
            }
        }
        None
    }

    fn year_from_text<B: BrowserSession + ?Sized>(
        &self,
        session: &B,
        index: usize,
        title: &str,
        row: &ElementHandle,
    ) -> Option<u32> {
        let element = self
            .year_text_locators
            .iter()
            .find_map(|locator| session.find_element(locator, Some(row)).ok())?;

        match session.get_text(&element) {
            Ok(text) => {
                let year = first_four_digit_run(&text);
                debug!("    Result {}: '{}' - year text: '{}'", index, title, text.trim());
                year
            }
            Err(e) => {
                warn!("    Result {}: '{}' (no year found) - error: {}", index, title, e);
                None
            }
        }
    }

    async fn dump_attributes<B: BrowserSession + ?Sized>(
        &self,
        session: &mut B,
        index: usize,
        row: &ElementHandle,
    ) {
        match session
            .execute_script(DUMP_ATTRIBUTES_SCRIPT, std::slice::from_ref(row))
            .await
        {
            Ok(attributes) => debug!("    Result {}: all attributes: {}", index, attributes),
            Err(e) => debug!("    Result {}: attribute dump unavailable: {}", index, e),
        }
    }
}

/// Parse a year attribute: integer and later than 1900
pub fn parse_year_attribute(value: &str) -> Option<u32> {
    let value = value.trim();
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    value.parse::<u32>().ok().filter(|year| *year > 1900)
}

/// First run of four digits, e.g. `"(2010)"` -> 2010
pub fn first_four_digit_run(text: &str) -> Option<u32> {
    FOUR_DIGITS
        .find(text)
        .and_then(|m| m.as_str().parse::<u32>().ok())
}

/// Exact matches only; greatest year wins, unknown years count as 0, and the
/// first candidate wins ties.
pub fn select_most_recent(query: &MovieQuery, candidates: Vec<Candidate>) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;

    for candidate in candidates {
        debug!(
            "    Comparing: '{}' vs '{}'",
            candidate.title.trim().to_lowercase(),
            query.key()
        );
        if !query.matches_title(&candidate.title) {
            debug!("    Not a match");
            continue;
        }
        info!("    EXACT MATCH: '{}' ({})", candidate.title, candidate.year_key());

        let replace = match &best {
            Some(current) => candidate.year_key() > current.year_key(),
            None => true,
        };
        if replace {
            best = Some(candidate);
        }
    }

    match &best {
        Some(selected) => info!(
            "Selected most recent: '{}' ({})",
            selected.title,
            selected.year_key()
        ),
        None => info!("No exact match found for '{}'", query.search_text()),
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{HtmlSession, StaticPages};

    fn candidate(title: &str, year: Option<u32>, ordinal: usize) -> Candidate {
        Candidate {
            title: title.to_string(),
            year,
            handle: ElementHandle {
                generation: 1,
                ordinal,
            },
        }
    }

    #[test]
    fn test_exact_match_picks_most_recent() {
        let query = MovieQuery::new("Dune");
        let candidates = vec![
            candidate("Dune", Some(2021), 0),
            candidate("dune", Some(1984), 1),
            candidate("Dune Part Two", Some(2024), 2),
        ];

        let selected = select_most_recent(&query, candidates).unwrap();
        assert_eq!(selected.year, Some(2021));
        assert_eq!(selected.handle.ordinal, 0);
    }

    #[test]
    fn test_unknown_year_loses_tie_break() {
        let query = MovieQuery::new("Up");
        let candidates = vec![candidate("Up", None, 0), candidate("Up", Some(2009), 1)];

        let selected = select_most_recent(&query, candidates).unwrap();
        assert_eq!(selected.year, Some(2009));
    }

    #[test]
    fn test_unknown_year_only_match_is_selected() {
        let query = MovieQuery::new(" up ");
        let selected = select_most_recent(&query, vec![candidate("UP", None, 3)]).unwrap();
        assert_eq!(selected.handle.ordinal, 3);
    }

    #[test]
    fn test_equal_years_first_wins() {
        let query = MovieQuery::new("Heat");
        let candidates = vec![
            candidate("Heat", Some(1995), 0),
            candidate("Heat", Some(1995), 1),
        ];
        assert_eq!(select_most_recent(&query, candidates).unwrap().handle.ordinal, 0);
    }

    #[test]
    fn test_no_exact_match() {
        let query = MovieQuery::new("Nonexistent Movie XYZ");
        let candidates = vec![candidate("Nonexistent Movie", Some(2001), 0)];
        assert!(select_most_recent(&query, candidates).is_none());
        assert!(select_most_recent(&query, Vec::new()).is_none());
    }

    #[test]
    fn test_year_parsing() {
        assert_eq!(parse_year_attribute("2010"), Some(2010));
        assert_eq!(parse_year_attribute(" 1999 "), Some(1999));
        assert_eq!(parse_year_attribute("1900"), None);
        assert_eq!(parse_year_attribute("20x0"), None);
        assert_eq!(parse_year_attribute(""), None);

        assert_eq!(first_four_digit_run("(2010)"), Some(2010));
        assert_eq!(first_four_digit_run("Released 1984, remastered 2004"), Some(1984));
        assert_eq!(first_four_digit_run("no year"), None);
    }

    #[tokio::test]
    async fn test_resolve_reads_rows() {
        let url = "https://site.test/search?search=Dune";
        let html = r#"<html><body>
            <search-page-result type="tvSeries">
              <search-page-media-row data-qa="data-row" startyear="2000">
                <a slot="title" href="/tv/dune">Dune</a>
              </search-page-media-row>
            </search-page-result>
            <search-page-result type="movie">
              <search-page-media-row data-qa="data-row" releaseyear="1984">
                <a slot="title" href="/m/dune_1984">Dune</a>
              </search-page-media-row>
              <search-page-media-row data-qa="data-row">
                <a data-qa="info-name" href="/m/dune_2021">Dune</a>
                <span data-qa="info-year">(2021)</span>
              </search-page-media-row>
              <search-page-media-row data-qa="data-row" releaseyear="2024">
                <span>No title here</span>
              </search-page-media-row>
            </search-page-result>
        </body></html>"#;
        let mut session = HtmlSession::new(StaticPages::new().with_page(url, html));
        session.open_session(url, true).await.unwrap();

        let resolver = CandidateResolver::new(10);
        let selected = resolver
            .resolve(&mut session, &MovieQuery::new("dune"))
            .await
            .unwrap()
            .unwrap();

        // The TV row is outside the movie section and ignored
        assert_eq!(selected.year, Some(2021));
        assert_eq!(
            session.get_attribute(&selected.handle, "href").unwrap().as_deref(),
            Some("/m/dune_2021")
        );
    }
}
