//! Maps chat text onto bot commands.

use regex::Regex;

use beerbot_core::config::{BEER_INDEX, BREWERY_INDEX, BREWERY_LOCATION_INDEX};
use beerbot_core::error::{Error, Result};
use beerbot_core::query;
use beerbot_core::types::CompositeQuery;

use crate::format::ResultKind;

/// The search commands the bot answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    BeersCalled,
    BreweriesCalled,
    BreweriesWith,
    BreweriesIn,
}

impl Route {
    pub fn index(self) -> &'static str {
        match self {
            Route::BeersCalled => BEER_INDEX,
            Route::BreweriesCalled | Route::BreweriesWith => BREWERY_INDEX,
            Route::BreweriesIn => BREWERY_LOCATION_INDEX,
        }
    }

    pub fn kind(self) -> ResultKind {
        match self {
            Route::BeersCalled => ResultKind::Beer,
            _ => ResultKind::Brewery,
        }
    }

    pub fn build_query(self, term: &str) -> Result<CompositeQuery> {
        match self {
            Route::BeersCalled | Route::BreweriesCalled => query::build(term, &["name"], true),
            Route::BreweriesWith => query::build(term, &["name", "description"], true),
            Route::BreweriesIn => query::any_field(term, &["city", "state"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Search { route: Route, term: String },
    Ping,
}

pub struct Router {
    searches: Vec<(Regex, Route)>,
    ping: Regex,
}

impl Router {
    pub fn new() -> Result<Self> {
        let pattern = |p: &str| Regex::new(p).map_err(|e| Error::Operation(format!("bad command pattern: {e}")));
        let search = |verb: &str| pattern(&format!(r"(?i)^\s*find\s+{verb}\b\s*(.*?)\s*$"));
        Ok(Self {
            searches: vec![
                (search(r"beers\s+called")?, Route::BeersCalled),
                (search(r"breweries\s+called")?, Route::BreweriesCalled),
                (search(r"breweries\s+with")?, Route::BreweriesWith),
                (search(r"breweries\s+in")?, Route::BreweriesIn),
            ],
            ping: pattern(r"(?i)^\s*test\s+my\s+(store|couchbase|database)\s+connection\s*[.!?]?\s*$")?,
        })
    }

    /// The command `text` asks for, if any. The search term keeps its
    /// original casing and inner spacing.
    pub fn parse(&self, text: &str) -> Option<Command> {
        if self.ping.is_match(text) {
            return Some(Command::Ping);
        }
        self.searches.iter().find_map(|(re, route)| {
            let caps = re.captures(text)?;
            let term = caps.get(1).map_or("", |m| m.as_str());
            Some(Command::Search { route: *route, term: term.to_string() })
        })
    }

    pub fn help() -> &'static str {
        "Try one of:\n  find beers called <name>\n  find breweries called <name>\n  find breweries with <words>\n  find breweries in <city or state>\n  test my store connection"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beerbot_core::types::QueryKind;

    fn parse(text: &str) -> Option<Command> {
        Router::new().unwrap().parse(text)
    }

    #[test]
    fn routes_are_case_insensitive() {
        assert_eq!(
            parse("Find Beers Called Hazy IPA"),
            Some(Command::Search { route: Route::BeersCalled, term: "Hazy IPA".into() })
        );
        assert_eq!(
            parse("find breweries in  San Francisco "),
            Some(Command::Search { route: Route::BreweriesIn, term: "San Francisco".into() })
        );
    }

    #[test]
    fn called_and_with_are_distinct() {
        let Some(Command::Search { route, .. }) = parse("find breweries with hoppy lagers") else { panic!() };
        assert_eq!(route, Route::BreweriesWith);
        let Some(Command::Search { route, .. }) = parse("find breweries called anchor") else { panic!() };
        assert_eq!(route, Route::BreweriesCalled);
    }

    #[test]
    fn ping_accepts_store_aliases() {
        for text in ["test my store connection", "Test my Couchbase connection", "test my database connection?"] {
            assert_eq!(parse(text), Some(Command::Ping), "{text}");
        }
    }

    #[test]
    fn unknown_text_is_not_a_command() {
        assert_eq!(parse("hello bot"), None);
        assert_eq!(parse("find breweriesin x"), None);
    }

    #[test]
    fn missing_term_is_empty() {
        assert_eq!(parse("find beers called"), Some(Command::Search { route: Route::BeersCalled, term: String::new() }));
    }

    #[test]
    fn routes_pick_index_and_fields() {
        assert_eq!(Route::BreweriesIn.index(), BREWERY_LOCATION_INDEX);
        let q = Route::BreweriesIn.build_query("portland oregon").unwrap();
        assert_eq!(q.len(), 2);
        assert!(q.iter().all(|s| s.kind == QueryKind::Match && s.text == "portland oregon"));

        let q = Route::BreweriesWith.build_query("hoppy lagers").unwrap();
        let phrases: Vec<&str> = q.iter().filter(|s| s.kind == QueryKind::MatchPhrase).map(|s| s.field.as_str()).collect();
        assert_eq!(phrases, ["name", "description"]);
        assert_eq!(q.len(), 6);
    }
}
