use tracing::{error, info, warn};

use beerbot_core::aggregate;
use beerbot_core::error::{Error, Result};
use beerbot_core::traits::DocumentStore;
use beerbot_core::types::SearchOptions;

use crate::format::format;
use crate::router::{Command, Route, Router};
use crate::sink::MessageSink;

pub const CONNECTED: &str = "I can connect to the document store!";
pub const NOT_CONNECTED: &str = "I cannot connect to the document store";
pub const EMPTY_SEARCH: &str = "What should I search for? Try `find beers called hazy ipa`.";

/// What the bot did with one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Answered { total_hits: u64, shown: usize },
    Connected,
    Disconnected,
    Failed(String),
    Unrecognized,
}

/// Answers chat commands from a document store, one message at a time.
pub struct BeerBot<S, K> {
    store: S,
    sink: K,
    router: Router,
    options: SearchOptions,
}

impl<S: DocumentStore, K: MessageSink> BeerBot<S, K> {
    pub fn new(store: S, sink: K) -> Result<Self> {
        Ok(Self { store, sink, router: Router::new()?, options: SearchOptions::default() })
    }

    pub fn with_options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn into_parts(self) -> (S, K) {
        (self.store, self.sink)
    }

    /// Handle `text`. Store and search failures become chat replies; only a
    /// failing sink is an error.
    pub fn handle(&self, text: &str) -> Result<Outcome> {
        match self.router.parse(text) {
            Some(Command::Ping) => self.ping(),
            Some(Command::Search { route, term }) => self.search(route, &term),
            None => {
                self.sink.reply(Router::help())?;
                Ok(Outcome::Unrecognized)
            }
        }
    }

    fn ping(&self) -> Result<Outcome> {
        match self.store.connect() {
            Ok(()) => {
                self.sink.reply(CONNECTED)?;
                self.sink.react("+1")?;
                Ok(Outcome::Connected)
            }
            Err(e) => {
                warn!(error = %e, "store connection check failed");
                self.sink.reply(NOT_CONNECTED)?;
                self.sink.react("-1")?;
                Ok(Outcome::Disconnected)
            }
        }
    }

    fn search(&self, route: Route, term: &str) -> Result<Outcome> {
        let result = route
            .build_query(term)
            .and_then(|q| aggregate(&self.store, route.index(), &q, &self.options));
        match result {
            Ok(result) => {
                info!(index = route.index(), term, total_hits = result.total_hits, rows = result.len(), "answered");
                self.sink.send_attachments(&format(&result, term, route.kind()))?;
                Ok(Outcome::Answered { total_hits: result.total_hits, shown: result.len() })
            }
            Err(e) => self.report(&e),
        }
    }

    fn report(&self, e: &Error) -> Result<Outcome> {
        match e {
            Error::EmptyQuery => self.sink.reply(EMPTY_SEARCH)?,
            e if e.is_connection() => {
                error!(error = %e, "store unreachable");
                self.sink.reply(NOT_CONNECTED)?;
                self.sink.react("-1")?;
            }
            e => {
                error!(error = %e, "search failed");
                self.sink.reply(&format!("Sorry, that search failed: {e}"))?;
                self.sink.react("warning")?;
            }
        }
        Ok(Outcome::Failed(e.to_string()))
    }
}
