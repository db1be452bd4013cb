//! Search-link builders: `.wiki`, `.yt`, `.imdb`, `.g`.

use async_trait::async_trait;

use super::{CommandError, CommandHandler, Invocation, Reply};

/// Builds a search URL from the arguments and posts it.
#[derive(Debug, Clone)]
pub struct SearchLink {
    name: &'static str,
    usage: &'static str,
    base: &'static str,
    separator: &'static str,
    suffix: &'static str,
}

impl SearchLink {
    /// URL for `terms`, or `None` when there are none.
    pub fn link(&self, terms: &[String]) -> Option<String> {
        if terms.is_empty() {
            return None;
        }
        Some(format!(
            "{}{}{}",
            self.base,
            terms.join(self.separator),
            self.suffix
        ))
    }

    fn usage_line(&self) -> String {
        format!("Usage: {} <search term>", self.name)
    }
}

#[async_trait]
impl CommandHandler for SearchLink {
    fn name(&self) -> &'static str {
        self.name
    }

    fn usage(&self) -> &'static str {
        self.usage
    }

    async fn handle(&self, invocation: &Invocation, reply: &Reply) -> Result<(), CommandError> {
        if invocation.first_arg() == Some("help") {
            reply.send(self.usage_line()).await;
            return Ok(());
        }
        match self.link(&invocation.args) {
            Some(url) => reply.send(url).await,
            None => reply.send(self.usage_line()).await,
        }
        Ok(())
    }
}

/// Wikipedia article link.
pub const WIKI: SearchLink = SearchLink {
    name: ".wiki",
    usage: ".wiki <query>: Search wikipedia for the inputted query",
    base: "http://en.wikipedia.org/wiki/",
    separator: "%20",
    suffix: "",
};

/// YouTube search link.
pub const YOUTUBE: SearchLink = SearchLink {
    name: ".yt",
    usage: ".yt <query>: Search youtube for the inputted query",
    base: "http://www.youtube.com/results?search_query=",
    separator: "+",
    suffix: "",
};

/// IMDb search link.
pub const IMDB: SearchLink = SearchLink {
    name: ".imdb",
    usage: ".imdb <query>: Search IMDb for the inputted query",
    base: "http://www.imdb.com/find?q=",
    separator: "+",
    suffix: "&s=all",
};

/// Google search link.
pub const GOOGLE: SearchLink = SearchLink {
    name: ".g",
    usage: ".g <query>: Search google for the inputted query",
    base: "https://www.google.ca/#q=",
    separator: "+",
    suffix: "",
};

/// Every search-link command.
pub fn all() -> [SearchLink; 4] {
    [WIKI, YOUTUBE, IMDB, GOOGLE]
}
