//! Shared library catalog
//!
//! The server documents global variables and steps on its pipeline syntax
//! page as a definition list: each `dt` carries the name in its `id`, and the
//! `dd` right after it holds the documentation in its first `div`.

use jack_client::BuildServer;
use jack_core::domain::shared_lib::SharedLibVar;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::Result;

const GLOBALS_PAGE: &str = "pipeline-syntax/globals";
const CATALOG_ROOT: &str = ".steps.variables.root";

/// How a catalog entry is presented
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SharedLibDisplay {
    /// Open this server-relative page in a browser
    Browser(String),
    /// Render this HTML document inline
    Inline(String),
}

impl SharedLibDisplay {
    pub fn for_entry(entry: &SharedLibVar, last_job: Option<&str>, browser: bool) -> Self {
        if browser {
            SharedLibDisplay::Browser(doc_path(last_job, &entry.name))
        } else {
            SharedLibDisplay::Inline(format!("<html>{}</html>", entry.description_html))
        }
    }
}

/// Fetches and parses the shared library documentation
pub struct SharedLibraryCatalog<S> {
    server: Arc<S>,
}

impl<S: BuildServer> SharedLibraryCatalog<S> {
    pub fn new(server: Arc<S>) -> Self {
        Self { server }
    }

    /// Rebuilds the catalog from the server
    ///
    /// The page is scoped to `last_job` when one is known, since a job can
    /// load libraries the global page does not list.
    pub async fn refresh(&self, last_job: Option<&str>) -> Result<Vec<SharedLibVar>> {
        let path = page_path(last_job);
        debug!("Fetching shared library docs from {}", path);

        let html = self.server.get_page(&path).await?;
        let entries = parse_catalog(&html);

        info!("Loaded {} shared library entries", entries.len());
        Ok(entries)
    }
}

/// Server-relative path of the globals page
pub fn page_path(last_job: Option<&str>) -> String {
    match last_job {
        Some(job) => format!("{}/{}", job_path(job), GLOBALS_PAGE),
        None => GLOBALS_PAGE.to_string(),
    }
}

/// Server-relative documentation link of one entry
pub fn doc_path(last_job: Option<&str>, name: &str) -> String {
    format!("{}#{}", page_path(last_job), name)
}

/// `a/b` becomes `job/a/job/b`
fn job_path(job: &str) -> String {
    job.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| format!("job/{}", s))
        .collect::<Vec<_>>()
        .join("/")
}

/// Extracts catalog entries, first occurrence of each name wins
///
/// Entries without a name or documentation are skipped.
pub fn parse_catalog(html: &str) -> Vec<SharedLibVar> {
    let (root_selector, dt_selector, div_selector) = match (
        Selector::parse(CATALOG_ROOT),
        Selector::parse("dt"),
        Selector::parse("div"),
    ) {
        (Ok(root), Ok(dt), Ok(div)) => (root, dt, div),
        _ => {
            warn!("Invalid catalog selectors");
            return Vec::new();
        }
    };

    let document = Html::parse_document(html);
    let Some(root) = document.select(&root_selector).next() else {
        debug!("No shared library list found");
        return Vec::new();
    };

    let mut entries = Vec::new();
    let mut seen = HashSet::new();
    let mut current = root.select(&dt_selector).next();

    while let Some(dt) = current {
        let dd = next_element(dt).filter(|el| el.value().name() == "dd");
        let content = dd.and_then(|dd| dd.select(&div_selector).next());

        match (dt.value().attr("id"), content) {
            (Some(name), Some(div)) => {
                if seen.insert(name.to_string()) {
                    entries.push(SharedLibVar {
                        name: name.to_string(),
                        description: div.text().collect::<String>().trim().to_string(),
                        description_html: format!(
                            "<div id='outer' markdown='1'><h2>{}</h2>{}</div>",
                            name,
                            div.inner_html()
                        ),
                    });
                } else {
                    debug!("Skipping duplicate shared library entry {}", name);
                }
            }
            _ => debug!("Skipping incomplete shared library entry"),
        }

        current = next_element(dd.unwrap_or(dt)).filter(|el| el.value().name() == "dt");
    }

    entries
}

fn next_element(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element.next_siblings().find_map(ElementRef::wrap)
}
