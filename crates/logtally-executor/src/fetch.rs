//! Paginated upstream fetching

use crate::source::LogSource;
use logtally_core::{LogEvent, Result, TallyError, TimeRange};
use tracing::debug;

/// Everything returned for one fetch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOutcome {
    pub events: Vec<LogEvent>,
    pub pages: usize,
}

/// Fetch every page for `query_text` over `range`.
///
/// Follows continuation tokens until none (or an empty one) is returned.
/// Any page error aborts the whole fetch and is returned unchanged.
pub async fn fetch_all(
    source: &dyn LogSource,
    query_text: &str,
    range: TimeRange,
    max_pages: usize,
) -> Result<FetchOutcome> {
    let mut outcome = FetchOutcome::default();
    let mut cursor: Option<String> = None;

    loop {
        let page = source
            .fetch_page(query_text, &range, cursor.as_deref())
            .await?;
        outcome.pages += 1;
        outcome.events.extend(page.events);

        match page.next_cursor {
            Some(next) if !next.is_empty() => {
                if outcome.pages >= max_pages {
                    return Err(TallyError::UpstreamFetch(format!(
                        "{} returned more than {} pages for {}",
                        source.name(),
                        max_pages,
                        range
                    )));
                }
                cursor = Some(next);
            }
            _ => break,
        }
    }

    debug!(
        "Fetched {} events in {} pages from {} for {}",
        outcome.events.len(),
        outcome.pages,
        source.name(),
        range
    );

    Ok(outcome)
}
