use thiserror::Error;

/// Errors that can occur while resolving a Host header to a live container
/// address. Carried through the resolver and turned into a status page or
/// an autostart `register` rejection by its caller.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("could not load project: {0}")]
    ProjectLoad(#[from] anyhow::Error),
}

/// Errors surfaced while forwarding a request to an upstream container.
/// Mirrors the distinctions the original Tornado handler drew between
/// `HTTPClientError` (with or without a response), timeouts, and `OSError`
/// (DNS/connect failure, which triggers the one-shot cache-flush retry).
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("upstream timed out")]
    UpstreamTimeout,

    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(#[source] reqwest::Error),

    #[error("upstream returned a malformed response: {0}")]
    UpstreamBadResponse(#[source] reqwest::Error),

    #[error("client disconnected before the response was complete")]
    ClientDisconnected,
}

impl ProxyError {
    /// `true` for failures that should trigger exactly one cache-flush
    /// retry (`retry_after_address_not_found_with_flushed_cache` in the
    /// original), i.e. failures that look like a stale cached address.
    pub fn is_stale_address(&self) -> bool {
        matches!(self, ProxyError::UpstreamUnreachable(_))
    }
}

/// Flattens an error's `source()` chain into display strings, dropping a
/// later entry when it repeats the immediately preceding one verbatim.
/// Some wrapping layers re-display the same message without adding
/// context; deduplicating keeps generated status pages readable.
///
/// Every entry after the first is prefixed with `>> Caused by `, matching
/// the original's `format_load_error` exactly, so any renderer (a `<li>`
/// per entry, or a single joined line) shows the same text.
pub fn format_cause_chain(err: &(dyn std::error::Error + 'static)) -> Vec<String> {
    let mut chain: Vec<String> = Vec::new();
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = current {
        let msg = e.to_string();
        let bare_last = chain.last().map(|s| s.trim_start_matches(">> Caused by "));
        if bare_last != Some(msg.as_str()) {
            if chain.is_empty() {
                chain.push(msg);
            } else {
                chain.push(format!(">> Caused by {msg}"));
            }
        }
        current = e.source();
    }
    chain
}
