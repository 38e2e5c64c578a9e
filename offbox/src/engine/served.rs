use offbox_core::{ResponseSnapshot, TrafficClass};

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// Fresh network response.
    Network,
    /// Stored snapshot of the same identity.
    Store,
    /// Stored fallback page of the category.
    Fallback,
    /// Synthesized offline page.
    Offline,
    /// Synthesized image placeholder.
    Placeholder,
    /// Synthesized `503` for API calls.
    Unavailable,
    /// Synthesized `202` for a deferred write.
    Queued,
}

impl Source {
    /// Returns the source as a string slice.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Source::Network => "network",
            Source::Store => "store",
            Source::Fallback => "fallback",
            Source::Offline => "offline",
            Source::Placeholder => "placeholder",
            Source::Unavailable => "unavailable",
            Source::Queued => "queued",
        }
    }

    /// Whether the response was synthesized rather than retrieved.
    pub fn is_synthetic(&self) -> bool {
        matches!(
            self,
            Source::Offline | Source::Placeholder | Source::Unavailable | Source::Queued
        )
    }
}

/// Response produced for an intercepted request.
#[derive(Debug, Clone)]
pub struct Served {
    /// The response.
    pub response: ResponseSnapshot,
    /// Where it came from.
    pub source: Source,
    /// Class the request was handled as. `None` for pass-through requests.
    pub class: Option<TrafficClass>,
}

impl Served {
    pub(crate) fn new(response: ResponseSnapshot, source: Source, class: TrafficClass) -> Self {
        Self {
            response,
            source,
            class: Some(class),
        }
    }

    pub(crate) fn unclassified(response: ResponseSnapshot, source: Source) -> Self {
        Self {
            response,
            source,
            class: None,
        }
    }
}
