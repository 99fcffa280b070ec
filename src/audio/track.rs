use std::fmt;

/// A playable entry: where to stream it from and what to call it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    locator: String,
    title: String,
}

impl Track {
    pub fn new(locator: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            title: title.into(),
        }
    }

    /// Stream URL handed to the output sink
    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}
