use chrono::{DateTime, Utc};

/// One scheduled broadcast slot.
///
/// Values are only built through [`Program::new`], which rejects empty or
/// inverted time windows, so `start < end` always holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    title: String,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl Program {
    /// Build a program, returning `None` unless `start < end`.
    pub fn new(title: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start < end).then(|| Self {
            title: title.into(),
            start,
            end,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Whether the program is over at `now`.
    #[inline]
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.end <= now
    }

    /// Whether the program has not started yet at `now`.
    #[inline]
    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.start > now
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }
}
