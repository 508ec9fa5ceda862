//! Record of the version decisions resolution made on the user's behalf.

use std::fmt;

/// Every override, take-highest choice and option disagreement seen while
/// expanding the graph. Failures are errors, not events.
#[derive(Debug, Default, Clone)]
pub struct ResolutionReport {
    pub events: Vec<ResolutionEvent>,
}

/// One requirement that did not get exactly what it asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionEvent {
    pub name: String,
    pub requested: String,
    pub resolved: String,
    pub kind: EventKind,
    /// Requesting path from the root, as reference strings.
    pub path: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// An override requirement replaced the requested version.
    Override,
    /// `take-highest` settled a conflict.
    TakeHighest,
    /// A second requester asked for different option values than the node has.
    OptionMismatch,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EventKind::Override => "overridden",
            EventKind::TakeHighest => "take-highest",
            EventKind::OptionMismatch => "options differ",
        };
        f.write_str(label)
    }
}

impl ResolutionReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, event: ResolutionEvent) {
        self.events.push(event);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn of_kind(&self, kind: EventKind) -> impl Iterator<Item = &ResolutionEvent> {
        self.events.iter().filter(move |e| e.kind == kind)
    }
}

impl fmt::Display for ResolutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.events.is_empty() {
            return write!(f, "No version adjustments.");
        }
        writeln!(f, "Version adjustments ({}):", self.events.len())?;
        for event in &self.events {
            writeln!(f, "  {event}")?;
        }
        Ok(())
    }
}

impl fmt::Display for ResolutionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} requested {} but resolved {} ({})",
            self.name, self.requested, self.resolved, self.kind
        )?;
        if !self.path.is_empty() {
            write!(f, " via {}", self.path.join(" -> "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_report() {
        let report = ResolutionReport::new();
        assert!(report.is_empty());
        assert_eq!(report.len(), 0);
        assert_eq!(report.to_string(), "No version adjustments.");
    }

    #[test]
    fn report_lists_events() {
        let mut report = ResolutionReport::new();
        report.add(ResolutionEvent {
            name: "zlib".to_string(),
            requested: "1.2.11".to_string(),
            resolved: "1.3".to_string(),
            kind: EventKind::Override,
            path: vec!["app/1.0".to_string(), "libpng/1.6".to_string()],
        });
        assert_eq!(report.len(), 1);
        assert_eq!(report.of_kind(EventKind::Override).count(), 1);
        assert_eq!(report.of_kind(EventKind::TakeHighest).count(), 0);
        let s = report.to_string();
        assert!(s.contains("zlib requested 1.2.11 but resolved 1.3 (overridden)"));
        assert!(s.contains("via app/1.0 -> libpng/1.6"));
    }
}
