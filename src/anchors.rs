//! Rendered markup handling and row anchor location
//!
//! Track-log pages carry no usable schema, so rows are found heuristically:
//! every row starts with a weekday abbreviation, and the abbreviation that
//! occurs most often is taken to be the row marker.

use tracing::debug;

/// Weekday labels in the order they are tried. Ties go to the earliest label.
pub const WEEKDAY_LABELS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Markup text addressable by character offset.
///
/// All offsets handed out by this crate count characters, not bytes, so that
/// a layout measured against the page text stays valid for non-ASCII pages.
#[derive(Debug, Clone)]
pub struct Markup {
    text: String,
    // byte offset of every char, plus text.len() as a terminator
    boundaries: Vec<usize>,
}

impl Markup {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let boundaries = text
            .char_indices()
            .map(|(byte, _)| byte)
            .chain(std::iter::once(text.len()))
            .collect();
        Self { text, boundaries }
    }

    /// Decodes a raw artifact, silently dropping invalid UTF-8 sequences.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut text = String::with_capacity(bytes.len());
        for chunk in bytes.utf8_chunks() {
            text.push_str(chunk.valid());
        }
        Self::new(text)
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn char_len(&self) -> usize {
        self.boundaries.len() - 1
    }

    /// Characters `[start, end)`, clamped to the end of the text.
    pub fn slice_chars(&self, start: usize, end: usize) -> &str {
        let len = self.char_len();
        let start = start.min(len);
        let end = end.clamp(start, len);
        &self.text[self.boundaries[start]..self.boundaries[end]]
    }

    fn char_offset(&self, byte: usize) -> usize {
        // byte offsets from match_indices always sit on a char boundary
        self.boundaries.partition_point(|&b| b < byte)
    }
}

/// One anchor occurrence, as character offsets into the markup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorMatch {
    pub start: usize,
    pub end: usize,
}

/// Strategy for finding the row anchors in rendered markup
pub trait AnchorLocator {
    /// Ordered anchor positions; empty when nothing resembling a row is present.
    fn locate_anchors(&self, markup: &Markup) -> Vec<AnchorMatch>;
}

/// Picks the most frequent label among a fixed set and anchors on its matches
#[derive(Debug, Clone)]
pub struct WeekdayAnchorLocator {
    labels: Vec<String>,
}

impl Default for WeekdayAnchorLocator {
    fn default() -> Self {
        Self::with_labels(WEEKDAY_LABELS)
    }
}

impl WeekdayAnchorLocator {
    pub fn with_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// Literal, case-sensitive, non-overlapping occurrences of `label`
    fn find_label(markup: &Markup, label: &str) -> Vec<AnchorMatch> {
        if label.is_empty() {
            return Vec::new();
        }
        markup
            .as_str()
            .match_indices(label)
            .map(|(byte, matched)| AnchorMatch {
                start: markup.char_offset(byte),
                end: markup.char_offset(byte + matched.len()),
            })
            .collect()
    }
}

impl AnchorLocator for WeekdayAnchorLocator {
    fn locate_anchors(&self, markup: &Markup) -> Vec<AnchorMatch> {
        let mut best: Option<(&str, Vec<AnchorMatch>)> = None;

        for label in &self.labels {
            let matches = Self::find_label(markup, label);
            debug!(label = %label, count = matches.len(), "Counted anchor label");

            // strictly greater, so the first label wins a tie
            let better = match &best {
                Some((_, current)) => matches.len() > current.len(),
                None => true,
            };
            if better {
                best = Some((label.as_str(), matches));
            }
        }

        match best {
            Some((label, matches)) => {
                debug!(label = label, anchors = matches.len(), "Selected anchor label");
                matches
            }
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_picks_most_frequent_label() {
        let markup = Markup::new("Tue x Mon y Mon z Mon Tue");
        let anchors = WeekdayAnchorLocator::default().locate_anchors(&markup);
        assert_eq!(anchors.len(), 3);
        assert_eq!(anchors[0], AnchorMatch { start: 6, end: 9 });
        assert_eq!(anchors[2], AnchorMatch { start: 18, end: 21 });
    }

    #[test]
    fn test_tie_goes_to_first_label() {
        // Sun appears first in the text, but Wed comes first in label order
        let markup = Markup::new("Sun Wed Sun Wed");
        let anchors = WeekdayAnchorLocator::default().locate_anchors(&markup);
        assert_eq!(
            anchors,
            vec![AnchorMatch { start: 4, end: 7 }, AnchorMatch { start: 12, end: 15 }]
        );
    }

    #[test]
    fn test_substring_and_case_sensitivity() {
        // "Monday" still counts, "mon" and "MON" do not
        let markup = Markup::new("Monday mon MON Sat");
        let locator = WeekdayAnchorLocator::default();
        let anchors = locator.locate_anchors(&markup);
        assert_eq!(anchors, vec![AnchorMatch { start: 0, end: 3 }]);
    }

    #[test]
    fn test_no_labels_present() {
        let markup = Markup::new("<html><body>nothing here</body></html>");
        assert!(WeekdayAnchorLocator::default().locate_anchors(&markup).is_empty());
        assert!(WeekdayAnchorLocator::default()
            .locate_anchors(&Markup::new(""))
            .is_empty());
    }

    #[test]
    fn test_offsets_count_characters() {
        let markup = Markup::new("é→Fri 12");
        let anchors = WeekdayAnchorLocator::default().locate_anchors(&markup);
        assert_eq!(anchors, vec![AnchorMatch { start: 2, end: 5 }]);
        assert_eq!(markup.slice_chars(anchors[0].end + 1, 100), "12");
    }

    #[test]
    fn test_from_bytes_drops_invalid_sequences() {
        let markup = Markup::from_bytes(b"Mon\xff\xfe 01:02:03");
        assert_eq!(markup.as_str(), "Mon 01:02:03");
        assert_eq!(markup.char_len(), 12);
    }

    #[test]
    fn test_slice_chars_clamps() {
        let markup = Markup::new("abc");
        assert_eq!(markup.slice_chars(1, 10), "bc");
        assert_eq!(markup.slice_chars(5, 10), "");
        assert_eq!(markup.slice_chars(2, 1), "");
    }
}
