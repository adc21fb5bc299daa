//! Rich-text report entries
//!
//! Per-box warnings and errors are kept as styled runs rather than plain
//! strings so the messaging layer can render them with emphasis; the CLI
//! flattens them to plain text.

/// One styled run of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub text: String,
    pub bold: bool,
}

/// A rich-text message assembled from styled runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RichText {
    runs: Vec<Run>,
}

impl RichText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plain run, builder style.
    pub fn text(mut self, s: impl Into<String>) -> Self {
        self.runs.push(Run {
            text: s.into(),
            bold: false,
        });
        self
    }

    /// Bold run, builder style.
    pub fn bold(mut self, s: impl Into<String>) -> Self {
        self.runs.push(Run {
            text: s.into(),
            bold: true,
        });
        self
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    /// Flatten to unstyled text.
    pub fn to_plain(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

impl std::fmt::Display for RichText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_plain())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_preserves_run_order() {
        let msg = RichText::new()
            .text("box 2: ")
            .bold("time not found")
            .text(", skipped");
        assert_eq!(msg.runs().len(), 3);
        assert!(msg.runs()[1].bold);
        assert_eq!(msg.to_plain(), "box 2: time not found, skipped");
    }
}
