//! Two-stage handling of the detail slider.
//!
//! Every input event produces a [`DetailPreview`] right away so the label
//! tracks the thumb. The expensive profile switch happens on commit: either
//! when the input has been quiet for the debounce delay ([`DetailPipeline::settle`],
//! driven by a cancellable timer) or on an explicit change event
//! ([`DetailPipeline::commit`]).

use crate::profile::DetailLevel;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetailPreview {
    pub level: DetailLevel,
    /// Text for the value label and `aria-valuenow`.
    pub label: String,
}

impl From<DetailLevel> for DetailPreview {
    fn from(level: DetailLevel) -> Self {
        Self {
            level,
            label: level.to_string(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct DetailPipeline {
    pending: Option<DetailLevel>,
}

impl DetailPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continuous input: quantize for display and remember the level for
    /// the next settle. The caller (re)arms the debounce timer.
    pub fn input(&mut self, raw: &str) -> DetailPreview {
        let level = DetailLevel::parse(raw);
        self.pending = Some(level);
        level.into()
    }

    /// The debounce delay elapsed without further input.
    pub fn settle(&mut self) -> Option<DetailLevel> {
        self.pending.take()
    }

    /// Explicit commit; supersedes anything pending.
    pub fn commit(&mut self, raw: &str) -> DetailLevel {
        self.pending = None;
        DetailLevel::parse(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_is_quantized_and_labelled() {
        let mut pipeline = DetailPipeline::new();
        let preview = pipeline.input("0.456");
        assert_eq!(preview.level, DetailLevel::from_index(46));
        assert_eq!(preview.label, "0.46");
        assert_eq!(pipeline.settle(), Some(DetailLevel::from_index(46)));
    }

    #[test]
    fn settle_commits_the_latest_input_once() {
        let mut pipeline = DetailPipeline::new();
        pipeline.input("0.1");
        pipeline.input("0.2");
        pipeline.input("0.3");
        assert_eq!(pipeline.settle(), Some(DetailLevel::from_index(30)));
        assert_eq!(pipeline.settle(), None);
    }

    #[test]
    fn explicit_commit_cancels_pending() {
        let mut pipeline = DetailPipeline::new();
        pipeline.input("0.7");
        assert_eq!(pipeline.commit("1"), DetailLevel::MAX);
        assert_eq!(pipeline.settle(), None);
    }

    #[test]
    fn end_labels_are_integers() {
        let mut pipeline = DetailPipeline::new();
        assert_eq!(pipeline.input("0").label, "0");
        assert_eq!(pipeline.input("1.0").label, "1");
    }
}
