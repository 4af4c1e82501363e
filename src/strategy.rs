//! Per-page strategy selection: native text layer or vision transcription.
//!
//! A vision call costs a network round trip and inference tokens; a native
//! pull costs nothing. The selector therefore only picks [`ExtractionMode::Vision`]
//! when a signal clearly crosses its threshold. Every comparison is strict,
//! so a value sitting exactly on a threshold stays [`ExtractionMode::Native`].
//! A page the heuristic gets wrong can still be forced with an override.
//!
//! The decision is monotone in every signal that pushes towards vision: with
//! the other signals fixed, raising `image_area_ratio` or `table_likelihood`,
//! or lowering `text_density`, never turns a `Vision` page back into `Native`.

use crate::config::StrategyThresholds;
use crate::output::{ContentSignals, ExtractionMode};

/// Chooses an [`ExtractionMode`] from a page's [`ContentSignals`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StrategySelector {
    thresholds: StrategyThresholds,
}

impl StrategySelector {
    pub fn new(thresholds: StrategyThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &StrategyThresholds {
        &self.thresholds
    }

    /// Pick the extraction mode for one page.
    ///
    /// An explicit `override_mode` wins unconditionally.
    pub fn select(
        &self,
        signals: &ContentSignals,
        override_mode: Option<ExtractionMode>,
    ) -> ExtractionMode {
        if let Some(mode) = override_mode {
            return mode;
        }

        // Nothing to read and nothing to look at: a wasted inference call.
        if signals.is_blank() {
            return ExtractionMode::Native;
        }

        let t = &self.thresholds;
        if signals.text_density < t.min_text_density
            || signals.image_area_ratio > t.max_image_area_ratio
            || signals.table_likelihood > t.table_likelihood_threshold
        {
            ExtractionMode::Vision
        } else {
            ExtractionMode::Native
        }
    }
}
