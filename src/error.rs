// src/error.rs
//! Error handling for the renderer.
//!
//! Two fatal classes, matching how failures actually present:
//! - **Setup errors** (buffer/pipeline/surface creation): abort startup.
//! - **Frame errors** (acquire/submit/present): fatal to the current frame.
//!   The orchestrator surfaces them with the failing stage attached and never
//!   retries internally; the window loop decides whether the next frame is
//!   worth attempting. Per-frame buffer writes are whole-buffer overwrites,
//!   so a failed frame leaves nothing corrupted for the next one.
//!
//! Tile light-list overflow is deliberately *not* an error: the culling stage
//! bounds it silently (see `light_culling`), and tests cover the boundary.

use std::fmt;
use thiserror::Error;

/// The point within a frame at which a fatal frame error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStage {
    /// Acquiring the next presentable surface texture.
    Acquire,
    /// Submitting the recorded command buffer.
    Submit,
    /// Handing the image to the presentation engine.
    Present,
}

impl fmt::Display for FrameStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FrameStage::Acquire => "acquire",
            FrameStage::Submit => "submit",
            FrameStage::Present => "present",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// Resource or pipeline creation failed during startup or resize.
    #[error("failed to create {what}: {detail}")]
    Setup { what: &'static str, detail: String },

    /// A frame could not be completed. Fatal to the frame, not the app.
    #[error("frame failed at {stage}: {detail}")]
    Frame { stage: FrameStage, detail: String },

    /// A frame-graph stage reads a resource no earlier stage has written.
    #[error("stage `{stage}` reads `{resource}` before any stage writes it")]
    Ordering {
        stage: &'static str,
        resource: &'static str,
    },

    /// A frame-graph stage overwrites a resource an earlier stage already
    /// read this frame. Per-frame resources are single-generation: written
    /// once, before every reader.
    #[error("stage `{stage}` writes `{resource}` after an earlier stage read it")]
    Hazard {
        stage: &'static str,
        resource: &'static str,
    },

    /// Simple custom message.
    #[error("{0}")]
    Custom(String),

    /// Context chaining, like anyhow but over our own type.
    #[error("{message}: {source}")]
    WithContext {
        message: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    #[inline]
    pub fn setup(what: &'static str, detail: impl fmt::Display) -> Self {
        Self::Setup {
            what,
            detail: detail.to_string(),
        }
    }

    #[inline]
    pub fn frame(stage: FrameStage, detail: impl fmt::Display) -> Self {
        Self::Frame {
            stage,
            detail: detail.to_string(),
        }
    }

    #[inline]
    pub fn custom<S: Into<String>>(msg: S) -> Self {
        Self::Custom(msg.into())
    }

    #[inline]
    pub fn format(args: fmt::Arguments) -> Self {
        Self::Custom(fmt::format(args))
    }

    /// Add context to any error (chainable).
    #[inline]
    pub fn context<C: Into<String>>(self, context: C) -> Self {
        Self::WithContext {
            message: context.into(),
            source: Box::new(self),
        }
    }

    #[inline]
    pub fn is_setup(&self) -> bool {
        matches!(self, Error::Setup { .. })
    }

    #[inline]
    pub fn is_frame(&self) -> bool {
        matches!(self, Error::Frame { .. })
    }

    /// The frame stage this error occurred at, if it is a frame error
    /// (looks through context wrappers).
    pub fn frame_stage(&self) -> Option<FrameStage> {
        match self {
            Error::Frame { stage, .. } => Some(*stage),
            Error::WithContext { source, .. } => source.frame_stage(),
            _ => None,
        }
    }
}

/// Convenient `Result` alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_stage_survives_context_chaining() {
        let err = Error::frame(FrameStage::Present, "surface lost")
            .context("run_frame")
            .context("event loop");
        assert_eq!(err.frame_stage(), Some(FrameStage::Present));
        assert!(!err.is_frame()); // wrapped, but the stage is still reachable
    }

    #[test]
    fn display_names_the_failing_stage() {
        let err = Error::frame(FrameStage::Acquire, "timeout");
        assert!(err.to_string().contains("acquire"));

        // Submit and present failures arrive through the device error
        // callback and get their stage attached the same way.
        let err = Error::frame(FrameStage::Submit, "validation error");
        assert_eq!(err.frame_stage(), Some(FrameStage::Submit));
        assert!(err.to_string().contains("submit"));
        let err = Error::frame(FrameStage::Present, "surface lost");
        assert!(err.to_string().contains("present"));
    }
}
