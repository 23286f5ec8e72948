use std::fmt;
use std::path::PathBuf;

use framebridge_render::{LayoutError, RenderError};

/// Error type an event listener returns. Return
/// `Err(DriverError::Quit.into())` to request quit.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// The fallible steps of [`crate::Driver::init`], in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStep {
    InitializingPlatform,
    CreatingWindow,
    CreatingRenderer,
    CreatingContext,
    CreatingFontAtlas,
    CreatingFont,
    CreatingLargeFont,
    BakingFont,
    CreatingConvertConfig,
}

impl fmt::Display for InitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InitStep::InitializingPlatform => "initializing platform",
            InitStep::CreatingWindow => "creating window",
            InitStep::CreatingRenderer => "creating renderer",
            InitStep::CreatingContext => "creating GUI context",
            InitStep::CreatingFontAtlas => "creating font atlas",
            InitStep::CreatingFont => "creating font",
            InitStep::CreatingLargeFont => "creating large font",
            InitStep::BakingFont => "baking font",
            InitStep::CreatingConvertConfig => "creating convert config",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("{step}: {source}")]
    Step {
        step: InitStep,
        source: Box<DriverError>,
    },
    #[error("platform initialization failed: {0}")]
    Platform(String),
    #[error("window creation failed: {0}")]
    Window(String),
    #[error("could not find any preferred render driver (wanted {wanted:?}, available {available:?})")]
    NoPreferredDriver {
        wanted: Vec<String>,
        available: Vec<String>,
    },
    #[error("loading font file {}: {source}", path.display())]
    FontFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("font baking failed: {0}")]
    FontBake(String),
    #[error("{op}: {source}")]
    Render {
        op: &'static str,
        source: RenderError,
    },
    #[error("vertex layout: {0}")]
    Layout(#[from] LayoutError),
    #[error("ui scale {0} is out of bounds")]
    ScaleOutOfRange(f32),
    #[error("not allowed between pre_render and post_render")]
    MidFrame,
    #[error("driver is not initialized")]
    NotInitialized,
    #[error("driver has already been initialized")]
    AlreadyInitialized,
    #[error("post_render called without a matching pre_render")]
    NoFrame,
    #[error("draw command references unregistered texture {0:?}")]
    UnknownTexture(egui::TextureId),
    #[error("event listener failed: {0}")]
    Listener(#[source] ListenerError),
    #[error("application quit requested by the user")]
    Quit,
}

impl DriverError {
    /// Whether this is the quit sentinel. Frame loops break on it.
    pub fn is_quit(&self) -> bool {
        matches!(self, DriverError::Quit)
    }

    pub(crate) fn render(op: &'static str) -> impl FnOnce(RenderError) -> DriverError {
        move |source| DriverError::Render { op, source }
    }

    pub(crate) fn step(step: InitStep) -> impl FnOnce(DriverError) -> DriverError {
        move |source| DriverError::Step {
            step,
            source: Box::new(source),
        }
    }

    /// The init step this error was raised in, if any.
    pub fn init_step(&self) -> Option<InitStep> {
        match self {
            DriverError::Step { step, .. } => Some(*step),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_error_names_the_step() {
        let err = DriverError::step(InitStep::CreatingWindow)(DriverError::Window("no display".into()));
        assert_eq!(
            err.to_string(),
            "creating window: window creation failed: no display"
        );
        assert_eq!(err.init_step(), Some(InitStep::CreatingWindow));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn quit_sentinel() {
        assert!(DriverError::Quit.is_quit());
        assert!(!DriverError::NoFrame.is_quit());
        let boxed: ListenerError = DriverError::Quit.into();
        assert!(boxed.downcast_ref::<DriverError>().is_some_and(DriverError::is_quit));
    }

    #[test]
    fn render_error_keeps_operation() {
        let err = DriverError::render("presenting frame")(RenderError::Surface("lost".into()));
        assert_eq!(err.to_string(), "presenting frame: surface error: lost");
    }
}
