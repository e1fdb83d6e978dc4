use anyhow::{bail, Result};
use tracing::info;

use super::backend::{CaptureGrant, CapturePlatform, Projection, ScreenRecorder};

/// Placeholder for hosts without a screen capture API
///
/// Foreground registration succeeds so the orchestrator can run; any attempt
/// to turn a grant into a projection fails as a setup failure.
#[derive(Debug, Default)]
pub struct UnsupportedPlatform;

impl CapturePlatform for UnsupportedPlatform {
    fn enter_foreground(&self) -> Result<()> {
        info!("Foreground registration is a no-op on this host");
        Ok(())
    }

    fn exit_foreground(&self) -> Result<()> {
        Ok(())
    }

    fn open_projection(&self, _grant: CaptureGrant) -> Result<Box<dyn Projection>> {
        bail!("Screen capture is not available on this host")
    }

    fn create_recorder(&self) -> Result<Box<dyn ScreenRecorder>> {
        bail!("Screen recording is not available on this host")
    }
}
