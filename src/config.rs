use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};

use crate::scene::WindowSettings;

pub const USAGE: &str =
    "Usage: meshview [scene.xml] [--import model.obj] [--summary-only] [--frames N]";

const DEFAULT_FRAMES: u32 = 60;

/// Window and projection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub fov_deg: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: "meshview".to_string(),
            width: 800,
            height: 800,
            fov_deg: 45.0,
            near: 0.1,
            far: 50.0,
        }
    }
}

impl ViewerConfig {
    /// Applies the overrides a scene file carries.
    pub fn with_window(mut self, window: &WindowSettings) -> Self {
        if let Some(title) = &window.title {
            self.title = title.clone();
        }
        if let Some(width) = window.width {
            self.width = width.max(1);
        }
        if let Some(height) = window.height {
            self.height = height.max(1);
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliOptions {
    pub scene: Option<PathBuf>,
    /// OBJ file added to the built-in scene.
    pub import: Option<PathBuf>,
    pub summary_only: bool,
    /// Frames simulated in summary mode.
    pub frames: u32,
}

impl Default for CliOptions {
    fn default() -> Self {
        Self {
            scene: None,
            import: None,
            summary_only: false,
            frames: DEFAULT_FRAMES,
        }
    }
}

impl CliOptions {
    /// Parses arguments, excluding the program name.
    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut options = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--summary-only" => options.summary_only = true,
                "--frames" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--frames needs a value. {USAGE}"))?;
                    options.frames = value
                        .parse()
                        .with_context(|| format!("invalid frame count {value:?}"))?;
                }
                "--import" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--import needs a path. {USAGE}"))?;
                    options.import = Some(PathBuf::from(value));
                }
                other if other.starts_with('-') => {
                    return Err(anyhow!("Unknown argument: {other}. {USAGE}"));
                }
                path => {
                    if options.scene.is_some() {
                        return Err(anyhow!("Only one scene file may be given. {USAGE}"));
                    }
                    options.scene = Some(PathBuf::from(path));
                }
            }
        }
        if options.scene.is_some() && options.import.is_some() {
            return Err(anyhow!(
                "--import only applies to the built-in scene; add a <mesh> to the scene file instead"
            ));
        }
        Ok(options)
    }
}
