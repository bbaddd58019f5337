use std::path::{Path, PathBuf};
use tapline_common::{AppIdentity, ElementRecord};

/// Mutable state of one device's run.
///
/// The step counter only moves forward and orders screenshots. The cached
/// hierarchy and element list are replaced together by every observation.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub device: String,
    pub app: AppIdentity,
    pub session_handle: Option<String>,
    pub output_dir: PathBuf,
    step: u32,
    hierarchy: String,
    elements: Vec<ElementRecord>,
}

impl SessionContext {
    pub fn new(
        device: impl Into<String>,
        app: AppIdentity,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            device: device.into(),
            app,
            session_handle: None,
            output_dir: output_dir.into(),
            step: 0,
            hierarchy: String::new(),
            elements: Vec::new(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    /// Advance the step counter and return the new value.
    pub fn next_step(&mut self) -> u32 {
        self.step += 1;
        self.step
    }

    pub fn hierarchy(&self) -> &str {
        &self.hierarchy
    }

    pub fn elements(&self) -> &[ElementRecord] {
        &self.elements
    }

    pub fn replace_snapshot(&mut self, hierarchy: String, elements: Vec<ElementRecord>) {
        self.hierarchy = hierarchy;
        self.elements = elements;
    }
}
