//! Build frames: the path from the root request to the object under construction.

use std::fmt;

use crate::plugin_type::PluginType;

/// One step of an active resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFrame {
    requested: PluginType,
    concrete: Option<PluginType>,
    instance: String,
}

impl BuildFrame {
    pub(crate) fn new(requested: PluginType, concrete: Option<PluginType>, instance: impl Into<String>) -> Self {
        Self {
            requested,
            concrete,
            instance: instance.into(),
        }
    }

    /// The abstract type that was asked for.
    pub fn requested(&self) -> &PluginType {
        &self.requested
    }

    /// The type the selected instance declares it builds, if known.
    pub fn concrete(&self) -> Option<&PluginType> {
        self.concrete.as_ref()
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub(crate) fn is_same_request(&self, requested: &PluginType, instance: &str) -> bool {
        self.requested == *requested && self.instance == instance
    }
}

impl fmt::Display for BuildFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.concrete {
            None if self.instance.is_empty() => write!(f, "{}", self.requested),
            Some(concrete) if concrete != &self.requested => {
                write!(f, "{} ({} '{}')", self.requested, concrete, self.instance)
            }
            _ => write!(f, "{} ('{}')", self.requested, self.instance),
        }
    }
}

/// Frames of an active or failed resolution, root first.
///
/// Every resolution error carries the path that was active when it happened,
/// so the outermost request (usually the actionable one) is always visible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildPath {
    frames: Vec<BuildFrame>,
}

impl BuildPath {
    pub(crate) fn from_frames(frames: impl IntoIterator<Item = BuildFrame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    pub(crate) fn push(&mut self, frame: BuildFrame) {
        self.frames.push(frame);
    }

    pub fn frames(&self) -> &[BuildFrame] {
        &self.frames
    }

    /// The original external request.
    pub fn root(&self) -> Option<&BuildFrame> {
        self.frames.first()
    }

    /// The innermost frame.
    pub fn leaf(&self) -> Option<&BuildFrame> {
        self.frames.last()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

// Renders as a suffix so error messages read "<cause> [path: a -> b]".
impl fmt::Display for BuildPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.frames.is_empty() {
            return Ok(());
        }
        f.write_str(" [path: ")?;
        for (i, frame) in self.frames.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{}", frame)?;
        }
        f.write_str("]")
    }
}
