use glam::Vec3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GizmoMode {
    #[default]
    Translate,
    Rotate,
    Scale,
}

impl GizmoMode {
    pub const ALL: [GizmoMode; 3] = [GizmoMode::Translate, GizmoMode::Rotate, GizmoMode::Scale];

    pub fn label(self) -> &'static str {
        match self {
            GizmoMode::Translate => "Translate",
            GizmoMode::Rotate => "Rotate",
            GizmoMode::Scale => "Scale",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "translate" | "move" | "position" => Some(GizmoMode::Translate),
            "rotate" | "rotation" => Some(GizmoMode::Rotate),
            "scale" => Some(GizmoMode::Scale),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GizmoAxis {
    X,
    Y,
    Z,
}

impl GizmoAxis {
    pub const ALL: [GizmoAxis; 3] = [GizmoAxis::X, GizmoAxis::Y, GizmoAxis::Z];

    pub fn label(self) -> &'static str {
        match self {
            GizmoAxis::X => "X axis",
            GizmoAxis::Y => "Y axis",
            GizmoAxis::Z => "Z axis",
        }
    }

    pub fn vector(self) -> Vec3 {
        match self {
            GizmoAxis::X => Vec3::X,
            GizmoAxis::Y => Vec3::Y,
            GizmoAxis::Z => Vec3::Z,
        }
    }
}

/// Drag notifications reported by the engine's manipulator handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GizmoDrag {
    Started { axis: GizmoAxis },
    Moved { axis: GizmoAxis },
    Ended { axis: GizmoAxis },
}

impl GizmoDrag {
    pub fn axis(self) -> GizmoAxis {
        match self {
            GizmoDrag::Started { axis } | GizmoDrag::Moved { axis } | GizmoDrag::Ended { axis } => axis,
        }
    }

    /// Intermediate and final drags publish the transform; the start does not.
    pub fn publishes_transform(self) -> bool {
        !matches!(self, GizmoDrag::Started { .. })
    }
}

/// Which manipulators are visible. Built from a single mode so exactly one is ever on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManipulatorSet {
    pub translate: bool,
    pub rotate: bool,
    pub scale: bool,
}

impl ManipulatorSet {
    pub fn exclusive(mode: GizmoMode) -> Self {
        Self {
            translate: mode == GizmoMode::Translate,
            rotate: mode == GizmoMode::Rotate,
            scale: mode == GizmoMode::Scale,
        }
    }

    pub fn is_enabled(&self, mode: GizmoMode) -> bool {
        match mode {
            GizmoMode::Translate => self.translate,
            GizmoMode::Rotate => self.rotate,
            GizmoMode::Scale => self.scale,
        }
    }

    pub fn enabled_count(&self) -> usize {
        [self.translate, self.rotate, self.scale].into_iter().filter(|on| *on).count()
    }
}
