//! Scene lights
//!
//! Lights are packed into the global parameter block each frame and drawn as
//! small gizmo models during the G-buffer pass.

use cgmath::{InnerSpace, Vector3, Zero};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightKind {
    Directional,
    Point,
}

impl LightKind {
    /// Tag written into the uniform block, matched by the shaders
    pub fn tag(self) -> u32 {
        match self {
            LightKind::Directional => 0,
            LightKind::Point => 1,
        }
    }

    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(LightKind::Directional),
            1 => Some(LightKind::Point),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: Vector3<f32>,
    /// Unit vector; only read for directional lights
    pub direction: Vector3<f32>,
    /// Point light origin, or where the gizmo of a directional light is drawn
    pub position: Vector3<f32>,
}

impl Light {
    pub fn directional(
        color: Vector3<f32>,
        direction: Vector3<f32>,
        position: Vector3<f32>,
    ) -> Self {
        Self {
            kind: LightKind::Directional,
            color,
            direction: direction.normalize(),
            position,
        }
    }

    pub fn point(color: Vector3<f32>, position: Vector3<f32>) -> Self {
        Self {
            kind: LightKind::Point,
            color,
            direction: Vector3::zero(),
            position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directional_light_normalizes_direction() {
        let light = Light::directional(
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(-1.0, -1.0, 0.0),
            Vector3::new(-3.0, -3.0, -4.0),
        );
        assert!((light.direction.magnitude() - 1.0).abs() < 1e-6);
        assert_eq!(light.kind.tag(), 0);
    }

    #[test]
    fn test_tags_round_trip() {
        for kind in [LightKind::Directional, LightKind::Point] {
            assert_eq!(LightKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(LightKind::from_tag(2), None);
    }
}
