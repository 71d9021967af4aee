//! Per-node material state.

use buildplate_core::Color;
use buildplate_settings::AppearanceSettings;

/// Phong-style surface parameters, or a flat line colour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub color: Color,
    pub emissive: Color,
    pub emissive_intensity: f32,
    pub specular: Color,
    pub shininess: f32,
    pub opacity: f32,
}

impl Material {
    /// Opaque lit surface.
    pub fn surface(color: Color, appearance: &AppearanceSettings) -> Self {
        Self {
            color,
            emissive: Color::BLACK,
            emissive_intensity: 0.0,
            specular: appearance.specular,
            shininess: appearance.shininess,
            opacity: 1.0,
        }
    }

    /// Unlit line colour.
    pub fn line(color: Color, opacity: f32) -> Self {
        Self {
            color,
            emissive: Color::BLACK,
            emissive_intensity: 0.0,
            specular: Color::BLACK,
            shininess: 0.0,
            opacity,
        }
    }

    pub fn model(appearance: &AppearanceSettings) -> Self {
        Self::surface(appearance.model_color, appearance)
    }

    pub fn outline(appearance: &AppearanceSettings) -> Self {
        Self::line(appearance.outline_color, appearance.outline_opacity)
    }

    pub fn plate(appearance: &AppearanceSettings) -> Self {
        Self::surface(appearance.plate_color, appearance)
    }

    pub fn printable_area(appearance: &AppearanceSettings) -> Self {
        Self::line(
            appearance.printable_area_color,
            appearance.printable_area_opacity,
        )
    }

    /// Model material for the given hover and validity state.
    pub fn model_state(appearance: &AppearanceSettings, hovered: bool, invalid: bool) -> Self {
        let mut material = Self::model(appearance);
        if hovered {
            material.color = appearance
                .model_color
                .lerp(Color::WHITE, appearance.hover_lerp);
        }
        if invalid {
            material.emissive = appearance.invalid_emissive;
            material.emissive_intensity = appearance.invalid_emissive_intensity;
        }
        material
    }

    pub fn is_transparent(&self) -> bool {
        self.opacity < 1.0
    }

    /// RGBA with opacity as alpha.
    pub fn rgba(&self) -> [f32; 4] {
        [self.color.r, self.color.g, self.color.b, self.opacity]
    }

    /// Emissive colour pre-multiplied by its intensity.
    pub fn emissive_rgb(&self) -> [f32; 3] {
        let e = self.emissive.to_array();
        let k = self.emissive_intensity;
        [e[0] * k, e[1] * k, e[2] * k]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_state_hover() {
        let appearance = AppearanceSettings::default();
        let normal = Material::model_state(&appearance, false, false);
        let hovered = Material::model_state(&appearance, true, false);
        assert_eq!(normal.color, appearance.model_color);
        assert_eq!(hovered.color, appearance.model_color.lerp(Color::WHITE, 0.2));
        assert!(hovered.color.r > normal.color.r);
        assert_eq!(hovered.emissive_intensity, 0.0);
    }

    #[test]
    fn test_model_state_invalid() {
        let appearance = AppearanceSettings::default();
        let invalid = Material::model_state(&appearance, false, true);
        assert_eq!(invalid.emissive.to_hex(), 0xff0000);
        assert_eq!(invalid.emissive_intensity, 0.3);
        assert_eq!(invalid.emissive_rgb(), [0.3, 0.0, 0.0]);
    }

    #[test]
    fn test_line_materials() {
        let appearance = AppearanceSettings::default();
        assert!(Material::printable_area(&appearance).is_transparent());
        assert_eq!(Material::outline(&appearance).rgba(), [0.0, 0.0, 0.0, 0.9]);
        assert!(!Material::plate(&appearance).is_transparent());
    }
}
