//! # OpenGL Shaders
//!
//! Lit surface shader for models and the build plate, and a flat shader
//! for outlines and the printable-area box.

/// Directional lights the surface shader accepts.
pub const MAX_DIRECTIONAL_LIGHTS: usize = 4;

pub const SURFACE_VERTEX_SHADER: &str = r#"
#version 330 core

layout (location = 0) in vec3 position;
layout (location = 1) in vec3 normal;
layout (location = 2) in vec4 color;

uniform mat4 mvp_matrix;
uniform mat4 model_matrix;
uniform mat3 normal_matrix;
uniform vec3 camera_position;

out vec3 frag_position;
out vec3 frag_normal;
out vec3 frag_view_direction;

void main() {
    vec4 world_position = model_matrix * vec4(position, 1.0);
    gl_Position = mvp_matrix * vec4(position, 1.0);

    frag_position = world_position.xyz;
    frag_normal = normalize(normal_matrix * normal);
    frag_view_direction = normalize(camera_position - frag_position);
}
"#;

pub const SURFACE_FRAGMENT_SHADER: &str = r#"
#version 330 core

#define MAX_LIGHTS 4

in vec3 frag_position;
in vec3 frag_normal;
in vec3 frag_view_direction;

uniform float ambient_intensity;
// Light positions; each light shines toward the origin
uniform vec3 light_positions[MAX_LIGHTS];
uniform float light_intensities[MAX_LIGHTS];
uniform int light_count;

uniform vec4 material_color;
uniform vec3 material_specular;
uniform float material_shininess;
uniform vec3 material_emissive;

out vec4 FragColor;

void main() {
    vec3 normal = normalize(frag_normal);
    vec3 view_dir = normalize(frag_view_direction);

    vec3 result = ambient_intensity * material_color.rgb;

    for (int i = 0; i < light_count && i < MAX_LIGHTS; ++i) {
        vec3 light_dir = normalize(light_positions[i]);
        float diff = max(dot(normal, light_dir), 0.0);
        result += diff * light_intensities[i] * material_color.rgb;

        // Blinn-Phong
        vec3 halfway_dir = normalize(light_dir + view_dir);
        float spec = pow(max(dot(normal, halfway_dir), 0.0), material_shininess);
        result += spec * light_intensities[i] * material_specular;
    }

    result += material_emissive;
    FragColor = vec4(result, material_color.a);
}
"#;

pub const LINE_VERTEX_SHADER: &str = r#"
#version 330 core

layout (location = 0) in vec3 position;
layout (location = 1) in vec3 normal;
layout (location = 2) in vec4 color;

uniform mat4 mvp_matrix;
uniform vec4 line_color;

out vec4 frag_color;

void main() {
    gl_Position = mvp_matrix * vec4(position, 1.0);
    frag_color = line_color;
}
"#;

pub const LINE_FRAGMENT_SHADER: &str = r#"
#version 330 core

in vec4 frag_color;
out vec4 FragColor;

void main() {
    FragColor = frag_color;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_light_limit_matches_shader() {
        let define = format!("#define MAX_LIGHTS {}", MAX_DIRECTIONAL_LIGHTS);
        assert!(SURFACE_FRAGMENT_SHADER.contains(&define));
    }
}
