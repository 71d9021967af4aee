//! # OpenGL backend
//!
//! Draws a [`FrameSubmission`] with `glow`. Opaque surfaces are drawn
//! first, then transparent surfaces, then lines.

use std::collections::HashMap;

use glam::{Mat3, Mat4, Vec3};
use glow::HasContext;

use crate::error::{RenderError, RenderResult};
use crate::scene::backend::{
    DrawItem, FrameSubmission, MeshHandle, PrimitiveKind, RenderBackend, UploadData,
};
use crate::scene::shaders::{
    LINE_FRAGMENT_SHADER, LINE_VERTEX_SHADER, MAX_DIRECTIONAL_LIGHTS, SURFACE_FRAGMENT_SHADER,
    SURFACE_VERTEX_SHADER,
};

/// Interleaved position, normal and colour.
const VERTEX_STRIDE: i32 = 40;

/// OpenGL resources for a single upload
#[derive(Debug)]
struct GlResources {
    vao: glow::VertexArray,
    vbo: glow::Buffer,
    ebo: Option<glow::Buffer>,
    count: i32,
    kind: PrimitiveKind,
}

pub struct GlBackend {
    gl: glow::Context,
    surface_program: glow::Program,
    line_program: glow::Program,
    resources: HashMap<MeshHandle, GlResources>,
    next_handle: u64,
    clear_color: [f32; 4],
}

impl GlBackend {
    pub fn new(gl: glow::Context) -> RenderResult<Self> {
        let surface_program =
            Self::create_shader_program(&gl, SURFACE_VERTEX_SHADER, SURFACE_FRAGMENT_SHADER)?;
        let line_program =
            match Self::create_shader_program(&gl, LINE_VERTEX_SHADER, LINE_FRAGMENT_SHADER) {
                Ok(program) => program,
                Err(e) => {
                    unsafe { gl.delete_program(surface_program) };
                    return Err(e);
                }
            };

        Ok(Self {
            gl,
            surface_program,
            line_program,
            resources: HashMap::new(),
            next_handle: 0,
            clear_color: [0.95, 0.95, 0.95, 1.0],
        })
    }

    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    fn upload_vertices(
        &self,
        vertices: &[f32],
        indices: Option<&[u32]>,
        kind: PrimitiveKind,
    ) -> RenderResult<GlResources> {
        unsafe {
            let vao = self
                .gl
                .create_vertex_array()
                .map_err(RenderError::Buffer)?;
            self.gl.bind_vertex_array(Some(vao));

            let vbo = self.gl.create_buffer().map_err(RenderError::Buffer)?;
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            self.gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(vertices),
                glow::STATIC_DRAW,
            );

            let ebo = match indices {
                Some(indices) => {
                    let ebo = self.gl.create_buffer().map_err(RenderError::Buffer)?;
                    self.gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(ebo));
                    self.gl.buffer_data_u8_slice(
                        glow::ELEMENT_ARRAY_BUFFER,
                        bytemuck::cast_slice(indices),
                        glow::STATIC_DRAW,
                    );
                    Some(ebo)
                }
                None => None,
            };

            // Position (location 0)
            self.gl
                .vertex_attrib_pointer_f32(0, 3, glow::FLOAT, false, VERTEX_STRIDE, 0);
            self.gl.enable_vertex_attrib_array(0);
            // Normal (location 1)
            self.gl
                .vertex_attrib_pointer_f32(1, 3, glow::FLOAT, false, VERTEX_STRIDE, 12);
            self.gl.enable_vertex_attrib_array(1);
            // Color (location 2)
            self.gl
                .vertex_attrib_pointer_f32(2, 4, glow::FLOAT, false, VERTEX_STRIDE, 24);
            self.gl.enable_vertex_attrib_array(2);

            self.gl.bind_vertex_array(None);
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);
            self.gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, None);

            let count = match indices {
                Some(indices) => indices.len(),
                None => vertices.len() / 10,
            };
            Ok(GlResources {
                vao,
                vbo,
                ebo,
                count: count as i32,
                kind,
            })
        }
    }

    fn draw_surface(&self, item: &DrawItem, frame: &FrameSubmission) {
        let Some(resources) = self.resources.get(&item.handle) else {
            return;
        };
        let program = self.surface_program;
        let mvp = frame.projection * frame.view * item.model_matrix;
        let normal_matrix = Mat3::from_mat4(item.model_matrix.inverse().transpose());
        let material = &item.material;

        unsafe {
            self.gl.use_program(Some(program));
            self.set_uniform_mat4(program, "mvp_matrix", &mvp);
            self.set_uniform_mat4(program, "model_matrix", &item.model_matrix);
            self.set_uniform_mat3(program, "normal_matrix", &normal_matrix.to_cols_array());
            self.set_uniform_vec3(program, "camera_position", frame.camera_position);

            self.set_uniform_f32(program, "ambient_intensity", frame.lighting.ambient_intensity);
            let lights = &frame.lighting.directional;
            let count = lights.len().min(MAX_DIRECTIONAL_LIGHTS);
            for (i, light) in lights.iter().take(count).enumerate() {
                self.set_uniform_vec3(
                    program,
                    &format!("light_positions[{}]", i),
                    Vec3::from_array(light.direction),
                );
                self.set_uniform_f32(program, &format!("light_intensities[{}]", i), light.intensity);
            }
            self.set_uniform_i32(program, "light_count", count as i32);

            self.set_uniform_vec4(program, "material_color", &material.rgba());
            self.set_uniform_vec3(
                program,
                "material_specular",
                Vec3::from_array(material.specular.to_array()),
            );
            self.set_uniform_f32(program, "material_shininess", material.shininess);
            self.set_uniform_vec3(
                program,
                "material_emissive",
                Vec3::from_array(material.emissive_rgb()),
            );

            self.gl.bind_vertex_array(Some(resources.vao));
            self.gl
                .draw_elements(glow::TRIANGLES, resources.count, glow::UNSIGNED_INT, 0);
            self.gl.bind_vertex_array(None);
        }
    }

    fn draw_lines(&self, item: &DrawItem, frame: &FrameSubmission) {
        let Some(resources) = self.resources.get(&item.handle) else {
            return;
        };
        let program = self.line_program;
        let mvp = frame.projection * frame.view * item.model_matrix;
        unsafe {
            self.gl.use_program(Some(program));
            self.set_uniform_mat4(program, "mvp_matrix", &mvp);
            self.set_uniform_vec4(program, "line_color", &item.material.rgba());
            self.gl.bind_vertex_array(Some(resources.vao));
            self.gl.draw_arrays(glow::LINES, 0, resources.count);
            self.gl.bind_vertex_array(None);
        }
    }

    fn create_shader_program(
        gl: &glow::Context,
        vs_source: &str,
        fs_source: &str,
    ) -> RenderResult<glow::Program> {
        unsafe {
            let vs = gl
                .create_shader(glow::VERTEX_SHADER)
                .map_err(RenderError::Shader)?;
            gl.shader_source(vs, vs_source);
            gl.compile_shader(vs);

            if !gl.get_shader_compile_status(vs) {
                let info = gl.get_shader_info_log(vs);
                gl.delete_shader(vs);
                return Err(RenderError::Shader(format!("Vertex shader: {}", info)));
            }

            let fs = match gl.create_shader(glow::FRAGMENT_SHADER) {
                Ok(fs) => fs,
                Err(e) => {
                    gl.delete_shader(vs);
                    return Err(RenderError::Shader(e));
                }
            };
            gl.shader_source(fs, fs_source);
            gl.compile_shader(fs);

            if !gl.get_shader_compile_status(fs) {
                let info = gl.get_shader_info_log(fs);
                gl.delete_shader(vs);
                gl.delete_shader(fs);
                return Err(RenderError::Shader(format!("Fragment shader: {}", info)));
            }

            let program = match gl.create_program() {
                Ok(program) => program,
                Err(e) => {
                    gl.delete_shader(vs);
                    gl.delete_shader(fs);
                    return Err(RenderError::Shader(e));
                }
            };
            gl.attach_shader(program, vs);
            gl.attach_shader(program, fs);
            gl.link_program(program);

            if !gl.get_program_link_status(program) {
                let info = gl.get_program_info_log(program);
                gl.delete_shader(vs);
                gl.delete_shader(fs);
                gl.delete_program(program);
                return Err(RenderError::Shader(format!("Program linking: {}", info)));
            }

            gl.delete_shader(vs);
            gl.delete_shader(fs);

            Ok(program)
        }
    }

    fn cleanup(&self, resources: &GlResources) {
        unsafe {
            self.gl.delete_vertex_array(resources.vao);
            self.gl.delete_buffer(resources.vbo);
            if let Some(ebo) = resources.ebo {
                self.gl.delete_buffer(ebo);
            }
        }
    }

    fn set_uniform_mat4(&self, program: glow::Program, name: &str, matrix: &Mat4) {
        unsafe {
            if let Some(loc) = self.gl.get_uniform_location(program, name) {
                self.gl
                    .uniform_matrix_4_f32_slice(Some(&loc), false, &matrix.to_cols_array());
            }
        }
    }

    fn set_uniform_mat3(&self, program: glow::Program, name: &str, matrix: &[f32; 9]) {
        unsafe {
            if let Some(loc) = self.gl.get_uniform_location(program, name) {
                self.gl.uniform_matrix_3_f32_slice(Some(&loc), false, matrix);
            }
        }
    }

    fn set_uniform_vec3(&self, program: glow::Program, name: &str, v: Vec3) {
        unsafe {
            if let Some(loc) = self.gl.get_uniform_location(program, name) {
                self.gl.uniform_3_f32(Some(&loc), v.x, v.y, v.z);
            }
        }
    }

    fn set_uniform_vec4(&self, program: glow::Program, name: &str, v: &[f32; 4]) {
        unsafe {
            if let Some(loc) = self.gl.get_uniform_location(program, name) {
                self.gl.uniform_4_f32(Some(&loc), v[0], v[1], v[2], v[3]);
            }
        }
    }

    fn set_uniform_f32(&self, program: glow::Program, name: &str, value: f32) {
        unsafe {
            if let Some(loc) = self.gl.get_uniform_location(program, name) {
                self.gl.uniform_1_f32(Some(&loc), value);
            }
        }
    }

    fn set_uniform_i32(&self, program: glow::Program, name: &str, value: i32) {
        unsafe {
            if let Some(loc) = self.gl.get_uniform_location(program, name) {
                self.gl.uniform_1_i32(Some(&loc), value);
            }
        }
    }
}

impl RenderBackend for GlBackend {
    fn upload(&mut self, data: UploadData<'_>) -> RenderResult<MeshHandle> {
        let resources = match data {
            UploadData::Mesh(mesh) => {
                let vertices = mesh.interleaved([1.0, 1.0, 1.0, 1.0]);
                self.upload_vertices(&vertices, Some(mesh.indices()), PrimitiveKind::Triangles)?
            }
            UploadData::Lines(lines) => {
                let vertices = lines.interleaved([1.0, 1.0, 1.0, 1.0]);
                self.upload_vertices(&vertices, None, PrimitiveKind::Lines)?
            }
        };
        self.next_handle += 1;
        let handle = MeshHandle::new(self.next_handle);
        self.resources.insert(handle, resources);
        Ok(handle)
    }

    fn release(&mut self, handle: MeshHandle) {
        match self.resources.remove(&handle) {
            Some(resources) => self.cleanup(&resources),
            None => tracing::warn!("Release of unknown {}", handle),
        }
    }

    fn draw(&mut self, frame: &FrameSubmission) -> RenderResult<()> {
        let [r, g, b, a] = self.clear_color;
        unsafe {
            self.gl.clear_color(r, g, b, a);
            self.gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
            self.gl.enable(glow::DEPTH_TEST);
        }

        let (transparent, opaque): (Vec<&DrawItem>, Vec<&DrawItem>) = frame
            .triangle_items()
            .partition(|item| item.material.is_transparent());
        for item in opaque {
            self.draw_surface(item, frame);
        }

        unsafe {
            self.gl.enable(glow::BLEND);
            self.gl.blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);
        }
        for item in transparent {
            self.draw_surface(item, frame);
        }
        for item in frame.line_items() {
            debug_assert_eq!(
                self.resources.get(&item.handle).map(|r| r.kind),
                Some(PrimitiveKind::Lines)
            );
            self.draw_lines(item, frame);
        }
        unsafe {
            self.gl.disable(glow::BLEND);
        }
        Ok(())
    }
}

impl Drop for GlBackend {
    fn drop(&mut self) {
        let resources: Vec<_> = self.resources.drain().map(|(_, r)| r).collect();
        for r in &resources {
            self.cleanup(r);
        }
        unsafe {
            self.gl.delete_program(self.surface_program);
            self.gl.delete_program(self.line_program);
        }
    }
}
