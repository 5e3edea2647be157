//! Thin helpers over the WebGL2 API: programs, textures, render targets and
//! the fullscreen quad.

use web_sys::{
    ImageBitmap, WebGl2RenderingContext as GL, WebGlBuffer, WebGlFramebuffer, WebGlProgram,
    WebGlShader, WebGlTexture, WebGlVertexArrayObject,
};

use crate::adaptive::Size;
use crate::error::{BackgroundError, Result, ShaderStage};

/// Two triangles covering clip space; attribute 0 is `position`.
const QUAD_VERTICES: [f32; 18] = [
    -1.0, -1.0, 0.0, //
    1.0, -1.0, 0.0, //
    -1.0, 1.0, 0.0, //
    -1.0, 1.0, 0.0, //
    1.0, -1.0, 0.0, //
    1.0, 1.0, 0.0,
];

const BLACK_TEXEL: [u8; 4] = [0, 0, 0, 255];

pub fn compile_shader(gl: &GL, stage: ShaderStage, source: &str) -> Result<WebGlShader> {
    let kind = match stage {
        ShaderStage::Vertex => GL::VERTEX_SHADER,
        ShaderStage::Fragment => GL::FRAGMENT_SHADER,
    };
    let shader = gl
        .create_shader(kind)
        .ok_or(BackgroundError::Resource("shader"))?;
    gl.shader_source(&shader, source);
    gl.compile_shader(&shader);

    if gl
        .get_shader_parameter(&shader, GL::COMPILE_STATUS)
        .as_bool()
        .unwrap_or(false)
    {
        return Ok(shader);
    }
    let log = gl
        .get_shader_info_log(&shader)
        .unwrap_or_else(|| "unknown".into());
    gl.delete_shader(Some(&shader));
    Err(BackgroundError::ShaderCompile { stage, log })
}

/// Compile and link a vertex/fragment pair. Shaders are released once the
/// program links.
pub fn link_program(gl: &GL, vertex: &str, fragment: &str) -> Result<WebGlProgram> {
    let vs = compile_shader(gl, ShaderStage::Vertex, vertex)?;
    let fs = match compile_shader(gl, ShaderStage::Fragment, fragment) {
        Ok(fs) => fs,
        Err(err) => {
            gl.delete_shader(Some(&vs));
            return Err(err);
        }
    };

    let Some(program) = gl.create_program() else {
        gl.delete_shader(Some(&vs));
        gl.delete_shader(Some(&fs));
        return Err(BackgroundError::Resource("program"));
    };
    gl.attach_shader(&program, &vs);
    gl.attach_shader(&program, &fs);
    gl.bind_attrib_location(&program, 0, "position");
    gl.link_program(&program);
    gl.delete_shader(Some(&vs));
    gl.delete_shader(Some(&fs));

    if gl
        .get_program_parameter(&program, GL::LINK_STATUS)
        .as_bool()
        .unwrap_or(false)
    {
        Ok(program)
    } else {
        let log = gl
            .get_program_info_log(&program)
            .unwrap_or_else(|| "unknown".into());
        gl.delete_program(Some(&program));
        Err(BackgroundError::ProgramLink(log))
    }
}

pub struct Quad {
    vao: WebGlVertexArrayObject,
    _vbo: WebGlBuffer,
}

impl Quad {
    pub fn new(gl: &GL) -> Result<Self> {
        let vao = gl
            .create_vertex_array()
            .ok_or(BackgroundError::Resource("vertex array"))?;
        gl.bind_vertex_array(Some(&vao));

        let vbo = gl
            .create_buffer()
            .ok_or(BackgroundError::Resource("vertex buffer"))?;
        gl.bind_buffer(GL::ARRAY_BUFFER, Some(&vbo));
        let data = js_sys::Float32Array::from(&QUAD_VERTICES[..]);
        gl.buffer_data_with_array_buffer_view(GL::ARRAY_BUFFER, &data, GL::STATIC_DRAW);

        gl.enable_vertex_attrib_array(0);
        gl.vertex_attrib_pointer_with_i32(0, 3, GL::FLOAT, false, 0, 0);
        gl.bind_vertex_array(None);

        Ok(Self { vao, _vbo: vbo })
    }

    pub fn draw(&self, gl: &GL) {
        gl.bind_vertex_array(Some(&self.vao));
        gl.draw_arrays(GL::TRIANGLES, 0, 6);
    }
}

fn new_texture(gl: &GL, wrap_s: u32) -> Result<WebGlTexture> {
    let tex = gl
        .create_texture()
        .ok_or(BackgroundError::Resource("texture"))?;
    gl.bind_texture(GL::TEXTURE_2D, Some(&tex));
    gl.tex_parameteri(GL::TEXTURE_2D, GL::TEXTURE_MIN_FILTER, GL::LINEAR as i32);
    gl.tex_parameteri(GL::TEXTURE_2D, GL::TEXTURE_MAG_FILTER, GL::LINEAR as i32);
    gl.tex_parameteri(GL::TEXTURE_2D, GL::TEXTURE_WRAP_S, wrap_s as i32);
    gl.tex_parameteri(GL::TEXTURE_2D, GL::TEXTURE_WRAP_T, GL::CLAMP_TO_EDGE as i32);
    Ok(tex)
}

fn store_rgba(gl: &GL, width: u32, height: u32, pixels: Option<&[u8]>) -> Result<()> {
    gl.tex_image_2d_with_i32_and_i32_and_i32_and_format_and_type_and_opt_u8_array(
        GL::TEXTURE_2D,
        0,
        GL::RGBA as i32,
        width as i32,
        height as i32,
        0,
        GL::RGBA,
        GL::UNSIGNED_BYTE,
        pixels,
    )?;
    Ok(())
}

/// 1x1 black texture bound until the real image arrives. `repeat_s` wraps
/// horizontally, for equirectangular maps.
pub fn placeholder_texture(gl: &GL, repeat_s: bool) -> Result<WebGlTexture> {
    let wrap = if repeat_s { GL::REPEAT } else { GL::CLAMP_TO_EDGE };
    let tex = new_texture(gl, wrap)?;
    let stored = store_rgba(gl, 1, 1, Some(&BLACK_TEXEL));
    gl.bind_texture(GL::TEXTURE_2D, None);
    stored.map(|_| tex)
}

/// Replace the contents of `tex` with a decoded image, flipped to GL's
/// bottom-up row order.
pub fn upload_image(gl: &GL, tex: &WebGlTexture, image: &ImageBitmap) -> Result<()> {
    gl.bind_texture(GL::TEXTURE_2D, Some(tex));
    gl.pixel_storei(GL::UNPACK_FLIP_Y_WEBGL, 1);
    let stored = gl.tex_image_2d_with_u32_and_u32_and_image_bitmap(
        GL::TEXTURE_2D,
        0,
        GL::RGBA as i32,
        GL::RGBA,
        GL::UNSIGNED_BYTE,
        image,
    );
    gl.pixel_storei(GL::UNPACK_FLIP_Y_WEBGL, 0);
    gl.bind_texture(GL::TEXTURE_2D, None);
    stored.map_err(BackgroundError::from)
}

pub fn bind_texture_unit(gl: &GL, unit: u32, tex: &WebGlTexture) {
    gl.active_texture(GL::TEXTURE0 + unit);
    gl.bind_texture(GL::TEXTURE_2D, Some(tex));
}

/// Offscreen color target the scene pass renders into.
pub struct RenderTarget {
    texture: WebGlTexture,
    framebuffer: WebGlFramebuffer,
    size: Size,
}

impl RenderTarget {
    pub fn new(gl: &GL, size: Size) -> Result<Self> {
        let size = Size::new(size.width.max(1), size.height.max(1));
        let texture = new_texture(gl, GL::CLAMP_TO_EDGE)?;
        let stored = store_rgba(gl, size.width, size.height, None);
        gl.bind_texture(GL::TEXTURE_2D, None);
        if let Err(err) = stored {
            gl.delete_texture(Some(&texture));
            return Err(err);
        }

        let framebuffer = match gl.create_framebuffer() {
            Some(fb) => fb,
            None => {
                gl.delete_texture(Some(&texture));
                return Err(BackgroundError::Resource("framebuffer"));
            }
        };
        gl.bind_framebuffer(GL::FRAMEBUFFER, Some(&framebuffer));
        gl.framebuffer_texture_2d(
            GL::FRAMEBUFFER,
            GL::COLOR_ATTACHMENT0,
            GL::TEXTURE_2D,
            Some(&texture),
            0,
        );
        gl.bind_framebuffer(GL::FRAMEBUFFER, None);

        Ok(Self {
            texture,
            framebuffer,
            size,
        })
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn texture(&self) -> &WebGlTexture {
        &self.texture
    }

    pub fn framebuffer(&self) -> &WebGlFramebuffer {
        &self.framebuffer
    }

    /// Reallocate at `size`; a no-op when the size is unchanged.
    pub fn resize(&mut self, gl: &GL, size: Size) -> Result<()> {
        if size == self.size || size.is_empty() {
            return Ok(());
        }
        let next = RenderTarget::new(gl, size)?;
        let old = std::mem::replace(self, next);
        old.delete(gl);
        Ok(())
    }

    fn delete(self, gl: &GL) {
        gl.delete_framebuffer(Some(&self.framebuffer));
        gl.delete_texture(Some(&self.texture));
    }
}
