mod font;
mod pixel_buffer;
mod text_fx;

pub use font::{draw_text_scaled, text_width_scaled, GLYPH_HEIGHT};
pub use pixel_buffer::PixelBuffer;
pub use text_fx::{draw_text_outlined, draw_text_shadowed};

use sdl2::event::{Event, WindowEvent};
use sdl2::keyboard::Keycode;
use sdl2::pixels::PixelFormatEnum;
use sdl2::render::{Canvas, Texture, TextureCreator};
use sdl2::video::{Window, WindowContext};
use sdl2::EventPump;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("SDL initialisation failed: {0}")]
    Init(String),
    #[error("texture error: {0}")]
    Texture(String),
    #[error("failed to present frame: {0}")]
    Present(String),
    #[error("failed to resize window: {0}")]
    Resize(String),
}

pub struct Display {
    canvas: Canvas<Window>,
    event_pump: EventPump,
    width: u32,
    height: u32,
}

/// Streaming texture the composed frame is uploaded into
pub struct RenderTarget<'a> {
    texture: Texture<'a>,
    width: u32,
    height: u32,
}

#[derive(Debug, Clone)]
pub enum InputEvent {
    Quit,
    KeyDown(Keycode),
    MouseMove { x: i32, y: i32 },
    MouseLeave,
}

impl Display {
    /// Open a window sized to the first frame. Frame pacing comes from the
    /// camera, so VSync stays off.
    pub fn new(title: &str, width: u32, height: u32) -> Result<(Self, TextureCreator<WindowContext>), DisplayError> {
        let sdl_context = sdl2::init().map_err(DisplayError::Init)?;
        let video_subsystem = sdl_context.video().map_err(DisplayError::Init)?;

        let window = video_subsystem
            .window(title, width, height)
            .position_centered()
            .build()
            .map_err(|e| DisplayError::Init(e.to_string()))?;

        let canvas = window
            .into_canvas()
            .accelerated()
            .build()
            .map_err(|e| DisplayError::Init(e.to_string()))?;

        let texture_creator = canvas.texture_creator();
        let event_pump = sdl_context.event_pump().map_err(DisplayError::Init)?;

        Ok((
            Self {
                canvas,
                event_pump,
                width,
                height,
            },
            texture_creator,
        ))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Follow the frame size; a no-op when nothing changed
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), DisplayError> {
        if (width, height) == (self.width, self.height) {
            return Ok(());
        }
        self.canvas
            .window_mut()
            .set_size(width, height)
            .map_err(|e| DisplayError::Resize(e.to_string()))?;
        self.width = width;
        self.height = height;
        Ok(())
    }

    pub fn present(&mut self, target: &mut RenderTarget, buffer: &PixelBuffer) -> Result<(), DisplayError> {
        if (buffer.width(), buffer.height()) != (target.width, target.height) {
            return Err(DisplayError::Texture(format!(
                "buffer is {}x{}, texture is {}x{}",
                buffer.width(),
                buffer.height(),
                target.width,
                target.height
            )));
        }
        target
            .texture
            .update(None, buffer.as_bytes(), (buffer.width() * 4) as usize)
            .map_err(|e| DisplayError::Texture(e.to_string()))?;

        self.canvas
            .copy(&target.texture, None, None)
            .map_err(DisplayError::Present)?;
        self.canvas.present();
        Ok(())
    }

    /// Wait up to `timeout` for the first event, then drain the queue
    pub fn poll_events(&mut self, timeout: Duration) -> Vec<InputEvent> {
        let mut events = Vec::new();

        let first = self.event_pump.wait_event_timeout(timeout.as_millis() as u32);
        for event in first.into_iter().chain(self.event_pump.poll_iter()) {
            match event {
                Event::Quit { .. } => events.push(InputEvent::Quit),
                Event::KeyDown {
                    keycode: Some(k), ..
                } => events.push(InputEvent::KeyDown(k)),
                Event::MouseMotion { x, y, .. } => events.push(InputEvent::MouseMove { x, y }),
                Event::Window {
                    win_event: WindowEvent::Leave,
                    ..
                } => events.push(InputEvent::MouseLeave),
                _ => {},
            }
        }

        events
    }
}

impl<'a> RenderTarget<'a> {
    pub fn with_size(
        texture_creator: &'a TextureCreator<WindowContext>,
        width: u32,
        height: u32,
    ) -> Result<Self, DisplayError> {
        let texture = texture_creator
            .create_texture_streaming(PixelFormatEnum::RGBA8888, width, height)
            .map_err(|e| DisplayError::Texture(e.to_string()))?;
        Ok(Self {
            texture,
            width,
            height,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// The window plus the texture it shows, resized to follow the frame
pub struct Screen<'a> {
    display: Display,
    texture_creator: &'a TextureCreator<WindowContext>,
    target: RenderTarget<'a>,
}

impl<'a> Screen<'a> {
    pub fn new(display: Display, texture_creator: &'a TextureCreator<WindowContext>) -> Result<Self, DisplayError> {
        let target = RenderTarget::with_size(texture_creator, display.width(), display.height())?;
        Ok(Self {
            display,
            texture_creator,
            target,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.display.width(), self.display.height())
    }

    /// Upload and show one frame, following frame-size changes
    pub fn show(&mut self, buffer: &PixelBuffer) -> Result<(), DisplayError> {
        let size = (buffer.width(), buffer.height());
        if self.target.dimensions() != size {
            info!(width = size.0, height = size.1, "Frame size changed");
            self.display.resize(size.0, size.1)?;
            self.target = RenderTarget::with_size(self.texture_creator, size.0, size.1)?;
        }
        self.display.present(&mut self.target, buffer)
    }

    pub fn poll_events(&mut self, timeout: Duration) -> Vec<InputEvent> {
        self.display.poll_events(timeout)
    }
}
