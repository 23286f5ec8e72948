use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Parser;
use framebridge_driver::{
    ConvertOpts, DefaultGuiDriver, DefaultWindowDriver, Driver, DriverError, EventListener,
    FontOpts, InitOpts, RenderOpts, WindowOpts,
};
use framebridge_input::{EventOutcome, InputEvent, KeyCode, default_bindings};
use framebridge_render::Color;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "framebridge-demo", about = "egui through the framebridge frame driver")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Detect the UI scale from the display instead of using --scale
    #[arg(long)]
    hidpi: bool,

    /// UI scale, between 0 (auto) and 5
    #[arg(long, default_value_t = 1.0)]
    scale: f32,

    /// Wait for vertical sync when presenting
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    vsync: bool,

    /// TrueType font file; defaults to egui's built-in font
    #[arg(long)]
    font: Option<PathBuf>,

    /// Font size in points
    #[arg(long, default_value_t = FontOpts::DEFAULT_SIZE)]
    font_size: f32,

    /// Preferred render driver (backend or device name); repeatable
    #[arg(long = "renderer")]
    renderers: Vec<String>,

    /// Disable anti-aliasing
    #[arg(long)]
    no_aa: bool,
}

/// Widget state shown in the demo window.
struct DemoState {
    name: String,
    volume: f32,
    checked: bool,
    clicks: u32,
    bg: [u8; 3],
}

impl Default for DemoState {
    fn default() -> Self {
        Self {
            name: String::from("framebridge"),
            volume: 0.5,
            checked: true,
            clicks: 0,
            bg: [40, 44, 52],
        }
    }
}

impl DemoState {
    fn show(&mut self, ctx: &egui::Context) {
        egui::Window::new("Demo").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label("Name:");
                ui.text_edit_singleline(&mut self.name);
            });
            ui.add(egui::Slider::new(&mut self.volume, 0.0..=1.0).text("volume"));
            ui.checkbox(&mut self.checked, "checked");
            if ui.button("Click me").clicked() {
                self.clicks += 1;
            }
            ui.label(format!("clicked {} times", self.clicks));
            ui.separator();
            ui.horizontal(|ui| {
                ui.label("Background:");
                ui.color_edit_button_srgb(&mut self.bg);
            });
            ui.small("Esc quits");
        });
    }

    fn bg_color(&self) -> Color {
        let [r, g, b] = self.bg;
        Color::rgba(r, g, b, 255)
    }
}

/// Quit on window close or Escape; log everything the GUI ignored.
fn listener() -> EventListener {
    Box::new(|event: &InputEvent, outcome: EventOutcome| {
        match event {
            InputEvent::Quit
            | InputEvent::Key {
                code: KeyCode::Escape,
                pressed: true,
                ..
            } => return Err(DriverError::Quit.into()),
            _ if !outcome.used => tracing::trace!(?event, "unhandled event"),
            _ => {}
        }
        Ok(())
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    tracing::info!("framebridge-demo starting");

    let window_driver = DefaultWindowDriver::new(
        InitOpts::default(),
        WindowOpts {
            title: "framebridge demo".into(),
            ..WindowOpts::default()
        },
        RenderOpts {
            drivers: cli.renderers,
            vsync: cli.vsync,
        },
    );
    let gui_driver = DefaultGuiDriver {
        font: FontOpts {
            path: cli.font,
            size: cli.font_size,
        },
        convert: ConvertOpts {
            line_aa: !cli.no_aa,
            shape_aa: !cli.no_aa,
            ..ConvertOpts::default()
        },
    };
    let mut driver = Driver::new(
        window_driver,
        gui_driver,
        default_bindings().clone(),
        Some(listener()),
    );
    driver.init().context("initializing frame driver")?;
    let scale = if cli.hidpi { 0.0 } else { cli.scale };
    driver.set_ui_scale(scale).context("setting ui scale")?;

    let mut state = DemoState::default();
    let result = run(&mut driver, &mut state);
    driver.destroy().context("destroying frame driver")?;
    tracing::info!(clicks = state.clicks, "framebridge-demo exiting");
    result
}

fn run(driver: &mut Driver<DefaultWindowDriver, DefaultGuiDriver>, state: &mut DemoState) -> Result<()> {
    loop {
        driver.set_bg_color(state.bg_color());
        match driver.pre_render() {
            Err(err) if err.is_quit() => return Ok(()),
            other => other.context("starting frame")?,
        }
        let ctx = driver
            .context()
            .context("gui context missing after pre_render")?
            .clone();
        state.show(&ctx);
        driver.post_render().context("finishing frame")?;
    }
}
