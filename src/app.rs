use crate::config::AppConfig;
use crate::processing::gpu::GpuContext;
use crate::processing::{FilterKind, FilterStrategy};
use crate::worker::{FilterWorker, WorkerEvent};

pub const PARAMETER_MIN: u32 = 1;
pub const PARAMETER_MAX: u32 = 100;
/// Slider position before the user touches anything.
pub const DEFAULT_PARAMETER: u32 = 60;

pub struct FilterviewApp {
    worker: FilterWorker,
    kind: FilterKind,
    adapter_summary: String,
    parameter: u32,
    /// Requests sent but not yet answered with a frame.
    outstanding: usize,
    texture: Option<egui::TextureHandle>,
    config: AppConfig,
}

impl FilterviewApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        config: AppConfig,
        gpu: GpuContext,
        strategy: FilterStrategy,
    ) -> Self {
        let kind = strategy.kind();
        let adapter_summary = gpu.adapter_summary();
        let parameter = config
            .initial_parameter
            .unwrap_or(DEFAULT_PARAMETER)
            .clamp(PARAMETER_MIN, PARAMETER_MAX);

        let worker = FilterWorker::spawn(gpu, strategy, cc.egui_ctx.clone());
        // First display: run the filter once at the initial parameter.
        worker.request(parameter);

        Self {
            worker,
            kind,
            adapter_summary,
            parameter,
            outstanding: 1,
            texture: None,
            config,
        }
    }

    fn drain(&mut self, ctx: &egui::Context) {
        while let Some(event) = self.worker.try_recv() {
            match event {
                WorkerEvent::Frame { image, .. } => {
                    self.outstanding = self.outstanding.saturating_sub(1);
                    let size = [image.width() as usize, image.height() as usize];
                    let color =
                        egui::ColorImage::from_rgba_unmultiplied(size, image.as_raw());
                    self.texture =
                        Some(ctx.load_texture("filter_result", color, egui::TextureOptions::LINEAR));
                }
                WorkerEvent::Failed(err) => {
                    // The one place run-time failures surface. No fallback
                    // image, no partial UI state.
                    eprintln!("filterview: fatal: {}", err);
                    std::process::exit(2);
                }
            }
        }
    }
}

impl eframe::App for FilterviewApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Track window size for saving on exit
        if let Some(rect) = ctx.input(|i| i.viewport().inner_rect) {
            self.config.window_width = Some(rect.width());
            self.config.window_height = Some(rect.height());
        }

        // Poll background work before rendering
        self.drain(ctx);

        egui::TopBottomPanel::bottom("controls").show(ctx, |ui| {
            ui.add_space(6.0);
            ui.horizontal(|ui| {
                ui.label(self.kind.parameter_label());
                let resp = ui.add(
                    egui::Slider::new(&mut self.parameter, PARAMETER_MIN..=PARAMETER_MAX)
                        .clamping(egui::SliderClamping::Always),
                );
                if resp.changed() {
                    // Every change enqueues a run; in-flight work is never
                    // cancelled, later requests just queue behind it.
                    self.worker.request(self.parameter);
                    self.outstanding += 1;
                }
            });
            ui.add_space(2.0);
            ui.label(
                egui::RichText::new(format!(
                    "{} · {}",
                    self.kind.label(),
                    self.adapter_summary
                ))
                .weak()
                .size(11.0),
            );
            ui.add_space(4.0);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let avail = ui.available_size();
            if let Some(ref tex) = self.texture {
                let tex_size = tex.size_vec2();
                let scale = (avail.x / tex_size.x).min(avail.y / tex_size.y).min(1.0);
                let display = tex_size * scale;
                let (img_rect, _) = ui.allocate_exact_size(display, egui::Sense::hover());
                ui.painter().image(
                    tex.id(),
                    img_rect,
                    egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                    egui::Color32::WHITE,
                );
                // Dim the stale frame while newer requests are queued
                if self.outstanding > 0 {
                    ui.painter()
                        .rect_filled(img_rect, 0.0, egui::Color32::from_black_alpha(80));
                }
            } else {
                ui.centered_and_justified(|ui| {
                    ui.spinner();
                });
            }
        });
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.config.save();
    }
}
