use std::sync::mpsc;
use std::time::Instant;

use image::RgbaImage;

use crate::asset;
use crate::error::FilterError;
use crate::processing::gpu::GpuContext;
use crate::processing::{FilterStrategy, TextureSet};

pub enum WorkerEvent {
    Frame { image: RgbaImage, parameter: u32 },
    Failed(FilterError),
}

/// Handle to the one background execution context for GPU work.
///
/// Requests go over an unbounded channel and are served strictly in arrival
/// order by a single thread, so at most one filter invocation is ever in
/// flight and none is dropped or coalesced.
pub struct FilterWorker {
    jobs: mpsc::Sender<u32>,
    events: mpsc::Receiver<WorkerEvent>,
}

impl FilterWorker {
    /// Move the GPU context and the chosen filter into a worker thread.
    ///
    /// The bundled image is decoded and uploaded lazily on the first job;
    /// the textures then live as long as the worker.
    pub fn spawn(gpu: GpuContext, strategy: FilterStrategy, repaint: egui::Context) -> Self {
        let (job_tx, job_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut strategy = strategy;
            let mut textures: Option<TextureSet> = None;
            serve(
                job_rx,
                event_tx,
                |parameter| run_one(&gpu, &mut strategy, &mut textures, parameter),
                || repaint.request_repaint(),
            );
        });
        FilterWorker {
            jobs: job_tx,
            events: event_rx,
        }
    }

    /// Enqueue a filter run at the given parameter. Never blocks.
    pub fn request(&self, parameter: u32) {
        let _ = self.jobs.send(parameter);
    }

    pub fn try_recv(&self) -> Option<WorkerEvent> {
        self.events.try_recv().ok()
    }
}

/// The worker loop, with the GPU path injected so the queue semantics stay
/// testable without a device: jobs are served FIFO, one at a time; the
/// first failure is reported and ends the loop (the boundary on the other
/// side of the channel terminates the process).
fn serve<R, P>(jobs: mpsc::Receiver<u32>, events: mpsc::Sender<WorkerEvent>, mut run: R, repaint: P)
where
    R: FnMut(u32) -> Result<RgbaImage, FilterError>,
    P: Fn(),
{
    while let Ok(parameter) = jobs.recv() {
        let started = Instant::now();
        match run(parameter) {
            Ok(image) => {
                tracing::debug!(
                    parameter,
                    elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
                    "filter run complete"
                );
                let _ = events.send(WorkerEvent::Frame { image, parameter });
                repaint();
            }
            Err(err) => {
                let _ = events.send(WorkerEvent::Failed(err));
                repaint();
                return;
            }
        }
    }
}

fn run_one(
    gpu: &GpuContext,
    strategy: &mut FilterStrategy,
    textures: &mut Option<TextureSet>,
    parameter: u32,
) -> Result<RgbaImage, FilterError> {
    if textures.is_none() {
        let source = asset::load_bundled()?;
        *textures = Some(TextureSet::upload(
            gpu,
            &source,
            strategy.needs_intermediate(),
        )?);
    }
    let Some(set) = textures.as_ref() else {
        return Err(FilterError::setup("texture set missing after import"));
    };
    strategy.run(gpu, set, parameter)?;
    set.read_back(gpu)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    use image::RgbaImage;

    use super::{WorkerEvent, serve};
    use crate::error::FilterError;

    fn frame_parameters(events: &mpsc::Receiver<WorkerEvent>) -> Vec<u32> {
        events
            .try_iter()
            .map(|event| match event {
                WorkerEvent::Frame { parameter, .. } => parameter,
                WorkerEvent::Failed(err) => panic!("unexpected failure: {}", err),
            })
            .collect()
    }

    #[test]
    fn back_to_back_requests_produce_updates_in_request_order() {
        let (job_tx, job_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let repaints = AtomicUsize::new(0);

        job_tx.send(10).unwrap();
        job_tx.send(20).unwrap();
        drop(job_tx);

        serve(
            job_rx,
            event_tx,
            |_| Ok(RgbaImage::new(1, 1)),
            || {
                repaints.fetch_add(1, Ordering::Relaxed);
            },
        );

        assert_eq!(frame_parameters(&event_rx), vec![10, 20]);
        assert_eq!(repaints.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn first_failure_is_reported_and_ends_the_loop() {
        let (job_tx, job_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        job_tx.send(13).unwrap();
        job_tx.send(14).unwrap();
        drop(job_tx);

        serve(
            job_rx,
            event_tx,
            |parameter| {
                if parameter == 13 {
                    Err(FilterError::asset("boom"))
                } else {
                    Ok(RgbaImage::new(1, 1))
                }
            },
            || {},
        );

        let events: Vec<WorkerEvent> = event_rx.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], WorkerEvent::Failed(_)));
    }
}
