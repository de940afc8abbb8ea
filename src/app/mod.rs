use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use eframe::egui::{self, Context};
use tracing::{error, info};

use crate::config::EngineConfig;
use crate::dataset::{Dataset, DatasetFilter, load_dataset};

mod engine;
mod graph;
mod particles;
mod physics;
mod render;
mod ui;

use engine::{Engine, LoopHandle};
use graph::ViewState;

type LoadResult = Result<Dataset, String>;

pub struct NetworkApp {
    dataset_path: PathBuf,
    config: EngineConfig,
    state: AppState,
    reload_rx: Option<Receiver<LoadResult>>,
}

enum AppState {
    Loading { rx: Receiver<LoadResult> },
    Ready(Box<ViewModel>),
    Error(String),
}

struct ViewModel {
    dataset: Dataset,
    filter: DatasetFilter,
    applied_filter: DatasetFilter,
    config: EngineConfig,
    engine: Engine,
    loop_handle: LoopHandle,
    revision: u64,
    carry_over_positions: bool,
    needs_view_reset: bool,
    view_state: Rc<Cell<ViewState>>,
    recent_selections: Rc<RefCell<VecDeque<String>>>,
    show_fps_bar: bool,
    fps_current: f32,
    fps_samples: VecDeque<f32>,
}

impl NetworkApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, dataset_path: PathBuf, config: EngineConfig) -> Self {
        let state = Self::start_load(dataset_path.clone());
        Self {
            dataset_path,
            config,
            state,
            reload_rx: None,
        }
    }

    fn spawn_load(dataset_path: PathBuf) -> Receiver<LoadResult> {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let result = load_dataset(&dataset_path).map_err(|error| format!("{error:#}"));
            if let Err(error) = &result {
                error!(path = %dataset_path.display(), %error, "dataset load failed");
            }
            let _ = tx.send(result);
        });

        rx
    }

    fn start_load(dataset_path: PathBuf) -> AppState {
        info!(path = %dataset_path.display(), "loading payment dataset");
        AppState::Loading {
            rx: Self::spawn_load(dataset_path),
        }
    }
}

impl eframe::App for NetworkApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let mut transition = None;

        match &mut self.state {
            AppState::Loading { rx } => {
                match rx.try_recv() {
                    Ok(Ok(dataset)) => {
                        transition = Some(AppState::Ready(Box::new(ViewModel::new(
                            dataset,
                            self.config.clone(),
                        ))));
                    }
                    Ok(Err(error)) => transition = Some(AppState::Error(error)),
                    Err(TryRecvError::Empty) => ctx.request_repaint(),
                    Err(TryRecvError::Disconnected) => {
                        transition = Some(AppState::Error("Background load worker disconnected".to_owned()));
                    }
                }

                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Loading payment network...");
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
            }
            AppState::Error(error) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to load payment dataset");
                    ui.add_space(6.0);
                    ui.label(error.as_str());
                    ui.add_space(10.0);
                    if ui.button("Retry").clicked() {
                        transition = Some(Self::start_load(self.dataset_path.clone()));
                    }
                });
            }
            AppState::Ready(model) => {
                let mut reload_requested = false;
                let is_reloading = self.reload_rx.is_some();
                model.show(ctx, &self.dataset_path, &mut reload_requested, is_reloading);

                if reload_requested && self.reload_rx.is_none() {
                    self.reload_rx = Some(Self::spawn_load(self.dataset_path.clone()));
                }

                if let Some(rx) = self.reload_rx.take() {
                    match rx.try_recv() {
                        Ok(Ok(dataset)) => model.replace_dataset(dataset),
                        Ok(Err(error)) => transition = Some(AppState::Error(error)),
                        Err(TryRecvError::Empty) => {
                            self.reload_rx = Some(rx);
                            ctx.request_repaint();
                        }
                        Err(TryRecvError::Disconnected) => {
                            transition =
                                Some(AppState::Error("Background load worker disconnected".to_owned()));
                        }
                    }
                }
            }
        }

        if let Some(next_state) = transition {
            self.reload_rx = None;
            self.state = next_state;
        }
    }
}
