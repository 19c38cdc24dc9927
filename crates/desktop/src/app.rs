use std::path::PathBuf;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use iced::widget::image::Handle;
use iced::widget::{button, column, container, row, scrollable, text};
use iced::{Element, Length, Subscription, Task, Theme};

use facecam_core::capture::domain::camera_backend::CaptureConstraints;
use facecam_core::capture::domain::video_surface::VideoSurface;
use facecam_core::capture::infrastructure::ffmpeg_camera::FfmpegCamera;
use facecam_core::capture::media_capture::{MediaCapture, StreamHandle};
use facecam_core::detection::domain::detection_service::{
    DetectionError, DetectionParams, DetectionService,
};
use facecam_core::detection::infrastructure::http_detection_client::HttpDetectionClient;
use facecam_core::pipeline::capture_and_detect_use_case::CaptureAndDetectUseCase;
use facecam_core::pipeline::detect_with_escalation_use_case::DetectWithEscalationUseCase;
use facecam_core::realtime::realtime_detection_loop::{RealtimeConfig, RealtimeDetectionLoop};
use facecam_core::shared::captured_frame::CapturedFrame;
use facecam_core::shared::constants::{IMAGE_EXTENSIONS, SURFACE_READY_TIMEOUT};
use facecam_core::shared::detection_result::DetectionResult;
use facecam_core::shared::server_status::ServerStatus;

use crate::settings::{Appearance, Settings};
use crate::tabs;
use crate::tabs::camera_tab::CameraState;
use crate::tabs::realtime_tab::RealtimeState;
use crate::tabs::upload_tab::UploadState;
use crate::theme;
use crate::widgets::status_banner;
use crate::workers::annotated_image::AnnotatedImage;
use crate::workers::blocking::run_blocking;

const FRAME_TICK: Duration = Duration::from_millis(33);

// ---------------------------------------------------------------------------
// Tab enum
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Upload,
    Camera,
    Realtime,
    Settings,
    About,
}

impl Tab {
    const ALL: &[Tab] = &[
        Tab::Upload,
        Tab::Camera,
        Tab::Realtime,
        Tab::Settings,
        Tab::About,
    ];

    fn label(self) -> &'static str {
        match self {
            Tab::Upload => "Upload",
            Tab::Camera => "Camera",
            Tab::Realtime => "Realtime",
            Tab::Settings => "Settings",
            Tab::About => "About",
        }
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Page an annotated image belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotatedSource {
    Upload,
    Camera,
}

/// Camera capture result handed back from the detection thread.
#[derive(Debug, Clone)]
pub struct CameraOutcome {
    pub result: DetectionResult,
    pub confidence: f64,
    pub annotated: Option<Arc<Vec<u8>>>,
}

#[derive(Debug, Clone)]
pub enum Message {
    TabSelected(Tab),
    Tick,
    PollSystemTheme,
    RefreshHealth,
    HealthChecked(ServerStatus),
    OpenServer,
    // Upload
    SelectImage,
    ImageSelected(Option<PathBuf>),
    UploadConfidenceChanged(u32),
    UploadEmotionsToggled(bool),
    UploadAgeToggled(bool),
    DetectUpload,
    UploadDetected(Result<DetectionResult, String>),
    AnnotateUpload,
    UploadAnnotated(Result<Arc<Vec<u8>>, String>),
    ClearUpload,
    SaveAnnotated(AnnotatedSource),
    AnnotatedSavePicked(AnnotatedSource, Option<PathBuf>),
    // Camera
    StartCamera,
    CameraStarted(Result<StreamHandle, String>),
    StopCamera,
    CameraEmotionsToggled(bool),
    CaptureAndDetect,
    CameraDetected(Result<CameraOutcome, String>),
    // Realtime
    StartRealtime,
    RealtimeStarted(Result<(), String>),
    StopRealtime,
    RealtimeConfidenceChanged(u32),
    RealtimeEmotionsToggled(bool),
    // Settings
    ServerUrlChanged(String),
    ApplyServerUrl,
    ConfidenceChanged(u32),
    EmotionsChanged(bool),
    AgeChanged(bool),
    RestoreDefaults,
    AppearanceChanged(Appearance),
    HighContrastChanged(bool),
    FontScaleChanged(f32),
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

/// HTTP client and the realtime loop bound to it; rebuilt when the server
/// URL changes.
struct Service {
    client: Arc<dyn DetectionService>,
    realtime: Arc<RealtimeDetectionLoop>,
}

impl Service {
    fn connect(settings: &Settings, capture: &Arc<MediaCapture>) -> Result<Self, DetectionError> {
        let client: Arc<dyn DetectionService> =
            Arc::new(HttpDetectionClient::new(settings.client_config())?);
        let realtime = Arc::new(RealtimeDetectionLoop::new(
            Arc::clone(capture),
            Arc::clone(&client),
            VideoSurface::new(),
            RealtimeConfig::default(),
        ));
        Ok(Self { client, realtime })
    }
}

pub struct App {
    active_tab: Tab,
    pub settings: Settings,
    server_draft: String,
    capture: Arc<MediaCapture>,
    service: Option<Service>,
    server_status: Option<ServerStatus>,
    upload: UploadState,
    camera: CameraState,
    realtime: RealtimeState,
}

impl App {
    pub fn new() -> (Self, Task<Message>) {
        let settings = Settings::load();
        let capture = Arc::new(MediaCapture::new(Box::new(FfmpegCamera::new())));
        let mut app = Self {
            active_tab: Tab::Upload,
            server_draft: settings.server_url.clone(),
            upload: UploadState::new(&settings),
            camera: CameraState::new(settings.emotions),
            realtime: RealtimeState::new(&settings),
            capture,
            service: None,
            server_status: None,
            settings,
        };
        let task = app.connect();
        (app, task)
    }

    fn healthy(&self) -> bool {
        self.service.is_some() && self.server_status.as_ref().is_some_and(|s| s.is_healthy())
    }

    fn client(&self) -> Option<Arc<dyn DetectionService>> {
        self.service.as_ref().map(|s| Arc::clone(&s.client))
    }

    /// (Re)builds the service for the configured URL and checks its health.
    fn connect(&mut self) -> Task<Message> {
        if let Some(old) = self.service.take() {
            old.realtime.stop();
        }
        self.realtime.stopped();
        self.server_status = None;

        match Service::connect(&self.settings, &self.capture) {
            Ok(service) => {
                log::info!("Using detection service at {}", self.settings.server_url);
                self.service = Some(service);
                self.check_health()
            }
            Err(e) => {
                log::error!("Cannot create detection client: {e}");
                self.server_status = Some(ServerStatus::unhealthy(e.to_string()));
                Task::none()
            }
        }
    }

    fn check_health(&self) -> Task<Message> {
        let Some(client) = self.client() else {
            return Task::none();
        };
        Task::perform(run_blocking(move || client.health()), |r| {
            Message::HealthChecked(r.unwrap_or_else(ServerStatus::unhealthy))
        })
    }

    fn save_settings(&self) {
        if let Err(e) = self.settings.save() {
            log::warn!("Failed to save settings: {e}");
        }
    }

    fn stop_camera(&mut self) {
        if let Some(handle) = self.camera.stream.take() {
            self.capture.stop(handle);
        }
        self.camera.camera_off();
    }

    fn stop_realtime(&mut self) {
        if let Some(service) = &self.service {
            service.realtime.stop();
        }
        self.realtime.stopped();
    }

    fn annotated_mut(
        &mut self,
        source: AnnotatedSource,
    ) -> (&Option<AnnotatedImage>, &mut Option<String>) {
        match source {
            AnnotatedSource::Upload => (&self.upload.annotated, &mut self.upload.error),
            AnnotatedSource::Camera => (&self.camera.annotated, &mut self.camera.error),
        }
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::TabSelected(tab) => {
                if tab != self.active_tab {
                    match self.active_tab {
                        Tab::Camera => self.stop_camera(),
                        Tab::Realtime => self.stop_realtime(),
                        _ => {}
                    }
                }
                self.active_tab = tab;
            }
            Message::Tick => {
                if self.camera.stream.is_some() || self.camera.detecting {
                    self.camera.refresh();
                }
                if let Some(service) = &self.service {
                    if self.realtime.is_running() {
                        self.realtime.live.refresh(service.realtime.surface());
                        self.realtime.snapshot = Some(service.realtime.snapshot());
                    }
                }
            }
            Message::PollSystemTheme => {
                // Theme is resolved fresh in theme() on every render.
            }
            Message::RefreshHealth => {
                self.server_status = None;
                return self.check_health();
            }
            Message::HealthChecked(status) => {
                if status.is_healthy() {
                    log::info!("Detection service healthy");
                } else {
                    log::warn!(
                        "Detection service unhealthy: {}",
                        status.message.as_deref().unwrap_or("no details")
                    );
                }
                self.server_status = Some(status);
            }
            Message::OpenServer => {
                if let Err(e) = open::that(&self.settings.server_url) {
                    log::warn!("Cannot open {}: {e}", self.settings.server_url);
                }
            }

            // Upload
            Message::SelectImage => {
                return Task::perform(
                    async {
                        rfd::AsyncFileDialog::new()
                            .set_title("Select an image")
                            .add_filter("Images", IMAGE_EXTENSIONS)
                            .pick_file()
                            .await
                            .map(|h| h.path().to_path_buf())
                    },
                    Message::ImageSelected,
                );
            }
            Message::ImageSelected(Some(path)) => {
                self.upload.preview = Some(Handle::from_path(&path));
                self.upload.path = Some(path);
                self.upload.reset_outputs();
            }
            Message::ImageSelected(None) => {}
            Message::UploadConfidenceChanged(val) => self.upload.confidence = val,
            Message::UploadEmotionsToggled(on) => self.upload.emotions = on,
            Message::UploadAgeToggled(on) => self.upload.age = on,
            Message::DetectUpload => {
                let (Some(client), Some(path)) = (self.client(), self.upload.path.clone()) else {
                    return Task::none();
                };
                let params = self.upload.params();
                self.upload.busy = true;
                self.upload.error = None;
                return Task::perform(
                    run_blocking(move || {
                        let frame = CapturedFrame::from_path(&path).map_err(|e| e.to_string())?;
                        client.detect(&frame, &params).map_err(|e| e.to_string())
                    }),
                    |r| Message::UploadDetected(r.and_then(|x| x)),
                );
            }
            Message::UploadDetected(result) => {
                self.upload.busy = false;
                match result {
                    Ok(result) => self.upload.result = Some(result),
                    Err(e) => self.upload.error = Some(e),
                }
            }
            Message::AnnotateUpload => {
                let (Some(client), Some(path)) = (self.client(), self.upload.path.clone()) else {
                    return Task::none();
                };
                let params = self.upload.params();
                self.upload.busy = true;
                self.upload.error = None;
                return Task::perform(
                    run_blocking(move || {
                        let frame = CapturedFrame::from_path(&path).map_err(|e| e.to_string())?;
                        client
                            .detect_and_annotate(&frame, &params)
                            .map(Arc::new)
                            .map_err(|e| e.to_string())
                    }),
                    |r| Message::UploadAnnotated(r.and_then(|x| x)),
                );
            }
            Message::UploadAnnotated(result) => {
                self.upload.busy = false;
                match result.and_then(|bytes| {
                    AnnotatedImage::from_bytes(&bytes).map_err(|e| e.to_string())
                }) {
                    Ok(annotated) => self.upload.annotated = Some(annotated),
                    Err(e) => self.upload.error = Some(e),
                }
            }
            Message::ClearUpload => {
                self.upload.path = None;
                self.upload.preview = None;
                self.upload.reset_outputs();
            }
            Message::SaveAnnotated(source) => {
                let (annotated, _) = self.annotated_mut(source);
                let Some(extension) = annotated.as_ref().map(|a| a.extension()) else {
                    return Task::none();
                };
                return Task::perform(
                    async move {
                        rfd::AsyncFileDialog::new()
                            .set_title("Save annotated image")
                            .set_file_name(format!("annotated.{extension}"))
                            .add_filter("Image", &[extension])
                            .save_file()
                            .await
                            .map(|h| h.path().to_path_buf())
                    },
                    move |path| Message::AnnotatedSavePicked(source, path),
                );
            }
            Message::AnnotatedSavePicked(source, Some(path)) => {
                let (annotated, error) = self.annotated_mut(source);
                if let Some(annotated) = annotated {
                    if let Err(e) = annotated.save_as(&path) {
                        *error = Some(format!("Could not save {}: {e}", path.display()));
                    }
                }
            }
            Message::AnnotatedSavePicked(_, None) => {}

            // Camera
            Message::StartCamera => {
                if self.camera.stream.is_some() || self.camera.starting {
                    return Task::none();
                }
                self.camera.starting = true;
                self.camera.error = None;
                let capture = Arc::clone(&self.capture);
                let surface = self.camera.surface.clone();
                return Task::perform(
                    run_blocking(move || {
                        let handle = capture
                            .start(&CaptureConstraints::default())
                            .map_err(|e| e.to_string())?;
                        let bound =
                            capture.bind_to_surface(handle, &surface, SURFACE_READY_TIMEOUT);
                        if let Err(e) = bound {
                            capture.stop(handle);
                            return Err(e.to_string());
                        }
                        Ok(handle)
                    }),
                    |r| Message::CameraStarted(r.and_then(|x| x)),
                );
            }
            Message::CameraStarted(Ok(handle)) => {
                self.camera.starting = false;
                if self.active_tab == Tab::Camera {
                    self.camera.stream = Some(handle);
                } else {
                    // The page was left while the camera was opening.
                    self.capture.stop(handle);
                }
            }
            Message::CameraStarted(Err(e)) => {
                log::warn!("Camera unavailable: {e}");
                self.camera.starting = false;
                self.camera.error = Some(e);
            }
            Message::StopCamera => self.stop_camera(),
            Message::CameraEmotionsToggled(on) => self.camera.set_emotions(on),
            Message::CaptureAndDetect => {
                let Some(client) = self.client() else {
                    return Task::none();
                };
                if self.camera.stream.is_none() || self.camera.detecting {
                    return Task::none();
                }
                self.camera.detecting = true;
                self.camera.error = None;
                self.camera.result = None;
                self.camera.final_confidence = None;
                self.camera.annotated = None;
                *self
                    .camera
                    .progress
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = None;

                let mut params = self.settings.detection_params();
                params.emotions = self.camera.emotions();
                let capture = Arc::clone(&self.capture);
                let surface = self.camera.surface.clone();
                let progress = Arc::clone(&self.camera.progress);
                return Task::perform(
                    run_blocking(move || {
                        let escalation = DetectWithEscalationUseCase::new(Arc::clone(&client))
                            .with_progress(Box::new(move |attempt, confidence| {
                                *progress.lock().unwrap_or_else(PoisonError::into_inner) =
                                    Some((attempt, confidence));
                                true
                            }));
                        CaptureAndDetectUseCase::new(capture, client, escalation)
                            .execute(&surface, &params)
                            .map(|outcome| CameraOutcome {
                                confidence: outcome.detection.confidence(),
                                result: outcome.detection.result,
                                annotated: outcome.annotated.map(Arc::new),
                            })
                            .map_err(|e| e.to_string())
                    }),
                    |r| Message::CameraDetected(r.and_then(|x| x)),
                );
            }
            Message::CameraDetected(Ok(outcome)) => {
                self.camera.detecting = false;
                self.camera.annotated = outcome.annotated.and_then(|bytes| {
                    AnnotatedImage::from_bytes(&bytes)
                        .map_err(|e| log::warn!("Cannot display annotated image: {e}"))
                        .ok()
                });
                self.camera.final_confidence = Some(outcome.confidence);
                self.camera.result = Some(outcome.result);
                self.camera.refresh();
            }
            Message::CameraDetected(Err(e)) => {
                self.camera.detecting = false;
                self.camera.error = Some(e);
            }

            // Realtime
            Message::StartRealtime => {
                let Some(service) = &self.service else {
                    return Task::none();
                };
                if self.realtime.is_running() {
                    return Task::none();
                }
                self.realtime.starting = true;
                self.realtime.error = None;
                let realtime = Arc::clone(&service.realtime);
                realtime.set_params(self.realtime_params());
                return Task::perform(
                    run_blocking(move || realtime.start().map_err(|e| e.to_string())),
                    |r| Message::RealtimeStarted(r.and_then(|x| x)),
                );
            }
            Message::RealtimeStarted(Ok(())) => {
                self.realtime.starting = false;
                if self.active_tab != Tab::Realtime {
                    self.stop_realtime();
                } else if let Some(service) = &self.service {
                    self.realtime.snapshot = Some(service.realtime.snapshot());
                }
            }
            Message::RealtimeStarted(Err(e)) => {
                log::warn!("Realtime detection failed to start: {e}");
                self.realtime.stopped();
                self.realtime.error = Some(e);
            }
            Message::StopRealtime => self.stop_realtime(),
            Message::RealtimeConfidenceChanged(val) => {
                self.realtime.confidence = val;
                self.push_realtime_params();
            }
            Message::RealtimeEmotionsToggled(on) => {
                self.realtime.emotions = on;
                self.push_realtime_params();
            }

            // Settings
            Message::ServerUrlChanged(url) => self.server_draft = url,
            Message::ApplyServerUrl => {
                let url = self.server_draft.trim().to_string();
                if url.is_empty() || url == self.settings.server_url {
                    return Task::none();
                }
                self.settings.server_url = url;
                self.save_settings();
                return self.connect();
            }
            Message::ConfidenceChanged(val) => {
                self.settings.confidence = val;
                self.save_settings();
            }
            Message::EmotionsChanged(on) => {
                self.settings.emotions = on;
                self.save_settings();
            }
            Message::AgeChanged(on) => {
                self.settings.age = on;
                self.save_settings();
            }
            Message::RestoreDefaults => {
                let defaults = Settings::default();
                self.settings.confidence = defaults.confidence;
                self.settings.emotions = defaults.emotions;
                self.settings.age = defaults.age;
                self.save_settings();
            }
            Message::AppearanceChanged(appearance) => {
                self.settings.appearance = appearance;
                self.save_settings();
            }
            Message::HighContrastChanged(enabled) => {
                self.settings.high_contrast = enabled;
                self.save_settings();
            }
            Message::FontScaleChanged(scale) => {
                self.settings.font_scale = scale;
                self.save_settings();
            }
        }
        Task::none()
    }

    fn realtime_params(&self) -> DetectionParams {
        let mut params = self.settings.detection_params();
        params.confidence = self.realtime.confidence.clamp(10, 100) as f64 / 100.0;
        params.emotions = self.realtime.emotions;
        params
    }

    fn push_realtime_params(&self) {
        if let Some(service) = &self.service {
            service.realtime.set_params(self.realtime_params());
        }
    }

    pub fn view(&self) -> Element<'_, Message> {
        let fs = self.settings.font_scale;
        let theme = self.theme();
        let healthy = self.healthy();

        let tab_bar = row(Tab::ALL
            .iter()
            .map(|&tab| {
                let label = text(tab.label()).size(scaled(13.0, fs));
                let btn = button(label)
                    .on_press(Message::TabSelected(tab))
                    .padding([6, 14]);
                if tab == self.active_tab {
                    btn.style(button::primary).into()
                } else {
                    btn.style(button::text).into()
                }
            })
            .collect::<Vec<_>>())
        .spacing(2);

        let content: Element<'_, Message> = match self.active_tab {
            Tab::Upload => tabs::upload_tab::view(&self.upload, healthy, fs, &theme),
            Tab::Camera => tabs::camera_tab::view(&self.camera, healthy, fs, &theme),
            Tab::Realtime => match &self.service {
                Some(service) => tabs::realtime_tab::view(
                    &self.realtime,
                    service.realtime.surface(),
                    healthy,
                    fs,
                    &theme,
                ),
                None => text("Detection service is not configured").size(scaled(13.0, fs)).into(),
            },
            Tab::Settings => tabs::settings_tab::view(&self.settings, &self.server_draft),
            Tab::About => tabs::about_tab::view(&self.settings.server_url, fs),
        };

        let tab_content = container(scrollable(content).height(Length::Fill))
            .padding(16)
            .height(Length::Fill);

        let footer = status_banner::view(self.server_status.as_ref(), fs, &theme);

        column![tab_bar, tab_content, footer]
            .spacing(0)
            .height(Length::Fill)
            .into()
    }

    pub fn theme(&self) -> Theme {
        theme::resolve_theme(self.settings.appearance, self.settings.high_contrast)
    }

    pub fn subscription(&self) -> Subscription<Message> {
        let system_theme = if self.settings.appearance == Appearance::System {
            iced::time::every(Duration::from_secs(2)).map(|_| Message::PollSystemTheme)
        } else {
            Subscription::none()
        };

        let live = self.camera.stream.is_some()
            || self.camera.starting
            || self.camera.detecting
            || self.realtime.is_running();
        let frames = if live {
            iced::time::every(FRAME_TICK).map(|_| Message::Tick)
        } else {
            Subscription::none()
        };

        Subscription::batch([system_theme, frames])
    }
}

/// Scale a base font size by the user's font_scale setting.
pub fn scaled(base: f32, font_scale: f32) -> f32 {
    (base * font_scale).round()
}
