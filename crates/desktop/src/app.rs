//! canvasqa Desktop: egui app state and UI.
//!
//! Screens come from `lib::ui::AppShell`. Relay and backend calls run on worker threads with
//! their own tokio runtime; results come back over mpsc receivers polled every frame.

use eframe::egui;
use lib::api::{ApiError, BackendClient, Course};
use lib::config::{Config, RelayConfig};
use lib::identity::AuthError;
use lib::relay::RelayRequest;
use lib::storage::{CourseSet, LocalStorage};
use lib::ui::{AppShell, CourseTokenEntry, QuerySubmission, ResultReveal, Screen};
use std::collections::VecDeque;
use std::future::Future;
use std::io::BufRead;
use std::path::PathBuf;
use std::process::{Child, Stdio};
use std::sync::mpsc;
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

const LOG_BUFFER_MAX_LINES: usize = 2000;
const QUESTION_INPUT_ROWS: usize = 4;

/// Ring buffer of log lines for the Logs view. Written by DesktopLogger and the relay output readers.
static LOG_LINES: OnceLock<Mutex<VecDeque<String>>> = OnceLock::new();

fn log_buffer() -> &'static Mutex<VecDeque<String>> {
    LOG_LINES.get_or_init(|| Mutex::new(VecDeque::new()))
}

fn push_log_line(line: String) {
    if let Ok(mut buf) = log_buffer().lock() {
        buf.push_back(line);
        while buf.len() > LOG_BUFFER_MAX_LINES {
            buf.pop_front();
        }
    }
}

/// Logger that appends to LOG_LINES for display in the Logs view.
struct DesktopLogger;

impl log::Log for DesktopLogger {
    fn enabled(&self, _: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        let line = format!(
            "{} [{}] {}",
            log_timestamp(),
            record.level(),
            record.args()
        );
        push_log_line(line);
    }

    fn flush(&self) {}
}

fn log_timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S%.3f").to_string()
}

static LOGGER: DesktopLogger = DesktopLogger;

#[derive(Clone, Copy, PartialEq, Eq, Default)]
enum View {
    #[default]
    App,
    Logs,
}

/// Run one future to completion on a fresh single-threaded runtime. For worker threads only.
fn block_on<F: Future>(fut: F) -> Result<F::Output, String> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| e.to_string())?;
    Ok(rt.block_on(fut))
}

/// Ask the relay for a Google token (startOAuth or checkAuth). Runs in a thread.
fn relay_token(config: &Config, request: RelayRequest) -> Result<String, AuthError> {
    let token = lib::config::resolve_relay_token(config);
    let url = config.relay.ws_url(token.as_deref());
    let res = block_on(lib::relay::request_once(&url, &request))
        .map_err(AuthError::Platform)?
        .map_err(|e| AuthError::Platform(e.to_string()))?;
    if !res.success {
        return Err(AuthError::Platform(
            res.error.unwrap_or_else(|| "unknown error".to_string()),
        ));
    }
    res.token
        .filter(|t| !t.trim().is_empty())
        .ok_or(AuthError::EmptyToken)
}

/// True if any resolved relay address accepts a TCP connection. Runs in a thread.
fn relay_reachable(relay: &RelayConfig) -> bool {
    relay
        .socket_addrs()
        .iter()
        .any(|addr| std::net::TcpStream::connect_timeout(addr, Duration::from_millis(800)).is_ok())
}

/// Resolve the canvasqa CLI binary: same directory as this executable, or "canvasqa" from PATH.
fn resolve_cli_binary() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let dir = exe.parent()?;
    let name = if cfg!(windows) { "canvasqa.exe" } else { "canvasqa" };
    let candidate = dir.join(name);
    if candidate.exists() {
        return Some(candidate);
    }
    Some(PathBuf::from("canvasqa"))
}

/// Frames between relay probes (~1 Hz at 60 fps).
const PROBE_INTERVAL_FRAMES: u32 = 60;

pub struct CanvasQaApp {
    config: Config,
    shell: AppShell,
    view: View,
    /// When Some, the relay subprocess is running. Cleared when it exits or we stop it.
    relay_process: Option<Child>,
    relay_error: Option<String>,
    /// True if the relay address accepted a TCP connection on the last probe.
    relay_responds: bool,
    probe_receiver: Option<mpsc::Receiver<bool>>,
    frames_since_probe: u32,
    /// Startup checkAuth or interactive startOAuth in flight.
    auth_receiver: Option<mpsc::Receiver<Result<String, AuthError>>>,
    token_entry: CourseTokenEntry,
    courses_receiver: Option<mpsc::Receiver<(String, Result<Vec<Course>, ApiError>)>>,
    submission: QuerySubmission,
    ask_receiver: Option<mpsc::Receiver<Result<String, ApiError>>>,
    /// Input problem from the last click (e.g. no course selected). Cleared on the next attempt.
    validation_message: Option<String>,
    reveal: Option<(ResultReveal, Instant)>,
}

impl CanvasQaApp {
    const SCREEN_TITLE_BOTTOM_SPACING: f32 = 16.0;
    const SCREEN_FOOTER_SPACING: f32 = 24.0;

    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let _ = LOG_LINES.get_or_init(|| Mutex::new(VecDeque::new()));
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(log::LevelFilter::Debug);
        log::info!("desktop started");

        let (config, path) = match lib::config::load_config(None) {
            Ok(pair) => pair,
            Err(e) => {
                log::error!("failed to load config, using defaults: {}", e);
                (Config::default(), lib::config::default_config_path())
            }
        };
        let storage = LocalStorage::load(lib::config::resolve_storage_path(&config, &path));
        let mut app = Self {
            config,
            shell: AppShell::new(storage),
            view: View::default(),
            relay_process: None,
            relay_error: None,
            relay_responds: false,
            probe_receiver: None,
            frames_since_probe: PROBE_INTERVAL_FRAMES,
            auth_receiver: None,
            token_entry: CourseTokenEntry::default(),
            courses_receiver: None,
            submission: QuerySubmission::default(),
            ask_receiver: None,
            validation_message: None,
            reveal: None,
        };
        app.spawn_auth(RelayRequest::CheckAuth);
        app
    }

    fn busy(&self) -> bool {
        self.auth_receiver.is_some()
            || self.courses_receiver.is_some()
            || self.ask_receiver.is_some()
            || self.probe_receiver.is_some()
    }

    fn spawn_auth(&mut self, request: RelayRequest) {
        let config = self.config.clone();
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let _ = tx.send(relay_token(&config, request));
        });
        self.auth_receiver = Some(rx);
    }

    /// Poll for probe result and optionally start a new probe. Call each frame.
    fn poll_relay_probe(&mut self) {
        if let Some(rx) = &self.probe_receiver {
            if let Ok(ok) = rx.try_recv() {
                self.relay_responds = ok;
                self.probe_receiver = None;
            }
        }
        self.frames_since_probe = self.frames_since_probe.saturating_add(1);
        if self.probe_receiver.is_none() && self.frames_since_probe >= PROBE_INTERVAL_FRAMES {
            self.frames_since_probe = 0;
            let relay = self.config.relay.clone();
            let (tx, rx) = mpsc::channel();
            std::thread::spawn(move || {
                let _ = tx.send(relay_reachable(&relay));
            });
            self.probe_receiver = Some(rx);
        }
    }

    fn poll_auth(&mut self) {
        let Some(rx) = &self.auth_receiver else { return };
        let Ok(result) = rx.try_recv() else { return };
        self.auth_receiver = None;
        let outcome = if self.shell.is_checking_auth() {
            if let Err(e) = &result {
                log::info!("no cached sign-in: {}", e);
            }
            self.shell.auth_check_completed(result.ok())
        } else {
            self.shell.auth_completed(result)
        };
        if let Err(e) = outcome {
            log::warn!("{}", e);
        }
    }

    fn poll_courses(&mut self) {
        let Some(rx) = &self.courses_receiver else { return };
        let Ok((token, result)) = rx.try_recv() else { return };
        self.courses_receiver = None;
        if let Some(set) = self.token_entry.finish(token, result) {
            if let Err(e) = self.shell.courses_loaded(set) {
                self.validation_message = Some(e.to_string());
            }
        }
    }

    fn poll_ask(&mut self) {
        let Some(rx) = &self.ask_receiver else { return };
        let Ok(result) = rx.try_recv() else { return };
        self.ask_receiver = None;
        let Some(answer) = self.submission.finish(result) else { return };
        let interval = Duration::from_millis(self.config.ui.reveal_interval_ms);
        self.reveal = Some((ResultReveal::new(&answer, interval), Instant::now()));
        if let Err(e) = self.shell.show_result(answer) {
            log::warn!("{}", e);
        }
    }

    /// True if we started the relay and it is still running (we can stop it).
    fn relay_owned(&mut self) -> bool {
        if let Some(ref mut child) = self.relay_process {
            if child.try_wait().ok().flatten().is_some() {
                self.relay_process = None;
                return false;
            }
            return true;
        }
        false
    }

    fn start_relay(&mut self) {
        self.relay_error = None;
        let Some(binary) = resolve_cli_binary() else {
            self.relay_error = Some("could not find canvasqa binary".to_string());
            return;
        };
        let child = std::process::Command::new(&binary)
            .args(["relay", "--port", &self.config.relay.port.to_string()])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();
        match child {
            Ok(mut c) => {
                if let Some(stderr) = c.stderr.take() {
                    std::thread::spawn(move || {
                        for line in std::io::BufReader::new(stderr).lines().map_while(Result::ok) {
                            push_log_line(format!("[relay] {}", line));
                        }
                    });
                }
                if let Some(stdout) = c.stdout.take() {
                    std::thread::spawn(move || {
                        for line in std::io::BufReader::new(stdout).lines().map_while(Result::ok) {
                            push_log_line(format!("[relay] {}", line));
                        }
                    });
                }
                self.relay_process = Some(c);
            }
            Err(e) => {
                self.relay_error = Some(format!("failed to start relay: {}", e));
            }
        }
    }

    fn stop_relay(&mut self) {
        if let Some(mut child) = self.relay_process.take() {
            let _ = child.kill();
        }
        self.relay_error = None;
    }

    fn start_sign_in(&mut self) {
        if self.auth_receiver.is_some() {
            return;
        }
        if let Err(e) = self.shell.begin_auth() {
            log::warn!("{}", e);
            return;
        }
        self.spawn_auth(RelayRequest::StartOAuth);
    }

    fn start_course_fetch(&mut self) {
        self.validation_message = None;
        let token = match self.token_entry.begin() {
            Ok(t) => t,
            Err(e) => {
                self.validation_message = Some(e.to_string());
                return;
            }
        };
        let backend = BackendClient::from_config(&self.config);
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let result = block_on(backend.fetch_courses(&token))
                .unwrap_or_else(|e| Err(ApiError::Backend(e)));
            let _ = tx.send((token, result));
        });
        self.courses_receiver = Some(rx);
    }

    fn start_ask(&mut self, set: &CourseSet) {
        self.validation_message = None;
        let request = match self.submission.prepare(self.shell.session(), set) {
            Ok(r) => r,
            Err(e) => {
                self.validation_message = Some(e.to_string());
                return;
            }
        };
        let backend = BackendClient::from_config(&self.config);
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let result = block_on(backend.ask(&request)).unwrap_or_else(|e| Err(ApiError::Backend(e)));
            let _ = tx.send(result);
        });
        self.ask_receiver = Some(rx);
    }

    fn sign_out(&mut self) {
        self.shell.sign_out();
        self.token_entry = CourseTokenEntry::default();
        self.submission = QuerySubmission::default();
        self.validation_message = None;
        self.reveal = None;
    }

    fn ui_validation(&self, ui: &mut egui::Ui, backend_error: Option<&str>) {
        if let Some(msg) = self.validation_message.as_deref().or(backend_error) {
            ui.add_space(8.0);
            ui.colored_label(egui::Color32::from_rgb(200, 60, 60), msg);
        }
    }

    fn ui_login(&mut self, ui: &mut egui::Ui, error: Option<&str>) {
        ui.heading("Sign in");
        ui.add_space(Self::SCREEN_TITLE_BOTTOM_SPACING);
        ui.label("Sign in with your Google account to ask questions about your courses.");
        ui.add_space(12.0);
        let pending = self.auth_receiver.is_some();
        ui.horizontal(|ui| {
            if ui
                .add_enabled(!pending, egui::Button::new("Sign in with Google"))
                .clicked()
            {
                self.start_sign_in();
            }
            if pending {
                ui.spinner();
            }
        });
        if let Some(e) = error {
            ui.add_space(8.0);
            ui.colored_label(egui::Color32::from_rgb(200, 60, 60), format!("Sign-in failed: {}", e));
        }
        if !self.relay_responds {
            ui.add_space(8.0);
            ui.label("The relay is not running. Start it from the header first.");
        }
    }

    fn ui_course_setup(&mut self, ui: &mut egui::Ui) {
        ui.heading("Connect Canvas");
        ui.add_space(Self::SCREEN_TITLE_BOTTOM_SPACING);
        ui.label("Paste a Canvas access token (Account > Settings > New Access Token).");
        ui.add_space(8.0);
        ui.add(
            egui::TextEdit::singleline(&mut self.token_entry.token_input)
                .password(true)
                .hint_text("Canvas access token")
                .desired_width(420.0),
        );
        ui.add_space(8.0);
        ui.horizontal(|ui| {
            if ui
                .add_enabled(self.token_entry.can_submit(), egui::Button::new("Load courses"))
                .clicked()
            {
                self.start_course_fetch();
            }
            if self.token_entry.is_loading() {
                ui.spinner();
            }
        });
        let backend_error = self.token_entry.error().map(str::to_string);
        self.ui_validation(ui, backend_error.as_deref());
    }

    fn ui_main(&mut self, ui: &mut egui::Ui, set: &CourseSet) {
        ui.horizontal(|ui| {
            ui.heading("Ask a question");
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("Change Canvas token").clicked() {
                    if let Err(e) = self.shell.reset_courses() {
                        log::warn!("{}", e);
                    }
                    self.submission = QuerySubmission::default();
                }
            });
        });
        ui.add_space(Self::SCREEN_TITLE_BOTTOM_SPACING);

        let selected_text = self
            .submission
            .selected_course
            .clone()
            .unwrap_or_else(|| "Select a course".to_string());
        egui::ComboBox::from_label("Course")
            .selected_text(selected_text)
            .width(320.0)
            .show_ui(ui, |ui| {
                for course in &set.courses {
                    let label = if course.course_code.is_empty() {
                        course.name.clone()
                    } else {
                        format!("{} ({})", course.name, course.course_code)
                    };
                    ui.selectable_value(
                        &mut self.submission.selected_course,
                        Some(course.name.clone()),
                        label,
                    );
                }
            });
        ui.add_space(8.0);
        ui.add(
            egui::TextEdit::multiline(&mut self.submission.question)
                .hint_text("e.g. When is the midterm?")
                .desired_rows(QUESTION_INPUT_ROWS)
                .desired_width(f32::INFINITY),
        );
        ui.add_space(8.0);
        ui.horizontal(|ui| {
            if ui
                .add_enabled(self.submission.can_submit(), egui::Button::new("Submit"))
                .clicked()
            {
                self.start_ask(set);
            }
            if self.submission.is_in_flight() {
                ui.spinner();
            }
        });
        let backend_error = self.submission.error().map(str::to_string);
        self.ui_validation(ui, backend_error.as_deref());

        if let Some(last) = self.shell.last_result() {
            ui.add_space(Self::SCREEN_FOOTER_SPACING);
            ui.label(egui::RichText::new("Last answer").strong());
            ui.label(last);
        }
    }

    fn ui_result(&mut self, ui: &mut egui::Ui, ctx: &egui::Context, message: &str) {
        ui.heading("Answer");
        ui.add_space(Self::SCREEN_TITLE_BOTTOM_SPACING);
        let text = match &mut self.reveal {
            Some((reveal, started)) => {
                reveal.advance(started.elapsed());
                if let Some(delay) = reveal.next_delay() {
                    ctx.request_repaint_after(delay);
                }
                reveal.visible().to_string()
            }
            None => message.to_string(),
        };
        egui::ScrollArea::vertical()
            .max_height((ui.available_height() - 48.0).max(0.0))
            .show(ui, |ui| {
                ui.label(text);
            });
        ui.add_space(12.0);
        if ui.button("Back").clicked() {
            self.reveal = None;
            if let Err(e) = self.shell.back() {
                log::warn!("{}", e);
            }
        }
    }

    fn ui_logs_screen(&self, ui: &mut egui::Ui) {
        ui.add_space(24.0);
        ui.heading("Logs");
        ui.add_space(Self::SCREEN_TITLE_BOTTOM_SPACING);

        let lines: Vec<String> = log_buffer()
            .lock()
            .map(|b| b.iter().cloned().collect())
            .unwrap_or_default();

        let available = ui.available_height();
        let scroll_height = (available - Self::SCREEN_FOOTER_SPACING).max(0.0);
        egui::ScrollArea::vertical()
            .max_height(scroll_height)
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for line in &lines {
                    ui.label(
                        egui::RichText::new(line.as_str()).family(egui::FontFamily::Monospace),
                    );
                }
                if lines.is_empty() {
                    ui.label("No log output yet.");
                }
            });
        ui.add_space(Self::SCREEN_FOOTER_SPACING);
    }
}

impl eframe::App for CanvasQaApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_relay_probe();
        self.poll_auth();
        self.poll_courses();
        self.poll_ask();
        let owned = self.relay_owned();
        let running = owned || self.relay_responds;

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            egui::Frame::none()
                .inner_margin(egui::Margin::symmetric(24.0, 0.0))
                .show(ui, |ui| {
                    ui.add_space(16.0);
                    ui.horizontal(|ui| {
                        ui.heading("Canvas Q&A");
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            if owned {
                                if ui.button("Stop relay").clicked() {
                                    self.stop_relay();
                                }
                            } else if running {
                                ui.add_enabled(false, egui::Button::new("Relay running"));
                            } else if ui.button("Start relay").clicked() {
                                self.start_relay();
                            }
                            if self.shell.session().authenticated() && ui.button("Sign out").clicked() {
                                self.sign_out();
                            }
                            if let Some(e) = &self.relay_error {
                                ui.colored_label(egui::Color32::from_rgb(200, 60, 60), e.as_str());
                            }
                        });
                    });
                    ui.add_space(16.0);
                });
        });

        let view = &mut self.view;
        egui::SidePanel::left("sidebar")
            .resizable(false)
            .exact_width(140.0)
            .show(ctx, |ui| {
                egui::Frame::none()
                    .inner_margin(egui::Margin::symmetric(24.0, 0.0))
                    .show(ui, |ui| {
                        ui.add_space(24.0);
                        if ui.selectable_label(*view == View::App, "Courses").clicked() {
                            *view = View::App;
                        }
                        ui.add_space(12.0);
                        if ui.selectable_label(*view == View::Logs, "Logs").clicked() {
                            *view = View::Logs;
                        }
                    });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::Frame::none()
                .inner_margin(egui::Margin::symmetric(24.0, 0.0))
                .show(ui, |ui| {
                    if self.view == View::Logs {
                        self.ui_logs_screen(ui);
                        return;
                    }
                    ui.add_space(24.0);
                    match self.shell.screen().clone() {
                        Screen::Loading => {
                            ui.horizontal(|ui| {
                                ui.spinner();
                                ui.label("Checking sign-in...");
                            });
                        }
                        Screen::Unauthenticated { error } => self.ui_login(ui, error.as_deref()),
                        Screen::CourseSetup => self.ui_course_setup(ui),
                        Screen::Main(set) => self.ui_main(ui, &set),
                        Screen::FinalResult { message, .. } => self.ui_result(ui, ctx, &message),
                    }
                });
        });

        if self.busy() {
            ctx.request_repaint_after(Duration::from_millis(50));
        }
    }
}
