pub mod ui;

use chrono::NaiveDate;
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{
        KeyCode, KeyEvent, KeyModifiers, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
        PushKeyboardEnhancementFlags,
    },
    execute,
    terminal::{
        disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
    tty::IsTty,
};
use dsst::{
    app_dirs::AppDirs,
    assessment::{Assessment, Completion, COUNTDOWN_INTERVAL, DEFAULT_DURATION_SECS},
    cutoff::{CutoffGate, CUTOFF_POLL_INTERVAL},
    grid::{GrowthPolicy, DEFAULT_GROWTH_THRESHOLD, DEFAULT_ROWS_PER_BATCH, MAX_ROWS_PER_BATCH},
    input::{grid_command, KeyRepeatGuard},
    logging,
    results::{export_csv, filter_by_date, SqliteResultStore, TestResult},
    runtime::{
        AppEvent, CrosstermEventSource, EventSource, FixedTicker, Runner, Scheduler, StoreWorker,
        TaskHandle, TaskKind, Ticker, TICK_RATE_MS,
    },
    scoring::{SubmitReceipt, Submission},
    session::{Role, SessionSlot, UserDirectory},
    settings::{FileSettingsStore, Settings, SettingsStore},
    Error as DsstError,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    time::{Duration, Instant},
};
use tracing::{info, warn};
use webbrowser::Browser;

use crate::ui::screen::current_screen;

/// How long the "more boxes" banner stays up after a growth cycle
const BANNER_DURATION: Duration = Duration::from_secs(2);

/// digit symbol substitution test in the terminal
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A timed Digit Symbol Substitution Test: match symbols to digits against the clock, with an admin dashboard for stored results."
)]
pub struct Cli {
    /// number of seconds the test runs for
    #[clap(short = 's', long, default_value_t = DEFAULT_DURATION_SECS, value_parser = clap::value_parser!(u32).range(1..))]
    duration_secs: u32,

    /// rows of five boxes added on each growth cycle
    #[clap(short = 'r', long, default_value_t = DEFAULT_ROWS_PER_BATCH, value_parser = parse_rows)]
    rows_per_batch: usize,

    /// fraction of the grid the focus must pass before more boxes are added
    #[clap(short = 'g', long, default_value_t = DEFAULT_GROWTH_THRESHOLD, value_parser = parse_threshold)]
    growth_threshold: f64,

    /// results database (":memory:" keeps nothing)
    #[clap(long)]
    db: Option<PathBuf>,

    /// settings file to use instead of the platform config dir
    #[clap(long)]
    settings: Option<PathBuf>,

    /// directory CSV exports are written to
    #[clap(long, default_value = ".")]
    export_dir: PathBuf,

    /// write logs to this file (DSST_LOG also enables logging)
    #[clap(long)]
    log: Option<PathBuf>,

    /// sign in as this user on startup
    #[clap(short = 'u', long, requires = "password")]
    user: Option<String>,

    /// password for --user
    #[clap(short = 'p', long, requires = "user")]
    password: Option<String>,
}

fn parse_rows(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(n) if (1..=MAX_ROWS_PER_BATCH).contains(&n) => Ok(n),
        _ => Err(format!(
            "`{s}` must be a number of rows from 1 to {MAX_ROWS_PER_BATCH}"
        )),
    }
}

fn parse_threshold(s: &str) -> Result<f64, String> {
    match s.parse::<f64>() {
        Ok(t) if t > 0.0 && t < 1.0 => Ok(t),
        _ => Err(format!("`{s}` must be a number between 0 and 1")),
    }
}

impl Cli {
    fn growth_policy(&self) -> GrowthPolicy {
        GrowthPolicy::new(self.rows_per_batch, self.growth_threshold)
    }

    fn log_path(&self) -> Option<PathBuf> {
        self.log
            .clone()
            .or_else(|| logging::enabled_by_env().then(AppDirs::log_path))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Login,
    Assessment,
    Dashboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginField {
    #[default]
    Username,
    Password,
}

#[derive(Debug, Default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub field: LoginField,
    pub error: Option<String>,
}

impl LoginForm {
    fn active_mut(&mut self) -> &mut String {
        match self.field {
            LoginField::Username => &mut self.username,
            LoginField::Password => &mut self.password,
        }
    }

    fn toggle_field(&mut self) {
        self.field = match self.field {
            LoginField::Username => LoginField::Password,
            LoginField::Password => LoginField::Username,
        };
    }
}

/// Where the current run's submission stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    Idle,
    Saving,
    Saved(i64),
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardField {
    DateFilter,
    RedirectUrl,
    CutoffTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Error(String),
}

#[derive(Debug, Default)]
pub struct DashboardState {
    pub results: Vec<TestResult>,
    pub date_filter: Option<NaiveDate>,
    pub editing: Option<DashboardField>,
    pub input: String,
    pub notice: Option<Notice>,
    pub scroll_offset: usize,
    pub loading: bool,
}

impl DashboardState {
    /// Rows matching the date filter, newest first
    pub fn visible(&self) -> Vec<TestResult> {
        filter_by_date(&self.results, self.date_filter)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct App {
    pub cli: Cli,
    pub state: AppState,
    pub session: SessionSlot,
    users: UserDirectory,
    pub assessment: Assessment,
    pub gate: CutoffGate,
    pub settings: Settings,
    settings_store: FileSettingsStore,
    scheduler: Scheduler,
    countdown: Option<TaskHandle>,
    cutoff_check: Option<TaskHandle>,
    repeat_guard: KeyRepeatGuard,
    store: StoreWorker,
    pub login: LoginForm,
    pub dashboard: DashboardState,
    pub banner_until: Option<Instant>,
    pub show_nav_help: bool,
    pub show_thank_you: bool,
    pub save_status: SaveStatus,
    pending: Option<Submission>,
    seen_growth_cycles: usize,
}

impl App {
    pub fn new(cli: Cli, store: StoreWorker, settings_store: FileSettingsStore) -> Self {
        let settings = settings_store.load();
        let gate = CutoffGate::new(settings.cutoff_time());

        Self {
            assessment: Assessment::new(cli.duration_secs, cli.growth_policy()),
            cli,
            state: AppState::Login,
            session: SessionSlot::default(),
            users: UserDirectory::builtin(),
            gate,
            settings,
            settings_store,
            scheduler: Scheduler::new(),
            countdown: None,
            cutoff_check: None,
            repeat_guard: KeyRepeatGuard::new(),
            store,
            login: LoginForm::default(),
            dashboard: DashboardState::default(),
            banner_until: None,
            show_nav_help: false,
            show_thank_you: false,
            save_status: SaveStatus::Idle,
            pending: None,
            seen_growth_cycles: 0,
        }
    }

    pub fn banner_visible(&self, now: Instant) -> bool {
        self.banner_until.is_some_and(|until| now < until)
    }

    fn handle_event(&mut self, event: AppEvent, now: Instant) -> Flow {
        match event {
            AppEvent::Key(key) => return self.on_key(key, now),
            AppEvent::Tick => self.on_tick(now),
            AppEvent::Resize => {}
            AppEvent::Submitted { run_id, outcome } => self.on_submitted(run_id, outcome),
            AppEvent::ResultsLoaded(outcome) => {
                self.dashboard.loading = false;
                match outcome {
                    Ok(results) => self.dashboard.results = results,
                    Err(e) => {
                        self.dashboard.notice =
                            Some(Notice::Error(format!("Could not load results: {e}")))
                    }
                }
            }
        }
        Flow::Continue
    }

    fn on_tick(&mut self, now: Instant) {
        for kind in self.scheduler.due(now) {
            match kind {
                TaskKind::Countdown => {
                    if let Some(completion) = self.assessment.tick(self.session.identity()) {
                        self.on_completion(completion);
                    }
                }
                TaskKind::CutoffCheck => {
                    self.gate.evaluate_now();
                }
            }
        }
        if self.banner_until.is_some_and(|until| now >= until) {
            self.banner_until = None;
        }
    }

    fn on_key(&mut self, key: KeyEvent, now: Instant) -> Flow {
        if !self.repeat_guard.accept(&key) {
            return Flow::Continue;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Flow::Quit;
        }

        match self.state {
            AppState::Login => self.on_login_key(key),
            AppState::Assessment => {
                self.on_assessment_key(key, now);
                Flow::Continue
            }
            AppState::Dashboard => {
                self.on_dashboard_key(key);
                Flow::Continue
            }
        }
    }

    fn on_login_key(&mut self, key: KeyEvent) -> Flow {
        match key.code {
            KeyCode::Esc => return Flow::Quit,
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                self.login.toggle_field()
            }
            KeyCode::Backspace => {
                self.login.active_mut().pop();
            }
            KeyCode::Enter => {
                if self.login.field == LoginField::Username && self.login.password.is_empty() {
                    self.login.field = LoginField::Password;
                } else {
                    let username = self.login.username.clone();
                    let password = self.login.password.clone();
                    // the form already shows the failure
                    let _ = self.sign_in(&username, &password);
                }
            }
            KeyCode::Char(c) => self.login.active_mut().push(c),
            _ => {}
        }
        Flow::Continue
    }

    /// Authenticate and route by role
    pub fn sign_in(&mut self, username: &str, password: &str) -> Result<(), DsstError> {
        match self.users.authenticate(username, password) {
            Ok(identity) => {
                let role = identity.role;
                self.session.sign_in(identity);
                self.login = LoginForm::default();
                match role {
                    Role::User => self.enter_assessment(),
                    Role::Admin => self.enter_dashboard(),
                }
                Ok(())
            }
            Err(e) => {
                self.login.error = Some(match &e {
                    DsstError::InvalidCredentials => "Invalid username or password".to_string(),
                    other => other.to_string(),
                });
                self.login.password.clear();
                Err(e)
            }
        }
    }

    fn sign_out(&mut self) {
        self.leave_assessment();
        if let Some(identity) = self.session.sign_out() {
            info!(user = %identity.user_id, "signed out");
        }
        self.dashboard = DashboardState::default();
        self.state = AppState::Login;
    }

    fn enter_assessment(&mut self) {
        self.state = AppState::Assessment;
        self.assessment = Assessment::new(self.cli.duration_secs, self.cli.growth_policy());
        self.seen_growth_cycles = 0;
        self.show_thank_you = false;
        self.show_nav_help = false;
        self.save_status = SaveStatus::Idle;
        self.pending = None;
        self.banner_until = None;

        self.gate.evaluate_now();
        if let Some(handle) = self.cutoff_check.take() {
            self.scheduler.cancel(handle);
        }
        self.cutoff_check = Some(self.scheduler.schedule(
            TaskKind::CutoffCheck,
            CUTOFF_POLL_INTERVAL,
            Instant::now(),
        ));
    }

    /// Tear down the assessment screen's periodic tasks
    fn leave_assessment(&mut self) {
        for handle in [self.countdown.take(), self.cutoff_check.take()]
            .into_iter()
            .flatten()
        {
            self.scheduler.cancel(handle);
        }
        self.show_nav_help = false;
        self.banner_until = None;
    }

    fn start_run(&mut self, now: Instant) {
        match self.assessment.start(&self.gate) {
            Ok(()) => {
                if let Some(handle) = self.countdown.take() {
                    self.scheduler.cancel(handle);
                }
                let handle = self
                    .scheduler
                    .schedule(TaskKind::Countdown, COUNTDOWN_INTERVAL, now);
                self.countdown = Some(handle);
                self.seen_growth_cycles = 0;
                self.show_nav_help = true;
                self.repeat_guard.clear();
            }
            Err(e) => warn!(error = %e, "run not started"),
        }
    }

    fn on_assessment_key(&mut self, key: KeyEvent, now: Instant) {
        if self.show_thank_you {
            match key.code {
                KeyCode::Char('o') => self.open_redirect(),
                KeyCode::Esc | KeyCode::Char('q') => self.sign_out(),
                _ => {}
            }
            return;
        }
        if self.gate.is_blocked() {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('q')) {
                self.sign_out();
            }
            return;
        }

        if self.assessment.is_running() {
            if self.show_nav_help {
                self.show_nav_help = false;
                return;
            }
            if key.code == KeyCode::Esc {
                self.sign_out();
                return;
            }
            let Some(command) = grid_command(&key) else {
                return;
            };
            match self.assessment.handle(command, self.session.identity()) {
                Ok(Some(completion)) => self.on_completion(completion),
                Ok(None) => {}
                Err(DsstError::NoSession) => {
                    warn!("submit without a session");
                    self.leave_assessment();
                    self.login.error = Some("Please sign in to submit".to_string());
                    self.state = AppState::Login;
                    return;
                }
                Err(e) => warn!(error = %e, "command failed"),
            }
            let cycles = self.assessment.grid().growth_cycles();
            if cycles > self.seen_growth_cycles {
                self.seen_growth_cycles = cycles;
                self.banner_until = Some(now + BANNER_DURATION);
            }
        } else if self.assessment.is_completed() {
            match key.code {
                KeyCode::Char('r') => self.retry_submission(),
                KeyCode::Esc | KeyCode::Char('q') => self.sign_out(),
                _ => {}
            }
        } else {
            match key.code {
                KeyCode::Enter | KeyCode::Char(' ') => self.start_run(now),
                KeyCode::Esc | KeyCode::Char('q') => self.sign_out(),
                _ => {}
            }
        }
    }

    fn on_completion(&mut self, completion: Completion) {
        if let Some(handle) = self.countdown.take() {
            self.scheduler.cancel(handle);
        }
        if let Some(handle) = self.cutoff_check.take() {
            self.scheduler.cancel(handle);
        }
        self.show_nav_help = false;

        match completion.submission {
            Some(submission) => {
                self.pending = Some(submission.clone());
                self.save_status = SaveStatus::Saving;
                if !self.store.submit(completion.run_id, submission) {
                    self.save_status = SaveStatus::Failed("result store is unavailable".into());
                }
            }
            None => {
                // time ran out with nobody signed in
                self.login.error = Some("Your session ended, please sign in again".to_string());
                self.sign_out();
            }
        }
    }

    fn on_submitted(&mut self, run_id: u64, outcome: Result<SubmitReceipt, String>) {
        if run_id != self.assessment.run_id() || self.save_status != SaveStatus::Saving {
            return;
        }
        match outcome {
            Ok(receipt) => {
                info!(run_id, id = receipt.id, "result saved");
                self.pending = None;
                self.save_status = SaveStatus::Saved(receipt.id);
                self.show_thank_you = true;
            }
            Err(e) => self.save_status = SaveStatus::Failed(e),
        }
    }

    fn retry_submission(&mut self) {
        if !matches!(self.save_status, SaveStatus::Failed(_)) {
            return;
        }
        if let Some(submission) = self.pending.clone() {
            info!(run_id = self.assessment.run_id(), "retrying submission");
            self.save_status = SaveStatus::Saving;
            if !self.store.submit(self.assessment.run_id(), submission) {
                self.save_status = SaveStatus::Failed("result store is unavailable".into());
            }
        }
    }

    fn open_redirect(&self) {
        let url = self.settings.redirect_url();
        if Browser::is_available() {
            if let Err(e) = webbrowser::open(url) {
                warn!(url, error = %e, "could not open browser");
            }
        }
    }

    fn enter_dashboard(&mut self) {
        self.state = AppState::Dashboard;
        self.dashboard = DashboardState::default();
        self.refresh_results();
    }

    fn refresh_results(&mut self) {
        self.dashboard.loading = self.store.fetch();
        if !self.dashboard.loading {
            self.dashboard.notice = Some(Notice::Error("Result store is unavailable".into()));
        }
    }

    fn on_dashboard_key(&mut self, key: KeyEvent) {
        if let Some(field) = self.dashboard.editing {
            match key.code {
                KeyCode::Esc => {
                    self.dashboard.editing = None;
                    self.dashboard.input.clear();
                }
                KeyCode::Enter => self.commit_edit(field),
                KeyCode::Backspace => {
                    self.dashboard.input.pop();
                }
                KeyCode::Char(c) => self.dashboard.input.push(c),
                _ => {}
            }
            return;
        }

        let rows = self.dashboard.visible().len();
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => self.sign_out(),
            KeyCode::Char('f') => {
                let current = self
                    .dashboard
                    .date_filter
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_default();
                self.begin_edit(DashboardField::DateFilter, current);
            }
            KeyCode::Char('c') => {
                self.dashboard.date_filter = None;
                self.dashboard.scroll_offset = 0;
            }
            KeyCode::Char('u') => {
                let current = self.settings.redirect_url().to_string();
                self.begin_edit(DashboardField::RedirectUrl, current);
            }
            KeyCode::Char('t') => {
                let current = self.settings.cutoff_time_str().to_string();
                self.begin_edit(DashboardField::CutoffTime, current);
            }
            KeyCode::Char('e') => self.export_results(),
            KeyCode::Char('l') => self.refresh_results(),
            KeyCode::Up => {
                self.dashboard.scroll_offset = self.dashboard.scroll_offset.saturating_sub(1)
            }
            KeyCode::Down => {
                if self.dashboard.scroll_offset + 1 < rows {
                    self.dashboard.scroll_offset += 1;
                }
            }
            KeyCode::Home => self.dashboard.scroll_offset = 0,
            _ => {}
        }
    }

    fn begin_edit(&mut self, field: DashboardField, current: String) {
        self.dashboard.editing = Some(field);
        self.dashboard.input = current;
        self.dashboard.notice = None;
    }

    fn commit_edit(&mut self, field: DashboardField) {
        let input = self.dashboard.input.trim().to_string();
        let outcome = match field {
            DashboardField::DateFilter => {
                if input.is_empty() {
                    self.dashboard.date_filter = None;
                    Ok(None)
                } else {
                    match NaiveDate::parse_from_str(&input, "%Y-%m-%d") {
                        Ok(date) => {
                            self.dashboard.date_filter = Some(date);
                            Ok(None)
                        }
                        Err(_) => Err(DsstError::InvalidInput(
                            "Please enter a date as YYYY-MM-DD".into(),
                        )),
                    }
                }
            }
            DashboardField::RedirectUrl => self
                .save_setting(|s| s.set_redirect_url(&input))
                .map(|()| Some("Redirect URL saved".to_string())),
            DashboardField::CutoffTime => self
                .save_setting(|s| s.set_cutoff_time(&input))
                .map(|()| {
                    self.gate = CutoffGate::new(self.settings.cutoff_time());
                    self.gate.evaluate_now();
                    Some("Cutoff time saved".to_string())
                }),
        };

        match outcome {
            Ok(message) => {
                self.dashboard.editing = None;
                self.dashboard.input.clear();
                self.dashboard.scroll_offset = 0;
                self.dashboard.notice = message.map(Notice::Info);
            }
            Err(e) => self.dashboard.notice = Some(Notice::Error(e.to_string())),
        }
    }

    /// Apply an edit to a copy and persist it; on any failure the current
    /// settings stay as they were
    fn save_setting<F>(&mut self, edit: F) -> Result<(), DsstError>
    where
        F: FnOnce(&mut Settings) -> Result<(), DsstError>,
    {
        let mut updated = self.settings.clone();
        edit(&mut updated)?;
        self.settings_store.save(&updated)?;
        self.settings = updated;
        Ok(())
    }

    fn export_results(&mut self) {
        let rows = self.dashboard.visible();
        self.dashboard.notice = Some(
            match export_csv(&rows, &self.cli.export_dir, self.dashboard.date_filter) {
                Ok(path) => Notice::Info(format!(
                    "Exported {} results to {}",
                    rows.len(),
                    path.display()
                )),
                Err(e) => Notice::Error(format!("Export failed: {e}")),
            },
        );
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    if let Some(path) = cli.log_path() {
        logging::init_file_logging(&path)?;
    }

    let store = match &cli.db {
        Some(path) => SqliteResultStore::open(path)?,
        None => SqliteResultStore::open_default()?,
    };
    let settings_store = match &cli.settings {
        Some(path) => FileSettingsStore::with_path(path),
        None => FileSettingsStore::new(),
    };

    let events = CrosstermEventSource::new();
    let worker = StoreWorker::spawn(store, events.sender());
    let runner = Runner::new(events, FixedTicker::new(Duration::from_millis(TICK_RATE_MS)));

    let mut app = App::new(cli.clone(), worker, settings_store);
    if let (Some(user), Some(password)) = (&cli.user, &cli.password) {
        if let Err(e) = app.sign_in(user, password) {
            warn!(error = %e, "startup sign-in failed");
        }
    }

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let enhanced = supports_keyboard_enhancement().unwrap_or(false);
    if enhanced {
        execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        )?;
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let outcome = start_tui(&mut terminal, &mut app, &runner);

    if enhanced {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)?;
    }
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    outcome
}

fn start_tui<B: Backend, E: EventSource, T: Ticker>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<E, T>,
) -> Result<(), Box<dyn Error>> {
    loop {
        terminal.draw(|f| ui(app, f))?;

        let event = runner.step();
        if app.handle_event(event, Instant::now()) == Flow::Quit {
            break;
        }
    }
    Ok(())
}

fn ui(app: &App, f: &mut Frame) {
    current_screen(&app.state).render(app, f);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use crossterm::event::{KeyEventKind, KeyEventState};
    use dsst::runtime::TestEventSource;
    use ratatui::{backend::TestBackend, buffer::Buffer, style::Modifier, Terminal};
    use std::sync::mpsc::{self, Receiver};
    use tempfile::{tempdir, TempDir};

    struct Harness {
        app: App,
        rx: Receiver<AppEvent>,
        dir: TempDir,
    }

    fn harness(args: &[&str]) -> Harness {
        let dir = tempdir().unwrap();
        let export = dir.path().join("exports");
        let mut argv = vec!["dsst", "--export-dir", export.to_str().unwrap()];
        argv.extend_from_slice(args);
        let cli = Cli::parse_from(argv);

        let (tx, rx) = mpsc::channel();
        let worker = StoreWorker::spawn(SqliteResultStore::open_in_memory().unwrap(), tx);
        let settings = FileSettingsStore::with_path(dir.path().join("settings.json"));
        Harness {
            app: App::new(cli, worker, settings),
            rx,
            dir,
        }
    }

    fn press(app: &mut App, code: KeyCode) -> Flow {
        app.handle_event(
            AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE)),
            Instant::now(),
        )
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    /// Wait for the worker's reply and feed it back to the app
    fn pump(h: &mut Harness) {
        let event = h.rx.recv_timeout(Duration::from_secs(5)).unwrap();
        h.app.handle_event(event, Instant::now());
    }

    fn render_buffer(app: &App) -> Buffer {
        let backend = TestBackend::new(100, 40);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|f| ui(app, f)).unwrap();
        terminal.backend().buffer().clone()
    }

    fn render(app: &App) -> String {
        render_buffer(app)
            .content
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    fn start_as_user(h: &mut Harness) {
        h.app.sign_in("user", "sleepisgood").unwrap();
        // run may be blocked if the suite runs inside the last minute of the day
        h.app.gate = CutoffGate::new(dsst::cutoff::CutoffTime::new(23, 59).unwrap());
        press(&mut h.app, KeyCode::Enter);
        // dismiss the navigation help
        press(&mut h.app, KeyCode::Char('x'));
    }

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::parse_from(["dsst"]);
        assert_eq!(cli.duration_secs, 90);
        assert_eq!(cli.rows_per_batch, 20);
        assert_eq!(cli.growth_threshold, 0.7);
        assert_eq!(cli.growth_policy().batch_size, 100);
        assert_eq!(cli.db, None);
        assert_eq!(cli.export_dir, PathBuf::from("."));
        assert_eq!(cli.user, None);
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "dsst",
            "-s",
            "30",
            "--rows-per-batch",
            "4",
            "--growth-threshold",
            "0.5",
            "--db",
            ":memory:",
        ]);
        assert_eq!(cli.duration_secs, 30);
        assert_eq!(cli.growth_policy().batch_size, 20);
        assert_eq!(cli.growth_threshold, 0.5);
        assert_eq!(cli.db, Some(PathBuf::from(":memory:")));
    }

    #[test]
    fn test_cli_rejects_bad_values() {
        assert!(Cli::try_parse_from(["dsst", "--growth-threshold", "1.5"]).is_err());
        assert!(Cli::try_parse_from(["dsst", "--growth-threshold", "0"]).is_err());
        assert!(Cli::try_parse_from(["dsst", "--rows-per-batch", "0"]).is_err());
        assert!(Cli::try_parse_from(["dsst", "--rows-per-batch", "1001"]).is_err());
        assert!(
            Cli::try_parse_from(["dsst", "--rows-per-batch", "18446744073709551615"]).is_err()
        );
        assert!(Cli::try_parse_from(["dsst", "--rows-per-batch", "1000"]).is_ok());
        assert!(Cli::try_parse_from(["dsst", "--duration-secs", "0"]).is_err());
        assert!(Cli::try_parse_from(["dsst", "--user", "user"]).is_err());
    }

    #[test]
    fn test_login_routes_by_role() {
        let mut h = harness(&[]);
        h.app.sign_in("user", "sleepisgood").unwrap();
        assert_eq!(h.app.state, AppState::Assessment);
        assert!(!h.app.assessment.is_running());

        press(&mut h.app, KeyCode::Esc);
        assert_eq!(h.app.state, AppState::Login);
        assert!(h.app.session.identity().is_none());

        h.app.sign_in("admin", "sleepisgood").unwrap();
        assert_eq!(h.app.state, AppState::Dashboard);
        assert!(h.app.dashboard.loading);
        pump(&mut h);
        assert!(!h.app.dashboard.loading);
    }

    #[test]
    fn test_login_form_typing() {
        let mut h = harness(&[]);
        type_text(&mut h.app, "user");
        press(&mut h.app, KeyCode::Enter);
        assert_eq!(h.app.login.field, LoginField::Password);
        type_text(&mut h.app, "wrong");
        press(&mut h.app, KeyCode::Enter);
        assert_eq!(h.app.state, AppState::Login);
        assert_eq!(
            h.app.login.error.as_deref(),
            Some("Invalid username or password")
        );
        assert!(h.app.login.password.is_empty());

        type_text(&mut h.app, "sleepisgood");
        press(&mut h.app, KeyCode::Enter);
        assert_eq!(h.app.state, AppState::Assessment);
        assert!(h.app.login.username.is_empty());
    }

    #[test]
    fn test_login_empty_fields() {
        let mut h = harness(&[]);
        assert!(h.app.sign_in("", "").is_err());
        assert_eq!(
            h.app.login.error.as_deref(),
            Some("Please enter both username and password")
        );
    }

    #[test]
    fn test_escape_on_login_quits() {
        let mut h = harness(&[]);
        assert_eq!(press(&mut h.app, KeyCode::Esc), Flow::Quit);
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(
            h.app.handle_event(AppEvent::Key(ctrl_c), Instant::now()),
            Flow::Quit
        );
    }

    #[test]
    fn test_nav_help_consumes_first_key() {
        let mut h = harness(&[]);
        h.app.sign_in("user", "sleepisgood").unwrap();
        h.app.gate = CutoffGate::new(dsst::cutoff::CutoffTime::new(23, 59).unwrap());
        press(&mut h.app, KeyCode::Enter);
        assert!(h.app.assessment.is_running());
        assert!(h.app.show_nav_help);

        press(&mut h.app, KeyCode::Char('5'));
        assert!(!h.app.show_nav_help);
        assert_eq!(h.app.assessment.total_attempted(), 0);

        press(&mut h.app, KeyCode::Char('5'));
        assert_eq!(h.app.assessment.total_attempted(), 1);
    }

    #[test]
    fn test_repeat_events_do_not_write() {
        let mut h = harness(&[]);
        start_as_user(&mut h);
        let repeat = KeyEvent {
            code: KeyCode::Right,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Repeat,
            state: KeyEventState::NONE,
        };
        h.app.handle_event(AppEvent::Key(repeat), Instant::now());
        assert_eq!(h.app.assessment.grid().focus(), 0);
    }

    #[test]
    fn test_submit_saves_and_thanks() {
        let mut h = harness(&[]);
        start_as_user(&mut h);
        press(&mut h.app, KeyCode::Char('3'));
        press(&mut h.app, KeyCode::Enter);
        assert!(h.app.assessment.is_completed());
        assert_eq!(h.app.save_status, SaveStatus::Saving);

        pump(&mut h);
        assert_matches::assert_matches!(h.app.save_status, SaveStatus::Saved(_));
        assert!(h.app.show_thank_you);
        assert!(render(&h.app).contains("Thank You!"));

        press(&mut h.app, KeyCode::Char('q'));
        assert_eq!(h.app.state, AppState::Login);
    }

    #[test]
    fn test_completed_view_keeps_frozen_grid() {
        let mut h = harness(&[]);
        start_as_user(&mut h);
        press(&mut h.app, KeyCode::Char('3'));
        press(&mut h.app, KeyCode::Enter);
        assert!(h.app.assessment.grid().is_frozen());
        let blank = h.app.assessment.grid().active().len();
        assert_eq!(blank, 99);

        let buffer = render_buffer(&h.app);
        let screen: String = buffer.content.iter().map(|c| c.symbol()).collect();
        assert!(screen.contains("Test Completed!"));
        assert!(screen.contains("Score: "));
        let dimmed_boxes = buffer
            .content
            .iter()
            .filter(|c| c.symbol() == "[" && c.modifier.contains(Modifier::DIM))
            .count();
        assert!(dimmed_boxes >= dsst::grid::ROW_WIDTH);

        // frozen boxes ignore input
        press(&mut h.app, KeyCode::Char('7'));
        assert_eq!(h.app.assessment.total_attempted(), 1);
    }

    #[test]
    fn test_failed_submission_can_be_retried() {
        let mut h = harness(&[]);
        start_as_user(&mut h);
        press(&mut h.app, KeyCode::Enter);
        let run_id = h.app.assessment.run_id();
        // drop the real acknowledgement and report a failure instead
        h.rx.recv_timeout(Duration::from_secs(5)).unwrap();
        h.app.handle_event(
            AppEvent::Submitted {
                run_id,
                outcome: Err("disk full".into()),
            },
            Instant::now(),
        );
        assert_eq!(h.app.save_status, SaveStatus::Failed("disk full".into()));
        assert!(render(&h.app).contains("Result could not be saved"));

        press(&mut h.app, KeyCode::Char('r'));
        assert_eq!(h.app.save_status, SaveStatus::Saving);
        pump(&mut h);
        assert_matches::assert_matches!(h.app.save_status, SaveStatus::Saved(_));

        // nothing left to retry once acknowledged
        press(&mut h.app, KeyCode::Char('r'));
        assert!(h.rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_stale_acknowledgement_is_ignored() {
        let mut h = harness(&[]);
        start_as_user(&mut h);
        h.app.handle_event(
            AppEvent::Submitted {
                run_id: 99,
                outcome: Ok(SubmitReceipt { success: true, id: 1 }),
            },
            Instant::now(),
        );
        assert_eq!(h.app.save_status, SaveStatus::Idle);
        assert!(!h.app.show_thank_you);
    }

    #[test]
    fn test_countdown_times_out() {
        let mut h = harness(&["--duration-secs", "3"]);
        h.app.sign_in("user", "sleepisgood").unwrap();
        h.app.gate = CutoffGate::new(dsst::cutoff::CutoffTime::new(23, 59).unwrap());
        let t0 = Instant::now();
        h.app
            .handle_event(AppEvent::Key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)), t0);

        h.app.handle_event(AppEvent::Tick, t0 + Duration::from_secs(2));
        assert!(h.app.assessment.is_running());
        assert_eq!(h.app.assessment.time_left(), 1);

        h.app.handle_event(AppEvent::Tick, t0 + Duration::from_secs(3));
        assert!(h.app.assessment.is_completed());
        assert_eq!(h.app.save_status, SaveStatus::Saving);
        let completion = h.app.assessment.completion().unwrap();
        assert_eq!(completion.time_spent_secs, 3);

        h.app.handle_event(AppEvent::Tick, t0 + Duration::from_secs(10));
        assert!(h.app.scheduler.is_empty());
    }

    #[test]
    fn test_timeout_without_session_returns_to_login() {
        let mut h = harness(&["--duration-secs", "1"]);
        h.app.sign_in("user", "sleepisgood").unwrap();
        h.app.gate = CutoffGate::new(dsst::cutoff::CutoffTime::new(23, 59).unwrap());
        let t0 = Instant::now();
        h.app
            .handle_event(AppEvent::Key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)), t0);
        h.app.session.sign_out();

        h.app.handle_event(AppEvent::Tick, t0 + Duration::from_secs(1));
        assert_eq!(h.app.state, AppState::Login);
        assert!(h.app.login.error.is_some());
        assert!(h.rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_growth_shows_banner() {
        let mut h = harness(&["--rows-per-batch", "2"]);
        start_as_user(&mut h);
        let now = Instant::now();
        press(&mut h.app, KeyCode::Down);
        press(&mut h.app, KeyCode::Right);
        press(&mut h.app, KeyCode::Left);
        press(&mut h.app, KeyCode::Right);
        assert!(h.app.banner_until.is_none());
        press(&mut h.app, KeyCode::Right);
        assert!(h.app.banner_visible(Instant::now()));
        assert!(render(&h.app).contains("More symbol boxes have been added!"));

        h.app.handle_event(AppEvent::Tick, now + Duration::from_secs(5));
        assert!(h.app.banner_until.is_none());
    }

    #[test]
    fn test_cutoff_check_blocks_open_screen() {
        let mut h = harness(&[]);
        h.app.sign_in("user", "sleepisgood").unwrap();
        // midnight has always passed by the time the check runs
        h.app.gate = CutoffGate::new(dsst::cutoff::CutoffTime::new(0, 0).unwrap());
        assert!(!h.app.gate.is_blocked());
        assert!(!h.app.scheduler.is_empty());

        h.app.handle_event(
            AppEvent::Tick,
            Instant::now() + CUTOFF_POLL_INTERVAL + Duration::from_secs(1),
        );
        assert!(h.app.gate.is_blocked());
        assert!(render(&h.app).contains("Assessment Unavailable"));

        press(&mut h.app, KeyCode::Enter);
        assert!(!h.app.assessment.is_running());
        press(&mut h.app, KeyCode::Esc);
        assert_eq!(h.app.state, AppState::Login);
        assert!(h.app.scheduler.is_empty());
    }

    #[test]
    fn test_leaving_assessment_cancels_tasks() {
        let mut h = harness(&[]);
        h.app.sign_in("user", "sleepisgood").unwrap();
        assert!(h.app.cutoff_check.is_some());
        press(&mut h.app, KeyCode::Esc);
        assert_eq!(h.app.state, AppState::Login);
        assert!(h.app.scheduler.is_empty());

        start_as_user(&mut h);
        assert!(h.app.countdown.is_some());
        press(&mut h.app, KeyCode::Esc);
        assert_eq!(h.app.state, AppState::Login);
        assert!(h.app.countdown.is_none());
        assert!(h.app.cutoff_check.is_none());
        assert!(h.app.scheduler.is_empty());

        // no stray countdown fires after leaving
        h.app
            .handle_event(AppEvent::Tick, Instant::now() + Duration::from_secs(120));
        assert!(h.rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_blocked_assessment_cannot_start() {
        let mut h = harness(&[]);
        h.app.sign_in("user", "sleepisgood").unwrap();
        let mut gate = CutoffGate::new("09:00".parse().unwrap());
        let late = chrono::NaiveDate::from_ymd_opt(2025, 3, 24)
            .unwrap()
            .and_hms_opt(9, 1, 0)
            .unwrap()
            .and_utc();
        gate.evaluate(&late);
        h.app.gate = gate;

        press(&mut h.app, KeyCode::Enter);
        assert!(!h.app.assessment.is_running());
        let screen = render(&h.app);
        assert!(screen.contains("Assessment Unavailable"));
        assert!(screen.contains("09:00"));
    }

    #[test]
    fn test_dashboard_lists_saved_results() {
        let mut h = harness(&[]);
        start_as_user(&mut h);
        press(&mut h.app, KeyCode::Enter);
        pump(&mut h);
        press(&mut h.app, KeyCode::Char('q'));

        h.app.sign_in("admin", "sleepisgood").unwrap();
        pump(&mut h);
        assert_eq!(h.app.dashboard.results.len(), 1);
        assert_eq!(h.app.dashboard.results[0].user_id, "USR001");
        assert!(render(&h.app).contains("USR001"));
    }

    #[test]
    fn test_dashboard_summary_statistics() {
        let mut h = harness(&[]);
        h.app.sign_in("admin", "sleepisgood").unwrap();
        pump(&mut h);
        let empty = render(&h.app);
        assert!(empty.contains("Summary Statistics"));
        assert!(empty.contains("Average Score: 0.0"));
        assert!(empty.contains("Total Tests: 0"));

        h.app.dashboard.results = [(1, 12, 90), (2, 17, 61)]
            .into_iter()
            .map(|(id, score, secs)| TestResult {
                id,
                user_id: "USR001".into(),
                date: NaiveDate::from_ymd_opt(2025, 3, 24).unwrap(),
                score,
                time_spent_secs: secs,
            })
            .collect();
        let screen = render(&h.app);
        assert!(screen.contains("Average Score: 14.5"));
        assert!(screen.contains("Average Time (sec): 75.5"));
        assert!(screen.contains("Total Tests: 2"));
    }

    #[test]
    fn test_dashboard_date_filter_and_export() {
        let mut h = harness(&[]);
        h.app.sign_in("admin", "sleepisgood").unwrap();
        pump(&mut h);

        press(&mut h.app, KeyCode::Char('f'));
        type_text(&mut h.app, "2025-13-01");
        press(&mut h.app, KeyCode::Enter);
        assert_matches::assert_matches!(h.app.dashboard.notice, Some(Notice::Error(_)));
        assert_eq!(h.app.dashboard.editing, Some(DashboardField::DateFilter));

        h.app.dashboard.input.clear();
        type_text(&mut h.app, "2025-03-24");
        press(&mut h.app, KeyCode::Enter);
        assert_eq!(
            h.app.dashboard.date_filter,
            NaiveDate::from_ymd_opt(2025, 3, 24)
        );
        assert_eq!(h.app.dashboard.editing, None);

        press(&mut h.app, KeyCode::Char('e'));
        let exported = h.dir.path().join("exports").join("dsst_results_2025-03-24.csv");
        assert!(exported.exists());
        assert_eq!(
            std::fs::read_to_string(exported).unwrap(),
            "ID,User ID,Date,Score,Time Spent (sec)\n"
        );

        press(&mut h.app, KeyCode::Char('c'));
        assert_eq!(h.app.dashboard.date_filter, None);
        press(&mut h.app, KeyCode::Char('e'));
        assert!(h.dir.path().join("exports").join("dsst_results_all.csv").exists());
    }

    #[test]
    fn test_dashboard_settings_editing() {
        let mut h = harness(&[]);
        h.app.sign_in("admin", "sleepisgood").unwrap();

        press(&mut h.app, KeyCode::Char('u'));
        h.app.dashboard.input.clear();
        type_text(&mut h.app, "example.org/visit");
        press(&mut h.app, KeyCode::Enter);
        assert_eq!(h.app.settings.redirect_url(), "https://example.org/visit");
        assert_eq!(
            h.app.dashboard.notice,
            Some(Notice::Info("Redirect URL saved".into()))
        );

        press(&mut h.app, KeyCode::Char('t'));
        h.app.dashboard.input.clear();
        type_text(&mut h.app, "25:00");
        press(&mut h.app, KeyCode::Enter);
        assert_matches::assert_matches!(h.app.dashboard.notice, Some(Notice::Error(_)));
        assert_eq!(h.app.settings.cutoff_time_str(), "23:59");

        press(&mut h.app, KeyCode::Esc);
        assert_eq!(h.app.dashboard.editing, None);
        assert_eq!(h.app.state, AppState::Dashboard);

        press(&mut h.app, KeyCode::Char('t'));
        h.app.dashboard.input.clear();
        type_text(&mut h.app, "9:30");
        press(&mut h.app, KeyCode::Enter);
        assert_eq!(h.app.settings.cutoff_time_str(), "09:30");
        assert_eq!(h.app.gate.cutoff().to_string(), "09:30");

        let reloaded = FileSettingsStore::with_path(h.dir.path().join("settings.json")).load();
        assert_eq!(reloaded.redirect_url(), "https://example.org/visit");
        assert_eq!(reloaded.cutoff_time_str(), "09:30");
    }

    #[test]
    fn test_ui_login_screen() {
        let h = harness(&[]);
        let screen = render(&h.app);
        assert!(screen.contains("DSST Login"));
        assert!(screen.contains("Username"));
    }

    #[test]
    fn test_ui_running_screen() {
        let mut h = harness(&[]);
        start_as_user(&mut h);
        let screen = render(&h.app);
        assert!(screen.contains("Time Left: 1:30"));
        assert!(screen.contains("Completed: 0"));
        assert!(screen.contains("Symbol Key"));
    }

    #[test]
    fn test_ui_intro_and_help() {
        let mut h = harness(&[]);
        h.app.sign_in("user", "sleepisgood").unwrap();
        h.app.gate = CutoffGate::new(dsst::cutoff::CutoffTime::new(23, 59).unwrap());
        assert!(render(&h.app).contains("Digit Symbol Substitution Test"));
        press(&mut h.app, KeyCode::Enter);
        assert!(render(&h.app).contains("Keyboard Navigation"));
    }

    #[test]
    fn test_runner_drives_app() {
        let mut h = harness(&[]);
        let (tx, rx) = mpsc::channel();
        let runner = Runner::new(
            TestEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(1)),
        );
        tx.send(AppEvent::Key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)))
            .unwrap();

        let backend = TestBackend::new(80, 24);
        let mut terminal = Terminal::new(backend).unwrap();
        start_tui(&mut terminal, &mut h.app, &runner).unwrap();
        assert_eq!(h.app.state, AppState::Login);
    }
}
