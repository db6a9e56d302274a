use ratatui::Frame;

use crate::{ui, App, AppState};

/// A UI Screen boundary: responsible for rendering one app state
pub trait Screen {
    fn render(&self, app: &App, f: &mut Frame);
}

/// Sign-in form
pub struct LoginScreen;

impl Screen for LoginScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        ui::login::render(app, f);
    }
}

/// Intro, running grid, completion and the blocked view
pub struct AssessmentScreen;

impl Screen for AssessmentScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        ui::assessment::render(app, f);
    }
}

/// Admin results and settings
pub struct DashboardScreen;

impl Screen for DashboardScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        ui::dashboard::render(app, f);
    }
}

/// Helper to construct the appropriate screen for the current state
pub fn current_screen(state: &AppState) -> Box<dyn Screen> {
    match state {
        AppState::Login => Box::new(LoginScreen),
        AppState::Assessment => Box::new(AssessmentScreen),
        AppState::Dashboard => Box::new(DashboardScreen),
    }
}
