//! Application shell: which screen is showing, driven by auth and course-loading events.

use crate::identity::AuthError;
use crate::storage::{CourseSet, LocalStorage, StorageError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthStatus {
    #[default]
    Idle,
    Pending,
    Success,
    Failed,
}

/// Sign-in state for this run of the app. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub auth_status: AuthStatus,
    pub bearer_token: Option<String>,
}

impl Session {
    pub fn authenticated(&self) -> bool {
        self.auth_status == AuthStatus::Success && self.bearer_token.is_some()
    }
}

/// The five screens. Course data only exists on the screens that can use it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    /// Startup auth check in flight.
    Loading,
    /// Login screen; `error` is the last interactive sign-in failure.
    Unauthenticated { error: Option<String> },
    /// Signed in, waiting for the Canvas token to be pasted.
    CourseSetup,
    /// Query screen.
    Main(CourseSet),
    /// Typed-out answer.
    FinalResult { courses: CourseSet, message: String },
}

impl Screen {
    pub fn name(&self) -> &'static str {
        match self {
            Screen::Loading => "loading",
            Screen::Unauthenticated { .. } => "login",
            Screen::CourseSetup => "course setup",
            Screen::Main(_) => "main",
            Screen::FinalResult { .. } => "result",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("cannot {action} from the {from} screen")]
    InvalidTransition {
        from: &'static str,
        action: &'static str,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub struct AppShell {
    session: Session,
    screen: Screen,
    storage: LocalStorage,
    /// Last answer shown; kept when going back to the query screen.
    last_result: Option<String>,
}

impl AppShell {
    /// Start in Loading; the caller runs the startup auth check and reports it via `auth_check_completed`.
    pub fn new(storage: LocalStorage) -> Self {
        Self {
            session: Session {
                auth_status: AuthStatus::Pending,
                bearer_token: None,
            },
            screen: Screen::Loading,
            storage,
            last_result: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn last_result(&self) -> Option<&str> {
        self.last_result.as_deref()
    }

    pub fn is_checking_auth(&self) -> bool {
        matches!(self.screen, Screen::Loading)
    }

    fn invalid(&self, action: &'static str) -> ShellError {
        log::warn!("ui: cannot {} from {}", action, self.screen.name());
        ShellError::InvalidTransition {
            from: self.screen.name(),
            action,
        }
    }

    /// Screen for a freshly authenticated session: persisted courses skip straight to Main.
    fn authenticated_screen(&self) -> Screen {
        match self.storage.load_course_set() {
            Some(set) => {
                log::info!("ui: restored {} course(s) from storage", set.courses.len());
                Screen::Main(set)
            }
            None => Screen::CourseSetup,
        }
    }

    fn set_authenticated(&mut self, token: String) {
        self.session = Session {
            auth_status: AuthStatus::Success,
            bearer_token: Some(token),
        };
        self.screen = self.authenticated_screen();
    }

    /// Result of the silent startup check (cached token or none). No error is shown for a miss.
    pub fn auth_check_completed(&mut self, token: Option<String>) -> Result<(), ShellError> {
        if !matches!(self.screen, Screen::Loading) {
            return Err(self.invalid("finish the startup auth check"));
        }
        match token {
            Some(t) => self.set_authenticated(t),
            None => {
                self.session = Session::default();
                self.screen = Screen::Unauthenticated { error: None };
            }
        }
        Ok(())
    }

    /// An interactive sign-in was started from the login screen.
    pub fn begin_auth(&mut self) -> Result<(), ShellError> {
        if !matches!(self.screen, Screen::Unauthenticated { .. }) {
            return Err(self.invalid("sign in"));
        }
        self.session.auth_status = AuthStatus::Pending;
        Ok(())
    }

    /// Result of an interactive sign-in.
    pub fn auth_completed(&mut self, result: Result<String, AuthError>) -> Result<(), ShellError> {
        if !matches!(self.screen, Screen::Loading | Screen::Unauthenticated { .. }) {
            return Err(self.invalid("complete sign-in"));
        }
        match result {
            Ok(token) => self.set_authenticated(token),
            Err(e) => {
                log::error!("sign-in failed: {}", e);
                self.session = Session {
                    auth_status: AuthStatus::Failed,
                    bearer_token: None,
                };
                self.screen = Screen::Unauthenticated {
                    error: Some(e.to_string()),
                };
            }
        }
        Ok(())
    }

    /// Back to the login screen. In-memory courses are dropped; persisted ones stay for next sign-in.
    pub fn sign_out(&mut self) {
        self.session = Session::default();
        self.screen = Screen::Unauthenticated { error: None };
        self.last_result = None;
    }

    /// Courses fetched on the setup screen: persist them with the token and go to Main.
    pub fn courses_loaded(&mut self, set: CourseSet) -> Result<(), ShellError> {
        if !matches!(self.screen, Screen::CourseSetup) {
            return Err(self.invalid("load courses"));
        }
        self.storage.save_course_set(&set)?;
        log::info!("ui: saved {} course(s)", set.courses.len());
        self.screen = Screen::Main(set);
        Ok(())
    }

    /// Forget the stored Canvas token and courses and return to the setup screen.
    pub fn reset_courses(&mut self) -> Result<(), ShellError> {
        if !matches!(self.screen, Screen::Main(_)) {
            return Err(self.invalid("change the Canvas token"));
        }
        self.storage.clear_course_set()?;
        self.screen = Screen::CourseSetup;
        Ok(())
    }

    /// An answer arrived on the query screen.
    pub fn show_result(&mut self, message: String) -> Result<(), ShellError> {
        let Screen::Main(set) = &self.screen else {
            return Err(self.invalid("show a result"));
        };
        let courses = set.clone();
        self.last_result = Some(message.clone());
        self.screen = Screen::FinalResult { courses, message };
        Ok(())
    }

    /// From the result screen back to Main; the last result is kept.
    pub fn back(&mut self) -> Result<(), ShellError> {
        let Screen::FinalResult { courses, .. } = &self.screen else {
            return Err(self.invalid("go back"));
        };
        self.screen = Screen::Main(courses.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Course;
    use std::path::PathBuf;

    fn temp_storage() -> (LocalStorage, PathBuf) {
        let path = std::env::temp_dir()
            .join(format!("canvasqa-shell-{}", uuid::Uuid::new_v4()))
            .join("storage.json");
        (LocalStorage::load(&path), path)
    }

    fn intro_cs() -> CourseSet {
        CourseSet {
            courses: vec![Course {
                id: "1".into(),
                name: "Intro CS".into(),
                course_code: "CS101".into(),
            }],
            course_token: "canvas-tok".into(),
        }
    }

    #[test]
    fn starts_loading() {
        let (storage, _) = temp_storage();
        let shell = AppShell::new(storage);
        assert!(shell.is_checking_auth());
        assert!(!shell.session().authenticated());
    }

    #[test]
    fn full_flow_and_restore_on_reload() {
        let (storage, path) = temp_storage();
        let mut shell = AppShell::new(storage);
        shell.auth_check_completed(None).unwrap();
        assert_eq!(shell.screen(), &Screen::Unauthenticated { error: None });

        shell.begin_auth().unwrap();
        assert_eq!(shell.session().auth_status, AuthStatus::Pending);
        shell.auth_completed(Ok("google".into())).unwrap();
        assert_eq!(shell.screen(), &Screen::CourseSetup);

        shell.courses_loaded(intro_cs()).unwrap();
        assert_eq!(shell.screen(), &Screen::Main(intro_cs()));

        // Reload with the same (cached) sign-in: straight to Main, no token prompt.
        let mut reloaded = AppShell::new(LocalStorage::load(&path));
        reloaded.auth_check_completed(Some("google".into())).unwrap();
        assert_eq!(reloaded.screen(), &Screen::Main(intro_cs()));
    }

    #[test]
    fn failed_sign_in_stays_unauthenticated() {
        let (storage, _) = temp_storage();
        let mut shell = AppShell::new(storage);
        shell.auth_check_completed(None).unwrap();
        shell.begin_auth().unwrap();
        shell
            .auth_completed(Err(AuthError::Platform("The user did not approve access.".into())))
            .unwrap();
        assert!(!shell.session().authenticated());
        assert_eq!(shell.session().auth_status, AuthStatus::Failed);
        assert_eq!(
            shell.screen(),
            &Screen::Unauthenticated {
                error: Some("The user did not approve access.".into())
            }
        );
    }

    #[test]
    fn result_and_back_keep_message() {
        let (mut storage, _) = temp_storage();
        storage.save_course_set(&intro_cs()).unwrap();
        let mut shell = AppShell::new(storage);
        shell.auth_check_completed(Some("g".into())).unwrap();
        shell.show_result("The midterm is on Friday.".into()).unwrap();
        assert!(matches!(shell.screen(), Screen::FinalResult { message, .. } if message == "The midterm is on Friday."));
        shell.back().unwrap();
        assert_eq!(shell.screen(), &Screen::Main(intro_cs()));
        assert_eq!(shell.last_result(), Some("The midterm is on Friday."));
    }

    #[test]
    fn sign_out_drops_memory_but_not_storage() {
        let (mut storage, path) = temp_storage();
        storage.save_course_set(&intro_cs()).unwrap();
        let mut shell = AppShell::new(storage);
        shell.auth_check_completed(Some("g".into())).unwrap();
        shell.sign_out();
        assert_eq!(shell.screen(), &Screen::Unauthenticated { error: None });
        assert!(!shell.session().authenticated());
        assert!(LocalStorage::load(&path).load_course_set().is_some());
        shell.auth_completed(Ok("g2".into())).unwrap();
        assert_eq!(shell.screen(), &Screen::Main(intro_cs()));
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        let (storage, _) = temp_storage();
        let mut shell = AppShell::new(storage);
        assert!(matches!(
            shell.courses_loaded(intro_cs()),
            Err(ShellError::InvalidTransition { from: "loading", .. })
        ));
        assert!(shell.show_result("x".into()).is_err());
        assert!(shell.back().is_err());
        assert!(shell.begin_auth().is_err());
        shell.auth_check_completed(None).unwrap();
        assert!(shell.auth_check_completed(None).is_err());
        assert!(shell.reset_courses().is_err());
    }

    #[test]
    fn unsaved_courses_are_not_restored_after_sign_out() {
        let dir = std::env::temp_dir().join(format!("canvasqa-shell-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("blocker"), "file").unwrap();
        let path = dir.join("blocker").join("storage.json");

        let mut shell = AppShell::new(LocalStorage::load(&path));
        shell.auth_check_completed(Some("g".into())).unwrap();
        assert!(matches!(
            shell.courses_loaded(intro_cs()),
            Err(ShellError::Storage(_))
        ));
        assert_eq!(shell.screen(), &Screen::CourseSetup);

        shell.sign_out();
        shell.auth_completed(Ok("g".into())).unwrap();
        assert_eq!(shell.screen(), &Screen::CourseSetup);
        assert!(!path.exists());
    }

    #[test]
    fn reset_courses_returns_to_setup() {
        let (mut storage, path) = temp_storage();
        storage.save_course_set(&intro_cs()).unwrap();
        let mut shell = AppShell::new(storage);
        shell.auth_check_completed(Some("g".into())).unwrap();
        shell.reset_courses().unwrap();
        assert_eq!(shell.screen(), &Screen::CourseSetup);
        assert!(LocalStorage::load(&path).load_course_set().is_none());
    }
}
