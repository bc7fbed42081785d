use std::io::stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::TableState;
use ratatui::Terminal;
use tracing::{debug, info};
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;

use crate::config::{Config, UiColors};
use crate::contact::ContactId;
use crate::query::Query;
use crate::remote::ContactRepository;
use crate::render::Listing;
use crate::session::{Action, Effect, Overlay, Screen, Session};
use crate::worker::RequestWorker;

use super::draw;
use super::edit::FieldEditor;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct App<'a> {
    config: &'a Config,
    session: Session,
    worker: RequestWorker,
    /// Delayed actions, fired by the event loop when due
    timers: Vec<(Instant, Action)>,
    pub search_input: Input,
    pub search_active: bool,
    pub table_state: TableState,
    pub editor: FieldEditor,
    /// Rows visible in the table, updated on every draw
    pub page_size: usize,
}

impl<'a> App<'a> {
    pub fn new(config: &'a Config, repo: Arc<dyn ContactRepository>) -> Result<Self> {
        let worker = RequestWorker::spawn(repo)?;
        let mut app = Self {
            config,
            session: Session::new(Query::default()),
            worker,
            timers: Vec::new(),
            search_input: Input::default(),
            search_active: false,
            table_state: TableState::default(),
            editor: FieldEditor::default(),
            page_size: 10,
        };
        let effects = app.session.bootstrap();
        app.apply(effects)?;
        Ok(app)
    }

    pub fn run(&mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop<B>(&mut self, terminal: &mut Terminal<B>) -> Result<()>
    where
        B: ratatui::backend::Backend,
    {
        loop {
            self.drain_completions()?;
            self.fire_due_timers()?;

            draw::render(terminal, self)?;

            if event::poll(POLL_INTERVAL)? {
                match event::read()? {
                    Event::Key(key) => {
                        if self.handle_key(key)? {
                            break;
                        }
                    }
                    Event::Resize(_, _) => {}
                    _ => {}
                }
            }
        }
        info!("leaving interactive session");
        Ok(())
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn ui_colors(&self) -> &UiColors {
        &self.config.ui.colors
    }

    pub fn api_url(&self) -> &str {
        &self.config.api_url
    }

    pub fn listing(&self) -> Listing {
        self.session.listing()
    }

    fn drain_completions(&mut self) -> Result<()> {
        while let Some(completion) = self.worker.try_recv() {
            self.dispatch(Action::Completed(completion))?;
        }
        Ok(())
    }

    fn fire_due_timers(&mut self) -> Result<()> {
        if self.timers.is_empty() {
            return Ok(());
        }
        let now = Instant::now();
        let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.timers)
            .into_iter()
            .partition(|(at, _)| *at <= now);
        self.timers = pending;
        for (_, action) in due {
            self.dispatch(action)?;
        }
        Ok(())
    }

    fn apply(&mut self, effects: Vec<Effect>) -> Result<()> {
        for effect in effects {
            match effect {
                Effect::Request(request) => {
                    debug!(request = %request.describe(), "submitting request");
                    self.worker.submit(request)?;
                }
                Effect::Schedule { delay, action } => {
                    self.timers.push((Instant::now() + delay, action));
                }
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, action: Action) -> Result<()> {
        let previous = self.selected_id();
        let effects = self.session.dispatch(action);
        self.apply(effects)?;
        self.sync_editor();
        self.reselect(previous);
        Ok(())
    }

    /// Keep the field editor on the focused field of whichever form is open.
    fn sync_editor(&mut self) {
        let Some(state) = self.session.active_form() else {
            self.editor.cancel();
            return;
        };
        let current = state.form.get(state.focus);
        if self.editor.target() != Some(state.focus) || self.editor.value() != current {
            self.editor.start(current, state.focus);
        }
    }

    /// Keep the cursor on the same contact across recomputes, else clamp it.
    fn reselect(&mut self, previous: Option<ContactId>) {
        let listing = self.session.listing();
        let rows = listing.rows();
        if rows.is_empty() {
            self.table_state.select(None);
            return;
        }
        let by_id = previous.and_then(|id| rows.iter().position(|row| row.id == id));
        let index = by_id
            .or(self.table_state.selected())
            .unwrap_or(0)
            .min(rows.len() - 1);
        self.table_state.select(Some(index));
    }

    pub fn selected_id(&self) -> Option<ContactId> {
        let index = self.table_state.selected()?;
        self.session.listing().rows().get(index).map(|row| row.id)
    }

    fn move_selection(&mut self, delta: isize) {
        let len = self.session.listing().len();
        if len == 0 {
            self.table_state.select(None);
            return;
        }
        let current = self.table_state.selected().unwrap_or(0) as isize;
        let next = (current + delta).clamp(0, len as isize - 1);
        self.table_state.select(Some(next as usize));
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        // Ctrl+C always quits
        if key.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C'))
        {
            return Ok(true);
        }

        // Route to the topmost layer first
        if self.session.notice().is_some() {
            self.handle_notice_key(key)?;
            return Ok(false);
        }

        match self.session.overlay() {
            Overlay::Viewing(_) => {
                self.handle_detail_key(key)?;
                return Ok(false);
            }
            Overlay::ConfirmDelete(_) => {
                self.handle_confirm_modal_key(key)?;
                return Ok(false);
            }
            Overlay::Editing(_) => {
                self.handle_form_key(key)?;
                return Ok(false);
            }
            Overlay::None => {}
        }

        if matches!(self.session.screen(), Screen::NewContact(_)) {
            self.handle_form_key(key)?;
            return Ok(false);
        }

        if self.search_active {
            self.handle_search_key(key)?;
            return Ok(false);
        }

        self.handle_listing_key(key)
    }

    fn handle_notice_key(&mut self, key: KeyEvent) -> Result<()> {
        let config = self.config;
        let modal = &config.keys.modal;
        if key_matches_any(&key, &modal.cancel) || key_matches_any(&key, &modal.confirm) {
            self.dispatch(Action::DismissNotice)?;
        }
        Ok(())
    }

    fn handle_detail_key(&mut self, key: KeyEvent) -> Result<()> {
        let config = self.config;
        let modal = &config.keys.modal;
        if key_matches_any(&key, &modal.edit) {
            self.dispatch(Action::HandoffToEdit)?;
        } else if key_matches_any(&key, &modal.cancel) || key_matches_any(&key, &modal.confirm) {
            self.dispatch(Action::Cancel)?;
        }
        Ok(())
    }

    fn handle_confirm_modal_key(&mut self, key: KeyEvent) -> Result<()> {
        let config = self.config;
        let modal = &config.keys.modal;

        if key_matches_any(&key, &modal.cancel) {
            return self.dispatch(Action::Cancel);
        }

        // Also accept 'n' as cancel (common convention)
        if matches!(key.code, KeyCode::Char(c) if c.eq_ignore_ascii_case(&'n')) {
            return self.dispatch(Action::Cancel);
        }

        if key_matches_any(&key, &modal.confirm) {
            return self.dispatch(Action::Confirm);
        }

        Ok(())
    }

    fn handle_form_key(&mut self, key: KeyEvent) -> Result<()> {
        let config = self.config;
        let form = &config.keys.form;

        if key_matches_any(&key, &form.cancel) {
            return self.dispatch(Action::Cancel);
        }
        if key_matches_any(&key, &form.submit) {
            return self.dispatch(Action::Submit);
        }
        if key_matches_any(&key, &form.next_field) {
            return self.dispatch(Action::FocusNext);
        }
        if key_matches_any(&key, &form.prev_field) {
            return self.dispatch(Action::FocusPrev);
        }

        if self.editor.handle_key_event(key) {
            if let Some(field) = self.editor.target() {
                let value = self.editor.value().to_string();
                self.dispatch(Action::SetField(field, value))?;
            }
        }
        Ok(())
    }

    fn handle_search_key(&mut self, key: KeyEvent) -> Result<()> {
        if matches!(key.code, KeyCode::Esc | KeyCode::Enter) {
            self.search_active = false;
            return Ok(());
        }

        let changed = self
            .search_input
            .handle_event(&Event::Key(key))
            .map_or(false, |change| change.value);
        if changed {
            let text = self.search_input.value().to_string();
            self.dispatch(Action::SetSearch(text))?;
        }
        Ok(())
    }

    fn handle_listing_key(&mut self, key: KeyEvent) -> Result<bool> {
        let config = self.config;
        let global = &config.keys.global;
        let listing = &config.keys.listing;

        if key_matches_any(&key, &global.quit) {
            return Ok(true);
        }
        if key_matches_any(&key, &global.search) {
            self.search_active = true;
            return Ok(false);
        }
        if key_matches_any(&key, &global.sort) {
            self.dispatch(Action::CycleSort)?;
            return Ok(false);
        }
        if key_matches_any(&key, &global.new_contact) {
            self.dispatch(Action::OpenCreate)?;
            return Ok(false);
        }
        if key_matches_any(&key, &global.refresh) {
            self.dispatch(Action::Refresh)?;
            return Ok(false);
        }

        let page = self.page_size.max(1) as isize;
        if key_matches_any(&key, &listing.next) {
            self.move_selection(1);
        } else if key_matches_any(&key, &listing.prev) {
            self.move_selection(-1);
        } else if key_matches_any(&key, &listing.page_down) {
            self.move_selection(page);
        } else if key_matches_any(&key, &listing.page_up) {
            self.move_selection(-page);
        } else if let Some(id) = self.selected_id() {
            if key_matches_any(&key, &listing.view) {
                self.dispatch(Action::Show(id))?;
            } else if key_matches_any(&key, &listing.edit) {
                self.dispatch(Action::Edit(id))?;
            } else if key_matches_any(&key, &listing.delete) {
                self.dispatch(Action::Delete(id))?;
            }
        }

        Ok(false)
    }

    #[cfg(test)]
    fn wait_for_requests(&mut self) -> Result<()> {
        while self.session.is_busy() {
            match self.worker.recv() {
                Some(completion) => self.dispatch(Action::Completed(completion))?,
                None => break,
            }
        }
        Ok(())
    }
}

/// Check if the key event matches any of the bindings in the list
fn key_matches_any(event: &KeyEvent, bindings: &[String]) -> bool {
    bindings.iter().any(|b| key_matches_single(event, b))
}

/// Check if the key event matches a single binding string
fn key_matches_single(event: &KeyEvent, binding: &str) -> bool {
    let trimmed = binding.trim();
    if trimmed.is_empty() {
        return false;
    }

    // Ctrl/Alt/Super combinations are never bound
    let disallowed = KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER;
    if event.modifiers.intersects(disallowed) {
        return false;
    }

    let lowered = trimmed.to_ascii_lowercase();
    if let Some(number) = lowered.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
        return event.code == KeyCode::F(number);
    }

    match lowered.as_str() {
        "enter" => matches!(event.code, KeyCode::Enter),
        "tab" => matches!(event.code, KeyCode::Tab),
        "backtab" | "shift+tab" => matches!(event.code, KeyCode::BackTab),
        "backspace" => matches!(event.code, KeyCode::Backspace),
        "delete" | "del" => matches!(event.code, KeyCode::Delete),
        "esc" | "escape" => matches!(event.code, KeyCode::Esc),
        "space" => matches!(event.code, KeyCode::Char(' ')),
        "up" => matches!(event.code, KeyCode::Up),
        "down" => matches!(event.code, KeyCode::Down),
        "left" => matches!(event.code, KeyCode::Left),
        "right" => matches!(event.code, KeyCode::Right),
        "pageup" | "page_up" => matches!(event.code, KeyCode::PageUp),
        "pagedown" | "page_down" => matches!(event.code, KeyCode::PageDown),
        "home" => matches!(event.code, KeyCode::Home),
        "end" => matches!(event.code, KeyCode::End),
        // Single character, case-sensitive
        _ => {
            let mut chars = trimmed.chars();
            if let (Some(first), None) = (chars.next(), chars.next()) {
                matches!(event.code, KeyCode::Char(c) if c == first)
            } else {
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::{Contact, FormField};
    use crate::mutation::fake::FakeRepository;
    use crate::mutation::Request;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn contact(id: i64, fname: &str) -> Contact {
        Contact {
            id: ContactId(id),
            fname: fname.into(),
            lname: "L".into(),
            email: "e@example.com".into(),
            phone: "1".into(),
            created_at: None,
        }
    }

    fn app_with<'a>(config: &'a Config, repo: Arc<FakeRepository>) -> App<'a> {
        let mut app = App::new(config, repo).unwrap();
        app.wait_for_requests().unwrap();
        app
    }

    #[test]
    fn test_key_matching() {
        let binding = |s: &str| vec![s.to_string()];
        assert!(key_matches_any(&press(KeyCode::Enter), &binding("ENTER")));
        assert!(key_matches_any(&press(KeyCode::F(5)), &binding("F5")));
        assert!(!key_matches_any(&press(KeyCode::F(5)), &binding("F")));
        assert!(key_matches_any(&press(KeyCode::Char('D')), &binding("D")));
        assert!(!key_matches_any(&press(KeyCode::Char('d')), &binding("D")));
        let ctrl_d = KeyEvent::new(KeyCode::Char('d'), KeyModifiers::CONTROL);
        assert!(!key_matches_any(&ctrl_d, &binding("d")));
        assert!(!key_matches_any(&press(KeyCode::Char('x')), &binding("  ")));
    }

    #[test]
    fn test_declined_delete_sends_nothing() {
        let config = Config::default();
        let repo = Arc::new(FakeRepository::with(vec![contact(1, "Bob")]));
        let mut app = app_with(&config, repo.clone());
        assert_eq!(app.selected_id(), Some(ContactId(1)));

        app.handle_key(press(KeyCode::Char('d'))).unwrap();
        assert!(matches!(app.session().overlay(), Overlay::ConfirmDelete(_)));
        app.handle_key(press(KeyCode::Char('n'))).unwrap();
        assert_eq!(app.session().overlay(), &Overlay::None);
        assert_eq!(repo.requests(), vec![Request::Load]);

        app.handle_key(press(KeyCode::Char('d'))).unwrap();
        app.handle_key(press(KeyCode::Enter)).unwrap();
        app.wait_for_requests().unwrap();
        assert_eq!(
            repo.requests(),
            vec![Request::Load, Request::Delete(ContactId(1)), Request::Load]
        );
        assert!(app.listing().is_empty());
        assert_eq!(app.selected_id(), None);
    }

    #[test]
    fn test_typing_in_edit_form_updates_session() {
        let config = Config::default();
        let repo = Arc::new(FakeRepository::with(vec![contact(1, "Bob")]));
        let mut app = app_with(&config, repo.clone());

        app.handle_key(press(KeyCode::Char('e'))).unwrap();
        assert_eq!(app.editor.target(), Some(FormField::FirstName));
        assert_eq!(app.editor.value(), "Bob");

        app.handle_key(press(KeyCode::Char('b'))).unwrap();
        app.handle_key(press(KeyCode::Backspace)).unwrap();
        app.handle_key(press(KeyCode::Char('y'))).unwrap();
        app.handle_key(press(KeyCode::Tab)).unwrap();
        assert_eq!(app.editor.target(), Some(FormField::LastName));

        app.handle_key(press(KeyCode::Enter)).unwrap();
        app.wait_for_requests().unwrap();
        assert_eq!(app.session().overlay(), &Overlay::None);
        assert_eq!(app.session().store().all()[0].fname, "Boby");
        assert!(!app.editor.is_active());
    }

    #[test]
    fn test_search_filters_live_and_q_types_in_search() {
        let config = Config::default();
        let repo = Arc::new(FakeRepository::with(vec![contact(1, "Bob"), contact(2, "Quinn")]));
        let mut app = app_with(&config, repo);

        app.handle_key(press(KeyCode::Char('/'))).unwrap();
        assert!(app.search_active);
        assert!(!app.handle_key(press(KeyCode::Char('q'))).unwrap());
        assert_eq!(app.session().query().search, "q");
        assert_eq!(app.listing().len(), 1);
        assert_eq!(app.selected_id(), Some(ContactId(2)));

        app.handle_key(press(KeyCode::Esc)).unwrap();
        assert!(!app.search_active);
        assert!(app.handle_key(press(KeyCode::Char('q'))).unwrap());
    }
}
