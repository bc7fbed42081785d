//! Presenter state machine.
//!
//! The terminal UI and the command line both drive a [`Session`] with
//! [`Action`]s. Dispatch never blocks: remote calls and timers come back as
//! [`Effect`]s for the caller to carry out, and their outcomes return as
//! [`Action::Completed`] or as the scheduled action.

use std::collections::VecDeque;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::contact::{self, Contact, ContactForm, ContactId, FormField};
use crate::error::{Failure, ValidationError, LOAD_FAILED};
use crate::mutation::{self, Completion, Request};
use crate::query::Query;
use crate::remote::ContactRepository;
use crate::render::{self, Listing};
use crate::store::ViewState;

/// Delay between closing the detail view and opening the edit form.
pub const HANDOFF_DELAY: Duration = Duration::from_millis(200);

pub const CONTACT_ADDED: &str = "Contact Added!";

#[derive(Debug)]
pub enum Action {
    SetSearch(String),
    CycleSort,
    Show(ContactId),
    Edit(ContactId),
    Delete(ContactId),
    /// Accept the open confirmation.
    Confirm,
    /// Close the topmost overlay, or leave the new-contact screen.
    Cancel,
    /// From the detail view, switch to editing the same contact.
    HandoffToEdit,
    HandoffElapsed(Contact),
    SetField(FormField, String),
    FocusNext,
    FocusPrev,
    Submit,
    OpenCreate,
    DismissNotice,
    Refresh,
    Completed(Completion),
}

#[derive(Debug)]
pub enum Effect {
    Request(Request),
    Schedule { delay: Duration, action: Action },
}

/// A form being filled in, with the focused field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormState {
    pub form: ContactForm,
    pub focus: FormField,
}

impl FormState {
    pub fn blank() -> Self {
        Self {
            form: ContactForm::default(),
            focus: FormField::FirstName,
        }
    }

    pub fn for_contact(contact: &Contact) -> Self {
        Self {
            form: ContactForm::from_contact(contact),
            focus: FormField::FirstName,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Listing,
    NewContact(FormState),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
    None,
    Viewing(Contact),
    Editing(FormState),
    ConfirmDelete(Contact),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

/// Blocking message shown until dismissed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn failure(failure: &Failure) -> Self {
        Self {
            kind: NoticeKind::Error,
            title: failure.title().to_string(),
            message: failure.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == NoticeKind::Error
    }

    /// A failed fetch of the contact set, as opposed to a failed change.
    pub fn is_load_failure(&self) -> bool {
        self.is_error() && self.title == LOAD_FAILED
    }
}

/// One-line status shown under the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub text: String,
    pub is_error: bool,
}

pub struct Session {
    store: ViewState,
    screen: Screen,
    overlay: Overlay,
    notice: Option<Notice>,
    status: Option<Status>,
    in_flight: usize,
    bootstrapped: bool,
    clock: fn() -> i64,
}

impl Session {
    pub fn new(query: Query) -> Self {
        Self {
            store: ViewState::new(query),
            screen: Screen::Listing,
            overlay: Overlay::None,
            notice: None,
            status: None,
            in_flight: 0,
            bootstrapped: false,
            clock: contact::now_millis,
        }
    }

    #[cfg(test)]
    fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    /// Initial fetch of the contact set.
    pub fn bootstrap(&mut self) -> Vec<Effect> {
        vec![self.request(Request::Load)]
    }

    pub fn store(&self) -> &ViewState {
        &self.store
    }

    pub fn query(&self) -> &Query {
        self.store.query()
    }

    pub fn listing(&self) -> Listing {
        render::listing(self.store.view())
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight > 0
    }

    pub fn is_bootstrapped(&self) -> bool {
        self.bootstrapped
    }

    /// The form currently accepting input, if any.
    pub fn active_form(&self) -> Option<&FormState> {
        match (&self.overlay, &self.screen) {
            (Overlay::Editing(state), _) => Some(state),
            (Overlay::None, Screen::NewContact(state)) => Some(state),
            _ => None,
        }
    }

    fn active_form_mut(&mut self) -> Option<&mut FormState> {
        match (&mut self.overlay, &mut self.screen) {
            (Overlay::Editing(state), _) => Some(state),
            (Overlay::None, Screen::NewContact(state)) => Some(state),
            _ => None,
        }
    }

    pub fn dispatch(&mut self, action: Action) -> Vec<Effect> {
        // A notice blocks everything except its dismissal and background work
        if self.notice.is_some()
            && !matches!(
                action,
                Action::DismissNotice | Action::Completed(_) | Action::HandoffElapsed(_)
            )
        {
            debug!(?action, "ignored while a notice is open");
            return Vec::new();
        }

        match action {
            Action::SetSearch(text) => {
                self.store.set_search(text);
                Vec::new()
            }
            Action::CycleSort => {
                let next = self.store.query().sort.next();
                self.store.set_sort(next);
                Vec::new()
            }
            Action::Show(id) => {
                if let Some(contact) = self.lookup(id) {
                    debug!(%id, "viewing contact");
                    self.overlay = Overlay::Viewing(contact);
                }
                Vec::new()
            }
            Action::Edit(id) => {
                if let Some(contact) = self.lookup(id) {
                    debug!(%id, "editing contact");
                    self.overlay = Overlay::Editing(FormState::for_contact(&contact));
                }
                Vec::new()
            }
            Action::Delete(id) => {
                if let Some(contact) = self.lookup(id) {
                    self.overlay = Overlay::ConfirmDelete(contact);
                }
                Vec::new()
            }
            Action::Confirm => match std::mem::replace(&mut self.overlay, Overlay::None) {
                Overlay::ConfirmDelete(contact) => {
                    info!(id = %contact.id, "deleting contact");
                    vec![self.request(Request::Delete(contact.id))]
                }
                other => {
                    self.overlay = other;
                    Vec::new()
                }
            },
            Action::Cancel => {
                if self.overlay != Overlay::None {
                    self.overlay = Overlay::None;
                } else if matches!(self.screen, Screen::NewContact(_)) {
                    self.screen = Screen::Listing;
                }
                Vec::new()
            }
            Action::HandoffToEdit => match std::mem::replace(&mut self.overlay, Overlay::None) {
                Overlay::Viewing(contact) => vec![Effect::Schedule {
                    delay: HANDOFF_DELAY,
                    action: Action::HandoffElapsed(contact),
                }],
                other => {
                    self.overlay = other;
                    Vec::new()
                }
            },
            Action::HandoffElapsed(contact) => {
                if self.overlay == Overlay::None {
                    self.overlay = Overlay::Editing(FormState::for_contact(&contact));
                } else {
                    debug!(id = %contact.id, "handoff dropped, another overlay is open");
                }
                Vec::new()
            }
            Action::SetField(field, value) => {
                if let Some(state) = self.active_form_mut() {
                    state.form.set(field, value);
                }
                Vec::new()
            }
            Action::FocusNext => {
                if let Some(state) = self.active_form_mut() {
                    state.focus = state.focus.next();
                }
                Vec::new()
            }
            Action::FocusPrev => {
                if let Some(state) = self.active_form_mut() {
                    state.focus = state.focus.prev();
                }
                Vec::new()
            }
            Action::Submit => self.submit(),
            Action::OpenCreate => {
                self.overlay = Overlay::None;
                self.screen = Screen::NewContact(FormState::blank());
                Vec::new()
            }
            Action::DismissNotice => {
                self.notice = None;
                Vec::new()
            }
            Action::Refresh => vec![self.request(Request::Load)],
            Action::Completed(completion) => {
                self.in_flight = self.in_flight.saturating_sub(1);
                self.complete(completion)
            }
        }
    }

    /// Carry out `effects` in the calling thread until nothing is left.
    /// Scheduled actions fire immediately.
    pub fn settle<R>(&mut self, repo: &R, effects: Vec<Effect>)
    where
        R: ContactRepository + ?Sized,
    {
        let mut queue: VecDeque<Effect> = effects.into();
        while let Some(effect) = queue.pop_front() {
            let follow_up = match effect {
                Effect::Request(request) => {
                    let completion = mutation::execute(repo, request);
                    self.dispatch(Action::Completed(completion))
                }
                Effect::Schedule { action, .. } => self.dispatch(action),
            };
            queue.extend(follow_up);
        }
    }

    fn lookup(&mut self, id: ContactId) -> Option<Contact> {
        let found = self.store.find(id).cloned();
        if found.is_none() {
            warn!(%id, "no such contact");
            self.set_status(format!("Contact {} not found", id), true);
        }
        found
    }

    fn submit(&mut self) -> Vec<Effect> {
        if let Overlay::Editing(state) = &self.overlay {
            return match state.form.to_patch() {
                Ok(patch) => {
                    info!(id = %patch.id, "updating contact");
                    vec![self.request(Request::Update(patch))]
                }
                Err(err) => self.reject(err),
            };
        }

        if let (Overlay::None, Screen::NewContact(state)) = (&self.overlay, &self.screen) {
            return match state.form.to_new_contact((self.clock)()) {
                Ok(contact) => {
                    info!("creating contact");
                    vec![self.request(Request::Create(contact))]
                }
                Err(err) => self.reject(err),
            };
        }

        Vec::new()
    }

    fn reject(&mut self, err: ValidationError) -> Vec<Effect> {
        warn!(error = %err, "contact rejected");
        self.notice = Some(Notice::failure(&Failure::Validation(err)));
        Vec::new()
    }

    fn complete(&mut self, completion: Completion) -> Vec<Effect> {
        match completion {
            Completion::Loaded(Ok(contacts)) => {
                let count = contacts.len();
                self.store.replace_all(contacts);
                self.bootstrapped = true;
                let viewing = match &self.overlay {
                    Overlay::Viewing(current) => Some(current.id),
                    _ => None,
                };
                if let Some(fresh) = viewing.and_then(|id| self.store.find(id).cloned()) {
                    self.overlay = Overlay::Viewing(fresh);
                }
                self.set_status(format!("Loaded {} contacts", count), false);
                Vec::new()
            }
            Completion::Loaded(Err(err)) => {
                let failure = Failure::Load(err);
                if self.bootstrapped {
                    self.notice = Some(Notice::failure(&failure));
                } else {
                    // First load failing leaves an empty listing behind
                    warn!(error = %failure, "initial load failed");
                    self.bootstrapped = true;
                    self.store.replace_all(Vec::new());
                    self.set_status(failure.to_string(), true);
                }
                Vec::new()
            }
            Completion::Created(Ok(created)) => {
                info!(id = %created.id, "contact created");
                self.screen = Screen::Listing;
                self.notice = Some(Notice::info("SAVED", CONTACT_ADDED));
                vec![self.request(Request::Load)]
            }
            Completion::Created(Err(err)) => {
                self.notice = Some(Notice::failure(&Failure::Create(err)));
                Vec::new()
            }
            Completion::Updated(id, Ok(_)) => {
                info!(%id, "contact updated");
                if matches!(&self.overlay, Overlay::Editing(state) if state.form.id == Some(id)) {
                    self.overlay = Overlay::None;
                }
                self.set_status(format!("Contact {} updated", id), false);
                vec![self.request(Request::Load)]
            }
            Completion::Updated(_, Err(err)) => {
                self.notice = Some(Notice::failure(&Failure::Update(err)));
                Vec::new()
            }
            Completion::Deleted(id, Ok(())) => {
                info!(%id, "contact deleted");
                self.set_status(format!("Contact {} deleted", id), false);
                vec![self.request(Request::Load)]
            }
            Completion::Deleted(_, Err(err)) => {
                self.notice = Some(Notice::failure(&Failure::Delete(err)));
                Vec::new()
            }
        }
    }

    fn request(&mut self, request: Request) -> Effect {
        self.in_flight += 1;
        Effect::Request(request)
    }

    fn set_status(&mut self, text: String, is_error: bool) {
        self.status = Some(Status { text, is_error });
    }
}
