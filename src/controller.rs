//! Symptom picker controller.
//!
//! Single owner of the picker state: selection, search query, dropdown
//! visibility, and the request lifecycle. Views never hold selection
//! state of their own; they are re-rendered from this owner after every
//! mutation through the `PickerView` observer interface.

use serde::{Deserialize, Serialize};

use crate::prediction::{
    PredictionError, PredictionResponse, RequestLifecycle, RequestState, Settlement, Submission,
};
use crate::presenter::{FailureView, ResultPresenter, ResultView};
use crate::symptoms::{ChipsView, DropdownView, SelectionSet, SymptomCatalog};

// ═══════════════════════════════════════════════════════════
// Events and view models
// ═══════════════════════════════════════════════════════════

/// Input events from the picker widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    /// The search field's text changed.
    SearchInput { query: String },
    /// Pointer action on the widget container.
    WidgetClicked,
    /// Downward-navigation key while focus is inside the widget.
    ArrowDown,
    /// A checklist row was activated.
    ItemToggled { label: String },
    /// A chip's remove control was clicked. Contained: it never counts
    /// as a click on the widget container.
    ChipRemoved { label: String },
    /// Enter in the search field.
    SearchEnter,
    /// Pointer action outside the widget's bounds.
    OutsideClicked,
    SubmitClicked,
}

/// Submit button and loading indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Controls {
    pub submit_enabled: bool,
    pub loading: bool,
}

/// The result card.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ResultPanel {
    Empty,
    Success { result: ResultView },
    Failure { failure: FailureView },
}

/// Full picker screen, for pull-style rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PickerScreen {
    pub query: String,
    pub selected: Vec<String>,
    pub phase: &'static str,
    pub dropdown: DropdownView,
    pub chips: ChipsView,
    pub controls: Controls,
    pub result: ResultPanel,
}

/// Observer notified after every state change it depends on.
pub trait PickerView: Send {
    fn render_dropdown(&mut self, view: &DropdownView);
    fn render_chips(&mut self, view: &ChipsView);
    fn render_controls(&mut self, controls: &Controls);
    fn render_result(&mut self, panel: &ResultPanel);
}

// ═══════════════════════════════════════════════════════════
// Controller
// ═══════════════════════════════════════════════════════════

pub struct Controller {
    catalog: SymptomCatalog,
    selection: SelectionSet,
    query: String,
    dropdown_open: bool,
    lifecycle: RequestLifecycle,
    presenter: ResultPresenter,
    endpoint: String,
    views: Vec<Box<dyn PickerView>>,
}

impl Controller {
    /// `endpoint` is named in failure hints.
    pub fn new(catalog: SymptomCatalog, presenter: ResultPresenter, endpoint: &str) -> Self {
        Self {
            catalog,
            selection: SelectionSet::new(),
            query: String::new(),
            dropdown_open: false,
            lifecycle: RequestLifecycle::new(),
            presenter,
            endpoint: endpoint.to_string(),
            views: Vec::new(),
        }
    }

    /// Register an observer and bring it up to date immediately.
    pub fn attach(&mut self, mut view: Box<dyn PickerView>) {
        view.render_dropdown(&self.dropdown_view());
        view.render_chips(&self.chips_view());
        view.render_controls(&self.controls());
        view.render_result(&self.result_panel());
        self.views.push(view);
    }

    // ── Queries ─────────────────────────────────────────────

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn request_state(&self) -> &RequestState {
        self.lifecycle.state()
    }

    /// Enabled iff something is selected and no request is in flight.
    pub fn submit_enabled(&self) -> bool {
        !self.selection.is_empty() && !self.lifecycle.is_pending()
    }

    pub fn controls(&self) -> Controls {
        Controls {
            submit_enabled: self.submit_enabled(),
            loading: self.lifecycle.is_pending(),
        }
    }

    pub fn dropdown_view(&self) -> DropdownView {
        DropdownView::build(&self.catalog, &self.query, &self.selection, self.dropdown_open)
    }

    pub fn chips_view(&self) -> ChipsView {
        ChipsView::build(&self.selection)
    }

    pub fn result_panel(&self) -> ResultPanel {
        match self.lifecycle.state() {
            RequestState::Idle | RequestState::Pending { .. } => ResultPanel::Empty,
            RequestState::Succeeded { response, .. } => ResultPanel::Success {
                result: self.presenter.present(response),
            },
            RequestState::Failed { error, .. } => ResultPanel::Failure {
                failure: self.presenter.present_failure(error, &self.endpoint),
            },
        }
    }

    pub fn screen(&self) -> PickerScreen {
        PickerScreen {
            query: self.query.clone(),
            selected: self.selection.labels(),
            phase: self.lifecycle.state().phase(),
            dropdown: self.dropdown_view(),
            chips: self.chips_view(),
            controls: self.controls(),
            result: self.result_panel(),
        }
    }

    // ── Events ──────────────────────────────────────────────

    /// Apply one input event. Returns a submission when the event
    /// started a request; the caller must send it and report back via
    /// [`Controller::settle`].
    pub fn handle(&mut self, event: UiEvent) -> Option<Submission> {
        tracing::debug!(?event, "Picker event");
        match event {
            UiEvent::SearchInput { query } => {
                self.query = query;
                self.open_dropdown();
                None
            }
            UiEvent::WidgetClicked | UiEvent::ArrowDown => {
                self.open_dropdown();
                None
            }
            UiEvent::OutsideClicked => {
                self.dropdown_open = false;
                self.notify_dropdown();
                None
            }
            UiEvent::ItemToggled { label } => {
                self.toggle(&label);
                None
            }
            UiEvent::ChipRemoved { label } => {
                self.remove(&label);
                None
            }
            UiEvent::SearchEnter => {
                // Enter never submits while nothing is selected.
                if self.selection.is_empty() {
                    return None;
                }
                self.submit()
            }
            UiEvent::SubmitClicked => self.submit(),
        }
    }

    /// Report the outcome of `seq`. Stale results change nothing.
    pub fn settle(
        &mut self,
        seq: u64,
        outcome: Result<PredictionResponse, PredictionError>,
    ) -> Settlement {
        let settlement = self.lifecycle.settle(seq, outcome);
        if settlement == Settlement::Applied {
            self.notify_request();
        }
        settlement
    }

    fn open_dropdown(&mut self) {
        self.dropdown_open = true;
        self.notify_dropdown();
    }

    fn toggle(&mut self, label: &str) {
        let Some(symptom) = self.catalog.lookup(label) else {
            tracing::warn!(label, "Ignoring toggle for unknown symptom");
            return;
        };
        self.selection.toggle(symptom);
        self.notify_selection();
    }

    fn remove(&mut self, label: &str) {
        let Some(symptom) = self.catalog.lookup(label) else {
            tracing::warn!(label, "Ignoring removal of unknown symptom");
            return;
        };
        if self.selection.remove(&symptom) {
            self.notify_selection();
        }
    }

    fn submit(&mut self) -> Option<Submission> {
        if !self.submit_enabled() {
            return None;
        }
        let submission = self.lifecycle.begin(&self.selection.snapshot())?;
        self.notify_request();
        Some(submission)
    }

    // ── Re-render fan-out ───────────────────────────────────

    fn notify_dropdown(&mut self) {
        let dropdown = self.dropdown_view();
        for view in &mut self.views {
            view.render_dropdown(&dropdown);
        }
    }

    fn notify_selection(&mut self) {
        let dropdown = self.dropdown_view();
        let chips = self.chips_view();
        let controls = self.controls();
        for view in &mut self.views {
            view.render_dropdown(&dropdown);
            view.render_chips(&chips);
            view.render_controls(&controls);
        }
    }

    fn notify_request(&mut self) {
        let controls = self.controls();
        let panel = self.result_panel();
        for view in &mut self.views {
            view.render_controls(&controls);
            view.render_result(&panel);
        }
    }
}
