use std::path::PathBuf;

use crate::error::{ProtocolError, WorkerError};
use crate::protocol::{
    Action, Command, RecognitionResult, Response, ResponseType, WindowBounds, WindowId,
    WindowSelection, decode_command,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub window_id: Option<WindowId>,
    pub app_name: Option<String>,
    pub title: Option<String>,
    pub bounds: WindowBounds,
}

impl Target {
    pub fn selection(&self) -> WindowSelection {
        WindowSelection {
            window_id: self.window_id,
            app_name: self.app_name.clone(),
            window_title: self.title.clone(),
            bounds: Some(self.bounds),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum TargetState {
    #[default]
    NoTarget,
    TargetAcquired(Target),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    pub languages: Vec<String>,
    pub save_to: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanJob {
    pub target: Target,
    pub request: ScanRequest,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PickResult {
    Selected(Target),
    Cancelled,
    StartFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Line(String),
    PickerFinished(PickResult),
    ScanFinished(Result<RecognitionResult, WorkerError>),
    InputClosed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Emit(Response),
    OpenPicker,
    CaptureAndRecognize(ScanJob),
    Exit,
}

#[derive(Debug, Clone)]
pub struct Machine {
    state: TargetState,
    picker_open: bool,
    pending_scan: Option<ScanRequest>,
    default_languages: Vec<String>,
}

impl Machine {
    pub fn new(default_languages: Vec<String>) -> Self {
        Self {
            state: TargetState::NoTarget,
            picker_open: false,
            pending_scan: None,
            default_languages,
        }
    }

    pub fn state(&self) -> &TargetState {
        &self.state
    }

    pub fn picker_open(&self) -> bool {
        self.picker_open
    }

    pub fn has_pending_scan(&self) -> bool {
        self.pending_scan.is_some()
    }

    pub fn target(&self) -> Result<&Target, WorkerError> {
        match &self.state {
            TargetState::TargetAcquired(target) => Ok(target),
            TargetState::NoTarget => Err(WorkerError::NoTargetForScan),
        }
    }

    pub fn reduce(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::Line(line) => match decode_command(&line) {
                Ok(command) => self.on_command(command),
                Err(ProtocolError::UnknownAction(name)) => vec![Effect::Emit(Response::failure(
                    ResponseType::Error,
                    ProtocolError::UnknownAction(name).to_string(),
                ))],
                Err(ProtocolError::Malformed(detail)) => vec![invalid_command(&detail)],
                Err(err) => vec![invalid_command(&err.to_string())],
            },
            Event::PickerFinished(result) => self.on_picker_finished(result),
            Event::ScanFinished(Ok(result)) => vec![Effect::Emit(Response::scanned(result))],
            Event::ScanFinished(Err(err)) => vec![Effect::Emit(Response::failure(
                ResponseType::Scan,
                err.to_string(),
            ))],
            Event::InputClosed => vec![Effect::Exit],
        }
    }

    fn on_command(&mut self, command: Command) -> Vec<Effect> {
        match command.action {
            Action::Pick => {
                if self.picker_open {
                    return vec![Effect::Emit(Response::failure(
                        ResponseType::Pick,
                        WorkerError::PickerBusy.to_string(),
                    ))];
                }
                self.picker_open = true;
                vec![Effect::OpenPicker]
            }
            Action::Scan => {
                let request = ScanRequest {
                    languages: command
                        .languages
                        .filter(|languages| !languages.is_empty())
                        .unwrap_or_else(|| self.default_languages.clone()),
                    save_to: command.save_to,
                };
                match self.target() {
                    Ok(target) => vec![Effect::CaptureAndRecognize(ScanJob {
                        target: target.clone(),
                        request,
                    })],
                    Err(_) => {
                        self.pending_scan = Some(request);
                        if self.picker_open {
                            return Vec::new();
                        }
                        self.picker_open = true;
                        vec![Effect::OpenPicker]
                    }
                }
            }
            Action::Quit => vec![Effect::Exit],
        }
    }

    fn on_picker_finished(&mut self, result: PickResult) -> Vec<Effect> {
        self.picker_open = false;
        match result {
            PickResult::Selected(target) => {
                let mut effects = vec![Effect::Emit(Response::picked(target.selection()))];
                if let Some(request) = self.pending_scan.take() {
                    effects.push(Effect::CaptureAndRecognize(ScanJob {
                        target: target.clone(),
                        request,
                    }));
                }
                self.state = TargetState::TargetAcquired(target);
                effects
            }
            PickResult::Cancelled => self.pick_failed(WorkerError::PickCancelled),
            PickResult::StartFailed(message) => {
                self.pick_failed(WorkerError::PickStartFailed(message))
            }
        }
    }

    fn pick_failed(&mut self, err: WorkerError) -> Vec<Effect> {
        self.pending_scan = None;
        vec![Effect::Emit(Response::failure(
            ResponseType::Pick,
            err.to_string(),
        ))]
    }
}

fn invalid_command(detail: &str) -> Effect {
    Effect::Emit(Response::failure(
        ResponseType::Error,
        format!("Invalid command: {}", detail),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Payload;

    fn machine() -> Machine {
        Machine::new(vec!["en-US".to_string(), "zh-Hans".to_string()])
    }

    fn notes() -> Target {
        Target {
            window_id: Some(42),
            app_name: Some("Notes".to_string()),
            title: Some("Untitled".to_string()),
            bounds: WindowBounds {
                x: 100.0,
                y: 100.0,
                width: 400.0,
                height: 300.0,
            },
        }
    }

    fn line(text: &str) -> Event {
        Event::Line(text.to_string())
    }

    fn scan_result() -> RecognitionResult {
        RecognitionResult {
            image_width: 800,
            image_height: 600,
            observations: Vec::new(),
            bounds: notes().bounds,
        }
    }

    #[test]
    fn pick_opens_picker_and_reports_selection() {
        let mut machine = machine();
        assert_eq!(machine.reduce(line(r#"{"action":"pick"}"#)), vec![Effect::OpenPicker]);
        assert!(machine.picker_open());

        let effects = machine.reduce(Event::PickerFinished(PickResult::Selected(notes())));
        assert_eq!(
            effects,
            vec![Effect::Emit(Response::picked(notes().selection()))]
        );
        assert_eq!(machine.state(), &TargetState::TargetAcquired(notes()));
        assert!(!machine.picker_open());
    }

    #[test]
    fn second_pick_while_open_is_rejected() {
        let mut machine = machine();
        machine.reduce(line(r#"{"action":"pick"}"#));
        let effects = machine.reduce(line(r#"{"action":"pick"}"#));
        assert_eq!(
            effects,
            vec![Effect::Emit(Response::failure(
                ResponseType::Pick,
                "A window picker is already open"
            ))]
        );
        assert!(machine.picker_open());
    }

    #[test]
    fn cancelled_pick_keeps_previous_target() {
        let mut machine = machine();
        machine.reduce(line(r#"{"action":"pick"}"#));
        machine.reduce(Event::PickerFinished(PickResult::Selected(notes())));

        machine.reduce(line(r#"{"action":"pick"}"#));
        let effects = machine.reduce(Event::PickerFinished(PickResult::Cancelled));
        let [Effect::Emit(response)] = effects.as_slice() else {
            panic!("unexpected effects: {effects:?}");
        };
        assert_eq!(response.kind, ResponseType::Pick);
        assert_eq!(
            response.outcome,
            Err("Window selection was cancelled".to_string())
        );
        assert_eq!(machine.target().expect("target"), &notes());
    }

    #[test]
    fn scan_without_target_picks_then_scans() {
        let mut machine = machine();
        let effects = machine.reduce(line(r#"{"action":"scan","saveTo":"/tmp/a.png"}"#));
        assert_eq!(effects, vec![Effect::OpenPicker]);
        assert!(machine.has_pending_scan());

        let effects = machine.reduce(Event::PickerFinished(PickResult::Selected(notes())));
        assert_eq!(
            effects,
            vec![
                Effect::Emit(Response::picked(notes().selection())),
                Effect::CaptureAndRecognize(ScanJob {
                    target: notes(),
                    request: ScanRequest {
                        languages: vec!["en-US".to_string(), "zh-Hans".to_string()],
                        save_to: Some(PathBuf::from("/tmp/a.png")),
                    },
                }),
            ]
        );
        assert!(!machine.has_pending_scan());

        let effects = machine.reduce(Event::ScanFinished(Ok(scan_result())));
        let [Effect::Emit(response)] = effects.as_slice() else {
            panic!("unexpected effects: {effects:?}");
        };
        assert!(matches!(response.outcome, Ok(Payload::Scan(_))));
    }

    #[test]
    fn failed_pick_drops_pending_scan() {
        let mut machine = machine();
        machine.reduce(line(r#"{"action":"scan"}"#));
        let effects = machine.reduce(Event::PickerFinished(PickResult::StartFailed(
            "no display".to_string(),
        )));
        assert_eq!(
            effects,
            vec![Effect::Emit(Response::failure(
                ResponseType::Pick,
                "Failed to start window picker: no display"
            ))]
        );
        assert!(!machine.has_pending_scan());
        assert_eq!(machine.target(), Err(WorkerError::NoTargetForScan));
    }

    #[test]
    fn scan_during_open_picker_waits_for_it() {
        let mut machine = machine();
        machine.reduce(line(r#"{"action":"pick"}"#));
        let effects = machine.reduce(line(r#"{"action":"scan","languages":["ja"]}"#));
        assert!(effects.is_empty());

        let effects = machine.reduce(Event::PickerFinished(PickResult::Selected(notes())));
        assert_eq!(effects.len(), 2);
        let Effect::CaptureAndRecognize(job) = &effects[1] else {
            panic!("expected scan, got {:?}", effects[1]);
        };
        assert_eq!(job.request.languages, vec!["ja".to_string()]);
    }

    #[test]
    fn scan_with_target_runs_immediately() {
        let mut machine = machine();
        machine.reduce(line(r#"{"action":"pick"}"#));
        machine.reduce(Event::PickerFinished(PickResult::Selected(notes())));

        let effects = machine.reduce(line(r#"{"action":"scan","languages":[]}"#));
        let [Effect::CaptureAndRecognize(job)] = effects.as_slice() else {
            panic!("unexpected effects: {effects:?}");
        };
        assert_eq!(job.target, notes());
        assert_eq!(job.request.languages, vec!["en-US", "zh-Hans"]);
    }

    #[test]
    fn scan_failure_is_reported_as_scan() {
        let mut machine = machine();
        let effects = machine.reduce(Event::ScanFinished(Err(WorkerError::CaptureFailed(
            "window is gone".to_string(),
        ))));
        assert_eq!(
            effects,
            vec![Effect::Emit(Response::failure(
                ResponseType::Scan,
                "Capture failed: window is gone"
            ))]
        );
    }

    #[test]
    fn bad_lines_answer_with_error_and_keep_state() {
        let mut machine = machine();
        machine.reduce(line(r#"{"action":"pick"}"#));
        machine.reduce(Event::PickerFinished(PickResult::Selected(notes())));

        let effects = machine.reduce(line(r#"{"action":"foo"}"#));
        assert_eq!(
            effects,
            vec![Effect::Emit(Response::failure(
                ResponseType::Error,
                "Unknown action: foo"
            ))]
        );

        let effects = machine.reduce(line("{nope"));
        let [Effect::Emit(response)] = effects.as_slice() else {
            panic!("unexpected effects: {effects:?}");
        };
        assert_eq!(response.kind, ResponseType::Error);
        assert!(matches!(&response.outcome, Err(message) if message.starts_with("Invalid command: ")));
        assert_eq!(machine.target().expect("target"), &notes());
    }

    #[test]
    fn quit_and_end_of_input_exit() {
        let mut machine = machine();
        assert_eq!(machine.reduce(line(r#"{"action":"quit"}"#)), vec![Effect::Exit]);
        assert_eq!(machine.reduce(Event::InputClosed), vec![Effect::Exit]);
    }
}
