//! Action dispatcher: permission gate first, then the concrete handler.
//!
//! Every failure below this boundary is an [`ActionError`]; callers fold it
//! into result text for the remote agent instead of aborting.

mod command;
mod files;
mod research;

use tracing::{debug, instrument};

use crate::core::action::{Action, ActionError, ActionRecord, ToolCall, ToolResult};
use crate::core::tier::Mode;
use crate::io::config::KekeConfig;
use crate::io::permissions::PermissionGate;
use crate::io::project::ProjectContext;
use crate::io::prompter::Prompter;
use crate::io::snapshot::SnapshotStore;

pub struct Dispatcher<'a, P: Prompter> {
    project: &'a ProjectContext,
    config: &'a KekeConfig,
    gate: PermissionGate<'a, P>,
    snapshots: SnapshotStore,
    research: bool,
}

impl<'a, P: Prompter> Dispatcher<'a, P> {
    /// Research actions are only routed in [`Mode::Research`].
    pub fn new(
        project: &'a ProjectContext,
        config: &'a KekeConfig,
        prompter: &'a P,
        mode: Mode,
    ) -> Self {
        Self {
            project,
            config,
            gate: PermissionGate::new(&project.permissions_path, prompter),
            snapshots: SnapshotStore::new(project),
            research: mode == Mode::Research,
        }
    }

    /// Run one validated action.
    #[instrument(skip_all, fields(kind = action.kind()))]
    pub fn dispatch(&self, action: &Action) -> Result<String, ActionError> {
        if is_research(action) && !self.research {
            return Err(ActionError::UnknownAction(action.kind().to_string()));
        }
        if !self.gate.ensure(action.permission(), &action.permission_message()) {
            debug!("permission denied");
            return Err(ActionError::PermissionDenied);
        }

        match action {
            Action::ReadFile { path } => files::read(self.project, path),
            Action::WriteFile { path, content } => {
                files::write(self.project, &self.snapshots, path, content)
            }
            Action::ListFiles { path } => files::list(self.project, self.config, path),
            Action::ExecuteCommand { command } => {
                command::execute(self.project, self.config, command)
            }
            Action::LoadDataset { path, format } => {
                research::load_dataset(self.project, path, format.as_deref())
            }
            Action::AnalyzeData {
                analysis_type,
                parameters,
            } => Ok(research::analyze_data(analysis_type, parameters)),
            Action::TrainModel {
                model_type,
                parameters,
            } => Ok(research::train_model(model_type, parameters)),
            Action::EvaluateModel { path } => Ok(research::evaluate_model(path)),
            Action::Visualize {
                viz_type,
                parameters,
            } => Ok(research::visualize(viz_type, parameters)),
        }
    }

    /// Validate and run a flat action record.
    pub fn dispatch_record(&self, record: ActionRecord) -> Result<String, ActionError> {
        let action = Action::try_from(record)?;
        self.dispatch(&action)
    }

    /// Normalize and run a tool call, always producing a correlated result.
    pub fn dispatch_tool_call(&self, call: &ToolCall) -> ToolResult {
        match Action::from_tool_call(call).and_then(|action| self.dispatch(&action)) {
            Ok(output) => ToolResult {
                tool_call_id: call.id.clone(),
                output,
                error: None,
            },
            Err(err) => err.into_tool_result(&call.id),
        }
    }
}

fn is_research(action: &Action) -> bool {
    matches!(
        action,
        Action::LoadDataset { .. }
            | Action::AnalyzeData { .. }
            | Action::TrainModel { .. }
            | Action::EvaluateModel { .. }
            | Action::Visualize { .. }
    )
}

/// Progress line for a flat record, even when it will fail validation.
pub fn describe_record(record: &ActionRecord) -> String {
    match Action::try_from(record.clone()) {
        Ok(action) => action.describe(),
        Err(_) => format!("Tool: {}", record.kind),
    }
}

/// Progress line for a tool call, even when its arguments are malformed.
pub fn describe_tool_call(call: &ToolCall) -> String {
    match Action::from_tool_call(call) {
        Ok(action) => action.describe(),
        Err(_) => format!("Tool: {}", call.function.name),
    }
}

/// Text fed back to the remote for an action outcome.
pub fn outcome_text(outcome: &Result<String, ActionError>) -> String {
    match outcome {
        Ok(output) => output.clone(),
        Err(err) => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::value::RawValue;

    use super::*;
    use crate::core::action::FunctionCall;
    use crate::io::permissions::{PermissionSet, load_permissions};
    use crate::test_support::{ScriptedPrompter, TestProject};

    fn all_granted() -> PermissionSet {
        PermissionSet {
            read: true,
            write: true,
            execute: true,
        }
    }

    fn snapshot_count(project: &TestProject) -> usize {
        SnapshotStore::new(project.context())
            .list()
            .expect("list")
            .len()
    }

    fn tool_call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: "call-7".to_string(),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: name.to_string(),
                arguments: RawValue::from_string(arguments.to_string()).expect("raw"),
            },
        }
    }

    #[test]
    fn write_over_existing_file_snapshots_pre_write_content_once() {
        let project = TestProject::new().expect("project");
        project.grant(all_granted()).expect("grant");
        project.write("notes.md", "before").expect("seed");
        let prompter = ScriptedPrompter::new(Vec::<String>::new());
        let config = KekeConfig::default();
        let dispatcher = Dispatcher::new(project.context(), &config, &prompter, Mode::Ask);

        let output = dispatcher
            .dispatch(&Action::WriteFile {
                path: "notes.md".to_string(),
                content: "after".to_string(),
            })
            .expect("write");

        assert_eq!(output, "Successfully wrote 5 bytes to notes.md");
        assert_eq!(project.read("notes.md").expect("read"), "after");
        let snapshots = SnapshotStore::new(project.context()).list().expect("list");
        assert_eq!(snapshots.len(), 1);
        assert_eq!(fs::read_to_string(&snapshots[0].path).expect("snapshot"), "before");
        let changelog = fs::read_to_string(&project.context().changelog_path).expect("log");
        assert!(changelog.contains(" wrote notes.md (5 bytes)"));
    }

    #[test]
    fn write_to_new_nested_file_creates_parents_without_snapshot() {
        let project = TestProject::new().expect("project");
        project.grant(all_granted()).expect("grant");
        let prompter = ScriptedPrompter::new(Vec::<String>::new());
        let config = KekeConfig::default();
        let dispatcher = Dispatcher::new(project.context(), &config, &prompter, Mode::Ask);

        dispatcher
            .dispatch(&Action::WriteFile {
                path: "src/deep/mod.rs".to_string(),
                content: String::new(),
            })
            .expect("write");

        assert_eq!(project.read("src/deep/mod.rs").expect("read"), "");
        assert_eq!(snapshot_count(&project), 0);
    }

    #[test]
    fn write_proceeds_when_snapshot_cannot_be_taken() {
        let project = TestProject::new().expect("project");
        project.grant(all_granted()).expect("grant");
        project.write("a.txt", "before").expect("seed");
        let snapshots_dir = &project.context().snapshots_dir;
        fs::remove_dir_all(snapshots_dir).expect("remove snapshots");
        fs::write(snapshots_dir, "not a directory").expect("block snapshots");
        let prompter = ScriptedPrompter::new(Vec::<String>::new());
        let config = KekeConfig::default();
        let dispatcher = Dispatcher::new(project.context(), &config, &prompter, Mode::Ask);

        let output = dispatcher
            .dispatch(&Action::WriteFile {
                path: "a.txt".to_string(),
                content: "after".to_string(),
            })
            .expect("write");

        assert_eq!(output, "Successfully wrote 5 bytes to a.txt");
        assert_eq!(project.read("a.txt").expect("read"), "after");
        assert!(snapshots_dir.is_file());
    }

    #[test]
    fn write_outside_project_is_rejected_without_effect() {
        let project = TestProject::new().expect("project");
        project.grant(all_granted()).expect("grant");
        let prompter = ScriptedPrompter::new(Vec::<String>::new());
        let config = KekeConfig::default();
        let dispatcher = Dispatcher::new(project.context(), &config, &prompter, Mode::Ask);

        let err = dispatcher
            .dispatch(&Action::WriteFile {
                path: "../escape.txt".to_string(),
                content: "x".to_string(),
            })
            .unwrap_err();

        assert!(matches!(err, ActionError::OutsideProject(_)));
        let parent = project.root().parent().expect("parent");
        assert!(!parent.join("escape.txt").exists());
    }

    #[test]
    fn denied_permission_has_no_effect() {
        let project = TestProject::new().expect("project");
        project.write("keep.txt", "original").expect("seed");
        let prompter = ScriptedPrompter::new(["n"]);
        let config = KekeConfig::default();
        let dispatcher = Dispatcher::new(project.context(), &config, &prompter, Mode::Ask);

        let outcome = dispatcher.dispatch(&Action::WriteFile {
            path: "keep.txt".to_string(),
            content: "changed".to_string(),
        });

        assert_eq!(outcome_text(&outcome), "Permission denied by user");
        assert_eq!(project.read("keep.txt").expect("read"), "original");
        assert_eq!(snapshot_count(&project), 0);
        assert_eq!(
            load_permissions(&project.context().permissions_path),
            PermissionSet::default()
        );
    }

    #[test]
    fn granted_read_is_not_reprompted() {
        let project = TestProject::new().expect("project");
        project.write("a.txt", "A").expect("seed");
        let prompter = ScriptedPrompter::new(["yes"]);
        let config = KekeConfig::default();
        let dispatcher = Dispatcher::new(project.context(), &config, &prompter, Mode::Ask);
        let read = Action::ReadFile {
            path: "a.txt".to_string(),
        };

        assert_eq!(dispatcher.dispatch(&read).expect("first"), "A");
        assert_eq!(dispatcher.dispatch(&read).expect("second"), "A");
        let listed = dispatcher
            .dispatch(&Action::ListFiles {
                path: ".".to_string(),
            })
            .expect("list");

        assert_eq!(listed, "a.txt");
        assert_eq!(prompter.questions(), vec!["Allow read? (y/n)".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn command_output_and_failure_are_results() {
        let project = TestProject::new().expect("project");
        project.grant(all_granted()).expect("grant");
        let prompter = ScriptedPrompter::new(Vec::<String>::new());
        let config = KekeConfig::default();
        let dispatcher = Dispatcher::new(project.context(), &config, &prompter, Mode::Ask);

        let ok = dispatcher
            .dispatch(&Action::ExecuteCommand {
                command: "echo hi".to_string(),
            })
            .expect("echo");
        assert_eq!(ok, "hi\n");

        let failed = dispatcher.dispatch(&Action::ExecuteCommand {
            command: "echo partial; exit 2".to_string(),
        });
        assert_eq!(
            outcome_text(&failed),
            "Command failed: exit status 2\nOutput: partial\n"
        );
    }

    #[test]
    fn research_actions_need_research_mode() {
        let project = TestProject::new().expect("project");
        project.grant(all_granted()).expect("grant");
        project.write("data.csv", "a,b\n1,2\n3,4\n").expect("seed");
        let prompter = ScriptedPrompter::new(Vec::<String>::new());
        let config = KekeConfig::default();
        let load = Action::LoadDataset {
            path: "data.csv".to_string(),
            format: None,
        };

        let ask = Dispatcher::new(project.context(), &config, &prompter, Mode::Ask);
        assert_eq!(
            outcome_text(&ask.dispatch(&load)),
            "Unknown action type: load_dataset"
        );

        let research = Dispatcher::new(project.context(), &config, &prompter, Mode::Research);
        let output = research.dispatch(&load).expect("load");
        assert!(output.contains("Rows: 2"), "{output}");
        assert!(output.contains("Columns: [a, b]"), "{output}");
    }

    #[test]
    fn unknown_record_type_is_reported() {
        let project = TestProject::new().expect("project");
        let prompter = ScriptedPrompter::new(Vec::<String>::new());
        let config = KekeConfig::default();
        let dispatcher = Dispatcher::new(project.context(), &config, &prompter, Mode::Ask);

        let outcome = dispatcher.dispatch_record(ActionRecord {
            kind: "delete_everything".to_string(),
            ..ActionRecord::default()
        });

        assert_eq!(outcome_text(&outcome), "Unknown action type: delete_everything");
        assert!(prompter.questions().is_empty());
    }

    #[test]
    fn malformed_tool_call_fails_before_prompting() {
        let project = TestProject::new().expect("project");
        let prompter = ScriptedPrompter::new(Vec::<String>::new());
        let config = KekeConfig::default();
        let dispatcher = Dispatcher::new(project.context(), &config, &prompter, Mode::Code);

        let result = dispatcher.dispatch_tool_call(&tool_call("write_file", r#"{"path":"a.txt"}"#));

        assert_eq!(result.tool_call_id, "call-7");
        assert!(result.is_error());
        assert!(prompter.questions().is_empty());
        assert!(!project.root().join("a.txt").exists());
    }

    #[test]
    fn double_encoded_tool_call_is_dispatched() {
        let project = TestProject::new().expect("project");
        project.grant(all_granted()).expect("grant");
        project.write("b.txt", "bee").expect("seed");
        let prompter = ScriptedPrompter::new(Vec::<String>::new());
        let config = KekeConfig::default();
        let dispatcher = Dispatcher::new(project.context(), &config, &prompter, Mode::Code);

        let result =
            dispatcher.dispatch_tool_call(&tool_call("read_file", r#""{\"path\":\"b.txt\"}""#));

        assert_eq!(result.output, "bee");
        assert!(!result.is_error());
    }
}
