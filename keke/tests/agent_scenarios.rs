//! End-to-end conversation scenarios against a scripted remote agent.
//!
//! These drive `run_conversation` through a real dispatcher on a temp project,
//! so grants, snapshots and file effects are all observable on disk.

use std::fs;

use keke::core::action::ActionRecord;
use keke::core::tier::{Mode, ModelTier};
use keke::dispatch::Dispatcher;
use keke::io::config::KekeConfig;
use keke::io::permissions::{PermissionSet, load_permissions};
use keke::io::remote::{RemoteReply, RoundPayload};
use keke::io::snapshot::SnapshotStore;
use keke::looping::{AgentRequest, LoopEvent, LoopStop, run_conversation};
use keke::test_support::{ScriptedPrompter, ScriptedRemote, TestProject};

fn request(prompt: &str) -> AgentRequest {
    AgentRequest {
        prompt: prompt.to_string(),
        tier: ModelTier::Smart,
        mode: Mode::Ask,
        provider: None,
        max_iterations: 20,
    }
}

fn record(kind: &str, path: &str) -> ActionRecord {
    ActionRecord {
        kind: kind.to_string(),
        path: Some(path.to_string()),
        ..ActionRecord::default()
    }
}

/// Declined `list_files`: the denial is fed back, nothing is listed, and the
/// remote's closing message ends the conversation.
#[test]
fn declined_listing_is_reported_back_and_nothing_is_listed() {
    let project = TestProject::new().expect("project");
    project.write("secret.txt", "s").expect("seed");
    let remote = ScriptedRemote::new(vec![
        Ok(RemoteReply {
            message: "Let me look around.".to_string(),
            actions: vec![record("list_files", ".")],
            credits_used: 1,
            ..RemoteReply::default()
        }),
        Ok(RemoteReply {
            message: "Understood, I will not list files.".to_string(),
            credits_used: 1,
            done: true,
            ..RemoteReply::default()
        }),
    ]);
    let prompter = ScriptedPrompter::new(["n"]);
    let config = KekeConfig::default();
    let dispatcher = Dispatcher::new(project.context(), &config, &prompter, Mode::Ask);
    let mut outputs = Vec::new();

    let outcome = run_conversation(&remote, &dispatcher, &request("list files"), |event| {
        if let LoopEvent::ActionFinished { output, error } = event {
            outputs.push((output.to_string(), error.map(str::to_string)));
        }
    })
    .expect("conversation");

    assert_eq!(outcome.stop, LoopStop::Done);
    assert_eq!(outcome.final_message, "Understood, I will not list files.");
    assert_eq!(
        outputs,
        vec![(String::new(), Some("Permission denied by user".to_string()))]
    );

    let requests = remote.requests();
    let RoundPayload::Transcript(turns) = &requests[1].payload else {
        panic!("expected transcript payload");
    };
    let last = turns.last().expect("turn");
    assert_eq!(last.content, "Action result: Permission denied by user");
    assert!(turns.iter().all(|turn| !turn.content.contains("secret.txt")));
    assert_eq!(
        load_permissions(&project.context().permissions_path),
        PermissionSet::default()
    );
}

/// Three rounds: two with actions, the last done. Credits from all three
/// rounds are summed and the loop makes no fourth call.
#[test]
fn multi_round_conversation_sums_credits_and_protects_writes() {
    let project = TestProject::new().expect("project");
    project.write("README.md", "old readme").expect("seed");
    let remote = ScriptedRemote::new(vec![
        Ok(RemoteReply {
            message: "Reading first.".to_string(),
            actions: vec![record("read_file", "README.md")],
            credits_used: 2,
            ..RemoteReply::default()
        }),
        Ok(RemoteReply {
            message: "Updating.".to_string(),
            actions: vec![ActionRecord {
                content: Some("new readme".to_string()),
                ..record("write_file", "README.md")
            }],
            credits_used: 3,
            ..RemoteReply::default()
        }),
        Ok(RemoteReply {
            message: "Done.".to_string(),
            credits_used: 4,
            done: true,
            ..RemoteReply::default()
        }),
        Ok(RemoteReply {
            message: "never sent".to_string(),
            ..RemoteReply::default()
        }),
    ]);
    let prompter = ScriptedPrompter::new(["y", "y"]);
    let config = KekeConfig::default();
    let dispatcher = Dispatcher::new(project.context(), &config, &prompter, Mode::Ask);

    let outcome =
        run_conversation(&remote, &dispatcher, &request("refresh the readme"), |_| {})
            .expect("conversation");

    assert_eq!(outcome.rounds, 3);
    assert_eq!(outcome.credits, 9);
    assert_eq!(outcome.stop, LoopStop::Done);
    assert_eq!(remote.requests().len(), 3);
    assert_eq!(
        prompter.questions(),
        vec!["Allow read? (y/n)".to_string(), "Allow write? (y/n)".to_string()]
    );

    assert_eq!(project.read("README.md").expect("read"), "new readme");
    let snapshots = SnapshotStore::new(project.context()).list().expect("list");
    assert_eq!(snapshots.len(), 1);
    assert_eq!(
        fs::read_to_string(&snapshots[0].path).expect("snapshot"),
        "old readme"
    );
}
