//! Scripted collaborators and throwaway projects for tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::io::permissions::{PermissionSet, write_permissions};
use crate::io::project::{ProjectContext, init_project};
use crate::io::prompter::Prompter;
use crate::io::remote::{RemoteAgent, RemoteError, RemoteReply, RoundRequest};

/// Prompter answering from a queue and recording every question.
///
/// An exhausted queue is an input error, which callers treat as refusal.
pub struct ScriptedPrompter {
    answers: RefCell<VecDeque<String>>,
    questions: RefCell<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: RefCell::new(answers.into_iter().map(Into::into).collect()),
            questions: RefCell::new(Vec::new()),
        }
    }

    pub fn questions(&self) -> Vec<String> {
        self.questions.borrow().clone()
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&self, question: &str) -> Result<String> {
        self.questions.borrow_mut().push(question.to_string());
        self.answers
            .borrow_mut()
            .pop_front()
            .map(|answer| answer.trim().to_string())
            .ok_or_else(|| anyhow!("no scripted answer for {question:?}"))
    }
}

/// Remote agent replaying queued replies and recording every request.
pub struct ScriptedRemote {
    replies: RefCell<VecDeque<Result<RemoteReply, RemoteError>>>,
    requests: RefCell<Vec<RoundRequest>>,
}

impl ScriptedRemote {
    pub fn new(replies: Vec<Result<RemoteReply, RemoteError>>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<RoundRequest> {
        self.requests.borrow().clone()
    }
}

impl RemoteAgent for ScriptedRemote {
    fn exchange(&self, request: &RoundRequest) -> Result<RemoteReply, RemoteError> {
        self.requests.borrow_mut().push(request.clone());
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(RemoteError::Transport("script exhausted".to_string())))
    }
}

/// Initialized project in a temp directory.
pub struct TestProject {
    _temp: TempDir,
    context: ProjectContext,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create tempdir")?;
        let context = ProjectContext::new(temp.path());
        init_project(&context)?;
        Ok(Self {
            _temp: temp,
            context,
        })
    }

    pub fn context(&self) -> &ProjectContext {
        &self.context
    }

    pub fn root(&self) -> &Path {
        &self.context.root
    }

    /// Write a project-relative file, creating parent directories.
    pub fn write(&self, relative: &str, contents: &str) -> Result<()> {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    pub fn read(&self, relative: &str) -> Result<String> {
        let path = self.root().join(relative);
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }

    /// Replace the persisted grants.
    pub fn grant(&self, set: PermissionSet) -> Result<()> {
        write_permissions(&self.context.permissions_path, &set)
    }
}
