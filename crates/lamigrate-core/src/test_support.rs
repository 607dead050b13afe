//! In-memory host for engine tests.

use crate::error::MigrationError;
use crate::graph::{InstalledGraph, InstalledRepository};
use crate::host::{Host, SubCommand};
use crate::manifest::ManifestStore;
use crate::package::Package;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

pub struct FakeHost {
    pub graph: InstalledGraph,
    pub dev_requirements: Vec<String>,
    pub available: Vec<Package>,
    pub commands: Vec<SubCommand>,
    /// Exit codes for upcoming commands; exhausted means success.
    pub exit_codes: VecDeque<i32>,
    pub uninstalled: Vec<String>,
    /// Answers for upcoming prompts; exhausted means the default.
    pub answers: VecDeque<bool>,
    pub questions: Vec<String>,
}

impl FakeHost {
    pub fn new(graph: InstalledGraph) -> Self {
        Self {
            graph,
            dev_requirements: Vec::new(),
            available: Vec::new(),
            commands: Vec::new(),
            exit_codes: VecDeque::new(),
            uninstalled: Vec::new(),
            answers: VecDeque::new(),
            questions: Vec::new(),
        }
    }

    pub fn with_available(mut self, package: Package) -> Self {
        self.available.push(package);
        self
    }

    pub fn with_dev_requirement(mut self, name: &str) -> Self {
        self.dev_requirements.push(name.to_string());
        self
    }

    pub fn with_exit_codes(mut self, codes: &[i32]) -> Self {
        self.exit_codes.extend(codes);
        self
    }

    pub fn with_answers(mut self, answers: &[bool]) -> Self {
        self.answers.extend(answers);
        self
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.commands.iter().map(ToString::to_string).collect()
    }
}

impl Host for FakeHost {
    fn installed(&self) -> &dyn InstalledRepository {
        &self.graph
    }

    fn is_dev_requirement(&self, name: &str) -> bool {
        self.dev_requirements.iter().any(|n| n == name)
    }

    fn find_available_package(&self, name: &str, version: &str) -> Option<Package> {
        self.available
            .iter()
            .find(|p| p.name == name && p.version == version)
            .cloned()
    }

    fn run_command(&mut self, command: &SubCommand) -> Result<i32, MigrationError> {
        self.commands.push(command.clone());
        Ok(self.exit_codes.pop_front().unwrap_or(0))
    }

    fn uninstall(&mut self, package: &Package) -> Result<(), MigrationError> {
        self.uninstalled.push(package.name.clone());
        Ok(())
    }

    fn confirm(&mut self, question: &str, default: bool) -> bool {
        self.questions.push(question.to_string());
        self.answers.pop_front().unwrap_or(default)
    }
}

/// Manifest store keeping the document in memory and counting writes.
#[derive(Default)]
pub struct MemoryStore {
    pub content: RefCell<Value>,
    pub writes: Cell<usize>,
}

impl MemoryStore {
    pub fn new(content: Value) -> Self {
        Self {
            content: RefCell::new(content),
            writes: Cell::new(0),
        }
    }
}

impl ManifestStore for MemoryStore {
    fn read(&self) -> Result<Value, MigrationError> {
        Ok(self.content.borrow().clone())
    }

    fn write(&self, definition: &Value) -> Result<(), MigrationError> {
        *self.content.borrow_mut() = definition.clone();
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }
}
