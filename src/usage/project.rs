//! Project attribution for sessions
//!
//! A session's project comes from, in order: a user override, evidence in the
//! log itself (only for sessions stored under the home folder), or the name
//! of the folder the log lives in. Aliases are applied to whatever wins.

use std::path::Path;

use log::warn;
use regex::Regex;

use crate::usage::config::{HubConfig, HOME_PROJECT};
use crate::usage::models::{ContentBlock, MessageContent, SessionEvent};
use crate::usage::overrides::OverrideMap;
use crate::usage::tally::Tally;

/// Maps raw session evidence to a canonical project name
#[derive(Debug, Clone)]
pub struct ProjectResolver {
    config: HubConfig,
    home_dir: String,
    /// One `<root>/<name>` matcher per code directory
    root_patterns: Vec<Regex>,
}

impl ProjectResolver {
    pub fn new(config: HubConfig, home_dir: &Path) -> Self {
        let root_patterns = config
            .code_directories
            .iter()
            .filter_map(|dir| {
                let pattern = format!("{}/([A-Za-z0-9_][A-Za-z0-9_-]*)", regex::escape(dir));
                Regex::new(&pattern)
                    .map_err(|e| warn!("Skipping code directory {:?}: {}", dir, e))
                    .ok()
            })
            .collect();

        Self {
            config,
            home_dir: home_dir.to_string_lossy().to_string(),
            root_patterns,
        }
    }

    /// Resolve the canonical project for a session
    pub fn resolve(
        &self,
        session_id: &str,
        folder_project: &str,
        events: &[SessionEvent],
        overrides: &OverrideMap,
    ) -> String {
        let raw = overrides
            .get(session_id)
            .cloned()
            .or_else(|| {
                if folder_project == HOME_PROJECT {
                    self.detect_project(events)
                } else {
                    None
                }
            })
            .unwrap_or_else(|| folder_project.to_string());

        self.normalize(&raw)
    }

    /// Apply the alias table: exact name first, then lowercase
    pub fn normalize(&self, name: &str) -> String {
        let aliases = &self.config.project_aliases;
        aliases
            .get(name)
            .or_else(|| aliases.get(&name.to_lowercase()))
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// First path segment below a configured code directory
    pub fn project_from_cwd(&self, cwd: &str) -> Option<String> {
        self.config.code_directories.iter().find_map(|dir| {
            let rest = cwd.strip_prefix(dir.as_str())?.strip_prefix('/')?;
            let root = rest.split('/').next()?;
            if root.is_empty() {
                None
            } else {
                Some(root.to_string())
            }
        })
    }

    /// Every `<code-dir>/<name>` mention in free text
    pub fn projects_in_text(&self, text: &str) -> Vec<String> {
        self.root_patterns
            .iter()
            .flat_map(|pattern| {
                pattern
                    .captures_iter(text)
                    .filter_map(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string())
            })
            .collect()
    }

    /// Guess the project from working directories, then from path mentions.
    ///
    /// Working-directory evidence beats text evidence regardless of counts.
    pub fn detect_project(&self, events: &[SessionEvent]) -> Option<String> {
        let mut cwd_counts = Tally::new();
        let mut path_counts = Tally::new();

        for event in events {
            if let Some(cwd) = event.cwd.as_deref() {
                if cwd != self.home_dir {
                    if let Some(project) = self.project_from_cwd(cwd) {
                        cwd_counts.add(&self.normalize(&project));
                    }
                }
            }

            let Some(message) = &event.message else {
                continue;
            };
            for text in message_texts(&message.content) {
                for project in self.projects_in_text(text) {
                    path_counts.add(&self.normalize(&project));
                }
            }
        }

        cwd_counts
            .leader()
            .or_else(|| path_counts.leader())
            .map(str::to_string)
    }
}

/// Text worth scanning for paths: tool inputs, plain content and text blocks
fn message_texts(content: &MessageContent) -> Vec<&str> {
    match content {
        MessageContent::Text(text) => vec![text.as_str()],
        MessageContent::Blocks(blocks) => {
            let mut texts = Vec::new();
            for block in blocks {
                if let ContentBlock::ToolUse {
                    input: Some(input), ..
                } = block
                {
                    if let Some(fields) = input.as_object() {
                        texts.extend(fields.values().filter_map(|v| v.as_str()));
                    }
                }
            }
            for block in blocks {
                if let ContentBlock::Text { text: Some(text) } = block {
                    texts.extend(text.as_str());
                }
            }
            texts
        }
        MessageContent::Other(_) => Vec::new(),
    }
}
