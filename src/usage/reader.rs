//! JSONL session file discovery and parsing

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Local, Timelike, Utc};
use glob::{glob, Pattern};
use log::{debug, warn};

use crate::usage::config::friendly_folder_name;
use crate::usage::models::{ContentBlock, SessionData, SessionEvent};
use crate::usage::overrides::OverrideMap;
use crate::usage::project::ProjectResolver;
use crate::usage::tally::Tally;

/// Error type for reader operations
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory not found: {0}")]
    DirNotFound(String),
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// One encoded project folder and its session logs
#[derive(Debug, Clone)]
pub struct ProjectFolder {
    pub encoded_path: String,
    /// Project hint derived from the folder name
    pub folder_project: String,
    pub session_files: Vec<PathBuf>,
}

/// List all project folders under the projects directory
pub fn list_projects(projects_dir: &Path) -> Result<Vec<ProjectFolder>, ReaderError> {
    if !projects_dir.is_dir() {
        return Err(ReaderError::DirNotFound(
            projects_dir.to_string_lossy().to_string(),
        ));
    }

    let mut dirs: Vec<PathBuf> = fs::read_dir(projects_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();

    let mut projects = Vec::new();
    for path in dirs {
        let encoded_path = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ReaderError::InvalidPath(path.to_string_lossy().to_string()));
        let encoded_path = match encoded_path {
            Ok(name) => name.to_string(),
            Err(e) => {
                warn!("Skipping project folder: {}", e);
                continue;
            }
        };

        let pattern = Path::new(&Pattern::escape(&path.to_string_lossy())).join("*.jsonl");
        let session_files: Vec<PathBuf> = glob(pattern.to_string_lossy().as_ref())
            .map(|paths| paths.filter_map(Result::ok).filter(|p| p.is_file()).collect())
            .unwrap_or_default();

        projects.push(ProjectFolder {
            folder_project: friendly_folder_name(&encoded_path),
            encoded_path,
            session_files,
        });
    }

    Ok(projects)
}

/// Read every well-formed record of a JSONL file, skipping bad lines
pub fn read_session_events(path: &Path) -> Result<Vec<SessionEvent>, ReaderError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut events = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = match line_result {
            Ok(l) => l,
            Err(e) => {
                // Read errors repeat on every call, so give up on the file
                warn!("Failed to read line {} in {:?}: {}", line_num, path, e);
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<SessionEvent>(line) {
            Ok(event) => events.push(event),
            Err(e) => {
                debug!(
                    "Failed to parse JSON at line {} in {:?}: {}",
                    line_num, path, e
                );
            }
        }
    }

    Ok(events)
}

/// Session id of a log file: its file name without `.jsonl`
pub fn session_id(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Parse one session log into a [`SessionData`].
///
/// Returns `None` for unreadable files and for logs without a single
/// billable assistant reply.
pub fn parse_session(
    path: &Path,
    folder_project: &str,
    resolver: &ProjectResolver,
    overrides: &OverrideMap,
) -> Option<SessionData> {
    let events = match read_session_events(path) {
        Ok(events) => events,
        Err(e) => {
            warn!("Failed to read session file {:?}: {}", path, e);
            return None;
        }
    };
    if events.is_empty() {
        return None;
    }

    let id = session_id(path);
    let project = resolver.resolve(&id, folder_project, &events, overrides);
    summarize_events(id, project, &events)
}

/// Fold parsed records into session counters and histograms
pub fn summarize_events(id: String, project: String, events: &[SessionEvent]) -> Option<SessionData> {
    let mut session = SessionData {
        id,
        project,
        primary_model: "unknown".to_string(),
        ..Default::default()
    };
    let mut model_counts = Tally::new();

    for event in events {
        fill_metadata(&mut session, event);

        let Some(model) = event.billable_model() else {
            continue;
        };
        let Some(message) = &event.message else {
            continue;
        };

        session.messages += 1;
        model_counts.add(model);
        let model_usage = session.model_usage.entry(model.to_string()).or_default();
        model_usage.messages += 1;

        if let Some(usage) = &message.usage {
            let input = usage.input_tokens.unwrap_or(0);
            let output = usage.output_tokens.unwrap_or(0);

            session.input_tokens += input;
            session.output_tokens += output;
            session.cache_read_tokens += usage.cache_read_input_tokens.unwrap_or(0);
            session.cache_create_tokens += usage.cache_creation_input_tokens.unwrap_or(0);
            model_usage.input_tokens += input;
            model_usage.output_tokens += output;
        }

        for block in message.content.blocks() {
            if let ContentBlock::ToolUse { .. } = block {
                session.tool_calls += 1;
                let tool = block.tool_name().unwrap_or("unknown");
                *session.tool_usage.entry(tool.to_string()).or_insert(0) += 1;
            }
        }

        if let Some(timestamp) = event.timestamp.as_deref() {
            record_activity(&mut session, timestamp);
        }
    }

    if session.messages == 0 {
        return None;
    }
    if let Some(model) = model_counts.leader() {
        session.primary_model = model.to_string();
    }

    Some(session)
}

/// Slug, version and branch: first non-empty value in file order wins
fn fill_metadata(session: &mut SessionData, event: &SessionEvent) {
    fn first_non_empty(slot: &mut String, value: &Option<String>) {
        if slot.is_empty() {
            if let Some(value) = value {
                slot.clone_from(value);
            }
        }
    }

    first_non_empty(&mut session.slug, &event.slug);
    first_non_empty(&mut session.version, &event.version);
    first_non_empty(&mut session.branch, &event.git_branch);
}

fn record_activity(session: &mut SessionData, timestamp: &str) {
    let Some(parsed) = parse_timestamp(timestamp) else {
        debug!("Ignoring unparseable timestamp {:?} in session {}", timestamp, session.id);
        return;
    };
    let local = parsed.with_timezone(&Local);

    *session.hourly.entry(local.hour()).or_insert(0) += 1;
    *session.daily.entry(day_key(&local)).or_insert(0) += 1;

    if session.first_active.is_empty() || timestamp < session.first_active.as_str() {
        session.first_active = timestamp.to_string();
    }
    if session.last_active.is_empty() || timestamp > session.last_active.as_str() {
        session.last_active = timestamp.to_string();
    }
}

/// `YYYY-MM-DD` bucket key for a local date
pub fn day_key<D: Datelike>(date: &D) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day())
}

/// Parse ISO timestamp to DateTime<Utc>
pub fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|ndt| ndt.and_utc())
        })
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|ndt| ndt.and_utc())
        })
}
