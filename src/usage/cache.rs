//! Process-wide session cache
//!
//! The full session list is built from disk on first use and kept until it is
//! explicitly invalidated. Readers get an `Arc` snapshot, so an invalidation
//! racing with an aggregation only swaps the pointer and never mutates a list
//! that is still being folded.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use log::{debug, info, warn};

use crate::usage::config::{get_overrides_path, get_projects_dir, ConfigSource, HubConfig};
use crate::usage::models::SessionData;
use crate::usage::overrides::{load_overrides, save_overrides, OverrideMap, StoreError};
use crate::usage::project::ProjectResolver;
use crate::usage::reader::{list_projects, parse_session, ReaderError};

/// Filesystem locations the store reads from
#[derive(Debug, Clone)]
pub struct StorePaths {
    pub projects_dir: PathBuf,
    pub overrides_file: PathBuf,
    pub config: ConfigSource,
}

impl StorePaths {
    /// Default locations, with an optional custom Claude data directory
    pub fn from_env(custom_path: Option<&str>) -> Self {
        Self {
            projects_dir: get_projects_dir(custom_path),
            overrides_file: get_overrides_path(custom_path),
            config: ConfigSource::from_env(),
        }
    }
}

/// Cached sessions, overrides and attribution config
#[derive(Debug)]
pub struct SessionStore {
    paths: StorePaths,
    sessions: Mutex<Option<Arc<Vec<SessionData>>>>,
    overrides: Mutex<Option<Arc<OverrideMap>>>,
    resolver: Mutex<Option<Arc<ProjectResolver>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionStore {
    pub fn new(paths: StorePaths) -> Self {
        Self {
            paths,
            sessions: Mutex::new(None),
            overrides: Mutex::new(None),
            resolver: Mutex::new(None),
        }
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    /// All parsed sessions, scanning the projects directory on a cache miss
    pub fn get_all_sessions(&self) -> Arc<Vec<SessionData>> {
        let mut cached = lock(&self.sessions);
        if let Some(sessions) = cached.as_ref() {
            return Arc::clone(sessions);
        }

        let sessions = Arc::new(self.load_sessions());
        *cached = Some(Arc::clone(&sessions));
        sessions
    }

    /// Drop every cache; the next read rescans disk and reloads config
    pub fn clear_session_cache(&self) {
        // Sessions last: a rebuild running in between has already seen the
        // old resolver, and its result must not outlive the refresh
        *lock(&self.resolver) = None;
        *lock(&self.overrides) = None;
        *lock(&self.sessions) = None;
        debug!("Session cache cleared");
    }

    /// Current override map, loaded lazily
    pub fn get_overrides(&self) -> Arc<OverrideMap> {
        let mut cached = lock(&self.overrides);
        self.cached_overrides(&mut cached)
    }

    fn cached_overrides(&self, cached: &mut Option<Arc<OverrideMap>>) -> Arc<OverrideMap> {
        match cached.as_ref() {
            Some(overrides) => Arc::clone(overrides),
            None => {
                let overrides = Arc::new(load_overrides(&self.paths.overrides_file));
                *cached = Some(Arc::clone(&overrides));
                overrides
            }
        }
    }

    /// Attribute a session to a project, replacing any earlier override
    pub fn set_override(&self, session_id: &str, project: &str) -> Result<(), StoreError> {
        self.update_overrides(|overrides| {
            overrides.insert(session_id.to_string(), project.to_string());
        })
    }

    /// Forget a session's override; unknown ids are a no-op write
    pub fn remove_override(&self, session_id: &str) -> Result<(), StoreError> {
        self.update_overrides(|overrides| {
            overrides.remove(session_id);
        })
    }

    fn update_overrides<F>(&self, mutate: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut OverrideMap),
    {
        {
            // Held across load, save and swap so concurrent writers queue up
            let mut cached = lock(&self.overrides);
            let mut overrides = (*self.cached_overrides(&mut cached)).clone();
            mutate(&mut overrides);
            save_overrides(&self.paths.overrides_file, &overrides)?;
            *cached = Some(Arc::new(overrides));
        }

        // Attribution may have changed. Never taken while holding the
        // overrides lock: a rebuild holds sessions and then asks for overrides.
        *lock(&self.sessions) = None;
        Ok(())
    }

    /// Project resolver built from the cached hub config
    pub fn resolver(&self) -> Arc<ProjectResolver> {
        let mut cached = lock(&self.resolver);
        match cached.as_ref() {
            Some(resolver) => Arc::clone(resolver),
            None => {
                let config = HubConfig::load(&self.paths.config);
                let resolver = Arc::new(ProjectResolver::new(config, &self.paths.config.home_dir));
                *cached = Some(Arc::clone(&resolver));
                resolver
            }
        }
    }

    fn load_sessions(&self) -> Vec<SessionData> {
        let start = Instant::now();
        let projects = match list_projects(&self.paths.projects_dir) {
            Ok(projects) => projects,
            Err(ReaderError::DirNotFound(dir)) => {
                info!("Projects directory {} does not exist, no sessions", dir);
                return Vec::new();
            }
            Err(e) => {
                warn!("Failed to list projects: {}", e);
                return Vec::new();
            }
        };

        let resolver = self.resolver();
        let overrides = self.get_overrides();

        let sessions: Vec<SessionData> = projects
            .iter()
            .flat_map(|project| {
                project.session_files.iter().filter_map(|file| {
                    parse_session(file, &project.folder_project, &resolver, &overrides)
                })
            })
            .collect();

        info!(
            "Loaded {} sessions from {} project folders in {:?}",
            sessions.len(),
            projects.len(),
            start.elapsed()
        );
        sessions
    }
}
