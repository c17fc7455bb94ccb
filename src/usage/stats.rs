//! Statistics calculation for session data

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{Duration, Local, NaiveDate, SecondsFormat, Utc};

use crate::usage::cache::SessionStore;
use crate::usage::models::{
    CacheEfficiency, ClaudeStats, ModelUsage, ProjectDetailStats, ProjectStat,
    ProjectTimelineEntry, SessionData, SessionTimelineEntry, StatsFilters, StreakStats,
};
use crate::usage::pricing::{CostBreakdown, PricingCalculator, SONNET_PRICING};
use crate::usage::reader::{day_key, parse_timestamp};

/// Spans longer than this are treated as idle time
const MAX_SESSION_SPAN_MS: i64 = 4 * 60 * 60 * 1000;

/// Aggregate statistics over every cached session, optionally filtered
pub fn parse_claude_data(store: &SessionStore, filters: Option<&StatsFilters>) -> ClaudeStats {
    let snapshot = store.get_all_sessions();
    let sessions: Vec<&SessionData> = snapshot
        .iter()
        .filter(|s| filters.map_or(true, |f| f.matches(s)))
        .collect();

    let mut stats = calculate_claude_stats(&sessions, &PricingCalculator::new(), today());
    stats.generated_at = generated_at();
    stats
}

/// Statistics for one project (case-insensitive), `None` if it has no sessions
pub fn parse_project_data(store: &SessionStore, project_name: &str) -> Option<ProjectDetailStats> {
    let snapshot = store.get_all_sessions();
    let wanted = project_name.to_lowercase();
    let sessions: Vec<&SessionData> = snapshot
        .iter()
        .filter(|s| s.project.to_lowercase() == wanted)
        .collect();

    let mut detail = calculate_project_detail(project_name, &sessions, &PricingCalculator::new())?;
    detail.generated_at = generated_at();
    Some(detail)
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn generated_at() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Fold sessions into global statistics; `generated_at` is left empty
pub fn calculate_claude_stats(
    sessions: &[&SessionData],
    pricing: &PricingCalculator,
    today: NaiveDate,
) -> ClaudeStats {
    let mut stats = ClaudeStats {
        hourly_activity: empty_hourly(),
        ..Default::default()
    };
    let mut projects: Vec<ProjectStat> = Vec::new();
    let mut project_index: HashMap<String, usize> = HashMap::new();

    for session in sessions {
        stats.total_sessions += 1;
        stats.total_messages += session.messages;
        stats.total_input_tokens += session.input_tokens;
        stats.total_output_tokens += session.output_tokens;
        stats.total_cache_read_tokens += session.cache_read_tokens;
        stats.total_cache_create_tokens += session.cache_create_tokens;
        stats.total_tool_calls += session.tool_calls;

        merge_activity(&mut stats.hourly_activity, &mut stats.daily_activity, session);
        for (tool, count) in &session.tool_usage {
            *stats.tool_usage.entry(tool.clone()).or_insert(0) += count;
        }
        merge_model_usage(&mut stats.model_usage, session);

        let (session_cost, by_model) = compute_session_cost(session, pricing);
        stats.estimated_cost += session_cost;
        merge_costs(&mut stats.cost_by_model, &by_model);

        let idx = *project_index
            .entry(session.project.clone())
            .or_insert_with(|| {
                projects.push(ProjectStat {
                    name: session.project.clone(),
                    ..Default::default()
                });
                projects.len() - 1
            });
        let project = &mut projects[idx];
        project.messages += session.messages;
        project.sessions += 1;
        project.tokens += session.input_tokens
            + session.output_tokens
            + session.cache_read_tokens
            + session.cache_create_tokens;
        project.input_tokens += session.input_tokens;
        project.output_tokens += session.output_tokens;
        project.cache_read_tokens += session.cache_read_tokens;
        project.cache_create_tokens += session.cache_create_tokens;
        project.estimated_cost += session_cost;
        if project.last_active.is_empty() || session.last_active > project.last_active {
            project.last_active.clone_from(&session.last_active);
        }
    }

    projects.sort_by(|a, b| b.messages.cmp(&a.messages));

    stats.total_hours_estimate = estimate_session_hours(sessions);
    stats.project_stats = projects;
    stats.streak_stats = compute_streaks(&stats.daily_activity, sessions, today);
    stats.cache_efficiency = compute_cache_efficiency(sessions);
    stats.session_timeline = build_session_timeline(sessions, pricing);
    stats.project_timeline = build_project_timeline(sessions, pricing);

    stats
}

/// Fold one project's sessions; `None` when there are none
pub fn calculate_project_detail(
    name: &str,
    sessions: &[&SessionData],
    pricing: &PricingCalculator,
) -> Option<ProjectDetailStats> {
    if sessions.is_empty() {
        return None;
    }

    let mut detail = ProjectDetailStats {
        name: name.to_string(),
        sessions: sessions.len() as u64,
        hourly_activity: empty_hourly(),
        ..Default::default()
    };

    for session in sessions {
        detail.messages += session.messages;
        detail.input_tokens += session.input_tokens;
        detail.output_tokens += session.output_tokens;
        detail.cache_read_tokens += session.cache_read_tokens;
        detail.cache_create_tokens += session.cache_create_tokens;
        detail.total_tool_calls += session.tool_calls;

        merge_activity(&mut detail.hourly_activity, &mut detail.daily_activity, session);
        merge_model_usage(&mut detail.model_usage, session);

        let (session_cost, by_model) = compute_session_cost(session, pricing);
        detail.estimated_cost += session_cost;
        merge_costs(&mut detail.cost_by_model, &by_model);
    }

    detail.total_hours_estimate = estimate_session_hours(sessions);
    detail.session_history = build_session_timeline(sessions, pricing);

    Some(detail)
}

/// All 24 hour buckets, zero-filled
fn empty_hourly() -> BTreeMap<u32, u64> {
    (0..24).map(|hour| (hour, 0)).collect()
}

fn merge_activity(
    hourly: &mut BTreeMap<u32, u64>,
    daily: &mut BTreeMap<String, u64>,
    session: &SessionData,
) {
    for (hour, count) in &session.hourly {
        *hourly.entry(*hour).or_insert(0) += count;
    }
    for (day, count) in &session.daily {
        *daily.entry(day.clone()).or_insert(0) += count;
    }
}

fn merge_model_usage(totals: &mut BTreeMap<String, ModelUsage>, session: &SessionData) {
    for (model, usage) in &session.model_usage {
        totals.entry(model.clone()).or_default().add(usage);
    }
}

fn merge_costs(totals: &mut BTreeMap<String, CostBreakdown>, costs: &BTreeMap<String, CostBreakdown>) {
    for (model, cost) in costs {
        totals.entry(model.clone()).or_default().add(cost);
    }
}

/// Session cost, total and per model.
///
/// Usage records carry cache tokens per reply, but sessions only keep the
/// totals, so each model gets a share proportional to its message count.
pub fn compute_session_cost(
    session: &SessionData,
    pricing: &PricingCalculator,
) -> (f64, BTreeMap<String, CostBreakdown>) {
    let mut total = 0.0;
    let mut by_model = BTreeMap::new();

    for (model, usage) in &session.model_usage {
        let share = usage.messages as f64 / session.messages.max(1) as f64;
        let cost = pricing.estimate_cost(
            model,
            usage.input_tokens,
            usage.output_tokens,
            session.cache_read_tokens as f64 * share,
            session.cache_create_tokens as f64 * share,
        );
        total += cost.total_cost;
        by_model.insert(model.clone(), cost);
    }

    (total, by_model)
}

/// Milliseconds between first and last activity, if both are known
pub fn session_duration_ms(session: &SessionData) -> Option<i64> {
    let first = parse_timestamp(&session.first_active)?;
    let last = parse_timestamp(&session.last_active)?;
    Some((last - first).num_milliseconds())
}

/// Hours spent across sessions, each capped at four hours
pub fn estimate_session_hours(sessions: &[&SessionData]) -> f64 {
    let total_ms: i64 = sessions
        .iter()
        .filter_map(|s| session_duration_ms(s))
        .map(|span| span.min(MAX_SESSION_SPAN_MS))
        .sum();

    total_ms as f64 / (1000.0 * 60.0 * 60.0)
}

/// Streak and consistency metrics from the daily activity map
pub fn compute_streaks(
    daily_activity: &BTreeMap<String, u64>,
    sessions: &[&SessionData],
    today: NaiveDate,
) -> StreakStats {
    if daily_activity.is_empty() {
        return StreakStats::default();
    }

    let mut most_active_day = String::new();
    let mut most_active_day_messages = 0;
    for (day, count) in daily_activity {
        if most_active_day.is_empty() || *count > most_active_day_messages {
            most_active_day.clone_from(day);
            most_active_day_messages = *count;
        }
    }

    let active_days: HashSet<&str> = daily_activity.keys().map(String::as_str).collect();

    // Today may still be empty; any earlier gap ends the streak
    let mut current_streak = 0;
    let mut cursor = today;
    loop {
        if active_days.contains(day_key(&cursor).as_str()) {
            current_streak += 1;
        } else if cursor != today {
            break;
        }
        cursor -= Duration::days(1);
    }

    let mut longest_streak = 0;
    let first_day = daily_activity.keys().next().and_then(|d| parse_day(d));
    let last_day = daily_activity.keys().next_back().and_then(|d| parse_day(d));
    if let (Some(first_day), Some(last_day)) = (first_day, last_day) {
        let mut run = 0;
        for day in first_day.iter_days().take_while(|d| *d <= last_day) {
            if active_days.contains(day_key(&day).as_str()) {
                run += 1;
                longest_streak = longest_streak.max(run);
            } else {
                run = 0;
            }
        }
    }

    let (duration_total, duration_count) = sessions
        .iter()
        .filter_map(|s| session_duration_ms(s))
        .filter(|span| *span > 0 && *span < MAX_SESSION_SPAN_MS)
        .fold((0i64, 0i64), |(total, count), span| (total + span, count + 1));

    let days_active = daily_activity.len() as u64;
    let total_messages: u64 = daily_activity.values().sum();

    StreakStats {
        current_streak,
        longest_streak,
        days_active: days_active as u32,
        most_active_day,
        most_active_day_messages,
        avg_messages_per_day: (total_messages as f64 / days_active as f64).round() as u64,
        avg_session_duration_ms: if duration_count > 0 {
            (duration_total as f64 / duration_count as f64).round() as i64
        } else {
            0
        },
    }
}

fn parse_day(day: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Cache hit rate and savings against the Sonnet input price
pub fn compute_cache_efficiency(sessions: &[&SessionData]) -> CacheEfficiency {
    let mut efficiency = CacheEfficiency::default();
    for session in sessions {
        efficiency.total_cache_reads += session.cache_read_tokens;
        efficiency.total_cache_creates += session.cache_create_tokens;
        efficiency.total_input_tokens += session.input_tokens;
    }

    let all_input = efficiency.total_input_tokens
        + efficiency.total_cache_reads
        + efficiency.total_cache_creates;
    efficiency.hit_rate = if all_input > 0 {
        efficiency.total_cache_reads as f64 / all_input as f64
    } else {
        0.0
    };

    let savings_per_token = (SONNET_PRICING.input - SONNET_PRICING.cache_read) / 1_000_000.0;
    efficiency.estimated_savings = efficiency.total_cache_reads as f64 * savings_per_token;

    efficiency
}

fn timeline_entry(session: &SessionData, estimated_cost: f64) -> SessionTimelineEntry {
    SessionTimelineEntry {
        id: session.id.clone(),
        slug: session.slug.clone(),
        project: session.project.clone(),
        start_time: session.first_active.clone(),
        end_time: session.last_active.clone(),
        duration_ms: session_duration_ms(session).unwrap_or(0),
        messages: session.messages,
        input_tokens: session.input_tokens,
        output_tokens: session.output_tokens,
        estimated_cost,
        model: session.primary_model.clone(),
        branch: session.branch.clone(),
        version: session.version.clone(),
        tool_usage: session.tool_usage.clone(),
    }
}

/// One entry per session, newest start first
pub fn build_session_timeline(
    sessions: &[&SessionData],
    pricing: &PricingCalculator,
) -> Vec<SessionTimelineEntry> {
    let mut timeline: Vec<_> = sessions
        .iter()
        .map(|s| timeline_entry(s, compute_session_cost(s, pricing).0))
        .collect();

    // Zero-padded ISO timestamps sort correctly as strings
    timeline.sort_by(|a, b| b.start_time.cmp(&a.start_time));
    timeline
}

/// Per-project summaries with daily activity, busiest project first
pub fn build_project_timeline(
    sessions: &[&SessionData],
    pricing: &PricingCalculator,
) -> Vec<ProjectTimelineEntry> {
    let mut projects: Vec<ProjectTimelineEntry> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for session in sessions {
        let idx = *index.entry(session.project.as_str()).or_insert_with(|| {
            projects.push(ProjectTimelineEntry {
                name: session.project.clone(),
                first_active: session.first_active.clone(),
                last_active: session.last_active.clone(),
                ..Default::default()
            });
            projects.len() - 1
        });
        let project = &mut projects[idx];

        project.sessions += 1;
        project.messages += session.messages;
        project.estimated_cost += compute_session_cost(session, pricing).0;

        if !session.first_active.is_empty()
            && (project.first_active.is_empty() || session.first_active < project.first_active)
        {
            project.first_active.clone_from(&session.first_active);
        }
        if !session.last_active.is_empty()
            && (project.last_active.is_empty() || session.last_active > project.last_active)
        {
            project.last_active.clone_from(&session.last_active);
        }

        for (day, count) in &session.daily {
            *project.daily_activity.entry(day.clone()).or_insert(0) += count;
        }
    }

    projects.sort_by(|a, b| b.messages.cmp(&a.messages));
    projects
}
