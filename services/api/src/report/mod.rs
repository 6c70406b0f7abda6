//! services/api/src/report/mod.rs
//!
//! Composes user PDF reports from profiles and breathing-session logs.
//!
//! Two delivery modes share one page routine:
//!   - batch: every profile, one page each, buffered to a `Vec<u8>`
//!   - single: one profile, streamed chunk by chunk while the breathing
//!     data is still being fetched
//!
//! Section content is gated by [`ReportOptions`]; a breathing-data fetch
//! failure degrades to a placeholder line on that user's page only.

pub mod pdf;

use std::io::{self, Write};
use std::sync::Arc;

use bytes::Bytes;
use chrono::Local;
use futures::channel::mpsc;

use vital_core::domain::{DerivedStats, Profile, ReportOptions};
use vital_core::ports::StoreService;
use vital_core::report::aggregate;

use crate::error::ApiError;
use pdf::{PageComposer, PdfWriter};

const TITLE: &str = "Vital Choice - User Report";

/// What the breathing-progress section has to work with for one user.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BreathingOutcome {
    Stats(DerivedStats),
    Empty,
    Failed,
}

async fn breathing_outcome(store: &dyn StoreService, uid: &str) -> BreathingOutcome {
    match store.sessions_for_user(uid).await {
        Ok(sessions) if sessions.is_empty() => BreathingOutcome::Empty,
        Ok(sessions) => BreathingOutcome::Stats(aggregate(&sessions)),
        Err(err) => {
            tracing::error!(uid, error = %err, "failed to load breathing sessions for report");
            BreathingOutcome::Failed
        }
    }
}

//=========================================================================================
// Shared page routine
//=========================================================================================

/// Durations come back from Firestore as doubles; whole values print
/// without a decimal point.
fn format_seconds(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn or_na(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => "N/A",
    }
}

fn joined_or_na(values: &[String]) -> String {
    if values.is_empty() {
        "N/A".to_string()
    } else {
        values.join(", ")
    }
}

fn field<W: Write>(c: &mut PageComposer<W>, label: &str, value: Option<&str>) -> io::Result<()> {
    c.line(&format!("{} {}", label, or_na(value)), 10.0)
}

/// Document title block. Rendered once, on the first page only.
fn render_title<W: Write>(c: &mut PageComposer<W>) -> io::Result<()> {
    c.centered(TITLE, 20.0)?;
    c.gap(1.0, 20.0)?;
    let generated = Local::now().format("%-m/%-d/%Y, %-I:%M:%S %p");
    c.centered(&format!("Generated on: {}", generated), 12.0)?;
    c.gap(2.0, 12.0)
}

fn render_user_header<W: Write>(c: &mut PageComposer<W>, display_name: &str) -> io::Result<()> {
    c.heading(&format!("User: {}", display_name), 16.0)?;
    c.gap(1.0, 16.0)
}

/// Personal-information and tobacco-usage sections. The breathing section is
/// rendered separately because it needs a store round trip.
fn render_sections<W: Write>(
    c: &mut PageComposer<W>,
    profile: &Profile,
    options: ReportOptions,
) -> io::Result<()> {
    if options.include_personal_info {
        c.heading("Personal Information:", 14.0)?;
        field(c, "Name:", profile.name.as_deref())?;
        field(c, "Age:", profile.age.as_deref())?;
        field(c, "Sex:", profile.sex.as_deref())?;
        field(c, "Nationality:", profile.nationality.as_deref())?;
        // Aadhar is an Indian national id; the check is an exact match.
        if profile.nationality.as_deref() == Some("India") {
            field(c, "Aadhar Number:", profile.aadhar.as_deref())?;
        }
        field(c, "Address:", profile.address.as_deref())?;
        field(c, "Phone:", profile.phone.as_deref())?;
        field(c, "Email:", profile.email.as_deref())?;
        field(c, "Marital Status:", profile.marital_status.as_deref())?;
        field(c, "Occupation:", profile.occupation.as_deref())?;
        if profile.occupation.as_deref() == Some("Other") {
            field(c, "Other Occupation:", profile.occupation_other.as_deref())?;
        }
        field(c, "Income:", profile.income.as_deref())?;
        c.gap(1.0, 10.0)?;
    }

    if options.include_tobacco_info {
        c.heading("Tobacco Usage Information:", 14.0)?;
        c.line(
            &format!("Types of Tobacco Used: {}", joined_or_na(&profile.tobacco_types)),
            10.0,
        )?;
        if profile.tobacco_types.iter().any(|t| t == "Other") {
            field(c, "Other Tobacco Type:", profile.other_tobacco_type.as_deref())?;
        }
        field(c, "Frequency Per Day:", profile.frequency_per_day.as_deref())?;
        c.line(
            &format!("Usual Craving Timings: {}", joined_or_na(&profile.craving_timings)),
            10.0,
        )?;
        if profile.craving_timings.iter().any(|t| t == "Other") {
            field(c, "Other Craving Timing:", profile.other_craving_timing.as_deref())?;
        }
        field(c, "Years Using Tobacco:", profile.years_using.as_deref())?;
        field(c, "Reason for Quitting:", profile.quitting_reason.as_deref())?;
        if profile.quitting_reason.as_deref() == Some("Other") {
            field(c, "Other Quitting Reason:", profile.quitting_reason_other.as_deref())?;
        }
        field(c, "Confidence Level to Quit:", profile.confidence_level.as_deref())?;
        c.line(&format!("Health Issues: {}", joined_or_na(&profile.health_issues)), 10.0)?;
        if profile.health_issues.iter().any(|t| t == "Other") {
            field(c, "Other Health Issues:", profile.health_issues_other.as_deref())?;
        }
        c.line(&format!("Triggers: {}", joined_or_na(&profile.triggers)), 10.0)?;
        if profile.triggers.iter().any(|t| t == "Other") {
            field(c, "Other Trigger:", profile.other_trigger.as_deref())?;
        }
        field(
            c,
            "Average Monthly Tobacco Spending (₹):",
            profile.tobacco_spending.as_deref(),
        )?;
        c.gap(1.0, 10.0)?;
    }

    Ok(())
}

fn render_breathing<W: Write>(c: &mut PageComposer<W>, outcome: BreathingOutcome) -> io::Result<()> {
    match outcome {
        BreathingOutcome::Stats(stats) => {
            c.line(
                &format!("Total Duration: {} seconds", format_seconds(stats.total_duration)),
                10.0,
            )?;
            c.line(&format!("Number of Sessions: {}", stats.session_count), 10.0)?;
            c.line(
                &format!("Best Session: {} seconds", format_seconds(stats.best_session)),
                10.0,
            )?;
        }
        BreathingOutcome::Empty => c.line("No breathing exercise data available", 10.0)?,
        BreathingOutcome::Failed => c.line("Error loading breathing data", 10.0)?,
    }
    c.gap(1.0, 10.0)
}

//=========================================================================================
// Batch mode
//=========================================================================================

/// Renders one page per profile into a fully buffered document.
///
/// Breathing sessions are fetched per profile, sequentially, while the
/// document is being composed; a failed fetch only degrades that profile's
/// section.
pub async fn render_batch(
    store: &dyn StoreService,
    profiles: &[Profile],
    options: ReportOptions,
) -> Result<Vec<u8>, ApiError> {
    let mut buffer = Vec::new();
    let mut pdf = PdfWriter::new(&mut buffer)?;
    let mut composer = PageComposer::start(&mut pdf)?;
    render_title(&mut composer)?;

    for (i, profile) in profiles.iter().enumerate() {
        if i > 0 {
            composer.page_break()?;
        }
        render_user_header(&mut composer, or_na(profile.name.as_deref()))?;
        render_sections(&mut composer, profile, options)?;
        if options.include_breathing_progress {
            composer.heading("Breathing Exercise Progress:", 14.0)?;
            let outcome = breathing_outcome(store, &profile.uid).await;
            render_breathing(&mut composer, outcome)?;
        }
        composer.gap(2.0, 10.0)?;
    }

    composer.finish()?;
    pdf.finish()?;
    Ok(buffer)
}

//=========================================================================================
// Single mode (streamed)
//=========================================================================================

/// An `io::Write` sink that hands each flushed batch of bytes to an
/// in-memory channel, whose receiver feeds the response body.
struct ChannelSink {
    tx: mpsc::UnboundedSender<Bytes>,
    buf: Vec<u8>,
}

impl ChannelSink {
    fn new(tx: mpsc::UnboundedSender<Bytes>) -> Self {
        Self { tx, buf: Vec::new() }
    }
}

impl Write for ChannelSink {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let chunk = Bytes::from(std::mem::take(&mut self.buf));
        self.tx
            .unbounded_send(chunk)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "report consumer went away"))
    }
}

fn single_display_name(profile: &Profile) -> &str {
    profile
        .name
        .as_deref()
        .filter(|n| !n.is_empty())
        .or_else(|| profile.email.as_deref().filter(|e| !e.is_empty()))
        .unwrap_or(&profile.uid)
}

/// Renders one user's report, streaming bytes as they are produced.
///
/// The returned receiver yields document chunks; the title, user header, and
/// synchronous sections are flushed before the breathing-session fetch
/// starts, so the client sees bytes while the store round trip is in flight.
/// Composition runs on a spawned task and stops early if the receiver is
/// dropped.
pub fn render_single(
    store: Arc<dyn StoreService>,
    profile: Profile,
    options: ReportOptions,
) -> mpsc::UnboundedReceiver<Bytes> {
    let (tx, rx) = mpsc::unbounded();
    tokio::spawn(async move {
        if let Err(err) = compose_single(store.as_ref(), &profile, options, tx).await {
            if err.kind() == io::ErrorKind::BrokenPipe {
                tracing::debug!(uid = %profile.uid, "report download abandoned by client");
            } else {
                tracing::error!(uid = %profile.uid, error = %err, "single-user report failed");
            }
        }
    });
    rx
}

async fn compose_single(
    store: &dyn StoreService,
    profile: &Profile,
    options: ReportOptions,
    tx: mpsc::UnboundedSender<Bytes>,
) -> io::Result<()> {
    let mut sink = ChannelSink::new(tx);
    let mut pdf = PdfWriter::new(&mut sink)?;
    let mut composer = PageComposer::start(&mut pdf)?;

    render_title(&mut composer)?;
    render_user_header(&mut composer, single_display_name(profile))?;
    render_sections(&mut composer, profile, options)?;

    if options.include_breathing_progress {
        composer.heading("Breathing Exercise Progress:", 14.0)?;
        // Everything composed so far goes on the wire before the store
        // round trip starts.
        composer.flush()?;
        let outcome = breathing_outcome(store, &profile.uid).await;
        render_breathing(&mut composer, outcome)?;
    } else {
        composer.flush()?;
    }
    composer.gap(2.0, 10.0)?;

    composer.finish()?;
    pdf.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::{HashMap, HashSet};

    use async_trait::async_trait;
    use futures::StreamExt;
    use serde_json::Map;
    use tokio::sync::Notify;

    use vital_core::domain::BreathingSession;
    use vital_core::ports::{PortError, PortResult};

    struct FakeStore {
        sessions: HashMap<String, Vec<BreathingSession>>,
        failing: HashSet<String>,
        gate: Option<Arc<Notify>>,
    }

    impl FakeStore {
        fn new() -> Self {
            Self {
                sessions: HashMap::new(),
                failing: HashSet::new(),
                gate: None,
            }
        }

        fn with_sessions(mut self, uid: &str, durations: &[f64]) -> Self {
            let sessions = durations
                .iter()
                .map(|&d| BreathingSession {
                    id: None,
                    uid: uid.to_string(),
                    duration: Some(d),
                    timestamp: None,
                })
                .collect();
            self.sessions.insert(uid.to_string(), sessions);
            self
        }

        fn failing_for(mut self, uid: &str) -> Self {
            self.failing.insert(uid.to_string());
            self
        }

        fn gated(mut self, gate: Arc<Notify>) -> Self {
            self.gate = Some(gate);
            self
        }
    }

    #[async_trait]
    impl StoreService for FakeStore {
        async fn put_user_record(&self, _uid: &str, _email: &str) -> PortResult<()> {
            unreachable!()
        }
        async fn mark_user_verified(&self, _uid: &str) -> PortResult<()> {
            unreachable!()
        }
        async fn set_profile(
            &self,
            _uid: &str,
            _data: Map<String, serde_json::Value>,
        ) -> PortResult<()> {
            unreachable!()
        }
        async fn update_profile(
            &self,
            _uid: &str,
            _data: Map<String, serde_json::Value>,
        ) -> PortResult<()> {
            unreachable!()
        }
        async fn fetch_profile(&self, _uid: &str) -> PortResult<Profile> {
            unreachable!()
        }
        async fn fetch_all_profiles(&self) -> PortResult<Vec<Profile>> {
            unreachable!()
        }
        async fn save_breathing_session(&self, _session: &BreathingSession) -> PortResult<String> {
            unreachable!()
        }
        async fn sessions_for_user(&self, uid: &str) -> PortResult<Vec<BreathingSession>> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.failing.contains(uid) {
                return Err(PortError::Unexpected("firestore is down".into()));
            }
            Ok(self.sessions.get(uid).cloned().unwrap_or_default())
        }
    }

    fn profile(uid: &str, name: Option<&str>) -> Profile {
        Profile {
            uid: uid.to_string(),
            name: name.map(str::to_string),
            ..Profile::default()
        }
    }

    fn all_options() -> ReportOptions {
        ReportOptions {
            include_personal_info: true,
            include_tobacco_info: true,
            include_breathing_progress: true,
        }
    }

    fn as_text(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }

    #[tokio::test]
    async fn batch_renders_one_page_per_profile() {
        let store = FakeStore::new();
        let profiles = vec![
            profile("u1", Some("Asha")),
            profile("u2", Some("Ravi")),
            profile("u3", Some("Meera")),
        ];
        let bytes = render_batch(&store, &profiles, ReportOptions::default())
            .await
            .unwrap();
        let text = as_text(&bytes);
        assert_eq!(text.matches("/Type /Page ").count(), 3);
        assert!(text.contains("(User: Asha)"));
        assert!(text.contains("(User: Meera)"));
        // All flags off: headers only, no sections.
        assert!(!text.contains("Personal Information:"));
        assert!(!text.contains("Tobacco Usage Information:"));
        assert!(!text.contains("Breathing Exercise Progress:"));
    }

    #[tokio::test]
    async fn batch_header_falls_back_to_na_for_missing_name() {
        let store = FakeStore::new();
        let profiles = vec![profile("u1", None)];
        let bytes = render_batch(&store, &profiles, ReportOptions::default())
            .await
            .unwrap();
        assert!(as_text(&bytes).contains("(User: N/A)"));
    }

    #[tokio::test]
    async fn aadhar_line_requires_exact_nationality_match() {
        let store = FakeStore::new();
        let options = ReportOptions {
            include_personal_info: true,
            ..ReportOptions::default()
        };

        let mut indian = profile("u1", Some("Asha"));
        indian.nationality = Some("India".into());
        indian.aadhar = Some("1234-5678-9012".into());
        let text = as_text(&render_batch(&store, &[indian], options).await.unwrap());
        assert!(text.contains("Aadhar Number: 1234-5678-9012"));

        let mut lowercase = profile("u2", Some("Ravi"));
        lowercase.nationality = Some("india".into());
        lowercase.aadhar = Some("1234-5678-9012".into());
        let text = as_text(&render_batch(&store, &[lowercase], options).await.unwrap());
        assert!(!text.contains("Aadhar Number:"));
    }

    #[tokio::test]
    async fn other_tobacco_line_follows_list_membership() {
        let store = FakeStore::new();
        let options = ReportOptions {
            include_tobacco_info: true,
            ..ReportOptions::default()
        };

        let mut with_other = profile("u1", Some("Asha"));
        with_other.tobacco_types = vec!["Cigarettes".into(), "Other".into()];
        with_other.other_tobacco_type = Some("Hookah".into());
        let text = as_text(&render_batch(&store, &[with_other], options).await.unwrap());
        assert!(text.contains("Types of Tobacco Used: Cigarettes, Other"));
        assert!(text.contains("Other Tobacco Type: Hookah"));

        let mut without = profile("u2", Some("Ravi"));
        without.tobacco_types = vec!["Cigarettes".into()];
        let text = as_text(&render_batch(&store, &[without], options).await.unwrap());
        assert!(!text.contains("Other Tobacco Type:"));
        // Rupee sign has no WinAnsi glyph; the label transliterates.
        assert!(text.contains("Average Monthly Tobacco Spending \\(Rs\\): N/A"));
    }

    #[tokio::test]
    async fn breathing_outcomes_stay_isolated_per_user() {
        let store = FakeStore::new()
            .with_sessions("u-stats", &[5.0, 9.0])
            .with_sessions("u-empty", &[])
            .failing_for("u-broken");
        let options = ReportOptions {
            include_breathing_progress: true,
            ..ReportOptions::default()
        };
        let profiles = vec![
            profile("u-stats", Some("A")),
            profile("u-empty", Some("B")),
            profile("u-broken", Some("C")),
        ];
        let text = as_text(&render_batch(&store, &profiles, options).await.unwrap());
        assert!(text.contains("Total Duration: 14 seconds"));
        assert!(text.contains("Number of Sessions: 2"));
        assert!(text.contains("Best Session: 9 seconds"));
        assert!(text.contains("No breathing exercise data available"));
        assert!(text.contains("Error loading breathing data"));
    }

    #[test]
    fn whole_second_durations_print_without_decimals() {
        assert_eq!(format_seconds(14.0), "14");
        assert_eq!(format_seconds(2.5), "2.5");
        assert_eq!(format_seconds(0.0), "0");
    }

    #[tokio::test]
    async fn single_report_header_fallback_order() {
        let mut p = profile("uid-123", None);
        p.email = Some("a@b.test".into());
        assert_eq!(single_display_name(&p), "a@b.test");
        p.email = None;
        assert_eq!(single_display_name(&p), "uid-123");
        p.name = Some("Asha".into());
        p.email = Some("a@b.test".into());
        assert_eq!(single_display_name(&p), "Asha");
    }

    #[tokio::test]
    async fn single_report_streams_header_before_sessions_resolve() {
        let gate = Arc::new(Notify::new());
        let store: Arc<dyn StoreService> = Arc::new(
            FakeStore::new()
                .with_sessions("u1", &[3.0])
                .gated(gate.clone()),
        );
        let mut rx = render_single(store, profile("u1", Some("Asha")), all_options());

        // The fetch is gated, so the first chunk arrives while the store
        // call is still pending.
        let first = rx.next().await.expect("header chunk");
        let head = as_text(&first);
        assert!(head.starts_with("%PDF-1.4"));
        assert!(head.contains("(User: Asha)"));
        assert!(head.contains("Breathing Exercise Progress:"));
        assert!(!head.contains("Total Duration:"));
        assert!(!head.contains("%%EOF"));

        gate.notify_one();
        let mut rest = Vec::new();
        while let Some(chunk) = rx.next().await {
            rest.extend_from_slice(&chunk);
        }
        let tail = as_text(&rest);
        assert!(tail.contains("Total Duration: 3 seconds"));
        assert!(tail.trim_end().ends_with("%%EOF"));
    }
}
