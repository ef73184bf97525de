use serde::Deserialize;

// ---------------------------------------------------------------------------
// API response types (mirror routes.rs shapes)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardResponse {
    pub active_sprint: Option<SprintResponse>,
    pub top_scorer_id: Option<String>,
    pub sellers: Vec<EntryResponse>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
pub struct SprintResponse {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub participant_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PrizesResponse {
    pub sales_value: f64,
    pub ticket_average: f64,
    pub pa: f64,
    pub points: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryResponse {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub sales_value: f64,
    #[serde(default)]
    pub ticket_average: f64,
    #[serde(default)]
    pub pa: f64,
    #[serde(default)]
    pub points: f64,
    #[serde(default)]
    pub extra_points: f64,
    #[serde(default)]
    pub prizes: PrizesResponse,
    #[serde(default)]
    pub sprint_prize: f64,
    #[serde(default)]
    pub top_scorer_bonus: f64,
    #[serde(default)]
    pub total_prize: f64,
    pub rank: u32,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
pub struct HealthResponse {
    pub status: Option<String>,
    pub sellers: Option<i64>,
    pub active_sprint_id: Option<String>,
    pub last_snapshot_at_ms: Option<i64>,
    pub snapshots_taken: Option<i64>,
    pub snapshot_failures: Option<i64>,
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connected,
    Error(String),
    Connecting,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub status: ConnectionStatus,
    pub leaderboard: LeaderboardResponse,
    pub health: HealthResponse,
    pub last_refresh: std::time::Instant,
    pub base_url: String,
}

impl AppState {
    pub fn new(base_url: String) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            leaderboard: LeaderboardResponse::default(),
            health: HealthResponse::default(),
            last_refresh: std::time::Instant::now(),
            base_url,
        }
    }

    pub fn entry(&self, index: Option<usize>) -> Option<&EntryResponse> {
        index.and_then(|i| self.leaderboard.sellers.get(i))
    }

    pub fn is_top_scorer(&self, seller_id: &str) -> bool {
        self.leaderboard.top_scorer_id.as_deref() == Some(seller_id)
    }

    pub async fn refresh(&mut self, client: &reqwest::Client) {
        let leaderboard_url = format!("{}/leaderboard", self.base_url);
        let health_url = format!("{}/health", self.base_url);

        let (leaderboard_res, health_res) = tokio::join!(
            client.get(&leaderboard_url).send(),
            client.get(&health_url).send(),
        );

        let leaderboard_res = match leaderboard_res {
            Ok(r) => r,
            Err(e) => {
                self.status = ConnectionStatus::Error(format!("{e}"));
                return;
            }
        };

        match leaderboard_res.json::<LeaderboardResponse>().await {
            Ok(board) => {
                self.leaderboard = board;
                self.status = ConnectionStatus::Connected;
                self.last_refresh = std::time::Instant::now();

                if let Ok(h) = health_res {
                    if let Ok(health) = h.json::<HealthResponse>().await {
                        self.health = health;
                    }
                }
            }
            Err(e) => {
                self.status = ConnectionStatus::Error(format!("parse error: {e}"));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// Currency-style amount with thousands separators, e.g. `25.000,50`.
pub fn format_money(v: f64) -> String {
    let cents = (v.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    let sign = if v < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}{grouped},{:02}", cents % 100)
}

pub fn format_decimal(v: f64) -> String {
    format!("{v:.2}")
}

/// Convert millisecond epoch timestamp to HH:MM:SS string (UTC).
pub fn format_time_ms(ms: i64) -> String {
    let secs = (ms / 1_000) as u64;
    let h = (secs / 3600) % 24;
    let m = (secs / 60) % 60;
    let s = secs % 60;
    format!("{h:02}:{m:02}:{s:02}")
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}

#[allow(dead_code)]
fn main() {
    // Helper module for src/bin/tui.rs; the entry point lives there.
}
