//! Waste report models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// Report lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Resolved,
    Rejected,
}

impl ReportStatus {
    /// Resolved and rejected reports never move again
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReportStatus::Pending)
    }

    /// Only `pending -> resolved` and `pending -> rejected` are allowed
    pub fn can_transition_to(&self, next: ReportStatus) -> bool {
        matches!(
            (self, next),
            (ReportStatus::Pending, ReportStatus::Resolved)
                | (ReportStatus::Pending, ReportStatus::Rejected)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Resolved => "resolved",
            ReportStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ReportStatus::Pending),
            "resolved" => Ok(ReportStatus::Resolved),
            "rejected" => Ok(ReportStatus::Rejected),
            _ => Err(format!("Unknown report status: {}", s)),
        }
    }
}

impl From<String> for ReportStatus {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(ReportStatus::Pending)
    }
}

/// Where a report was filed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub province: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub village: String,
    #[serde(default, alias = "fullAddress")]
    pub full_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Report {
    pub id: String,
    pub user_id: String,
    pub description: String,
    pub lat: f64,
    pub lng: f64,
    pub province: String,
    pub city: String,
    pub district: String,
    pub village: String,
    pub full_address: String,
    pub status: String,
    pub timestamp: String,
}

impl Report {
    /// Get the status as a ReportStatus enum
    pub fn status_enum(&self) -> ReportStatus {
        ReportStatus::from(self.status.clone())
    }

    pub fn location(&self) -> Location {
        Location {
            lat: self.lat,
            lng: self.lng,
            province: self.province.clone(),
            city: self.city.clone(),
            district: self.district.clone(),
            village: self.village.clone(),
            full_address: self.full_address.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportResponse {
    pub id: String,
    pub user_id: String,
    pub description: String,
    pub location: Location,
    pub status: ReportStatus,
    pub timestamp: String,
}

impl From<Report> for ReportResponse {
    fn from(report: Report) -> Self {
        Self {
            location: report.location(),
            status: report.status_enum(),
            id: report.id,
            user_id: report.user_id,
            description: report.description,
            timestamp: report.timestamp,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReportRequest {
    pub description: String,
    pub location: Location,
}

#[derive(Debug, Deserialize)]
pub struct UpdateReportStatusRequest {
    pub status: ReportStatus,
    /// Owner the moderator expects the report to have
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Query string for cancelling a report
#[derive(Debug, Deserialize)]
pub struct CancelReportQuery {
    pub user_id: Option<String>,
}

pub async fn find_report(pool: &SqlitePool, id: &str) -> Result<Option<Report>, sqlx::Error> {
    sqlx::query_as::<_, Report>("SELECT * FROM reports WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Every report, newest first
pub async fn list_reports(pool: &SqlitePool) -> Result<Vec<Report>, sqlx::Error> {
    sqlx::query_as::<_, Report>("SELECT * FROM reports ORDER BY timestamp DESC, id")
        .fetch_all(pool)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions_only_leave_pending() {
        use ReportStatus::*;

        assert!(Pending.can_transition_to(Resolved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(!Pending.can_transition_to(Pending));

        for terminal in [Resolved, Rejected] {
            assert!(terminal.is_terminal());
            for next in [Pending, Resolved, Rejected] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_location_accepts_camel_case_full_address() {
        let location: Location = serde_json::from_str(
            r#"{"lat": -6.9175, "lng": 107.6191, "province": "JAWA BARAT", "fullAddress": "Cipaganti, Coblong"}"#,
        )
        .unwrap();

        assert_eq!(location.full_address, "Cipaganti, Coblong");
        assert_eq!(location.city, "");
    }

    #[test]
    fn test_unknown_status_is_rejected_on_input() {
        let parsed: Result<UpdateReportStatusRequest, _> =
            serde_json::from_str(r#"{"status": "archived"}"#);
        assert!(parsed.is_err());
    }
}
