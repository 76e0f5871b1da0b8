use serde::Serialize;
use tracing::{info, warn};

use super::{credit_points, debit_points, Ledger, LedgerError};
use crate::db::{now_timestamp, Location, Report, ReportResponse, ReportStatus, Role};
use crate::feeds::{Change, Collection};
use crate::session::Caller;

/// Result of a moderation decision
#[derive(Debug, Clone, Serialize)]
pub struct StatusChange {
    pub report: ReportResponse,
    /// False when the report already had the requested status
    pub changed: bool,
    pub points_awarded: i64,
}

impl Ledger {
    /// File a new report as `caller` and award the creation points.
    ///
    /// The report row and the point award commit together.
    pub async fn create_report(
        &self,
        caller: &Caller,
        description: &str,
        location: Location,
    ) -> Result<Report, LedgerError> {
        if description.trim().is_empty() {
            return Err(LedgerError::Validation("Description is required".to_string()));
        }

        let report = Report {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: caller.id.clone(),
            description: description.to_string(),
            lat: location.lat,
            lng: location.lng,
            province: location.province,
            city: location.city,
            district: location.district,
            village: location.village,
            full_address: location.full_address,
            status: ReportStatus::Pending.to_string(),
            timestamp: now_timestamp(),
        };

        let mut tx = self.begin_write().await?;

        sqlx::query(
            r#"
            INSERT INTO reports (id, user_id, description, lat, lng, province, city, district, village, full_address, status, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&report.id)
        .bind(&report.user_id)
        .bind(&report.description)
        .bind(report.lat)
        .bind(report.lng)
        .bind(&report.province)
        .bind(&report.city)
        .bind(&report.district)
        .bind(&report.village)
        .bind(&report.full_address)
        .bind(&report.status)
        .bind(&report.timestamp)
        .execute(&mut *tx)
        .await?;

        let balance = credit_points(&mut tx, &caller.id, self.points.report_created).await?;

        tx.commit().await?;

        info!(
            report_id = %report.id,
            user_id = %caller.id,
            balance,
            "Report created"
        );
        self.publish(Change::global(Collection::Reports));
        self.publish(Change::scoped(Collection::Profile, &caller.id));

        Ok(report)
    }

    /// Resolve or reject a pending report. Admin only.
    ///
    /// Only `pending` reports move. Asking for the status a report already
    /// has is a no-op that awards nothing. Resolving credits the owner unless
    /// the owner is an admin; the owner's role is read in the same
    /// transaction as the status write and the credit.
    pub async fn update_report_status(
        &self,
        caller: &Caller,
        report_id: &str,
        status: ReportStatus,
        report_owner_id: Option<&str>,
    ) -> Result<StatusChange, LedgerError> {
        if !caller.role.can_moderate_reports() {
            warn!(user_id = %caller.id, report_id = %report_id, "Rejected status change by non-admin");
            return Err(LedgerError::Forbidden("moderating reports requires the admin role"));
        }
        if status == ReportStatus::Pending {
            return Err(LedgerError::Validation(
                "Status must be resolved or rejected".to_string(),
            ));
        }

        let mut tx = self.begin_write().await?;

        let report = sqlx::query_as::<_, Report>("SELECT * FROM reports WHERE id = ?")
            .bind(report_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(LedgerError::NotFound("Report"))?;

        if let Some(owner) = report_owner_id {
            if owner != report.user_id {
                return Err(LedgerError::Validation(
                    "Report owner does not match".to_string(),
                ));
            }
        }

        let current = report.status_enum();
        if current == status {
            return Ok(StatusChange {
                report: ReportResponse::from(report),
                changed: false,
                points_awarded: 0,
            });
        }
        if !current.can_transition_to(status) {
            return Err(LedgerError::InvalidTransition {
                from: current,
                to: status,
            });
        }

        let updated = sqlx::query_as::<_, Report>(
            "UPDATE reports SET status = ? WHERE id = ? AND status = ? RETURNING *",
        )
        .bind(status.as_str())
        .bind(report_id)
        .bind(ReportStatus::Pending.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(LedgerError::InvalidTransition {
            from: current,
            to: status,
        })?;

        let mut points_awarded = 0;
        if status == ReportStatus::Resolved {
            let owner_role: Option<(String,)> = sqlx::query_as("SELECT role FROM users WHERE id = ?")
                .bind(&updated.user_id)
                .fetch_optional(&mut *tx)
                .await?;

            if let Some((role,)) = owner_role {
                if Role::from(role).earns_resolution_bonus() {
                    credit_points(&mut tx, &updated.user_id, self.points.report_resolved).await?;
                    points_awarded = self.points.report_resolved;
                }
            }
        }

        tx.commit().await?;

        info!(
            report_id = %report_id,
            moderator_id = %caller.id,
            status = %status,
            points_awarded,
            "Report status updated"
        );
        self.publish(Change::global(Collection::Reports));
        if points_awarded != 0 {
            self.publish(Change::scoped(Collection::Profile, &updated.user_id));
        }

        Ok(StatusChange {
            report: ReportResponse::from(updated),
            changed: true,
            points_awarded,
        })
    }

    /// Withdraw one of the caller's own pending reports and take back the
    /// creation points.
    ///
    /// `caller_id` names the account the client believes it is acting for and
    /// must match the session. The delete and the debit commit together; if
    /// the creation points were already spent the cancel is refused.
    pub async fn cancel_report(
        &self,
        caller: &Caller,
        report_id: &str,
        caller_id: &str,
    ) -> Result<(), LedgerError> {
        if caller_id != caller.id {
            warn!(user_id = %caller.id, claimed = %caller_id, "Rejected cancel for another account");
            return Err(LedgerError::Forbidden("reports can only be cancelled by their owner"));
        }

        let mut tx = self.begin_write().await?;

        let report = sqlx::query_as::<_, Report>("SELECT * FROM reports WHERE id = ?")
            .bind(report_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(LedgerError::NotFound("Report"))?;

        if report.user_id != caller.id {
            warn!(user_id = %caller.id, report_id = %report_id, "Rejected cancel of foreign report");
            return Err(LedgerError::Forbidden("reports can only be cancelled by their owner"));
        }
        let status = report.status_enum();
        if status.is_terminal() {
            return Err(LedgerError::ReportClosed(status));
        }

        let deleted = sqlx::query("DELETE FROM reports WHERE id = ? AND status = ?")
            .bind(report_id)
            .bind(ReportStatus::Pending.as_str())
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(LedgerError::NotFound("Report"));
        }

        let balance = debit_points(&mut tx, &caller.id, self.points.report_cancelled).await?;

        tx.commit().await?;

        info!(report_id = %report_id, user_id = %caller.id, balance, "Report cancelled");
        self.publish(Change::global(Collection::Reports));
        self.publish(Change::scoped(Collection::Profile, &caller.id));

        Ok(())
    }
}
