//! # Booking Service
//!
//! Appointment lifecycle up to (but not including) settlement: booking,
//! cancellation, waitlist reconciliation and technician removal.
//!
//! ## Booking Transaction
//! ```text
//! pre-checks on the pool (member, service, technician, skills, hours)
//!      │
//!      ▼
//! BEGIN ── leave check ── conflict probe ── INSERT ── COMMIT
//! ```
//! The leave and conflict checks run again inside the transaction:
//! SQLite's single writer serializes the probe and the insert, so two
//! concurrent bookings for the same slot cannot both see it free.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use lotus_core::types::{Appointment, AppointmentStatus};
use lotus_core::validation::validate_window;

use crate::error::{ServiceError, ServiceResult};
use crate::pool::Database;
use crate::service::settlement::{SettlementEngine, SettlementOutcome, SettlementRequest};

/// A booking request.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BookingRequest {
    pub member_id: String,
    pub technician_id: String,
    pub service_id: String,
    pub start_time: chrono::DateTime<Utc>,
    /// When the slot is taken, enqueue as `waiting` instead of rejecting.
    pub join_waitlist: bool,
}

/// Booking, cancellation and waitlist workflows.
#[derive(Debug, Clone)]
pub struct BookingService {
    db: Database,
}

impl BookingService {
    pub fn new(db: Database) -> Self {
        BookingService { db }
    }

    /// Books an appointment. Returns a `pending` appointment when the
    /// slot is free, a `waiting` one when it is taken and the request
    /// opted into the waitlist, and [`ServiceError::SlotConflict`]
    /// otherwise.
    pub async fn book(&self, request: BookingRequest) -> ServiceResult<Appointment> {
        let member = self.db.members().get(&request.member_id).await?;
        let service = self.db.catalog().get_service(&request.service_id).await?;
        if !service.is_active {
            return Err(ServiceError::ServiceInactive {
                id: request.service_id.clone(),
            });
        }
        let technician = self.db.technicians().get(&request.technician_id).await?;

        if !technician.skills.contains(&request.service_id) {
            return Err(ServiceError::SkillMismatch {
                technician_id: request.technician_id.clone(),
                service_id: request.service_id.clone(),
            });
        }

        let start = request.start_time;
        let end = start + service.duration();
        validate_window(start, end).map_err(lotus_core::error::CoreError::from)?;

        let date = start.date_naive();
        let hours = &self.db.settings().business_hours;
        if start < hours.open_on(date) || end > hours.close_on(date) {
            return Err(ServiceError::OutsideBusinessHours);
        }

        let appointments = self.db.appointments();
        let mut tx = self.db.pool().begin().await?;

        if self
            .db
            .schedules()
            .is_on_leave(&mut *tx, &request.technician_id, date)
            .await?
        {
            return Err(ServiceError::TechnicianOnLeave {
                technician_id: request.technician_id.clone(),
                date,
            });
        }

        let conflict = appointments
            .conflict_exists(&mut *tx, &request.technician_id, start, end, None)
            .await?;

        let status = if !conflict {
            AppointmentStatus::Pending
        } else if request.join_waitlist {
            AppointmentStatus::Waiting
        } else {
            return Err(ServiceError::SlotConflict {
                technician_id: request.technician_id.clone(),
            });
        };

        let appointment = Appointment {
            id: Uuid::new_v4().to_string(),
            member_id: member.id,
            technician_id: request.technician_id,
            service_id: request.service_id,
            start_time: start,
            end_time: end,
            status,
            origin_price_cents: service.price_cents,
            actual_price_cents: service.price_cents,
            payment_method: None,
            paid_balance_cents: None,
            paid_cash_cents: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        appointments.insert(&mut *tx, &appointment).await?;
        tx.commit().await?;

        info!(
            appointment_id = %appointment.id,
            technician_id = %appointment.technician_id,
            status = ?appointment.status,
            "Appointment booked"
        );

        Ok(appointment)
    }

    /// Cancels an appointment. Cancelling a pending booking frees its
    /// window, so the technician's waitlist is reconciled afterwards.
    ///
    /// Cancelling an already-cancelled appointment is a no-op success, so
    /// callers can retry freely. Completed appointments cannot be
    /// cancelled.
    pub async fn cancel(&self, appointment_id: &str) -> ServiceResult<Appointment> {
        let appointments = self.db.appointments();
        let mut tx = self.db.pool().begin().await?;

        let appointment = appointments.get_with(&mut *tx, appointment_id).await?;
        match appointment.status {
            AppointmentStatus::Pending
            | AppointmentStatus::Waiting
            | AppointmentStatus::Waitlist => {}
            AppointmentStatus::Cancelled => return Ok(appointment),
            status => {
                return Err(ServiceError::InvalidStatus {
                    appointment_id: appointment_id.to_string(),
                    status,
                })
            }
        }

        appointments
            .set_status(&mut *tx, appointment_id, AppointmentStatus::Cancelled)
            .await?;
        tx.commit().await?;

        info!(appointment_id, "Appointment cancelled");

        if appointment.status == AppointmentStatus::Pending {
            // Reconciliation failure must not undo the cancellation.
            if let Err(err) = self.reconcile_waitlist(&appointment.technician_id).await {
                warn!(
                    technician_id = %appointment.technician_id,
                    error = %err,
                    "Waitlist reconciliation failed after cancellation"
                );
            }
        }

        Ok(self.db.appointments().get(appointment_id).await?)
    }

    /// Completes an appointment. Thin front over the settlement engine,
    /// which owns the transaction, the idempotency and the follow-up
    /// waitlist reconciliation.
    pub async fn complete(&self, request: SettlementRequest) -> ServiceResult<SettlementOutcome> {
        SettlementEngine::new(self.db.clone()).settle(request).await
    }

    /// Promotes waiting appointments whose windows are now free, strictly
    /// first-come-first-served on creation time.
    ///
    /// A promotion inside the pass blocks later waiters for the same
    /// window, because the conflict probe sees rows already promoted in
    /// this transaction.
    pub async fn reconcile_waitlist(&self, technician_id: &str) -> ServiceResult<u32> {
        let appointments = self.db.appointments();
        let mut tx = self.db.pool().begin().await?;

        let waiting = appointments.waiting_fcfs(&mut *tx, technician_id).await?;
        let mut promoted = 0u32;

        for candidate in &waiting {
            let conflict = appointments
                .conflict_exists(
                    &mut *tx,
                    technician_id,
                    candidate.start_time,
                    candidate.end_time,
                    Some(&candidate.id),
                )
                .await?;

            if !conflict {
                appointments
                    .set_status(&mut *tx, &candidate.id, AppointmentStatus::Pending)
                    .await?;
                promoted += 1;
            }
        }

        tx.commit().await?;

        if promoted > 0 {
            info!(technician_id, promoted, "Promoted waitlisted appointments");
        }

        Ok(promoted)
    }

    /// Removes a technician. Their pending appointments move to the
    /// `waitlist` state (to be rebooked manually) in the same transaction
    /// that deletes the row, so no appointment is ever left pending for a
    /// technician that no longer exists.
    pub async fn remove_technician(&self, technician_id: &str) -> ServiceResult<u64> {
        // existence check before opening the write transaction
        self.db.technicians().get(technician_id).await?;

        let mut tx = self.db.pool().begin().await?;

        let moved = self
            .db
            .appointments()
            .move_pending_to_waitlist(&mut *tx, technician_id)
            .await?;

        // schedules reference the technician row; clear them first
        self.db
            .schedules()
            .delete_for_technician(&mut *tx, technician_id)
            .await?;

        self.db.technicians().delete(&mut *tx, technician_id).await?;

        tx.commit().await?;

        info!(
            technician_id,
            orphaned = moved,
            "Technician removed, pending appointments moved to waitlist"
        );

        Ok(moved)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
