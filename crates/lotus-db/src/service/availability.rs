//! # Availability Service
//!
//! Read-only plumbing around the pure partitioning and slot-grid math:
//! fetches candidates, leave entries and busy intervals, then delegates
//! to lotus-core.
//!
//! Results are snapshots. A slot shown as available can be taken by the
//! time a booking arrives; the booking transaction re-checks and is the
//! only authority.

use chrono::{NaiveDate, Utc};
use tracing::debug;

use lotus_core::availability::{
    day_slot_grid, partition_technicians, AvailabilityPartition, Slot,
};

use crate::error::{ServiceError, ServiceResult};
use crate::pool::Database;

/// Read-only availability queries.
#[derive(Debug, Clone)]
pub struct AvailabilityService {
    db: Database,
}

impl AvailabilityService {
    pub fn new(db: Database) -> Self {
        AvailabilityService { db }
    }

    /// Partitions all technicians for a requested service start time.
    /// The window's end is derived from the service duration.
    pub async fn available_technicians(
        &self,
        service_id: &str,
        start: chrono::DateTime<Utc>,
    ) -> ServiceResult<AvailabilityPartition> {
        let service = self.db.catalog().get_service(service_id).await?;
        if !service.is_active {
            return Err(ServiceError::ServiceInactive {
                id: service_id.to_string(),
            });
        }

        let end = start + service.duration();
        let date = start.date_naive();

        let hours = &self.db.settings().business_hours;
        if start < hours.open_on(date) || end > hours.close_on(date) {
            return Err(ServiceError::OutsideBusinessHours);
        }

        let candidates = self.db.technicians().list().await?;
        let on_leave = self.db.schedules().on_leave_for_date(date).await?;
        let busy = self.db.appointments().busy_intervals_for_day(date).await?;

        let partition = partition_technicians(candidates, service_id, start, end, &on_leave, &busy);

        debug!(
            service_id,
            available = partition.available.len(),
            unavailable = partition.unavailable.len(),
            "Partitioned technicians"
        );

        Ok(partition)
    }

    /// The day grid for one service: every slot of the business day with
    /// its status and the number of technicians free to take it.
    pub async fn day_grid(&self, service_id: &str, date: NaiveDate) -> ServiceResult<Vec<Slot>> {
        let service = self.db.catalog().get_service(service_id).await?;
        if !service.is_active {
            return Err(ServiceError::ServiceInactive {
                id: service_id.to_string(),
            });
        }

        let candidates = self.db.technicians().list().await?;
        let on_leave = self.db.schedules().on_leave_for_date(date).await?;
        let busy = self.db.appointments().busy_intervals_for_day(date).await?;

        let hours = &self.db.settings().business_hours;
        Ok(day_slot_grid(
            hours,
            date,
            service_id,
            service.duration(),
            &candidates,
            &on_leave,
            &busy,
            Utc::now(),
        ))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::service::booking::BookingRequest;
    use chrono::{DateTime, NaiveDate};
    use lotus_core::availability::{SlotStatus, UnavailableReason};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2030, 6, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
            .and_utc()
    }

    #[tokio::test]
    async fn test_partition_across_technicians() {
        let db = test_db().await;
        let service = db.catalog().create_service("Massage", 60, 8800).await.unwrap();
        let member = db.members().create("Chen Wei", "13800138000", None).await.unwrap();

        let free = db.technicians().create("Free", &[service.id.clone()]).await.unwrap();
        let unskilled = db.technicians().create("Unskilled", &[]).await.unwrap();
        let on_leave = db.technicians().create("On Leave", &[service.id.clone()]).await.unwrap();
        let busy = db.technicians().create("Busy", &[service.id.clone()]).await.unwrap();

        db.schedules()
            .upsert(&on_leave.id, at(14, 0).date_naive(), false)
            .await
            .unwrap();
        db.booking()
            .book(BookingRequest {
                member_id: member.id.clone(),
                technician_id: busy.id.clone(),
                service_id: service.id.clone(),
                start_time: at(14, 0),
                join_waitlist: false,
            })
            .await
            .unwrap();

        let partition = db
            .availability()
            .available_technicians(&service.id, at(14, 30))
            .await
            .unwrap();

        assert_eq!(partition.available.len(), 1);
        assert_eq!(partition.available[0].id, free.id);

        let reason_for = |id: &str| {
            partition
                .unavailable
                .iter()
                .find(|u| u.technician.id == id)
                .map(|u| u.reason)
        };
        assert_eq!(reason_for(&unskilled.id), Some(UnavailableReason::SkillMismatch));
        assert_eq!(reason_for(&on_leave.id), Some(UnavailableReason::OnLeave));
        assert_eq!(reason_for(&busy.id), Some(UnavailableReason::Busy));
    }

    #[tokio::test]
    async fn test_partition_rejects_window_outside_hours() {
        let db = test_db().await;
        let service = db.catalog().create_service("Massage", 60, 8800).await.unwrap();

        let result = db.availability().available_technicians(&service.id, at(21, 30)).await;
        assert!(matches!(result, Err(ServiceError::OutsideBusinessHours)));
    }

    #[tokio::test]
    async fn test_day_grid_counts_and_statuses() {
        let db = test_db().await;
        let service = db.catalog().create_service("Massage", 60, 8800).await.unwrap();
        let booked = db
            .technicians()
            .create("Wang Fang", &[service.id.clone()])
            .await
            .unwrap();
        db.technicians()
            .create("Li Na", &[service.id.clone()])
            .await
            .unwrap();
        let member = db.members().create("Chen Wei", "13800138000", None).await.unwrap();

        db.booking()
            .book(BookingRequest {
                member_id: member.id.clone(),
                technician_id: booked.id.clone(),
                service_id: service.id.clone(),
                start_time: at(14, 0),
                join_waitlist: false,
            })
            .await
            .unwrap();

        let grid = db
            .availability()
            .day_grid(&service.id, at(0, 0).date_naive())
            .await
            .unwrap();

        let slot_at = |h: u32, m: u32| grid.iter().find(|s| s.start == at(h, m)).unwrap();
        assert_eq!(slot_at(13, 0).available_count, 2);
        assert_eq!(slot_at(14, 0).available_count, 1);
        assert_eq!(slot_at(14, 0).status, SlotStatus::Available);
        assert_eq!(slot_at(15, 0).available_count, 2);
    }

    #[tokio::test]
    async fn test_day_grid_waitlist_when_everyone_booked_or_on_leave() {
        let db = test_db().await;
        let service = db.catalog().create_service("Massage", 60, 8800).await.unwrap();
        let booked = db
            .technicians()
            .create("Wang Fang", &[service.id.clone()])
            .await
            .unwrap();
        let resting = db
            .technicians()
            .create("Li Na", &[service.id.clone()])
            .await
            .unwrap();
        let member = db.members().create("Chen Wei", "13800138000", None).await.unwrap();

        db.schedules()
            .upsert(&resting.id, at(0, 0).date_naive(), false)
            .await
            .unwrap();
        db.booking()
            .book(BookingRequest {
                member_id: member.id.clone(),
                technician_id: booked.id.clone(),
                service_id: service.id.clone(),
                start_time: at(14, 0),
                join_waitlist: false,
            })
            .await
            .unwrap();

        let grid = db
            .availability()
            .day_grid(&service.id, at(0, 0).date_naive())
            .await
            .unwrap();

        let slot_at = |h: u32, m: u32| grid.iter().find(|s| s.start == at(h, m)).unwrap();
        assert_eq!(slot_at(14, 0).status, SlotStatus::Waitlist);
        assert_eq!(slot_at(14, 0).available_count, 0);
        assert_eq!(slot_at(13, 0).status, SlotStatus::Available);
        assert_eq!(slot_at(13, 0).available_count, 1);
    }
}
