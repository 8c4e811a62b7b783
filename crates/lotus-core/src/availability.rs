//! # Availability Resolution
//!
//! Pure scheduling math: interval overlap, technician partitioning for a
//! requested window, and day slot-grid generation.
//!
//! ```text
//!              candidates
//!                  │
//!        ┌─────────┴──────────┐
//!        ▼                    ▼
//!   has skill?──no──► SkillMismatch
//!        │yes
//!   on leave?──yes──► OnLeave
//!        │no
//!   window overlaps a
//!   pending booking?──yes──► Busy
//!        │no
//!        ▼
//!    available
//! ```
//!
//! Everything here is deterministic and I/O-free; the database layer feeds
//! in pre-fetched busy intervals and leave dates.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::config::BusinessHours;
use crate::types::Technician;

// =============================================================================
// Interval Overlap
// =============================================================================

/// Half-open interval overlap: `[a_start, a_end)` intersects `[b_start, b_end)`.
///
/// Back-to-back bookings do not conflict: a window ending at 11:00 does not
/// overlap one starting at 11:00.
#[inline]
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && a_end > b_start
}

/// A time span during which a technician is already committed.
///
/// Produced by the database layer from `pending` appointments only;
/// waiting, completed and cancelled bookings never block a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusyInterval {
    pub technician_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BusyInterval {
    /// Whether this interval conflicts with the given window.
    #[inline]
    pub fn conflicts_with(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        overlaps(self.start, self.end, start, end)
    }
}

// =============================================================================
// Technician Partitioning
// =============================================================================

/// Why a technician cannot take a requested window.
///
/// When several reasons apply, the most specific one is reported:
/// skill mismatch over leave over a busy calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    /// The technician does not offer the requested service.
    SkillMismatch,
    /// An explicit schedule entry marks the technician off for that day.
    OnLeave,
    /// The window overlaps one of the technician's pending bookings.
    Busy,
}

/// A technician rejected for a requested window, with the reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnavailableTechnician {
    pub technician: Technician,
    pub reason: UnavailableReason,
}

/// Result of partitioning the candidate pool for one requested window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AvailabilityPartition {
    pub available: Vec<Technician>,
    pub unavailable: Vec<UnavailableTechnician>,
}

/// Splits the candidate pool into technicians who can and cannot take the
/// window `[start, end)` for `service_id`.
///
/// `on_leave` holds technician ids with an `is_available = false` schedule
/// entry on the window's date; `busy` holds pending-appointment intervals
/// for any of the candidates (intervals for other technicians are ignored).
pub fn partition_technicians(
    candidates: Vec<Technician>,
    service_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    on_leave: &HashSet<String>,
    busy: &[BusyInterval],
) -> AvailabilityPartition {
    let mut partition = AvailabilityPartition::default();

    for technician in candidates {
        let reason = if !technician.skills.contains(service_id) {
            Some(UnavailableReason::SkillMismatch)
        } else if on_leave.contains(&technician.id) {
            Some(UnavailableReason::OnLeave)
        } else if busy
            .iter()
            .any(|b| b.technician_id == technician.id && b.conflicts_with(start, end))
        {
            Some(UnavailableReason::Busy)
        } else {
            None
        };

        match reason {
            Some(reason) => partition
                .unavailable
                .push(UnavailableTechnician { technician, reason }),
            None => partition.available.push(technician),
        }
    }

    partition
}

// =============================================================================
// Slot Grid
// =============================================================================

/// Bookability of one grid slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    /// At least one eligible technician is free for the slot.
    Available,
    /// Every eligible technician is booked; a client may still join the
    /// waitlist for this slot.
    Waitlist,
    /// The slot cannot be booked at all: it starts in the past, or the
    /// service would run past closing time.
    Closed,
}

/// One entry of the day grid for a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: SlotStatus,
    /// Eligible technicians free for this slot. Always zero for `Closed`
    /// slots.
    pub available_count: u32,
}

/// Generates the day grid for one service across the candidate pool.
///
/// Slots start at the opening time and step by the configured interval.
/// The grid always spans the full business day; unusable slots are marked
/// `Closed` rather than omitted, so clients render a stable layout.
///
/// A technician counts toward a slot when they offer the service, are not
/// on leave that day, and have no pending booking overlapping the slot's
/// window.
#[allow(clippy::too_many_arguments)]
pub fn day_slot_grid(
    hours: &BusinessHours,
    date: NaiveDate,
    service_id: &str,
    service_duration: Duration,
    candidates: &[Technician],
    on_leave: &HashSet<String>,
    busy: &[BusyInterval],
    now: DateTime<Utc>,
) -> Vec<Slot> {
    let eligible: Vec<&Technician> = candidates
        .iter()
        .filter(|t| t.skills.contains(service_id) && !on_leave.contains(&t.id))
        .collect();

    let open = hours.open_on(date);
    let close = hours.close_on(date);
    let step = hours.slot_interval();

    let mut slots = Vec::new();
    let mut start = open;
    while start < close {
        let end = start + service_duration;

        let slot = if start < now || end > close {
            Slot {
                start,
                end,
                status: SlotStatus::Closed,
                available_count: 0,
            }
        } else {
            let available_count = eligible
                .iter()
                .filter(|t| {
                    !busy
                        .iter()
                        .any(|b| b.technician_id == t.id && b.conflicts_with(start, end))
                })
                .count() as u32;
            let status = if available_count > 0 {
                SlotStatus::Available
            } else {
                SlotStatus::Waitlist
            };
            Slot {
                start,
                end,
                status,
                available_count,
            }
        };

        slots.push(slot);
        start += step;
    }

    slots
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SkillSet, TechnicianStatus};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2026, 3, 14)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
            .and_utc()
    }

    fn tech(id: &str, skills: &[&str]) -> Technician {
        Technician {
            id: id.to_string(),
            name: format!("tech {id}"),
            skills: SkillSet::from_ids(skills.iter().copied()),
            status: TechnicianStatus::Free,
            created_at: at(9, 0),
            updated_at: at(9, 0),
        }
    }

    fn busy(id: &str, s: DateTime<Utc>, e: DateTime<Utc>) -> BusyInterval {
        BusyInterval {
            technician_id: id.to_string(),
            start: s,
            end: e,
        }
    }

    // -------------------------------------------------------------------------
    // overlaps
    // -------------------------------------------------------------------------

    #[test]
    fn test_overlap_partial() {
        assert!(overlaps(at(10, 0), at(11, 0), at(10, 30), at(11, 30)));
        assert!(overlaps(at(10, 30), at(11, 30), at(10, 0), at(11, 0)));
    }

    #[test]
    fn test_overlap_containment() {
        assert!(overlaps(at(10, 0), at(12, 0), at(10, 30), at(11, 0)));
        assert!(overlaps(at(10, 30), at(11, 0), at(10, 0), at(12, 0)));
    }

    #[test]
    fn test_back_to_back_does_not_overlap() {
        assert!(!overlaps(at(10, 0), at(11, 0), at(11, 0), at(12, 0)));
        assert!(!overlaps(at(11, 0), at(12, 0), at(10, 0), at(11, 0)));
    }

    #[test]
    fn test_disjoint_does_not_overlap() {
        assert!(!overlaps(at(10, 0), at(10, 30), at(14, 0), at(15, 0)));
    }

    // -------------------------------------------------------------------------
    // partition_technicians
    // -------------------------------------------------------------------------

    #[test]
    fn test_partition_all_reasons() {
        let candidates = vec![
            tech("t-free", &["svc-massage"]),
            tech("t-unskilled", &["svc-facial"]),
            tech("t-leave", &["svc-massage"]),
            tech("t-busy", &["svc-massage"]),
        ];
        let on_leave: HashSet<String> = ["t-leave".to_string()].into();
        let busy = vec![busy("t-busy", at(10, 0), at(11, 0))];

        let p = partition_technicians(
            candidates,
            "svc-massage",
            at(10, 30),
            at(11, 30),
            &on_leave,
            &busy,
        );

        assert_eq!(p.available.len(), 1);
        assert_eq!(p.available[0].id, "t-free");

        let reasons: Vec<(&str, UnavailableReason)> = p
            .unavailable
            .iter()
            .map(|u| (u.technician.id.as_str(), u.reason))
            .collect();
        assert_eq!(
            reasons,
            vec![
                ("t-unskilled", UnavailableReason::SkillMismatch),
                ("t-leave", UnavailableReason::OnLeave),
                ("t-busy", UnavailableReason::Busy),
            ]
        );
    }

    #[test]
    fn test_partition_skill_mismatch_wins_over_leave_and_busy() {
        let candidates = vec![tech("t-1", &["svc-other"])];
        let on_leave: HashSet<String> = ["t-1".to_string()].into();
        let busy = vec![busy("t-1", at(10, 0), at(11, 0))];

        let p = partition_technicians(
            candidates,
            "svc-massage",
            at(10, 0),
            at(11, 0),
            &on_leave,
            &busy,
        );
        assert_eq!(p.unavailable[0].reason, UnavailableReason::SkillMismatch);
    }

    #[test]
    fn test_partition_ignores_other_technicians_busy_intervals() {
        let candidates = vec![tech("t-1", &["svc-massage"])];
        let busy = vec![busy("t-2", at(10, 0), at(11, 0))];

        let p = partition_technicians(
            candidates,
            "svc-massage",
            at(10, 0),
            at(11, 0),
            &HashSet::new(),
            &busy,
        );
        assert_eq!(p.available.len(), 1);
    }

    #[test]
    fn test_partition_back_to_back_is_available() {
        let candidates = vec![tech("t-1", &["svc-massage"])];
        let busy = vec![busy("t-1", at(10, 0), at(11, 0))];

        let p = partition_technicians(
            candidates,
            "svc-massage",
            at(11, 0),
            at(12, 0),
            &HashSet::new(),
            &busy,
        );
        assert_eq!(p.available.len(), 1);
    }

    // -------------------------------------------------------------------------
    // day_slot_grid
    // -------------------------------------------------------------------------

    fn grid_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    #[test]
    fn test_grid_spans_full_day() {
        let hours = BusinessHours::default();
        let candidates = vec![tech("t-1", &["svc-massage"])];
        // 12 hours / 30-minute step
        let grid = day_slot_grid(
            &hours,
            grid_date(),
            "svc-massage",
            Duration::minutes(60),
            &candidates,
            &HashSet::new(),
            &[],
            at(0, 0),
        );
        assert_eq!(grid.len(), 24);
        assert_eq!(grid[0].start, at(10, 0));
        assert_eq!(grid[0].available_count, 1);
        assert_eq!(grid[23].start, at(21, 30));
    }

    #[test]
    fn test_grid_marks_past_slots_closed() {
        let hours = BusinessHours::default();
        let candidates = vec![tech("t-1", &["svc-massage"])];
        let grid = day_slot_grid(
            &hours,
            grid_date(),
            "svc-massage",
            Duration::minutes(30),
            &candidates,
            &HashSet::new(),
            &[],
            at(12, 15),
        );

        // 10:00 .. 12:00 starts are in the past
        for slot in grid.iter().filter(|s| s.start < at(12, 15)) {
            assert_eq!(slot.status, SlotStatus::Closed);
            assert_eq!(slot.available_count, 0);
        }
        let first_open = grid.iter().find(|s| s.start >= at(12, 15)).unwrap();
        assert_eq!(first_open.status, SlotStatus::Available);
    }

    #[test]
    fn test_grid_marks_overflow_slots_closed() {
        let hours = BusinessHours::default();
        let candidates = vec![tech("t-1", &["svc-massage"])];
        let grid = day_slot_grid(
            &hours,
            grid_date(),
            "svc-massage",
            Duration::minutes(90),
            &candidates,
            &HashSet::new(),
            &[],
            at(0, 0),
        );

        // a 90-minute service starting 21:00 or later would end past 22:00
        for slot in grid.iter().filter(|s| s.start >= at(21, 0)) {
            assert_eq!(slot.status, SlotStatus::Closed);
        }
        let last_open = grid.iter().rfind(|s| s.status == SlotStatus::Available).unwrap();
        assert_eq!(last_open.start, at(20, 30));
    }

    #[test]
    fn test_grid_counts_free_technicians_per_slot() {
        let hours = BusinessHours::default();
        let candidates = vec![
            tech("t-1", &["svc-massage"]),
            tech("t-2", &["svc-massage"]),
        ];
        let busy = vec![busy("t-1", at(14, 0), at(15, 0))];
        let grid = day_slot_grid(
            &hours,
            grid_date(),
            "svc-massage",
            Duration::minutes(60),
            &candidates,
            &HashSet::new(),
            &busy,
            at(0, 0),
        );

        // starts in [13:30, 15:00) collide with t-1's 14:00-15:00 booking,
        // leaving t-2 alone
        let by_start = |h, m| grid.iter().find(|s| s.start == at(h, m)).unwrap();
        assert_eq!(by_start(13, 0).available_count, 2);
        assert_eq!(by_start(13, 30).available_count, 1);
        assert_eq!(by_start(14, 0).available_count, 1);
        assert_eq!(by_start(14, 30).available_count, 1);
        assert_eq!(by_start(15, 0).available_count, 2);
        assert_eq!(by_start(14, 0).status, SlotStatus::Available);
    }

    #[test]
    fn test_grid_waitlist_when_no_technician_free() {
        let hours = BusinessHours::default();
        let candidates = vec![tech("t-1", &["svc-massage"])];
        let busy = vec![busy("t-1", at(14, 0), at(15, 0))];
        let grid = day_slot_grid(
            &hours,
            grid_date(),
            "svc-massage",
            Duration::minutes(60),
            &candidates,
            &HashSet::new(),
            &busy,
            at(0, 0),
        );

        let by_start = |h, m| grid.iter().find(|s| s.start == at(h, m)).unwrap();
        assert_eq!(by_start(13, 0).status, SlotStatus::Available);
        assert_eq!(by_start(13, 30).status, SlotStatus::Waitlist);
        assert_eq!(by_start(14, 30).status, SlotStatus::Waitlist);
        assert_eq!(by_start(15, 0).status, SlotStatus::Available);
    }

    #[test]
    fn test_grid_excludes_unskilled_and_on_leave() {
        let hours = BusinessHours::default();
        let candidates = vec![
            tech("t-skilled", &["svc-massage"]),
            tech("t-unskilled", &["svc-facial"]),
            tech("t-leave", &["svc-massage"]),
        ];
        let on_leave: HashSet<String> = ["t-leave".to_string()].into();
        let grid = day_slot_grid(
            &hours,
            grid_date(),
            "svc-massage",
            Duration::minutes(60),
            &candidates,
            &on_leave,
            &[],
            at(0, 0),
        );

        assert_eq!(grid[0].available_count, 1);
    }
}
