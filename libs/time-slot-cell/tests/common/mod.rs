#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

use time_slot_cell::{
    Clock, DateOverride, DateRange, DayOfWeek, ScheduleRepository, SlotError, SlotStatus, TimeRange,
    TimeSlot, WeeklyAvailability, WeeklySchedule,
};

#[derive(Default)]
struct Store {
    doctors: HashSet<Uuid>,
    slot_durations: HashMap<Uuid, i64>,
    weekly: HashMap<Uuid, WeeklySchedule>,
    overrides: HashMap<Uuid, BTreeMap<NaiveDate, DateOverride>>,
    slots: Vec<TimeSlot>,
}

/// Repository double keeping everything in memory. `insert_delay` holds inserts back
/// so concurrent runs overlap.
#[derive(Default)]
pub struct InMemoryRepository {
    store: Mutex<Store>,
    insert_delay: Option<Duration>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_insert_delay(delay: Duration) -> Self {
        Self { store: Mutex::default(), insert_delay: Some(delay) }
    }

    pub fn add_doctor(&self, doctor_id: Uuid, weekly: WeeklySchedule) {
        let mut store = self.store.lock().unwrap();
        store.doctors.insert(doctor_id);
        store.weekly.insert(doctor_id, weekly);
    }

    pub fn set_slot_duration(&self, doctor_id: Uuid, minutes: i64) {
        self.store.lock().unwrap().slot_durations.insert(doctor_id, minutes);
    }

    pub fn set_weekly(&self, doctor_id: Uuid, weekly: WeeklySchedule) {
        self.store.lock().unwrap().weekly.insert(doctor_id, weekly);
    }

    pub fn add_override(&self, doctor_id: Uuid, date_override: DateOverride) {
        self.store
            .lock()
            .unwrap()
            .overrides
            .entry(doctor_id)
            .or_default()
            .insert(date_override.date, date_override);
    }

    pub fn slots(&self) -> Vec<TimeSlot> {
        let mut slots = self.store.lock().unwrap().slots.clone();
        slots.sort_by_key(|slot| (slot.date, slot.start_time));
        slots
    }

    pub fn book(&self, date: NaiveDate, start: NaiveTime) {
        let mut store = self.store.lock().unwrap();
        for slot in store.slots.iter_mut() {
            if slot.date == date && slot.start_time == start {
                slot.status = SlotStatus::Booked;
            }
        }
    }
}

#[async_trait]
impl ScheduleRepository for InMemoryRepository {
    async fn doctor_exists(&self, doctor_id: Uuid, _auth_token: &str) -> Result<bool, SlotError> {
        Ok(self.store.lock().unwrap().doctors.contains(&doctor_id))
    }

    async fn doctor_slot_duration(&self, doctor_id: Uuid, _auth_token: &str) -> Result<Option<i64>, SlotError> {
        Ok(self.store.lock().unwrap().slot_durations.get(&doctor_id).copied())
    }

    async fn load_weekly_schedule(&self, doctor_id: Uuid, _auth_token: &str) -> Result<WeeklySchedule, SlotError> {
        Ok(self.store.lock().unwrap().weekly.get(&doctor_id).cloned().unwrap_or_default())
    }

    async fn load_overrides(
        &self,
        doctor_id: Uuid,
        range: Option<DateRange>,
        _auth_token: &str,
    ) -> Result<Vec<DateOverride>, SlotError> {
        let store = self.store.lock().unwrap();
        Ok(store
            .overrides
            .get(&doctor_id)
            .map(|overrides| {
                overrides
                    .values()
                    .filter(|o| range.map_or(true, |r| r.contains(o.date)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn load_slots(&self, doctor_id: Uuid, range: DateRange, _auth_token: &str) -> Result<Vec<TimeSlot>, SlotError> {
        let store = self.store.lock().unwrap();
        Ok(store
            .slots
            .iter()
            .filter(|slot| slot.doctor_id == doctor_id && range.contains(slot.date))
            .cloned()
            .collect())
    }

    async fn insert_slots(
        &self,
        doctor_id: Uuid,
        slots: &[TimeSlot],
        _auth_token: &str,
    ) -> Result<Vec<TimeSlot>, SlotError> {
        if let Some(delay) = self.insert_delay {
            tokio::time::sleep(delay).await;
        }

        let mut store = self.store.lock().unwrap();
        let clash = slots.iter().any(|new| {
            store.slots.iter().any(|old| {
                old.status.blocks_time() && old.doctor_id == new.doctor_id && old.starts_at() == new.starts_at()
            })
        });
        if clash {
            return Err(SlotError::ConcurrentGenerationConflict(doctor_id));
        }

        let stored: Vec<TimeSlot> = slots
            .iter()
            .cloned()
            .map(|mut slot| {
                slot.id = Some(Uuid::new_v4());
                slot
            })
            .collect();
        store.slots.extend(stored.iter().cloned());
        Ok(stored)
    }

    async fn delete_slots(&self, doctor_id: Uuid, slot_ids: &[Uuid], _auth_token: &str) -> Result<usize, SlotError> {
        let mut store = self.store.lock().unwrap();
        let before = store.slots.len();
        store.slots.retain(|slot| {
            !(slot.doctor_id == doctor_id
                && slot.status == SlotStatus::Available
                && slot.id.map_or(false, |id| slot_ids.contains(&id)))
        });
        Ok(before - store.slots.len())
    }

    async fn replace_weekly_schedule(
        &self,
        doctor_id: Uuid,
        schedule: &WeeklySchedule,
        _auth_token: &str,
    ) -> Result<(), SlotError> {
        self.set_weekly(doctor_id, schedule.clone());
        Ok(())
    }

    async fn upsert_overrides(
        &self,
        doctor_id: Uuid,
        overrides: &[DateOverride],
        _auth_token: &str,
    ) -> Result<(), SlotError> {
        for date_override in overrides {
            self.add_override(doctor_id, date_override.clone());
        }
        Ok(())
    }
}

pub fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// January 2030; the 7th is a Monday.
pub fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 1, day).unwrap()
}

pub fn fixed_clock(at: NaiveDateTime) -> Clock {
    Arc::new(move || at)
}

/// A moment well before every test date.
pub fn early_clock() -> Clock {
    fixed_clock(d(1).and_hms_opt(0, 0, 0).unwrap())
}

/// Monday to Friday, the given hours; weekend disabled.
pub fn weekday_schedule(start: NaiveTime, end: NaiveTime) -> WeeklySchedule {
    let mut weekly: WeeklySchedule = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
    ]
    .into_iter()
    .map(|day| WeeklyAvailability::open(day, TimeRange { start, end }))
    .collect();
    weekly.set(WeeklyAvailability::closed(DayOfWeek::Saturday));
    weekly.set(WeeklyAvailability::closed(DayOfWeek::Sunday));
    weekly
}
