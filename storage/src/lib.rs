// storage/src/lib.rs
//! Sled-backed persistent store for the hospital backend.
//!
//! One tree per entity, JSON-encoded values. Uniqueness invariants
//! (usernames, the one-Booked-appointment-per-slot rule, department names)
//! are enforced with `compare_and_swap` on dedicated index trees, so the
//! conflict signal comes from the storage layer itself rather than from a
//! separate read-then-write existence check.

use std::collections::HashSet;
use std::path::Path;

use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::{Db, Tree};
use tracing::info;

use models::errors::{HmsError, HmsResult};
use models::medical::{
    Appointment, AppointmentStatus, AvailabilityCalendar, Department, DoctorProfile, NewDepartment,
    NewUser, PatientProfile, Role, Treatment, User,
};

pub const DEFAULT_ADMIN_USERNAME: &str = "admin@hms.com";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

/// Handle over the sled database and its entity trees. Cheap to share via
/// `Arc`; sled trees are internally thread-safe.
pub struct HospitalStore {
    db: Db,
    users: Tree,
    usernames: Tree,
    doctor_profiles: Tree,
    patient_profiles: Tree,
    departments: Tree,
    department_names: Tree,
    appointments: Tree,
    appt_by_doctor: Tree,
    appt_by_patient: Tree,
    booked_slots: Tree,
    treatments: Tree,
}

fn encode<T: Serialize>(value: &T) -> HmsResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> HmsResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

fn id_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

fn pair_key(owner: u64, entity: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(16);
    key.extend_from_slice(&owner.to_be_bytes());
    key.extend_from_slice(&entity.to_be_bytes());
    key
}

/// Claim key for a bookable slot. Present in `booked_slots` exactly while a
/// Booked appointment holds the slot.
fn slot_key(doctor_id: u64, date: NaiveDate, time: NaiveTime) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + 16);
    key.extend_from_slice(&doctor_id.to_be_bytes());
    key.extend_from_slice(date.format("%Y-%m-%d").to_string().as_bytes());
    key.push(b'@');
    key.extend_from_slice(time.format("%H:%M").to_string().as_bytes());
    key
}

fn slot_date_prefix(doctor_id: u64, date: NaiveDate) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(8 + 10);
    prefix.extend_from_slice(&doctor_id.to_be_bytes());
    prefix.extend_from_slice(date.format("%Y-%m-%d").to_string().as_bytes());
    prefix
}

impl HospitalStore {
    /// Opens (or creates) the database under `path`.
    pub fn open(path: impl AsRef<Path>) -> HmsResult<Self> {
        let db = sled::open(path.as_ref())?;
        let store = HospitalStore {
            users: db.open_tree("users")?,
            usernames: db.open_tree("usernames")?,
            doctor_profiles: db.open_tree("doctor_profiles")?,
            patient_profiles: db.open_tree("patient_profiles")?,
            departments: db.open_tree("departments")?,
            department_names: db.open_tree("department_names")?,
            appointments: db.open_tree("appointments")?,
            appt_by_doctor: db.open_tree("appt_by_doctor")?,
            appt_by_patient: db.open_tree("appt_by_patient")?,
            booked_slots: db.open_tree("booked_slots")?,
            treatments: db.open_tree("treatments")?,
            db,
        };
        Ok(store)
    }

    fn next_id(&self) -> HmsResult<u64> {
        // sled's monotonic id generator; never reused across restarts.
        Ok(self.db.generate_id()?)
    }

    fn flush(&self) -> HmsResult<()> {
        self.db.flush()?;
        Ok(())
    }

    // --- Users ---

    /// Creates a user, failing with `Conflict` when the username is taken.
    /// The username index insert is the atomic uniqueness check.
    pub fn create_user(&self, new_user: NewUser) -> HmsResult<User> {
        let id = self.next_id()?;
        let user = User::from_new_user(id, new_user)
            .map_err(|e| HmsError::Internal(format!("Failed to hash password: {}", e)))?;

        let claimed = self
            .usernames
            .compare_and_swap(
                user.username.as_bytes(),
                None as Option<&[u8]>,
                Some(&id_key(id)[..]),
            )?
            .is_ok();
        if !claimed {
            return Err(HmsError::conflict("User already exists"));
        }

        self.users.insert(id_key(id), encode(&user)?)?;
        self.flush()?;
        Ok(user)
    }

    pub fn user_by_id(&self, id: u64) -> HmsResult<Option<User>> {
        self.users
            .get(id_key(id))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    pub fn user_by_username(&self, username: &str) -> HmsResult<Option<User>> {
        let Some(id_bytes) = self.usernames.get(username.as_bytes())? else {
            return Ok(None);
        };
        let id = u64::from_be_bytes(id_bytes.as_ref().try_into().map_err(|_| {
            HmsError::Storage(format!("Corrupt username index entry for '{}'", username))
        })?);
        self.user_by_id(id)
    }

    /// Rewrites a user record. The username is immutable; approval and
    /// blocked flags are the expected mutations.
    pub fn update_user(&self, user: &User) -> HmsResult<()> {
        if self.users.get(id_key(user.id))?.is_none() {
            return Err(HmsError::not_found("User not found"));
        }
        self.users.insert(id_key(user.id), encode(user)?)?;
        self.flush()?;
        Ok(())
    }

    /// Removes a user together with its username index entry and any
    /// role-specific profile.
    pub fn delete_user(&self, id: u64) -> HmsResult<()> {
        let Some(user) = self.user_by_id(id)? else {
            return Err(HmsError::not_found("User not found"));
        };
        self.usernames.remove(user.username.as_bytes())?;
        self.users.remove(id_key(id))?;
        self.doctor_profiles.remove(id_key(id))?;
        self.patient_profiles.remove(id_key(id))?;
        self.flush()?;
        Ok(())
    }

    pub fn users_by_role(&self, role: Role) -> HmsResult<Vec<User>> {
        let mut users = Vec::new();
        for entry in self.users.iter() {
            let (_, bytes) = entry?;
            let user: User = decode(&bytes)?;
            if user.role == role {
                users.push(user);
            }
        }
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    pub fn count_users_by_role(&self, role: Role) -> HmsResult<usize> {
        Ok(self.users_by_role(role)?.len())
    }

    /// Seeds the default admin account when no admin exists yet. Returns the
    /// created user on first startup, `None` afterwards.
    pub fn seed_admin(&self) -> HmsResult<Option<User>> {
        if self.count_users_by_role(Role::Admin)? > 0 {
            return Ok(None);
        }
        let admin = self.create_user(NewUser {
            username: DEFAULT_ADMIN_USERNAME.to_string(),
            password: DEFAULT_ADMIN_PASSWORD.to_string(),
            role: Role::Admin,
            approved: true,
        })?;
        info!(username = %admin.username, "seeded default admin account");
        Ok(Some(admin))
    }

    // --- Profiles ---

    pub fn put_doctor_profile(&self, profile: &DoctorProfile) -> HmsResult<()> {
        self.doctor_profiles
            .insert(id_key(profile.user_id), encode(profile)?)?;
        self.flush()?;
        Ok(())
    }

    pub fn doctor_profile(&self, user_id: u64) -> HmsResult<Option<DoctorProfile>> {
        self.doctor_profiles
            .get(id_key(user_id))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    pub fn put_patient_profile(&self, profile: &PatientProfile) -> HmsResult<()> {
        self.patient_profiles
            .insert(id_key(profile.user_id), encode(profile)?)?;
        self.flush()?;
        Ok(())
    }

    pub fn patient_profile(&self, user_id: u64) -> HmsResult<Option<PatientProfile>> {
        self.patient_profiles
            .get(id_key(user_id))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    // --- Departments ---

    pub fn create_department(&self, new: NewDepartment) -> HmsResult<Department> {
        if new.name.trim().is_empty() {
            return Err(HmsError::validation("Department name required"));
        }
        let id = self.next_id()?;
        let claimed = self
            .department_names
            .compare_and_swap(
                new.name.as_bytes(),
                None as Option<&[u8]>,
                Some(&id_key(id)[..]),
            )?
            .is_ok();
        if !claimed {
            return Err(HmsError::conflict("Department already exists"));
        }
        let department = Department {
            id,
            name: new.name,
            description: new.description,
        };
        self.departments.insert(id_key(id), encode(&department)?)?;
        self.flush()?;
        Ok(department)
    }

    pub fn department(&self, id: u64) -> HmsResult<Option<Department>> {
        self.departments
            .get(id_key(id))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    pub fn departments(&self) -> HmsResult<Vec<Department>> {
        let mut departments = Vec::new();
        for entry in self.departments.iter() {
            let (_, bytes) = entry?;
            departments.push(decode(&bytes)?);
        }
        Ok(departments)
    }

    // --- Appointments ---

    /// Books a slot. The `compare_and_swap` on the slot claim key is the
    /// serialization point: under concurrent requests for the same
    /// (doctor, date, time) exactly one booking wins and the rest fail with
    /// `Conflict`.
    pub fn book_appointment(
        &self,
        doctor_id: u64,
        patient_id: u64,
        department_id: Option<u64>,
        date: NaiveDate,
        time: NaiveTime,
    ) -> HmsResult<Appointment> {
        let id = self.next_id()?;
        let claimed = self
            .booked_slots
            .compare_and_swap(
                slot_key(doctor_id, date, time),
                None as Option<&[u8]>,
                Some(&id_key(id)[..]),
            )?
            .is_ok();
        if !claimed {
            return Err(HmsError::conflict("Slot already booked"));
        }

        let appointment = Appointment {
            id,
            doctor_id,
            patient_id,
            department_id,
            date,
            time,
            status: AppointmentStatus::Booked,
            remarks: None,
        };
        self.appointments.insert(id_key(id), encode(&appointment)?)?;
        self.appt_by_doctor
            .insert(pair_key(doctor_id, id), &id_key(id)[..])?;
        self.appt_by_patient
            .insert(pair_key(patient_id, id), &id_key(id)[..])?;
        self.flush()?;
        Ok(appointment)
    }

    pub fn appointment(&self, id: u64) -> HmsResult<Option<Appointment>> {
        self.appointments
            .get(id_key(id))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    fn appointments_by_index(&self, index: &Tree, owner: u64) -> HmsResult<Vec<Appointment>> {
        let mut appointments = Vec::new();
        for entry in index.scan_prefix(owner.to_be_bytes()) {
            let (_, id_bytes) = entry?;
            let id = u64::from_be_bytes(
                id_bytes
                    .as_ref()
                    .try_into()
                    .map_err(|_| HmsError::Storage("Corrupt appointment index entry".into()))?,
            );
            if let Some(appointment) = self.appointment(id)? {
                appointments.push(appointment);
            }
        }
        Ok(appointments)
    }

    /// Doctor-facing listing, ascending by (date, time).
    pub fn appointments_for_doctor(&self, doctor_id: u64) -> HmsResult<Vec<Appointment>> {
        let mut appointments = self.appointments_by_index(&self.appt_by_doctor, doctor_id)?;
        appointments.sort_by_key(|a| (a.date, a.time));
        Ok(appointments)
    }

    /// Patient-facing listing, descending by (date, time).
    pub fn appointments_for_patient(&self, patient_id: u64) -> HmsResult<Vec<Appointment>> {
        let mut appointments = self.appointments_by_index(&self.appt_by_patient, patient_id)?;
        appointments.sort_by_key(|a| std::cmp::Reverse((a.date, a.time)));
        Ok(appointments)
    }

    /// Admin listing, descending by (date, time).
    pub fn all_appointments(&self) -> HmsResult<Vec<Appointment>> {
        let mut appointments = Vec::new();
        for entry in self.appointments.iter() {
            let (_, bytes) = entry?;
            appointments.push(decode(&bytes)?);
        }
        appointments.sort_by_key(|a: &Appointment| std::cmp::Reverse((a.date, a.time)));
        Ok(appointments)
    }

    pub fn count_appointments(&self) -> usize {
        self.appointments.len()
    }

    pub fn count_appointments_from(&self, date: NaiveDate) -> HmsResult<usize> {
        let mut count = 0;
        for entry in self.appointments.iter() {
            let (_, bytes) = entry?;
            let appointment: Appointment = decode(&bytes)?;
            if appointment.date >= date {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Times on `date` currently held by a Booked appointment, from the slot
    /// claim tree.
    pub fn booked_times(&self, doctor_id: u64, date: NaiveDate) -> HmsResult<HashSet<NaiveTime>> {
        let mut times = HashSet::new();
        for entry in self
            .booked_slots
            .scan_prefix(slot_date_prefix(doctor_id, date))
        {
            let (key, _) = entry?;
            // Key layout: doctor be-bytes + "YYYY-MM-DD" + '@' + "HH:MM".
            let raw = &key.as_ref()[8 + 10 + 1..];
            let label = std::str::from_utf8(raw)
                .map_err(|_| HmsError::Storage("Corrupt slot claim key".into()))?;
            let time = NaiveTime::parse_from_str(label, "%H:%M")
                .map_err(|_| HmsError::Storage("Corrupt slot claim key".into()))?;
            times.insert(time);
        }
        Ok(times)
    }

    /// Booked appointments dated `date`, across all doctors.
    pub fn booked_appointments_on(&self, date: NaiveDate) -> HmsResult<Vec<Appointment>> {
        let mut appointments = Vec::new();
        for entry in self.appointments.iter() {
            let (_, bytes) = entry?;
            let appointment: Appointment = decode(&bytes)?;
            if appointment.date == date && appointment.status.is_booked() {
                appointments.push(appointment);
            }
        }
        appointments.sort_by_key(|a| (a.doctor_id, a.time));
        Ok(appointments)
    }

    /// A doctor's appointments whose month-of-year matches `month`,
    /// irrespective of year.
    pub fn doctor_appointments_in_month(
        &self,
        doctor_id: u64,
        month: u32,
    ) -> HmsResult<Vec<Appointment>> {
        let appointments = self.appointments_for_doctor(doctor_id)?;
        Ok(appointments
            .into_iter()
            .filter(|a| a.date.month() == month)
            .collect())
    }

    /// Completes a visit: owner check, single status transition, slot claim
    /// release and creation of the one Treatment record.
    pub fn complete_appointment(
        &self,
        appointment_id: u64,
        acting_doctor_id: u64,
        diagnosis: String,
        prescription: String,
        notes: String,
    ) -> HmsResult<(Appointment, Treatment)> {
        let Some(mut appointment) = self.appointment(appointment_id)? else {
            return Err(HmsError::not_found("Appointment not found"));
        };
        if appointment.doctor_id != acting_doctor_id {
            return Err(HmsError::forbidden("Not your appointment"));
        }
        if !appointment.status.is_booked() {
            return Err(HmsError::validation(
                "Only booked appointments can be completed",
            ));
        }

        appointment.status = AppointmentStatus::Completed;
        self.appointments
            .insert(id_key(appointment_id), encode(&appointment)?)?;
        self.booked_slots.remove(slot_key(
            appointment.doctor_id,
            appointment.date,
            appointment.time,
        ))?;

        let treatment = Treatment {
            id: self.next_id()?,
            appointment_id,
            diagnosis,
            prescription,
            notes,
        };
        self.treatments
            .insert(id_key(appointment_id), encode(&treatment)?)?;
        self.flush()?;
        Ok((appointment, treatment))
    }

    /// Cancels a booking: owner check, Booked-only transition, slot claim
    /// release so the slot becomes bookable again.
    pub fn cancel_appointment(
        &self,
        appointment_id: u64,
        acting_patient_id: u64,
    ) -> HmsResult<Appointment> {
        let Some(mut appointment) = self.appointment(appointment_id)? else {
            return Err(HmsError::not_found("Appointment not found"));
        };
        if appointment.patient_id != acting_patient_id {
            return Err(HmsError::forbidden("Not your appointment"));
        }
        if !appointment.status.is_booked() {
            return Err(HmsError::validation(
                "Only booked appointments can be cancelled",
            ));
        }

        appointment.status = AppointmentStatus::Cancelled;
        self.appointments
            .insert(id_key(appointment_id), encode(&appointment)?)?;
        self.booked_slots.remove(slot_key(
            appointment.doctor_id,
            appointment.date,
            appointment.time,
        ))?;
        self.flush()?;
        Ok(appointment)
    }

    // --- Treatments ---

    pub fn treatment_for_appointment(&self, appointment_id: u64) -> HmsResult<Option<Treatment>> {
        self.treatments
            .get(id_key(appointment_id))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    /// Treatments for a patient, paired with their appointments, newest
    /// appointment first.
    pub fn treatments_for_patient(
        &self,
        patient_id: u64,
    ) -> HmsResult<Vec<(Treatment, Appointment)>> {
        let mut rows = Vec::new();
        for appointment in self.appointments_for_patient(patient_id)? {
            if let Some(treatment) = self.treatment_for_appointment(appointment.id)? {
                rows.push((treatment, appointment));
            }
        }
        Ok(rows)
    }

    /// Replaces a doctor's calendar, leaving the rest of the profile alone.
    pub fn replace_doctor_availability(
        &self,
        user_id: u64,
        availability: AvailabilityCalendar,
    ) -> HmsResult<DoctorProfile> {
        let Some(mut profile) = self.doctor_profile(user_id)? else {
            return Err(HmsError::not_found("Doctor profile not found"));
        };
        profile.availability = availability;
        self.put_doctor_profile(&profile)?;
        Ok(profile)
    }
}
