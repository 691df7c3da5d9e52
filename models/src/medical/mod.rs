pub mod appointment;
pub mod department;
pub mod doctor;
pub mod patient;
pub mod role;
pub mod treatment;
pub mod user;

pub use appointment::{
    parse_appointment_date, parse_appointment_time, Appointment, AppointmentStatus,
};
pub use department::{Department, NewDepartment};
pub use doctor::{AvailabilityCalendar, AvailabilityDay, DoctorProfile};
pub use patient::{PatientProfile, PatientProfileUpdate};
pub use role::Role;
pub use treatment::Treatment;
pub use user::{Login, NewUser, User};
