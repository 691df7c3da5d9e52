// models/src/medical/department.rs

use serde::{Deserialize, Serialize};

/// Specialization catalog entry. Static reference data, admin-managed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Department {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDepartment {
    pub name: String,
    pub description: Option<String>,
}
