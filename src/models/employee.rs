use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::team::TeamRef;

pub const COLLECTION: &str = "employees";

/// An employee row as read back from the backend, with its team relation.
#[derive(Deserialize, Debug, Clone)]
pub struct Employee {
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub job_title: Option<String>,
    pub email: Option<String>,
    pub team_id: Option<i64>,
    pub salary: Option<f64>,
    pub hire_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub teams: Option<TeamRef>,
}

/// Wire shape of an employee: the team relation flattened to `team_name`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EmployeeResponse {
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub job_title: Option<String>,
    pub email: Option<String>,
    pub team_id: Option<i64>,
    pub salary: Option<f64>,
    pub hire_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub team_name: Option<String>,
}

impl From<Employee> for EmployeeResponse {
    fn from(employee: Employee) -> Self {
        EmployeeResponse {
            id: employee.id,
            first_name: employee.first_name,
            last_name: employee.last_name,
            job_title: employee.job_title,
            email: employee.email,
            team_id: employee.team_id,
            salary: employee.salary,
            hire_date: employee.hire_date,
            created_at: employee.created_at,
            team_name: employee.teams.and_then(|team| team.team_name),
        }
    }
}

#[derive(Serialize, Deserialize, Validate, Debug)]
pub struct NewEmployee {
    #[validate(length(min = 1))]
    pub first_name: String,
    #[validate(length(min = 1))]
    pub last_name: String,
    pub job_title: String,
    #[validate(email)]
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0))]
    pub salary: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hire_date: Option<NaiveDate>,
}

/// Update body. Every mutable field is written, so a field missing from the
/// request is stored as null.
#[derive(Serialize, Deserialize, Validate, Debug)]
pub struct EmployeeUpdate {
    #[serde(skip_serializing)]
    pub id: Option<i64>,
    #[validate(length(min = 1))]
    pub first_name: Option<String>,
    #[validate(length(min = 1))]
    pub last_name: Option<String>,
    pub job_title: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub team_id: Option<i64>,
    #[validate(range(min = 0.0))]
    pub salary: Option<f64>,
    pub hire_date: Option<NaiveDate>,
}
