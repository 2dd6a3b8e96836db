use actix_web::{web, HttpResponse};
use serde_json::{json, Value};
use validator::Validate;

use crate::db::{to_row, DataAccess, Filter, Row, Select};
use crate::errors::AppError;
use crate::models::employee::{Employee, EmployeeResponse, EmployeeUpdate, NewEmployee, COLLECTION};

fn employees_with_team() -> Select {
    Select::from(COLLECTION).join("teams", "team_id", &["team_name"])
}

fn into_response(row: Row) -> Result<EmployeeResponse, AppError> {
    let employee: Employee = serde_json::from_value(Value::Object(row))?;
    Ok(employee.into())
}

fn acknowledge(message: &str) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "success": true,
        "message": message,
    }))
}

fn missing_id() -> AppError {
    AppError::BadRequest("Employee ID is required".to_string())
}

pub async fn get_employees(store: web::Data<dyn DataAccess>) -> Result<HttpResponse, AppError> {
    let rows = store
        .select(&employees_with_team().order("created_at", true))
        .await?;

    let employees = rows
        .into_iter()
        .map(into_response)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(HttpResponse::Ok().json(employees))
}

pub async fn get_employee(
    store: web::Data<dyn DataAccess>,
    id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let id = id.into_inner();
    let rows = store
        .select(&employees_with_team().filter(Filter::eq("id", id)))
        .await?;

    match rows.into_iter().next() {
        Some(row) => Ok(HttpResponse::Ok().json(into_response(row)?)),
        None => Err(AppError::NotFound("Employee not found".to_string())),
    }
}

pub async fn create_employee(
    store: web::Data<dyn DataAccess>,
    new_employee: web::Json<NewEmployee>,
) -> Result<HttpResponse, AppError> {
    new_employee.validate()?;

    let record = to_row(&new_employee.into_inner())?;
    store.insert(COLLECTION, record).await?;

    log::info!("Employee added");
    Ok(acknowledge("Employee added"))
}

pub async fn update_employee(
    store: web::Data<dyn DataAccess>,
    updates: web::Json<EmployeeUpdate>,
) -> Result<HttpResponse, AppError> {
    let id = updates.id.filter(|id| *id != 0).ok_or_else(missing_id)?;
    updates.validate()?;

    let patch = to_row(&updates.into_inner())?;
    store.update(COLLECTION, patch, &Filter::eq("id", id)).await?;

    log::info!("Employee {} updated", id);
    Ok(acknowledge("Employee updated"))
}

pub async fn delete_employee(
    store: web::Data<dyn DataAccess>,
    id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let id = id.into_inner();
    store.delete(COLLECTION, &Filter::eq("id", id)).await?;

    log::info!("Employee {} deleted", id);
    Ok(acknowledge("Employee deleted"))
}

/// `DELETE /employees` names no record.
pub async fn delete_without_id() -> Result<HttpResponse, AppError> {
    Err(missing_id())
}

pub async fn method_not_allowed() -> Result<HttpResponse, AppError> {
    Err(AppError::MethodNotAllowed("Method not allowed".to_string()))
}
