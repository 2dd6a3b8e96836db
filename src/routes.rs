use actix_web::web;

use crate::errors::AppError;
use crate::handlers::employee;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::PathConfig::default()
            .error_handler(|_err, _req| AppError::BadRequest("Invalid employee ID".to_string()).into()),
    )
    .app_data(
        web::JsonConfig::default()
            .content_type_required(false)
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
    )
    .service(
        web::resource("/employees")
            .route(web::get().to(employee::get_employees))
            .route(web::post().to(employee::create_employee))
            .route(web::put().to(employee::update_employee))
            .route(web::delete().to(employee::delete_without_id))
            .default_service(web::to(employee::method_not_allowed)),
    )
    .service(
        web::resource("/employees/{id}")
            .route(web::get().to(employee::get_employee))
            .route(web::delete().to(employee::delete_employee))
            .default_service(web::to(employee::method_not_allowed)),
    );
}
