/*!
Student CRUD, the filtered search, and the analysis report.

Every handler here sits behind `key_authenticate`; by the time one
runs, the caller holds a live session.
*/
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::Response,
    Json,
};
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;
use serde_json::json;

use crate::config::Glob;
use crate::report;
use crate::student::{Student, StudentForm, StudentPatch};
use super::{ApiError, respond_ok};

fn parse_record_id(id: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(id).map_err(|_| ApiError::Validation(format!(
        "{:?} is not a valid record id.", id
    )))
}

fn student_array(students: &[Student]) -> serde_json::Value {
    let arr: Vec<serde_json::Value> = students.iter()
        .map(Student::api_json)
        .collect();
    json!(arr)
}

pub async fn create(
    Extension(glob): Extension<Arc<Glob>>,
    Json(form): Json<StudentForm>,
) -> Result<Response, ApiError> {
    log::trace!("students::create( {:?} ) called.", &form);

    let new = form.validate().map_err(ApiError::Validation)?;

    if glob.store.get_student_by_student_id(&new.student_id)
        .await?.is_some()
    {
        return Err(ApiError::Conflict(
            "That student ID is already on file.".to_owned()
        ));
    }

    let student = glob.store.insert_student(&new).await?;
    log::info!(
        "Created student record {:?} ({:?}).",
        &student.student_id, &student.name
    );

    Ok(respond_ok(
        StatusCode::CREATED,
        Some(student.api_json()),
        "Student record created.",
    ))
}

pub async fn list(
    Extension(glob): Extension<Arc<Glob>>,
) -> Result<Response, ApiError> {
    log::trace!("students::list() called.");

    let students = glob.store.get_students().await?;

    Ok(respond_ok(
        StatusCode::OK,
        Some(student_array(&students)),
        "Student list retrieved.",
    ))
}

pub async fn get_one(
    Extension(glob): Extension<Arc<Glob>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    log::trace!("students::get_one( {:?} ) called.", &id);

    let oid = parse_record_id(&id)?;
    match glob.store.get_student(oid).await? {
        Some(student) => Ok(respond_ok(
            StatusCode::OK,
            Some(student.api_json()),
            "Student record retrieved.",
        )),
        None => Err(ApiError::NotFound(
            "No student with that record id.".to_owned()
        )),
    }
}

pub async fn update(
    Extension(glob): Extension<Arc<Glob>>,
    Path(id): Path<String>,
    Json(patch): Json<StudentPatch>,
) -> Result<Response, ApiError> {
    log::trace!("students::update( {:?}, {:?} ) called.", &id, &patch);

    let oid = parse_record_id(&id)?;
    let patch = patch.validate().map_err(ApiError::Validation)?;

    // Moving to a studentId some *other* record holds is a conflict.
    if let Some(student_id) = &patch.student_id {
        if glob.store.student_id_taken_by_other(student_id, oid).await? {
            return Err(ApiError::Conflict(
                "That student ID is already in use by another student.".to_owned()
            ));
        }
    }

    match glob.store.update_student(oid, &patch).await? {
        Some(student) => {
            log::info!("Updated student record {:?}.", &student.student_id);
            Ok(respond_ok(
                StatusCode::OK,
                Some(student.api_json()),
                "Student record updated.",
            ))
        },
        None => Err(ApiError::NotFound(
            "No student with that record id.".to_owned()
        )),
    }
}

pub async fn remove(
    Extension(glob): Extension<Arc<Glob>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    log::trace!("students::remove( {:?} ) called.", &id);

    let oid = parse_record_id(&id)?;
    match glob.store.delete_student(oid).await? {
        Some(student) => {
            log::info!("Deleted student record {:?}.", &student.student_id);
            Ok(respond_ok::<serde_json::Value>(
                StatusCode::OK,
                None,
                "Student record deleted.",
            ))
        },
        None => Err(ApiError::NotFound(
            "No student with that record id.".to_owned()
        )),
    }
}

#[derive(Debug, Deserialize)]
pub struct FilterParams {
    pub class: Option<String>,
    #[serde(rename = "minScore")]
    pub min_score: Option<f64>,
    #[serde(rename = "maxScore")]
    pub max_score: Option<f64>,
}

pub async fn filter(
    Extension(glob): Extension<Arc<Glob>>,
    Query(params): Query<FilterParams>,
) -> Result<Response, ApiError> {
    log::trace!("students::filter( {:?} ) called.", &params);

    let students = glob.store.filter_students(
        params.class.as_deref(),
        params.min_score,
        params.max_score,
    ).await?;

    Ok(respond_ok(
        StatusCode::OK,
        Some(student_array(&students)),
        "Filter applied.",
    ))
}

pub async fn analysis_report(
    Extension(glob): Extension<Arc<Glob>>,
) -> Result<Response, ApiError> {
    log::trace!("students::analysis_report() called.");

    let students = glob.store.get_students().await?;

    let data = match report::analyze(&students) {
        Some(report) => json!(report),
        None => json!({
            "totalStudents": 0,
            "message": "No student records yet.",
        }),
    };

    Ok(respond_ok(
        StatusCode::OK,
        Some(data),
        "Analysis report generated.",
    ))
}
