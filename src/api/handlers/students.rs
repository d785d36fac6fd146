//! Student record endpoints.
//!
//! Flow Overview:
//! 1) The auth middlewares have already established the caller and checked
//!    the route rule (reads and updates: admin or teacher; create and delete:
//!    admin).
//! 2) Bodies are validated before the store is touched.
//! 3) Store conflicts and misses surface as 409 and 404 envelopes.

use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::{auth::Principal, input::trimmed, parse_id};
use crate::{
    api::error::{ApiError, ErrorEnvelope, ValidatedJson},
    store::{NewStudent, SharedStore, Student, StudentPatch, conflict_message, not_found_message},
};

const DEFAULT_ATTENDANCE_THRESHOLD: i32 = 75;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub grade: f64,
    pub attendance: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<Student> for StudentResponse {
    fn from(student: Student) -> Self {
        Self {
            id: student.id,
            name: student.name,
            email: student.email,
            grade: student.grade,
            attendance: student.attendance,
            created_at: student.created_at,
            updated_at: student.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct StudentCreateRequest {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(
        required(message = "Name is required"),
        length(min = 2, max = 100, message = "Name must be between 2 and 100 characters")
    )]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(
        required(message = "Email is required"),
        email(message = "Invalid email format")
    )]
    pub email: Option<String>,
    #[validate(
        required(message = "Grade is required"),
        range(min = 0.0, max = 100.0, message = "Grade must be between 0.0 and 100.0")
    )]
    pub grade: Option<f64>,
    #[validate(
        required(message = "Attendance is required"),
        range(min = 0, max = 100, message = "Attendance must be between 0 and 100")
    )]
    pub attendance: Option<i32>,
}

/// Partial update; omitted fields keep their stored values.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct StudentUpdateRequest {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(min = 2, max = 100, message = "Name must be between 2 and 100 characters"))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(range(min = 0.0, max = 100.0, message = "Grade must be between 0.0 and 100.0"))]
    pub grade: Option<f64>,
    #[validate(range(min = 0, max = 100, message = "Attendance must be between 0 and 100"))]
    pub attendance: Option<i32>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    /// Case-insensitive fragment of the student name.
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AttendanceParams {
    /// Students strictly below this attendance percentage are returned.
    pub threshold: Option<String>,
}

fn responses(students: Vec<Student>) -> Json<Vec<StudentResponse>> {
    Json(students.into_iter().map(StudentResponse::from).collect())
}

#[utoipa::path(
    get,
    path = "/api/students",
    responses(
        (status = 200, description = "All students.", body = [StudentResponse]),
        (status = 401, description = "Missing or invalid bearer token.", body = ErrorEnvelope),
        (status = 403, description = "Forbidden.", body = ErrorEnvelope),
    ),
    security(("bearer_auth" = [])),
    tag = "students"
)]
pub async fn list_students(
    Extension(store): Extension<SharedStore>,
) -> Result<Json<Vec<StudentResponse>>, ApiError> {
    Ok(responses(store.list_students().await?))
}

#[utoipa::path(
    get,
    path = "/api/students/{id}",
    params(("id" = i64, Path, description = "Student id")),
    responses(
        (status = 200, description = "Student detail.", body = StudentResponse),
        (status = 400, description = "Invalid student id.", body = ErrorEnvelope),
        (status = 404, description = "Student not found.", body = ErrorEnvelope),
    ),
    security(("bearer_auth" = [])),
    tag = "students"
)]
pub async fn get_student(
    Path(id): Path<String>,
    Extension(store): Extension<SharedStore>,
) -> Result<Json<StudentResponse>, ApiError> {
    let id = parse_id(&id)?;
    store
        .find_student(id)
        .await?
        .map(|student| Json(StudentResponse::from(student)))
        .ok_or_else(|| ApiError::NotFound(not_found_message("Student", "id", id)))
}

#[utoipa::path(
    post,
    path = "/api/students",
    request_body = StudentCreateRequest,
    responses(
        (status = 201, description = "Student created.", body = StudentResponse),
        (status = 400, description = "Validation failed.", body = ErrorEnvelope),
        (status = 409, description = "Email already in use.", body = ErrorEnvelope),
    ),
    security(("bearer_auth" = [])),
    tag = "students"
)]
pub async fn create_student(
    Extension(principal): Extension<Principal>,
    Extension(store): Extension<SharedStore>,
    ValidatedJson(request): ValidatedJson<StudentCreateRequest>,
) -> Result<(StatusCode, Json<StudentResponse>), ApiError> {
    let email = request.email.unwrap_or_default();
    if store.exists_by_email(&email).await? {
        return Err(ApiError::Conflict(conflict_message("Student", "email", &email)));
    }

    let student = store
        .create_student(NewStudent {
            name: request.name.unwrap_or_default(),
            email,
            grade: request.grade.unwrap_or_default(),
            attendance: request.attendance.unwrap_or_default(),
        })
        .await?;

    info!(student_id = student.id, by = %principal.username, "Student created");
    Ok((StatusCode::CREATED, Json(student.into())))
}

#[utoipa::path(
    put,
    path = "/api/students/{id}",
    params(("id" = i64, Path, description = "Student id")),
    request_body = StudentUpdateRequest,
    responses(
        (status = 200, description = "Student updated.", body = StudentResponse),
        (status = 400, description = "Validation failed.", body = ErrorEnvelope),
        (status = 404, description = "Student not found.", body = ErrorEnvelope),
        (status = 409, description = "Email already in use.", body = ErrorEnvelope),
    ),
    security(("bearer_auth" = [])),
    tag = "students"
)]
pub async fn update_student(
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    Extension(store): Extension<SharedStore>,
    ValidatedJson(request): ValidatedJson<StudentUpdateRequest>,
) -> Result<Json<StudentResponse>, ApiError> {
    let id = parse_id(&id)?;
    let student = store
        .update_student(
            id,
            StudentPatch {
                name: request.name,
                email: request.email,
                grade: request.grade,
                attendance: request.attendance,
            },
        )
        .await?;

    info!(student_id = student.id, by = %principal.username, "Student updated");
    Ok(Json(student.into()))
}

#[utoipa::path(
    delete,
    path = "/api/students/{id}",
    params(("id" = i64, Path, description = "Student id")),
    responses(
        (status = 204, description = "Student deleted."),
        (status = 404, description = "Student not found.", body = ErrorEnvelope),
    ),
    security(("bearer_auth" = [])),
    tag = "students"
)]
pub async fn delete_student(
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    Extension(store): Extension<SharedStore>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    store.delete_student(id).await?;
    info!(student_id = id, by = %principal.username, "Student deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/students/search",
    params(SearchParams),
    responses(
        (status = 200, description = "Students whose name contains the fragment.", body = [StudentResponse]),
        (status = 400, description = "Missing name parameter.", body = ErrorEnvelope),
    ),
    security(("bearer_auth" = [])),
    tag = "students"
)]
pub async fn search_students(
    Query(params): Query<SearchParams>,
    Extension(store): Extension<SharedStore>,
) -> Result<Json<Vec<StudentResponse>>, ApiError> {
    let name = params.name.ok_or_else(|| {
        ApiError::BadRequest("Required request parameter 'name' is not present".to_string())
    })?;
    Ok(responses(store.search_students(name.trim()).await?))
}

#[utoipa::path(
    get,
    path = "/api/students/low-attendance",
    params(AttendanceParams),
    responses(
        (status = 200, description = "Students below the attendance threshold.", body = [StudentResponse]),
        (status = 400, description = "Threshold is not an integer.", body = ErrorEnvelope),
    ),
    security(("bearer_auth" = [])),
    tag = "students"
)]
pub async fn low_attendance(
    Query(params): Query<AttendanceParams>,
    Extension(store): Extension<SharedStore>,
) -> Result<Json<Vec<StudentResponse>>, ApiError> {
    let threshold = match params.threshold.as_deref().map(str::trim) {
        None | Some("") => DEFAULT_ATTENDANCE_THRESHOLD,
        Some(raw) => raw.parse::<i32>().map_err(|_| {
            ApiError::BadRequest(format!("Invalid value for parameter 'threshold': '{raw}'"))
        })?,
    };
    Ok(responses(store.students_below_attendance(threshold).await?))
}
