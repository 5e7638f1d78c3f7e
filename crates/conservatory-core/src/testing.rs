//! Row fixtures shared by the unit tests.

use serde_json::{json, Value};

use crate::backend::{functions, InMemoryBackend};

pub fn parent_row(id: &str, first: &str, last: &str, email: Option<&str>) -> Value {
    json!({
        "id": id,
        "first_name": first,
        "last_name": last,
        "email": email,
        "phone": "5551234567",
        "address": "12 Bach Lane",
        "city": "Leipzig",
        "state": "SN",
        "zip": "04109",
        "created_at": "2026-08-01T09:00:00Z"
    })
}

pub fn student_row(id: &str, first: &str, last: &str, dob: Option<&str>, parent_id: Option<&str>) -> Value {
    json!({
        "id": id,
        "first_name": first,
        "last_name": last,
        "date_of_birth": dob,
        "email": format!("{}@students.example.org", first.to_lowercase()),
        "phone": null,
        "division": "Professional",
        "status": "active",
        "parent_id": parent_id,
        "created_at": "2026-08-01T09:00:00Z"
    })
}

pub fn template_row(id: &str, content: &str, active: bool) -> Value {
    json!({
        "id": id,
        "name": "Professional Enrollment",
        "content": content,
        "season": "2026-2027",
        "division": "Professional",
        "is_active": active,
        "created_at": "2026-07-01T09:00:00Z"
    })
}

pub fn contract_row(
    id: &str,
    student_id: &str,
    status: &str,
    signed: [bool; 3],
    created_at: &str,
) -> Value {
    let at = |set: bool| if set { json!("2026-09-02T10:00:00Z") } else { json!(null) };
    json!({
        "id": id,
        "contract_number": format!("CN-{}", id),
        "student_id": student_id,
        "template_id": "t1",
        "season": "2026-2027",
        "monthly_tuition": 450.0,
        "registration_fee": 100.0,
        "start_date": "2026-09-01",
        "end_date": "2027-09-01",
        "status": status,
        "parent_signature_date": at(signed[0]),
        "student_signature_date": at(signed[1]),
        "director_signature_date": at(signed[2]),
        "created_at": created_at
    })
}

pub fn schedule_row(id: &str, student_id: &str, amount: f64, due: &str, status: &str) -> Value {
    json!({
        "id": id,
        "contract_id": "c1",
        "student_id": student_id,
        "category_id": null,
        "description": null,
        "amount": amount,
        "due_date": due,
        "status": status,
        "paid_date": null,
        "created_at": "2026-08-01T09:00:00Z"
    })
}

pub fn document_row(id: &str, student_id: &str, status: &str, created_at: &str) -> Value {
    json!({
        "id": id,
        "contract_id": "c1",
        "student_id": student_id,
        "title": format!("Document {}", id),
        "content": "<p>contract</p>",
        "status": status,
        "created_at": created_at
    })
}

/// Backend with the three rate functions answering fixed values.
pub fn backend_with_rates(tuition: f64, fee: f64, number: &str) -> InMemoryBackend {
    let backend = InMemoryBackend::new();
    backend.register_function(functions::MONTHLY_TUITION, move |_| Ok(json!(tuition)));
    backend.register_function(functions::REGISTRATION_FEE, move |_| Ok(json!(fee)));
    let number = number.to_string();
    backend.register_function(functions::CONTRACT_NUMBER, move |_| Ok(json!(number)));
    backend
}
