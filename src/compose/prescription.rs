use log::{debug, info};
use serde_json::Value;

use super::{fetch_logo, non_blank, ComposeError, PrescriptionQuery, RenderContext, Stage};
use crate::upstream::{UpstreamClient, UpstreamFailure};

pub(super) async fn compose(
    client: &UpstreamClient,
    query: &PrescriptionQuery,
) -> Result<RenderContext, ComposeError> {
    let (consultation, doctor) = futures::join!(
        client.fetch_consultation_details(
            &query.consultation_id,
            &query.prescription_id,
            &query.user_role
        ),
        client.fetch_doctor_details(&query.consultation_id, &query.user_role),
    );
    let consultation = consultation
        .into_result()
        .map_err(|failure| ComposeError::upstream(Stage::Consultation, failure))?;
    let doctor = doctor
        .into_result()
        .map_err(|failure| ComposeError::upstream(Stage::Doctor, failure))?;

    let doctor_id = non_blank(doctor.id.as_deref())
        .map(str::to_string)
        .ok_or_else(|| {
            ComposeError::upstream(
                Stage::Doctor,
                UpstreamFailure::malformed("doctor record has no id"),
            )
        })?;

    let mut ctx = RenderContext::from(consultation.0);
    ctx.insert("doctors_name", text(doctor.doctors_name));
    ctx.insert("licence_number", text(doctor.licence_number));
    ctx.insert("degree", text(doctor.degree));
    ctx.insert("specialization", text(doctor.specialization));

    let clinic = client
        .fetch_own_clinic_details(&doctor_id, &query.clinic_id, &query.user_role)
        .await
        .into_result()
        .map_err(|failure| ComposeError::upstream(Stage::Clinic, failure))?;

    let clinic_img = match non_blank(clinic.logo.as_deref()) {
        Some(file) => fetch_logo(client, &query.clinic_id, file).await,
        None => {
            debug!("Clinic {} has no logo", query.clinic_id);
            String::new()
        }
    };

    ctx.insert("clinic_name", text(clinic.name));
    ctx.insert("address_line_1", text(clinic.address_line_1));
    ctx.insert("phonenumber_1", text(clinic.phonenumber_1));
    ctx.insert("phonenumber_2", text(clinic.phonenumber_2));
    ctx.insert("timings", clinic.timings);
    ctx.insert("clinicImg", clinic_img);

    let medicine = parse_medicine(ctx.get("medicine"))?;
    let count = medicine.len();
    ctx.insert("medicine", medicine);

    info!(
        "Composed prescription {} for consultation {} with {} medicine(s)",
        query.prescription_id, query.consultation_id, count
    );
    Ok(ctx)
}

/// The consultation record carries `medicine` as a JSON-encoded list.
fn parse_medicine(raw: Option<&Value>) -> Result<Vec<Value>, ComposeError> {
    match raw {
        Some(Value::String(encoded)) => match serde_json::from_str::<Value>(encoded) {
            Ok(Value::Array(items)) => Ok(items),
            Ok(_) => Err(ComposeError::malformed("medicine", "expected a list")),
            Err(e) => Err(ComposeError::malformed("medicine", e.to_string())),
        },
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(Value::Null) | None => Err(ComposeError::malformed("medicine", "field is missing")),
        Some(_) => Err(ComposeError::malformed("medicine", "expected a list")),
    }
}

fn text(value: Option<String>) -> Value {
    value.map(Value::String).unwrap_or(Value::Null)
}
