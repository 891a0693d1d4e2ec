use log::{debug, info, warn};
use serde_json::{json, Value};

use super::{fetch_logo, non_blank, ComposeError, InvoiceQuery, RenderContext, Stage};
use crate::upstream::{ClinicDetails, InvoiceLine, UpstreamClient};

pub(super) async fn compose(
    client: &UpstreamClient,
    query: &InvoiceQuery,
) -> Result<RenderContext, ComposeError> {
    let details = client
        .fetch_invoice_details(&query.invoice_number, &query.user_role)
        .await
        .into_result()
        .map_err(|failure| ComposeError::upstream(Stage::Details, failure))?;

    let mut ctx = RenderContext::new();
    match serde_json::to_value(&details.clinic) {
        Ok(Value::Object(fields)) => ctx.extend(fields),
        Ok(_) => {}
        Err(e) => return Err(ComposeError::malformed("clinicDetails", e.to_string())),
    }
    ctx.extend(details.patient);
    ctx.insert("full_address", full_address(&details.clinic));

    let logo = match (
        non_blank(details.clinic.logo.as_deref()),
        non_blank(details.clinic.clinic_id.as_deref()),
    ) {
        (Some(file), Some(clinic_id)) => fetch_logo(client, clinic_id, file).await,
        _ => {
            debug!("Invoice {} has no clinic logo", query.invoice_number);
            String::new()
        }
    };
    ctx.insert("logo", logo);

    let lines = parse_lines(&details.line_items);
    if let Some(first) = lines.first() {
        ctx.insert("invoice_create_datetime", text(&first.invoice_create_datetime));
        ctx.insert("receipt_no", text(&first.receipt_no));
        ctx.insert("discount_amount", text(&first.discount_amount));
        ctx.insert("total_amount", text(&first.total_amount));
        ctx.insert("gst_amount", text(&first.gst_amount));
        ctx.insert("payable_amount", text(&first.payable_amount));
        ctx.insert("paid_amount", text(&first.paid_amount));
        ctx.insert(
            "gst_percent",
            gst_percent(first.gst_amount.as_deref(), first.total_amount.as_deref()),
        );
    } else {
        ctx.insert("gst_percent", "");
    }

    ctx.insert(
        "services",
        lines
            .iter()
            .map(|line| {
                json!({
                    "fee_name": text(&line.fee_name),
                    "fee_amount": text(&line.fee_amount),
                    "unit": text(&line.unit),
                    "fee_total": text(&line.fee_total),
                })
            })
            .collect::<Vec<_>>(),
    );
    ctx.insert(
        "payments",
        lines
            .iter()
            .map(|line| {
                json!({
                    "payment_datetime": text(&line.payment_datetime),
                    "payment_method": text(&line.payment_method),
                    "paid_amount": text(&line.paid_amount),
                    "payment_status": text(&line.payment_status),
                    "receipt_no": text(&line.receipt_no),
                })
            })
            .collect::<Vec<_>>(),
    );
    ctx.insert("invoice_number", query.invoice_number.clone());

    info!(
        "Composed invoice {} with {} line item(s)",
        query.invoice_number,
        lines.len()
    );
    Ok(ctx)
}

/// Non-blank address parts in fixed order, joined with `", "`.
pub fn full_address(clinic: &ClinicDetails) -> String {
    [
        &clinic.address_line_1,
        &clinic.city,
        &clinic.district,
        &clinic.pincode,
        &clinic.state,
    ]
    .into_iter()
    .filter_map(|part| non_blank(part.as_deref()))
    .collect::<Vec<_>>()
    .join(", ")
}

/// `gst / total * 100` to one decimal place, or `""` when that is not a finite number.
pub fn gst_percent(gst_amount: Option<&str>, total_amount: Option<&str>) -> String {
    let parse = |raw: Option<&str>| raw.and_then(|v| v.trim().parse::<f64>().ok());
    match (parse(gst_amount), parse(total_amount)) {
        (Some(gst), Some(total)) => {
            let percent = gst / total * 100.0;
            if percent.is_finite() {
                // Halves round away from zero, not to even.
                format!("{:.1}%", (percent * 10.0).round() / 10.0)
            } else {
                String::new()
            }
        }
        _ => String::new(),
    }
}

/// Line items in upstream order. Anything that is not a sequence is treated as empty.
fn parse_lines(raw: &Value) -> Vec<InvoiceLine> {
    match raw {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| {
                serde_json::from_value(item.clone())
                    .map_err(|e| warn!("Dropping invoice line {}: {}", index, e))
                    .ok()
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn text(value: &Option<String>) -> Value {
    value.clone().map(Value::String).unwrap_or(Value::Null)
}
