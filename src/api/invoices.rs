use crate::api::{parse_date_param, AppState};
use crate::domain::{invoice_number, Decimal, Invoice, MachineId};
use crate::error::AppError;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    /// Defaults to today.
    pub invoice_date: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
}

/// An invoice with the headline numbers of its settlement.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceSummary {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub machine_id: MachineId,
    pub machine_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub pay_to_clowee: Decimal,
}

/// Issue the one invoice a settlement may carry.
pub async fn create_invoice(
    Path(settlement_id): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<Invoice>), AppError> {
    let invoice_date = match req.invoice_date.as_deref() {
        Some(raw) => parse_date_param("invoiceDate", raw)?,
        None => Utc::now().date_naive(),
    };

    if state.repo.get_settlement(&settlement_id).await?.is_none() {
        return Err(AppError::NotFound(format!("settlement {}", settlement_id)));
    }
    if state
        .repo
        .invoice_for_settlement(&settlement_id)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(format!(
            "settlement {} already has an invoice",
            settlement_id
        )));
    }

    let number = invoice_number(&state.config.invoice_prefix, &settlement_id, invoice_date);
    let invoice = state
        .repo
        .insert_invoice(
            &settlement_id,
            &number,
            invoice_date,
            req.notes.as_deref(),
            req.created_by.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn list_invoices(
    State(state): State<AppState>,
) -> Result<Json<Vec<InvoiceSummary>>, AppError> {
    let (invoices, settlements) = futures::try_join!(
        state.repo.list_invoices(),
        state.repo.list_settlements(None),
    )?;
    let by_id: HashMap<_, _> = settlements.into_iter().map(|s| (s.id.clone(), s)).collect();

    let summaries = invoices
        .into_iter()
        .filter_map(|invoice| {
            let settlement = by_id.get(&invoice.settlement_id)?;
            Some(InvoiceSummary {
                machine_id: settlement.machine_id.clone(),
                machine_name: settlement.machine_name.clone(),
                start_date: settlement.start_date,
                end_date: settlement.end_date,
                pay_to_clowee: settlement.pay_to_clowee,
                invoice,
            })
        })
        .collect();

    Ok(Json(summaries))
}
