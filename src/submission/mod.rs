// src/submission/mod.rs

pub mod schema;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::{
    auth::{Authenticator, Scopes},
    error::Result,
    form::FormSurface,
    graph::{self, CreatedRow, DriveLocation, DriveStore},
};

pub use schema::{
    build_row, check_table_schema, format_timestamp, ColumnSpec, FieldSource, SchemaReport,
    CROSS_SELLING_COLUMNS,
};

/// Workbook table that receives submitted rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkbookTarget {
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub source: DriveLocation,
    pub table: String,
}

/// Build the row from the form as it is now and append it to the table.
///
/// The row is complete before any external call. A token failure returns
/// without touching the store; otherwise exactly one append is attempted.
#[instrument(level = "info", skip_all, fields(table = %target.table))]
pub async fn submit<F: FormSurface + ?Sized>(
    form: &F,
    columns: &[ColumnSpec],
    auth: &dyn Authenticator,
    store: &dyn DriveStore,
    target: &WorkbookTarget,
    scopes: &Scopes,
) -> Result<CreatedRow> {
    let row = build_row(form, columns, Utc::now());
    info!(cells = row.len(), "row built");

    let token = match auth.bearer_token(scopes).await {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "no write token; submission abandoned");
            return Err(e);
        }
    };

    let item = graph::resolve(store, &token, &target.source).await?;
    let created = store
        .add_table_row(&token, &item, &target.table, &row)
        .await?;
    info!(index = ?created.index, "row appended");
    Ok(created)
}

/// Fetch the table header and compare it with `columns`.
pub async fn verify_table(
    columns: &[ColumnSpec],
    auth: &dyn Authenticator,
    store: &dyn DriveStore,
    target: &WorkbookTarget,
    scopes: &Scopes,
) -> Result<SchemaReport> {
    auth.ensure_signed_in(scopes).await?;
    let token = auth.bearer_token(scopes).await?;
    let item = graph::resolve(store, &token, &target.source).await?;
    let actual = store.table_columns(&token, &item, &target.table).await?;
    Ok(check_table_schema(columns, &actual))
}
