// src/page.rs

use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    auth::{Authenticator, Scopes},
    error::{FormError, Result},
    form::{self, BindingOutcome, DropdownBinding, Form},
    graph::{CreatedRow, DriveStore},
    roster::{self, Roster, RosterSource},
    submission::{self, ColumnSpec, WorkbookTarget},
};

/// Outcome of the load step. A roster failure does not make the page
/// unusable; it is handed back for reporting.
#[derive(Debug)]
pub struct LoadReport {
    pub prefilled: Vec<String>,
    pub roster: Result<Roster>,
    pub bindings: Vec<BindingOutcome>,
}

/// One evaluation page: its form, collaborators and declarations.
pub struct FormPage {
    pub form: Form,
    auth: Arc<dyn Authenticator>,
    store: Arc<dyn DriveStore>,
    roster_source: Option<RosterSource>,
    bindings: Vec<DropdownBinding>,
    columns: &'static [ColumnSpec],
    target: Option<WorkbookTarget>,
    read_scopes: Scopes,
    write_scopes: Scopes,
}

impl FormPage {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        form: Form,
        auth: Arc<dyn Authenticator>,
        store: Arc<dyn DriveStore>,
        roster_source: Option<RosterSource>,
        bindings: Vec<DropdownBinding>,
        columns: &'static [ColumnSpec],
        target: Option<WorkbookTarget>,
        read_scopes: Scopes,
        write_scopes: Scopes,
    ) -> Self {
        Self {
            form,
            auth,
            store,
            roster_source,
            bindings,
            columns,
            target,
            read_scopes,
            write_scopes,
        }
    }

    /// Pre-fill from the query string, then load the roster and fill the
    /// dropdowns.
    pub async fn load(&mut self, query: &str) -> LoadReport {
        let prefilled = form::prefill_from_query(&mut self.form, query);
        if !prefilled.is_empty() {
            info!(?prefilled, "pre-filled from query string");
        }

        let Some(source) = &self.roster_source else {
            return LoadReport {
                prefilled,
                roster: Ok(Roster::default()),
                bindings: Vec::new(),
            };
        };

        let roster = roster::load_roster(
            source,
            self.auth.as_ref(),
            self.store.as_ref(),
            &self.read_scopes,
        )
        .await;

        let bindings = match &roster {
            Ok(r) => form::populate(&mut self.form, &r.records, &self.bindings),
            Err(e) => {
                warn!(error = %e, "roster not loaded; dropdowns left as they were");
                Vec::new()
            }
        };
        LoadReport {
            prefilled,
            roster,
            bindings,
        }
    }

    /// Append the current form as one row; reset the form on success.
    pub async fn submit(&mut self) -> Result<CreatedRow> {
        let target = self.target()?;
        let created = submission::submit(
            &self.form,
            self.columns,
            self.auth.as_ref(),
            self.store.as_ref(),
            target,
            &self.write_scopes,
        )
        .await?;
        self.form.reset();
        Ok(created)
    }

    /// Compare the declared columns with the workbook table.
    pub async fn verify_table(&self) -> Result<submission::SchemaReport> {
        submission::verify_table(
            self.columns,
            self.auth.as_ref(),
            self.store.as_ref(),
            self.target()?,
            &self.write_scopes,
        )
        .await
    }

    fn target(&self) -> Result<&WorkbookTarget> {
        self.target
            .as_ref()
            .ok_or(FormError::NotConfigured("workbook target"))
    }
}
