// src/form/dropdown.rs

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{FormSurface, SelectOption};
use crate::roster::{option_set, Record};

fn default_true() -> bool {
    true
}

/// Fill control `control_id` from roster column `column`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropdownBinding {
    pub control_id: String,
    pub column: String,
    #[serde(default = "default_true")]
    pub sort: bool,
    #[serde(default = "default_true")]
    pub include_empty: bool,
}

impl DropdownBinding {
    pub fn new(control_id: &str, column: &str) -> Self {
        Self {
            control_id: control_id.to_string(),
            column: column.to_string(),
            sort: true,
            include_empty: true,
        }
    }

    pub fn unsorted(mut self) -> Self {
        self.sort = false;
        self
    }

    pub fn without_empty(mut self) -> Self {
        self.include_empty = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingOutcome {
    /// The page has no such control; nothing happened.
    MissingControl,
    /// The control exists but cannot hold options; nothing happened.
    NotASelect,
    /// Options rendered, sentinel excluded.
    Filled { options: Vec<String> },
}

/// Bindings of the cross-selling page: control id and roster column.
pub fn cross_selling_bindings() -> Vec<DropdownBinding> {
    [
        ("campania", "campania"),
        ("dni_asesor", "dni"),
        ("usuario_icc", "usuario_icc"),
        ("nombre_asesor", "asesor"),
        ("supervisor", "supervisor"),
        ("monitor", "monitor"),
        ("quien_comunica", "quien_comunica"),
        ("motivo_contacto", "motivo_contacto"),
        ("tipo_plan", "tipo_plan_sva"),
        ("amerita_ofrecimiento", "amerita_ofrecimiento"),
    ]
    .into_iter()
    .map(|(control, column)| DropdownBinding::new(control, column))
    .collect()
}

/// Render each binding's option set into its control. Bindings are
/// independent: a missing control or column affects only that binding.
pub fn populate<F: FormSurface + ?Sized>(
    form: &mut F,
    records: &[Record],
    bindings: &[DropdownBinding],
) -> Vec<BindingOutcome> {
    bindings
        .iter()
        .map(|b| {
            if !form.has_control(&b.control_id) {
                debug!(control = %b.control_id, "control not on this page; skipped");
                return BindingOutcome::MissingControl;
            }
            let values = option_set(records, &b.column, b.sort);
            let mut rendered = Vec::with_capacity(values.len() + 1);
            if b.include_empty {
                rendered.push(SelectOption::unselected());
            }
            rendered.extend(values.iter().cloned().map(SelectOption::new));
            if !form.replace_options(&b.control_id, rendered) {
                warn!(control = %b.control_id, "control does not take options; skipped");
                return BindingOutcome::NotASelect;
            }
            info!(control = %b.control_id, column = %b.column, options = values.len(), "dropdown filled");
            BindingOutcome::Filled { options: values }
        })
        .collect()
}
