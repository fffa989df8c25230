// src/form/mod.rs

pub mod dropdown;
pub mod query;

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

pub use dropdown::{cross_selling_bindings, populate, BindingOutcome, DropdownBinding};
pub use query::{prefill_from_query, PREFILL_KEYS};

/// Label of the empty "nothing selected" option.
pub const EMPTY_OPTION_LABEL: &str = "-- Seleccione --";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            label: value.clone(),
            value,
        }
    }

    pub fn unselected() -> Self {
        Self {
            value: String::new(),
            label: EMPTY_OPTION_LABEL.to_string(),
        }
    }
}

/// What the roster loader and the submission builder need from a page.
pub trait FormSurface {
    fn has_control(&self, id: &str) -> bool;

    /// Current value, `None` when no such control exists.
    fn value(&self, id: &str) -> Option<String>;

    /// Returns false when the control is missing or refused the value.
    fn set_value(&mut self, id: &str, value: &str) -> bool;

    /// Returns false when the control is missing or is not a select.
    fn replace_options(&mut self, id: &str, options: Vec<SelectOption>) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlKind {
    Text,
    /// Accepts only `YYYY-MM-DD`.
    Date,
    Select { options: Vec<SelectOption> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub kind: ControlKind,
    pub default: String,
    pub value: String,
}

impl Control {
    fn new(kind: ControlKind, default: &str) -> Self {
        Self {
            kind,
            default: default.to_string(),
            value: default.to_string(),
        }
    }

    fn accepts(&self, value: &str) -> bool {
        if value.is_empty() {
            return true;
        }
        match &self.kind {
            ControlKind::Text => true,
            ControlKind::Date => {
                value.len() == 10 && NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
            }
            ControlKind::Select { options } => options.iter().any(|o| o.value == value),
        }
    }
}

/// Controls that rejected or did not recognize analyst input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub rejected: Vec<String>,
    pub unknown: Vec<String>,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty() && self.unknown.is_empty()
    }
}

/// In-memory form whose controls behave like their HTML counterparts.
#[derive(Debug, Clone, Default)]
pub struct Form {
    controls: BTreeMap<String, Control>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_control(mut self, id: &str, kind: ControlKind, default: &str) -> Self {
        self.controls
            .insert(id.to_string(), Control::new(kind, default));
        self
    }

    pub fn with_text(self, id: &str) -> Self {
        self.with_control(id, ControlKind::Text, "")
    }

    pub fn with_date(self, id: &str) -> Self {
        self.with_control(id, ControlKind::Date, "")
    }

    pub fn with_select(self, id: &str) -> Self {
        self.with_control(id, ControlKind::Select { options: Vec::new() }, "")
    }

    /// The cross-selling evaluation page.
    pub fn cross_selling() -> Self {
        Form::new()
            .with_date("fecha_llamada")
            .with_select("campania")
            .with_control("tipo_focalizado", ControlKind::Text, "NTP")
            .with_date("fecha_revision")
            .with_text("telefono")
            .with_text("dni_cliente")
            .with_select("dni_asesor")
            .with_select("usuario_icc")
            .with_select("nombre_asesor")
            .with_select("supervisor")
            .with_select("monitor")
            .with_text("semana")
            .with_text("cuartil")
            .with_select("quien_comunica")
            .with_select("motivo_contacto")
            .with_select("tipo_plan")
            .with_select("amerita_ofrecimiento")
    }

    pub fn control(&self, id: &str) -> Option<&Control> {
        self.controls.get(id)
    }

    pub fn options(&self, id: &str) -> Option<&[SelectOption]> {
        match &self.controls.get(id)?.kind {
            ControlKind::Select { options } => Some(options),
            _ => None,
        }
    }

    /// Snapshot of every control's value.
    pub fn values(&self) -> BTreeMap<String, String> {
        self.controls
            .iter()
            .map(|(id, c)| (id.clone(), c.value.clone()))
            .collect()
    }

    /// Restore every control to its default value. Options stay.
    pub fn reset(&mut self) {
        for c in self.controls.values_mut() {
            c.value = c.default.clone();
        }
    }

    /// Apply analyst input. Every entry is attempted; refusals are reported.
    pub fn apply_values(&mut self, values: &HashMap<String, String>) -> ApplyReport {
        let mut report = ApplyReport::default();
        let mut ids: Vec<&String> = values.keys().collect();
        ids.sort();
        for id in ids {
            let value = values[id].trim();
            if !self.has_control(id) {
                warn!(control = %id, "no such control; value ignored");
                report.unknown.push(id.clone());
            } else if !self.set_value(id, value) {
                warn!(control = %id, value, "value not accepted by control");
                report.rejected.push(id.clone());
            }
        }
        report
    }
}

impl FormSurface for Form {
    fn has_control(&self, id: &str) -> bool {
        self.controls.contains_key(id)
    }

    fn value(&self, id: &str) -> Option<String> {
        self.controls.get(id).map(|c| c.value.clone())
    }

    fn set_value(&mut self, id: &str, value: &str) -> bool {
        let Some(c) = self.controls.get_mut(id) else {
            return false;
        };
        if c.accepts(value) {
            c.value = value.to_string();
            true
        } else {
            c.value.clear();
            false
        }
    }

    /// A select whose current value is no longer offered falls back to its
    /// first option, as a browser does.
    fn replace_options(&mut self, id: &str, options: Vec<SelectOption>) -> bool {
        let Some(c) = self.controls.get_mut(id) else {
            return false;
        };
        let ControlKind::Select { options: current } = &mut c.kind else {
            debug!(control = %id, "not a select; options ignored");
            return false;
        };
        if !options.iter().any(|o| o.value == c.value) {
            c.value = options.first().map(|o| o.value.clone()).unwrap_or_default();
        }
        *current = options;
        true
    }
}
