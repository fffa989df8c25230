// src/submission/schema.rs

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;

use crate::form::FormSurface;

/// Where a destination cell's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    /// Current value of the named control.
    Control(&'static str),
    /// Fixed text, not read from the page.
    Constant(&'static str),
    /// Wall-clock time of the submission.
    SubmittedAt,
}

/// One destination column. A column's position in its list is its index in
/// the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub column: &'static str,
    pub source: FieldSource,
}

const fn control(column: &'static str, id: &'static str) -> ColumnSpec {
    ColumnSpec {
        column,
        source: FieldSource::Control(id),
    }
}

/// Column order of the cross-selling results table. Rows are appended
/// positionally, so this must match the workbook table exactly; run
/// `crossform check-schema` after any change on either side.
pub const CROSS_SELLING_COLUMNS: &[ColumnSpec] = &[
    control("Fecha_Llamada", "fecha_llamada"),
    control("Campania", "campania"),
    ColumnSpec {
        column: "Tipo_Focalizado",
        source: FieldSource::Constant("NTP"),
    },
    control("Fecha_Revision", "fecha_revision"),
    control("Telefono", "telefono"),
    control("DNI_Cliente", "dni_cliente"),
    control("DNI_Asesor", "dni_asesor"),
    control("Usuario_ICC", "usuario_icc"),
    control("Nombre_Asesor", "nombre_asesor"),
    control("Supervisor", "supervisor"),
    control("Monitor", "monitor"),
    control("Semana", "semana"),
    control("Cuartil", "cuartil"),
    control("Quien_Comunica", "quien_comunica"),
    control("Motivo_Contacto", "motivo_contacto"),
    control("Tipo_Plan_SVA", "tipo_plan"),
    control("Amerita_Ofrecimiento", "amerita_ofrecimiento"),
    ColumnSpec {
        column: "Fecha_Envio",
        source: FieldSource::SubmittedAt,
    },
];

/// `2024-01-10T15:04:05.123Z`
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// One string per column, in column order. Missing or blank controls give
/// `""`, never a gap.
pub fn build_row<F: FormSurface + ?Sized>(
    form: &F,
    columns: &[ColumnSpec],
    now: DateTime<Utc>,
) -> Vec<String> {
    columns
        .iter()
        .map(|spec| match spec.source {
            FieldSource::Control(id) => form
                .value(id)
                .map(|v| v.trim().to_string())
                .unwrap_or_default(),
            FieldSource::Constant(text) => text.to_string(),
            FieldSource::SubmittedAt => format_timestamp(now),
        })
        .collect()
}

/// Differences between the declared columns and the workbook table header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaReport {
    /// Declared but absent from the table.
    pub missing: Vec<String>,
    /// In the table but not declared.
    pub unexpected: Vec<String>,
    /// Present on both sides at different positions: (name, declared, actual).
    pub misplaced: Vec<(String, usize, usize)>,
}

impl SchemaReport {
    pub fn is_match(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty() && self.misplaced.is_empty()
    }
}

impl fmt::Display for SchemaReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_match() {
            return write!(f, "table columns match");
        }
        for m in &self.missing {
            writeln!(f, "missing in table: {}", m)?;
        }
        for u in &self.unexpected {
            writeln!(f, "not declared: {}", u)?;
        }
        for (name, want, got) in &self.misplaced {
            writeln!(f, "{} declared at {} but found at {}", name, want + 1, got + 1)?;
        }
        Ok(())
    }
}

fn same_name(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Compare declared columns with the table's actual header names.
pub fn check_table_schema(columns: &[ColumnSpec], actual: &[String]) -> SchemaReport {
    let mut report = SchemaReport::default();
    for (i, spec) in columns.iter().enumerate() {
        match actual.iter().position(|a| same_name(a, spec.column)) {
            None => report.missing.push(spec.column.to_string()),
            Some(j) if j != i => report.misplaced.push((spec.column.to_string(), i, j)),
            Some(_) => {}
        }
    }
    report.unexpected = actual
        .iter()
        .filter(|a| !columns.iter().any(|c| same_name(a, c.column)))
        .cloned()
        .collect();
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{Form, SelectOption};
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 15, 4, 5).unwrap() + chrono::Duration::milliseconds(123)
    }

    #[test]
    fn test_timestamp_format() {
        assert_eq!(format_timestamp(at()), "2024-01-10T15:04:05.123Z");
    }

    #[test]
    fn test_empty_form_row() {
        let row = build_row(&Form::cross_selling(), CROSS_SELLING_COLUMNS, at());
        assert_eq!(row.len(), CROSS_SELLING_COLUMNS.len());
        for (i, cell) in row.iter().enumerate() {
            match i {
                2 => assert_eq!(cell, "NTP"),
                17 => assert_eq!(cell, "2024-01-10T15:04:05.123Z"),
                _ => assert_eq!(cell, "", "column {} should be empty", i),
            }
        }
    }

    #[test]
    fn test_row_shape_is_independent_of_values() {
        let mut filled = Form::cross_selling();
        filled.set_value("fecha_llamada", "2024-01-10");
        filled.set_value("telefono", "  987654321 ");
        filled.replace_options("campania", vec![SelectOption::new("Ventas")]);
        let row = build_row(&filled, CROSS_SELLING_COLUMNS, at());
        let empty = build_row(&Form::new(), CROSS_SELLING_COLUMNS, at());

        assert_eq!(row.len(), empty.len());
        assert_eq!(row[0], "2024-01-10");
        assert_eq!(row[1], "Ventas");
        assert_eq!(row[4], "987654321");
        assert_eq!(empty[2], "NTP");
        assert_eq!(empty[0], "");
    }

    #[test]
    fn test_declared_columns_are_unique() {
        for (i, a) in CROSS_SELLING_COLUMNS.iter().enumerate() {
            for b in &CROSS_SELLING_COLUMNS[i + 1..] {
                assert!(!same_name(a.column, b.column), "{} declared twice", a.column);
            }
        }
    }

    #[test]
    fn test_schema_check() {
        let names: Vec<String> = CROSS_SELLING_COLUMNS
            .iter()
            .map(|c| c.column.to_uppercase())
            .collect();
        assert!(check_table_schema(CROSS_SELLING_COLUMNS, &names).is_match());

        let mut shifted = names.clone();
        shifted.remove(4);
        shifted.push("Observaciones".into());
        let report = check_table_schema(CROSS_SELLING_COLUMNS, &shifted);
        assert_eq!(report.missing, vec!["Telefono"]);
        assert_eq!(report.unexpected, vec!["Observaciones"]);
        assert_eq!(report.misplaced.len(), 13);
        assert_eq!(report.misplaced[0], ("DNI_Cliente".to_string(), 5, 4));
        assert!(report.to_string().contains("missing in table: Telefono"));
    }
}
