//! Declare-and-select call strategy for drivers without output binding.
//!
//! Each OUT/INOUT parameter gets a local variable passed as `OUTPUT`; the
//! batch selects every variable after the call so the values come back as
//! single-row result sets:
//!
//! ```sql
//! SET NOCOUNT ON;
//! DECLARE @out_1 int = 5;
//! DECLARE @out_2 money;
//! SELECT @out_1 AS [count];
//! EXEC [dbo].[p] @P1, @count = @out_1 OUTPUT, @total = @out_2 OUTPUT;
//! SELECT @out_1 AS [count];
//! SELECT @out_2 AS [total];
//! ```
//!
//! The `SELECT` before `EXEC` echoes each INOUT seed and is skipped by
//! [`OutputRecovery`](super::recovery::OutputRecovery).

use crate::core::identifier::quote_ident;
use crate::core::schema::ParamDirection;
use crate::core::value::SqlValue;
use crate::error::Result;

use super::params::{validate_param_name, ProcedureParam};
use super::recovery::OutputRecovery;

#[derive(Debug, Clone, PartialEq)]
pub struct DeclareBatch {
    pub sql: String,
    /// Values of the IN parameters, in `@Pn` order.
    pub binds: Vec<SqlValue>,
    /// Number of INOUT echo result sets preceding the call's own output.
    pub inout_echoes: usize,
    /// Output parameter names in declaration order.
    pub outputs: Vec<String>,
}

impl DeclareBatch {
    /// Recovery for a batch that returned `total` result sets.
    pub fn recovery(&self, total: usize) -> OutputRecovery {
        OutputRecovery::new(self.inout_echoes, self.outputs.clone()).with_total(total)
    }
}

/// Build the batch; `literal` renders INOUT seed values.
pub fn build_declare_batch(
    procedure: &str,
    params: &[ProcedureParam],
    literal: impl Fn(&SqlValue) -> String,
) -> Result<DeclareBatch> {
    let mut declares = Vec::new();
    let mut echoes = Vec::new();
    let mut selects = Vec::new();
    let mut args = Vec::with_capacity(params.len());
    let mut binds = Vec::new();
    let mut outputs = Vec::new();
    let mut named = false;

    for param in params {
        if param.is_output() {
            validate_param_name(&param.name)?;
            let variable = format!("@out_{}", outputs.len() + 1);
            let alias = quote_ident(&param.name)?;

            if param.param_type == ParamDirection::InOut {
                declares.push(format!(
                    "DECLARE {} {} = {};",
                    variable,
                    param.sql_type(),
                    literal(&param.value)
                ));
                echoes.push(format!("SELECT {} AS {};", variable, alias));
            } else {
                declares.push(format!("DECLARE {} {};", variable, param.sql_type()));
            }
            selects.push(format!("SELECT {} AS {};", variable, alias));
            args.push(format!("@{} = {} OUTPUT", param.name, variable));
            outputs.push(param.name.clone());
            named = true;
        } else {
            binds.push(param.value.clone());
            let placeholder = format!("@P{}", binds.len());
            if named {
                validate_param_name(&param.name)?;
                args.push(format!("@{} = {}", param.name, placeholder));
            } else {
                args.push(placeholder);
            }
        }
    }

    let mut lines = vec!["SET NOCOUNT ON;".to_string()];
    lines.extend(declares);
    lines.extend(echoes.iter().cloned());
    lines.push(if args.is_empty() {
        format!("EXEC {};", procedure)
    } else {
        format!("EXEC {} {};", procedure, args.join(", "))
    });
    lines.extend(selects);

    Ok(DeclareBatch {
        sql: lines.join("\n"),
        binds,
        inout_echoes: echoes.len(),
        outputs,
    })
}
