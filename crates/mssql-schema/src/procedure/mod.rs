//! Stored procedure and function invocation.
//!
//! [`ProcedureInvoker::call`] picks a strategy from the driver:
//!
//! - drivers with output binding run a native `EXEC` with OUT/INOUT
//!   placeholders bound as output parameters ([`native`])
//! - other drivers run a declare-and-select batch and recover outputs from
//!   trailing result sets ([`declare`], [`recovery`])
//!
//! Either way OUT/INOUT values are written back into the parameter list
//! and the remaining result sets are returned as a [`CallResult`].

pub mod declare;
pub mod native;
mod params;
pub mod recovery;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::core::traits::{Driver, SchemaDialect};
use crate::core::value::ResultSet;
use crate::error::{Result, SchemaError};

pub use declare::{build_declare_batch, DeclareBatch};
pub use native::build_native_call;
pub use params::{validate_param_name, CallResult, ProcedureParam, DEFAULT_OUTPUT_LENGTH};
pub use recovery::{Disposition, OutputRecovery, RecoveryState};

/// Shape of a function's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FunctionReturn {
    /// `SELECT f(..) AS [value]`
    #[default]
    Scalar,
    /// `SELECT * FROM f(..)`
    Table,
}

pub struct ProcedureInvoker {
    driver: Arc<dyn Driver>,
    dialect: Arc<dyn SchemaDialect>,
}

impl ProcedureInvoker {
    pub fn new(driver: Arc<dyn Driver>, dialect: Arc<dyn SchemaDialect>) -> Self {
        Self { driver, dialect }
    }

    /// Whether calls use the native-binding strategy.
    pub fn uses_native_binding(&self) -> bool {
        self.driver.supports_output_binding()
    }

    /// Call a stored procedure, writing OUT/INOUT values back into `params`.
    pub async fn call(&self, name: &str, params: &mut [ProcedureParam]) -> Result<CallResult> {
        let procedure = self.dialect.quote_table_name(name)?;
        let sets = if self.uses_native_binding() {
            self.call_native(&procedure, params).await?
        } else {
            self.call_declared(&procedure, params).await?
        };
        info!(
            "Called {} ({} parameters, {} result sets)",
            procedure,
            params.len(),
            sets.len()
        );
        Ok(CallResult::from_sets(sets))
    }

    async fn call_native(
        &self,
        procedure: &str,
        params: &mut [ProcedureParam],
    ) -> Result<Vec<ResultSet>> {
        let (sql, mut bound) = build_native_call(procedure, params)?;
        debug!("Native call: {}", sql);
        let sets = self.driver.execute_bound(&sql, &mut bound).await?;

        for (param, bound) in params.iter_mut().zip(bound) {
            if param.is_output() {
                param.value = bound.value;
            }
        }
        Ok(sets)
    }

    async fn call_declared(
        &self,
        procedure: &str,
        params: &mut [ProcedureParam],
    ) -> Result<Vec<ResultSet>> {
        let batch = build_declare_batch(procedure, params, |v| self.dialect.quote_value(v))?;
        debug!("Declare-and-select call: {}", batch.sql);

        let sets = self.driver.query(&batch.sql, &batch.binds).await?;
        let mut recovery = batch.recovery(sets.len());
        let mut kept = Vec::with_capacity(sets.len());

        for rs in sets {
            match recovery.feed(&rs) {
                Disposition::Skip => {}
                Disposition::Keep => kept.push(rs),
                Disposition::Output(values) => {
                    for (name, value) in values {
                        if let Some(param) = params
                            .iter_mut()
                            .find(|p| p.is_output() && p.name.eq_ignore_ascii_case(&name))
                        {
                            param.value = value;
                        }
                    }
                }
            }
        }

        if !recovery.pending().is_empty() {
            warn!(
                "{}: no value recovered for output parameters {:?}",
                procedure,
                recovery.pending()
            );
        }
        Ok(kept)
    }

    /// Call a function with positional IN arguments.
    pub async fn call_function(
        &self,
        name: &str,
        params: &[ProcedureParam],
        returns: FunctionReturn,
    ) -> Result<CallResult> {
        if let Some(p) = params.iter().find(|p| p.is_output()) {
            return Err(SchemaError::Config(format!(
                "function parameter '{}' cannot be {}",
                p.name, p.param_type
            )));
        }
        let function = self.dialect.quote_table_name(name)?;
        let args: Vec<String> = (1..=params.len()).map(|i| format!("@P{}", i)).collect();
        let sql = match returns {
            FunctionReturn::Scalar => format!("SELECT {}({}) AS [value]", function, args.join(", ")),
            FunctionReturn::Table => format!("SELECT * FROM {}({})", function, args.join(", ")),
        };
        let binds: Vec<_> = params.iter().map(|p| p.value.clone()).collect();

        debug!("Function call: {}", sql);
        let sets = self.driver.query(&sql, &binds).await?;
        Ok(CallResult::from_sets(sets))
    }
}
