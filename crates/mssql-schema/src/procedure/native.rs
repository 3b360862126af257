//! Native-binding call strategy.
//!
//! `EXEC [proc] @P1, @P2, @total = @P3 OUTPUT`: every argument is a bound
//! placeholder and the driver binds OUT/INOUT placeholders as output
//! parameters. IN arguments are positional until the first output argument;
//! T-SQL does not allow positional arguments after named ones.

use crate::core::traits::BoundParameter;

use super::params::{validate_param_name, ProcedureParam};
use crate::error::Result;

/// Build the `EXEC` text and the bound parameters in `@Pn` order.
pub fn build_native_call(
    procedure: &str,
    params: &[ProcedureParam],
) -> Result<(String, Vec<BoundParameter>)> {
    let mut args = Vec::with_capacity(params.len());
    let mut named = false;

    for (idx, param) in params.iter().enumerate() {
        let placeholder = format!("@P{}", idx + 1);
        if param.is_output() {
            validate_param_name(&param.name)?;
            named = true;
            args.push(format!("@{} = {} OUTPUT", param.name, placeholder));
        } else if named {
            validate_param_name(&param.name)?;
            args.push(format!("@{} = {}", param.name, placeholder));
        } else {
            args.push(placeholder);
        }
    }

    let sql = if args.is_empty() {
        format!("EXEC {}", procedure)
    } else {
        format!("EXEC {} {}", procedure, args.join(", "))
    };
    let bound = params.iter().map(ProcedureParam::to_bound).collect();
    Ok((sql, bound))
}
