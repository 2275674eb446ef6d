//! Console built-in object.
//!
//! Script output is routed to `tracing` under the `jsdeob::console` target
//! so it interleaves with the tool's own logs.

use tracing::{debug, error, info, warn};

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::operations::type_conversion::to_string;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext};

/// Register the console object with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let console = BuiltInObject::new("console")
        .with_no_prototype()
        .add_static_method("log", console_log)
        .add_static_method("info", console_info)
        .add_static_method("warn", console_warn)
        .add_static_method("error", console_error)
        .add_static_method("debug", console_debug);

    registry.register_object(console);
}

/// Format all arguments for console output.
fn format_args(args: &[JsValue]) -> String {
    args.iter().map(to_string).collect::<Vec<_>>().join(" ")
}

fn console_log(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    info!(target: "jsdeob::console", "{}", format_args(&args));
    Ok(JsValue::Undefined)
}

fn console_info(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    info!(target: "jsdeob::console", "{}", format_args(&args));
    Ok(JsValue::Undefined)
}

fn console_warn(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    warn!(target: "jsdeob::console", "{}", format_args(&args));
    Ok(JsValue::Undefined)
}

fn console_error(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    error!(target: "jsdeob::console", "{}", format_args(&args));
    Ok(JsValue::Undefined)
}

fn console_debug(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    debug!(target: "jsdeob::console", "{}", format_args(&args));
    Ok(JsValue::Undefined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_returns_undefined() {
        let mut ctx = EvalContext::new();
        assert_eq!(ctx.run_script("console.log('a', 1, [2, 3]);").unwrap(), JsValue::Undefined);
        assert_eq!(format_args(&[JsValue::string("a"), JsValue::number(1.0)]), "a 1");
    }
}
