//! Indented call trace listener
//!
//! Writes one line per call event, indented by a tab per call depth:
//!
//! ```text
//! --> importing.call_import(0)
//! 	--> imported.call(0)
//! 		==> host.div_by(0)
//! 		<== 1
//! 	<-- 1
//! <-- 1
//! ```
//!
//! `-->`/`<--` mark WebAssembly functions, `==>`/`<==` host functions.

use super::scope::{is_in_log_scope, LogScopes};
use super::{FunctionListener, FunctionListenerFactory, StackIterator};
use crate::parser::module::{FunctionDefinition, ValueType};
use crate::runtime::{CallContext, Value};
use std::fmt::Write as _;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

type SharedWriter = Arc<Mutex<dyn Write + Send>>;

pub struct LoggingListenerFactory {
    writer: SharedWriter,
    scopes: LogScopes,
}

impl LoggingListenerFactory {
    /// Log every function
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Self::with_scopes(writer, LogScopes::ALL)
    }

    /// Log only functions classified under `scopes`
    pub fn with_scopes<W: Write + Send + 'static>(writer: W, scopes: LogScopes) -> Self {
        LoggingListenerFactory {
            writer: Arc::new(Mutex::new(writer)),
            scopes,
        }
    }
}

impl FunctionListenerFactory for LoggingListenerFactory {
    fn new_listener(&self, definition: &FunctionDefinition) -> Option<Arc<dyn FunctionListener>> {
        if !is_in_log_scope(definition, self.scopes) {
            return None;
        }
        Some(Arc::new(LoggingListener {
            writer: self.writer.clone(),
        }))
    }
}

struct LoggingListener {
    writer: SharedWriter,
}

impl LoggingListener {
    fn write_line(&self, depth: usize, line: &str) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let indent = "\t".repeat(depth);
        if let Err(e) = writeln!(writer, "{indent}{line}") {
            log::warn!("call trace write failed: {e}");
        }
    }
}

impl FunctionListener for LoggingListener {
    fn before(&self, ctx: &CallContext, definition: &FunctionDefinition, params: &[u64], _stack: StackIterator<'_>) {
        let arrow = if definition.is_host { "==>" } else { "-->" };
        let line = format!(
            "{arrow} {}({})",
            definition.debug_name(),
            format_words(&definition.func_type.params, params)
        );
        self.write_line(ctx.depth(), &line);
    }

    fn after(&self, ctx: &CallContext, definition: &FunctionDefinition, results: &[u64]) {
        let arrow = if definition.is_host { "<==" } else { "<--" };
        let formatted = format_words(&definition.func_type.results, results);
        let line = if results.len() == 1 {
            format!("{arrow} {formatted}")
        } else {
            format!("{arrow} ({formatted})")
        };
        self.write_line(ctx.depth(), &line);
    }
}

/// Comma separated values, integers signed, floats with `Display`
fn format_words(types: &[ValueType], words: &[u64]) -> String {
    let mut out = String::new();
    for (i, (typ, word)) in types.iter().zip(words).enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = match Value::from_word(*typ, *word) {
            Value::I32(v) => write!(out, "{v}"),
            Value::I64(v) => write!(out, "{v}"),
            Value::F32(v) => write!(out, "{v}"),
            Value::F64(v) => write!(out, "{v}"),
        };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::module::FunctionType;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn definition(params: Vec<ValueType>, results: Vec<ValueType>, is_host: bool) -> FunctionDefinition {
        FunctionDefinition {
            module_name: "m".to_string(),
            name: Some("f".to_string()),
            func_type: FunctionType::new(params, results),
            is_host,
            ..Default::default()
        }
    }

    #[test]
    fn test_wasm_lines() {
        let out = Captured::default();
        let factory = LoggingListenerFactory::new(out.clone());
        let def = definition(vec![ValueType::I32, ValueType::I32], vec![ValueType::I32, ValueType::I32], false);
        let listener = factory.new_listener(&def).unwrap();

        let ctx = CallContext::new();
        listener.before(&ctx, &def, &[1, 2], StackIterator::new(None, &[], &[]));
        listener.after(&ctx, &def, &[1, 2]);
        assert_eq!(out.text(), "--> m.f(1,2)\n<-- (1,2)\n");
    }

    #[test]
    fn test_host_lines_are_indented() {
        let out = Captured::default();
        let factory = LoggingListenerFactory::new(out.clone());
        let def = definition(vec![ValueType::I32], vec![ValueType::I32], true);
        let listener = factory.new_listener(&def).unwrap();

        let ctx = CallContext::new().at_depth(2);
        listener.before(&ctx, &def, &[(-3i32) as u32 as u64], StackIterator::new(None, &[], &[]));
        listener.after(&ctx, &def, &[1]);
        assert_eq!(out.text(), "\t\t==> m.f(-3)\n\t\t<== 1\n");
    }

    #[test]
    fn test_value_formatting() {
        let types = [ValueType::I64, ValueType::F32, ValueType::F64];
        let words = [(-1i64) as u64, 1.5f32.to_bits() as u64, 0.25f64.to_bits()];
        assert_eq!(format_words(&types, &words), "-1,1.5,0.25");
        assert_eq!(format_words(&[], &[]), "");
    }

    #[test]
    fn test_no_results() {
        let out = Captured::default();
        let factory = LoggingListenerFactory::new(out.clone());
        let def = definition(vec![], vec![], false);
        let listener = factory.new_listener(&def).unwrap();
        listener.after(&CallContext::new(), &def, &[]);
        assert_eq!(out.text(), "<-- ()\n");
    }

    #[test]
    fn test_out_of_scope_gets_no_listener() {
        let factory = LoggingListenerFactory::with_scopes(std::io::sink(), LogScopes::CLOCK);
        let mut def = definition(vec![], vec![], true);
        assert!(factory.new_listener(&def).is_none());
        def.name = Some("clock_time_get".to_string());
        assert!(factory.new_listener(&def).is_some());
    }
}
