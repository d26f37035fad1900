//! Terminal output for the `ilrsync` commands
//!
//! Human output goes to stdout with status marks, diagnostics to stderr.
//! With `--json` only machine-readable documents reach stdout so the output
//! can be piped into other tools.

use serde_json::{json, Value};

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Sink for everything a command reports
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    fn print_json(&self, value: &Value);

    /// Prints pre-formatted report lines (listing rows, summaries)
    fn lines(&self, lines: &[String]) {
        for line in lines {
            self.info(line);
        }
    }
}

/// Status-marked text for operators; `quiet` keeps only errors
pub struct HumanFormatter {
    quiet: bool,
}

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        if !self.quiet {
            println!("\u{2713} {}", message);
        }
    }

    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {}", message);
    }

    fn warn(&self, message: &str) {
        if !self.quiet {
            eprintln!("\u{26a0} Warning: {}", message);
        }
    }

    fn info(&self, message: &str) {
        if !self.quiet {
            println!("  {}", message);
        }
    }

    // Commands print a human rendering alongside their JSON document
    fn print_json(&self, _value: &Value) {}
}

/// One JSON document per report on stdout, status events on stderr
pub struct JsonFormatter;

impl JsonFormatter {
    fn event(ok: bool, message: &str) -> Value {
        if ok {
            json!({ "success": true, "message": message })
        } else {
            json!({ "success": false, "error": message })
        }
    }
}

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        eprintln!("{}", Self::event(true, message));
    }

    fn error(&self, message: &str) {
        eprintln!("{}", Self::event(false, message));
    }

    fn warn(&self, message: &str) {
        eprintln!("{}", json!({ "level": "warning", "message": message }));
    }

    fn info(&self, _message: &str) {}

    fn print_json(&self, value: &Value) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("{}", Self::event(false, &e.to_string())),
        }
    }
}

/// Picks the formatter; JSON output is never silenced by `--quiet`
pub fn get_formatter(json: bool, quiet: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(HumanFormatter { quiet })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_shapes() {
        assert_eq!(
            JsonFormatter::event(true, "done"),
            json!({ "success": true, "message": "done" })
        );
        assert_eq!(
            JsonFormatter::event(false, "boom")["error"],
            Value::String("boom".into())
        );
    }

    #[test]
    fn test_formatter_selection_does_not_panic() {
        for (json, quiet) in [(true, true), (true, false), (false, true), (false, false)] {
            let formatter = get_formatter(json, quiet);
            formatter.lines(&["row".to_string()]);
            formatter.print_json(&json!({ "ok": true }));
        }
    }
}
