// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Positional message template rendering.
//!
//! Templates use `{N}` placeholders indexing into the argument list, with
//! `{{` and `}}` as escapes. Anything after `:` or `,` inside a placeholder
//! is accepted and ignored. Placeholders that do not resolve to an argument
//! are emitted verbatim.

use serde_json::Value;

/// Render `template` with `args` substituted for its positional placeholders.
pub fn format_template(template: &str, args: &[Value]) -> String {
	let mut out = String::with_capacity(template.len());
	let mut rest = template;

	while let Some(pos) = rest.find(['{', '}']) {
		out.push_str(&rest[..pos]);
		let tail = &rest[pos..];

		if tail.starts_with("{{") {
			out.push('{');
			rest = &tail[2..];
			continue;
		}
		if tail.starts_with("}}") {
			out.push('}');
			rest = &tail[2..];
			continue;
		}
		if tail.starts_with('}') {
			out.push('}');
			rest = &tail[1..];
			continue;
		}

		let Some(close) = tail.find('}') else {
			out.push_str(tail);
			rest = "";
			break;
		};

		let index = tail[1..close]
			.split([':', ','])
			.next()
			.unwrap_or_default()
			.trim();
		match index.parse::<usize>().ok().and_then(|i| args.get(i)) {
			Some(value) => push_value(&mut out, value),
			None => out.push_str(&tail[..=close]),
		}
		rest = &tail[close + 1..];
	}

	out.push_str(rest);
	out
}

fn push_value(out: &mut String, value: &Value) {
	match value {
		Value::String(s) => out.push_str(s),
		Value::Null => {}
		other => out.push_str(&other.to_string()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_positional_substitution() {
		let args = [json!(3), json!("abc")];
		assert_eq!(format_template("test {0} {1}", &args), "test 3 abc");
		assert_eq!(format_template("{1}-{0}-{1}", &args), "abc-3-abc");
	}

	#[test]
	fn test_no_placeholders() {
		assert_eq!(format_template("plain text", &[]), "plain text");
		assert_eq!(format_template("", &[]), "");
	}

	#[test]
	fn test_escaped_braces() {
		assert_eq!(
			format_template("{{literal}} {0}", &[json!(true)]),
			"{literal} true"
		);
	}

	#[test]
	fn test_unresolved_placeholders_kept() {
		let args = [json!(1)];
		assert_eq!(format_template("{0} {1} {name}", &args), "1 {1} {name}");
		assert_eq!(format_template("dangling {0", &args), "dangling {0");
	}

	#[test]
	fn test_format_spec_ignored() {
		let args = [json!(2.5), json!(null)];
		assert_eq!(format_template("{0:N2}|{1,-5}|", &args), "2.5||");
	}

	#[test]
	fn test_structured_values_render_as_json() {
		let args = [json!({"k": 1}), json!([1, 2])];
		assert_eq!(format_template("{0} {1}", &args), "{\"k\":1} [1,2]");
	}
}
