//! Variable substitution engine for template bodies

use serde_json::Value;

/// Substitute `{{variable}}` placeholders in a template string.
///
/// Values come from a JSON object; nested objects are reachable through
/// dotted paths (`{{logo.src}}`). Strings substitute verbatim, numbers and
/// booleans stringify, null becomes empty. Placeholders with no matching
/// variable are left untouched.
pub fn substitute(template: &str, params: &Value) -> String {
    let Value::Object(map) = params else {
        return template.to_string();
    };

    let mut result = template.to_string();
    apply(&mut result, "", map);
    result
}

fn apply(result: &mut String, prefix: &str, map: &serde_json::Map<String, Value>) {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };

        match value {
            Value::Object(inner) => apply(result, &path, inner),
            other => {
                let pattern = format!("{{{{{path}}}}}");
                if !result.contains(&pattern) {
                    continue;
                }
                let replacement = match other {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    Value::Null => String::new(),
                    // Arrays keep their JSON representation
                    _ => other.to_string(),
                };
                *result = result.replace(&pattern, &replacement);
            }
        }
    }
}
