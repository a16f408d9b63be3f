//! The human-readable catalog page.

use faas_types::{Capability, FunctionCatalog, FunctionDescriptor, MethodSpec};
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use serde_json::Value;

const STYLE: &str = "body{font-family:system-ui,sans-serif;margin:2rem;color:#222}\
table{border-collapse:collapse;width:100%;margin:1rem 0}\
th,td{border-bottom:1px solid #ddd;padding:.4rem .6rem;text-align:left;vertical-align:top}\
th{background:#f5f5f5}code,pre{font-family:ui-monospace,monospace}\
pre{background:#f7f7f7;padding:.6rem;overflow:auto}\
.role{display:inline-block;background:#eef;border-radius:3px;padding:0 .3rem;margin-right:.2rem}\
#search{width:100%;padding:.5rem;font-size:1rem}";

const FILTER_SCRIPT: &str = "document.getElementById('search').addEventListener('input',function(e){\
var q=e.target.value.toLowerCase();\
document.querySelectorAll('[data-search]').forEach(function(el){\
el.style.display=el.getAttribute('data-search').indexOf(q)===-1?'none':'';});});";

fn description(d: &FunctionDescriptor) -> String {
    ["description", "doc"]
        .iter()
        .find_map(|key| d.docs.get(*key).and_then(Value::as_str))
        .unwrap_or_default()
        .to_owned()
}

fn binding(cap: &Capability) -> String {
    match cap {
        Capability::Guard { prefix, .. } => format!("guard {prefix}"),
        Capability::Http { path, .. } => path.clone(),
        Capability::Event { channel, .. } => format!("channel {channel}"),
        Capability::Job { rule, .. } => format!("rule {rule}"),
    }
}

fn method(caps: &[Capability]) -> String {
    caps.iter()
        .find_map(|c| match c {
            Capability::Http { method, .. } => Some(
                MethodSpec::parse(method.as_deref())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|raw| raw),
            ),
            _ => None,
        })
        .unwrap_or_default()
}

fn pretty(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_default(),
    }
}

/// Render the catalog as a standalone page with a client-side filter.
pub(crate) fn render(catalog: &FunctionCatalog) -> String {
    let mut rows = String::new();
    let mut details = String::new();

    for (name, descriptor) in catalog.iter() {
        let caps = descriptor.capabilities(name);
        let roles: Vec<String> = caps.iter().map(|c| c.role().to_string()).collect();
        let bindings: Vec<String> = caps.iter().map(binding).collect();
        let about = description(descriptor);
        let search = format!(
            "{} {} {} {}",
            name,
            roles.join(" "),
            bindings.join(" "),
            about
        )
        .to_lowercase();
        let anchor = format!("fn-{name}");

        let role_tags: String = if roles.is_empty() {
            "<span class=\"role\">inert</span>".to_owned()
        } else {
            roles
                .iter()
                .map(|r| format!("<span class=\"role\">{}</span>", text(r)))
                .collect()
        };
        rows.push_str(&format!(
            "<tr data-search=\"{search}\"><td><a href=\"#{anchor}\">{name}</a></td><td>{roles}</td>\
             <td>{method}</td><td><code>{binding}</code></td><td>{about}</td></tr>\n",
            search = attr(&search),
            anchor = attr(&anchor),
            name = text(name),
            roles = role_tags,
            method = text(&method(&caps)),
            binding = bindings
                .iter()
                .map(|b| text(b).into_owned())
                .collect::<Vec<_>>()
                .join("<br>"),
            about = text(&about),
        ));

        details.push_str(&format!(
            "<article id=\"{anchor}\" data-search=\"{search}\"><h2>{name}</h2><p>{about}</p>\n",
            anchor = attr(&anchor),
            search = attr(&search),
            name = text(name),
            about = text(&about),
        ));
        for (key, title) in [
            ("requestSample", "Request sample"),
            ("responseSample", "Response sample"),
        ] {
            if let Some(sample) = descriptor.docs.get(key) {
                details.push_str(&format!(
                    "<h3>{title}</h3><pre>{}</pre>\n",
                    text(&pretty(sample))
                ));
            }
        }
        details.push_str(&format!(
            "<h3>Descriptor</h3><pre>{}</pre></article>\n",
            text(&pretty(&descriptor.sanitized()))
        ));
    }

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"utf-8\">\
         <title>Functions</title><style>{STYLE}</style></head><body>\n\
         <h1>Functions</h1>\n\
         <input id=\"search\" type=\"search\" placeholder=\"Filter functions\" autofocus>\n\
         <table><thead><tr><th>Name</th><th>Roles</th><th>Method</th><th>Binding</th>\
         <th>Description</th></tr></thead><tbody>\n{rows}</tbody></table>\n\
         <section>\n{details}</section>\n<script>{FILTER_SCRIPT}</script>\n</body></html>\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_text_is_escaped() {
        let mut catalog = FunctionCatalog::new();
        let mut d = FunctionDescriptor::default();
        d.docs
            .insert("description".into(), json!("<script>alert(1)</script>"));
        d.docs.insert("requestSample".into(), json!({"q": "<b>"}));
        catalog.insert("x<y", d);

        let page = render(&catalog);
        assert!(!page.contains("<script>alert(1)</script>"));
        assert!(page.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(page.contains("x&lt;y"));
        assert!(page.contains("Request sample"));
    }

    #[test]
    fn page_has_search_and_table() {
        let page = render(&FunctionCatalog::new());
        assert!(page.contains("id=\"search\""));
        assert!(page.contains("<table>"));
        assert!(page.contains("querySelectorAll('[data-search]')"));
    }
}
