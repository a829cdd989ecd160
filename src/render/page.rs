//! Full-page wrapper around processed task content.
//!
//! The template is embedded at compile time using `include_str!`.

use super::html_escape;

/// The published page template.
pub const PAGE_TEMPLATE: &str = include_str!("templates/page.html");

const GATE: &str = r#"<div id="password-prompt" class="password-screen">
        <div class="password-container">
            <h2>Enter Password</h2>
            <input type="password" id="password-input" placeholder="Password" />
            <button onclick="checkPassword()">Enter</button>
        </div>
    </div>"#;

/// Page-level settings.
#[derive(Debug, Clone, Default)]
pub struct PageOptions {
    pub title: String,
    /// Access secret checked client-side; empty disables the gate.
    pub secret: String,
    /// Where the page is published, shown as an info line when non-empty.
    pub target: String,
    /// Human-readable timestamp of this render.
    pub updated_at: String,
    /// Base URL of the intake server; `None` keeps edits in browser storage.
    pub intake_url: Option<String>,
}

/// Wrap `content` (already-rendered HTML) in the published page.
pub fn render_page(content: &str, options: &PageOptions) -> String {
    let gated = !options.secret.is_empty();
    let target = if options.target.is_empty() {
        String::new()
    } else {
        format!(
            r#"<div class="repo-info">📁 Published to: {}</div>"#,
            html_escape(&options.target)
        )
    };

    let fill = |part: &str| {
        part.replace("{{title}}", &html_escape(&options.title))
            .replace("{{gate}}", if gated { GATE } else { "" })
            .replace("{{hidden}}", if gated { r#" style="display:none""# } else { "" })
            .replace("{{updated}}", &html_escape(&options.updated_at))
            .replace("{{target}}", &target)
            .replace("{{secret}}", &js_string(&options.secret))
            .replace(
                "{{intake}}",
                &options
                    .intake_url
                    .as_deref()
                    .map_or_else(|| "null".to_string(), js_string),
            )
    };

    // Content is spliced in last so nothing inside it is treated as a placeholder.
    match PAGE_TEMPLATE.split_once("{{content}}") {
        Some((head, tail)) => format!("{}{}{}", fill(head), content, fill(tail)),
        None => fill(PAGE_TEMPLATE),
    }
}

/// Encode a value as a JavaScript string literal safe inside a `<script>` block.
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string())
        .to_string()
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> PageOptions {
        PageOptions {
            title: "My Tasks".to_string(),
            updated_at: "2024-01-01 09:00".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_page_without_secret() {
        let html = render_page("<p>body</p>", &options());
        assert!(html.contains("<title>My Tasks</title>"));
        assert!(html.contains("<p>body</p>"));
        assert!(html.contains("Last updated: 2024-01-01 09:00"));
        assert!(!html.contains("password-prompt"));
        assert!(!html.contains("display:none"));
        assert!(html.contains("const INTAKE_URL = null;"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn test_page_with_secret_and_target() {
        let opts = PageOptions {
            secret: "12</script>34".to_string(),
            target: "site/out".to_string(),
            intake_url: Some("http://127.0.0.1:31995".to_string()),
            ..options()
        };
        let html = render_page("", &opts);
        assert!(html.contains(r#"id="password-prompt""#));
        assert!(html.contains(r#"<div id="main-content" style="display:none">"#));
        assert!(html.contains(r#"const PAGE_SECRET = "12\u003c/script\u003e34";"#));
        assert!(!html.contains("12</script>"));
        assert!(html.contains("Published to: site/out"));
        assert!(html.contains(r#"const INTAKE_URL = "http://127.0.0.1:31995";"#));
    }

    #[test]
    fn test_script_sends_secret_and_falls_back_on_rejection() {
        let html = render_page("", &options());
        assert!(html.contains("headers['X-Page-Secret'] = PAGE_SECRET"));
        // Non-2xx answers are kept in local storage like network failures
        assert!(html.contains("if (!response.ok) { queueLocally(kind, key, value); }"));
        assert!(html.contains(".catch(function () { queueLocally(kind, key, value); })"));
    }

    #[test]
    fn test_content_placeholders_are_not_expanded() {
        let html = render_page("literal {{title}}", &options());
        assert!(html.contains("literal {{title}}"));
    }
}
