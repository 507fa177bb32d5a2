//! HTML pages for sign-in and authorization confirmation.

use crate::models::Client;

const STYLE: &str = r#"<style>
body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif; background: #f5f5f5; margin: 0; display: flex; justify-content: center; align-items: center; min-height: 100vh; }
.card { background: #fff; border-radius: 8px; box-shadow: 0 2px 8px rgba(0,0,0,0.1); padding: 32px; max-width: 400px; width: 100%; }
h1 { font-size: 20px; margin: 0 0 8px; color: #333; }
.subtitle { color: #666; font-size: 14px; margin: 0 0 24px; }
label { display: block; font-size: 14px; font-weight: 500; margin: 12px 0 6px; color: #333; }
input[type="text"], input[type="password"] { width: 100%; padding: 10px; border: 1px solid #ddd; border-radius: 4px; font-size: 14px; box-sizing: border-box; }
button { width: 100%; padding: 10px; background: #4a90d9; color: #fff; border: none; border-radius: 4px; font-size: 14px; font-weight: 500; cursor: pointer; margin-top: 16px; }
button:hover { background: #357abd; }
.error { background: #fee; border: 1px solid #c00; color: #c00; padding: 10px; border-radius: 4px; margin-bottom: 16px; }
</style>"#;

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width,initial-scale=1">
<title>{title} - simpleident</title>
{STYLE}
</head>
<body>
<div class="card">
{body}
</div>
</body>
</html>"#,
        title = html_escape(title),
    )
}

/// Render the sign-in form.
///
/// `return_to` is posted back as a hidden field. All values are HTML-escaped.
pub fn render_sign_in_page(return_to: &str, error_message: Option<&str>) -> String {
    let error_html = error_message
        .map(|msg| format!(r#"<div class="error">{}</div>"#, html_escape(msg)))
        .unwrap_or_default();

    let body = format!(
        r#"<h1>Sign in</h1>
<p class="subtitle">Sign in to continue</p>
{error_html}
<form method="POST" action="/sign-in">
<input type="hidden" name="return" value="{return_to}">
<label for="username">Username</label>
<input type="text" id="username" name="username" required autofocus>
<label for="password">Password</label>
<input type="password" id="password" name="password" required>
<button type="submit">Sign in</button>
</form>"#,
        return_to = html_escape(return_to),
    );
    page("Sign in", &body)
}

/// Render the confirmation view of the first authorize leg.
pub fn render_authorize_page(client: &Client, redirect_uri: &str, username: &str) -> String {
    let description = if client.description.is_empty() {
        String::new()
    } else {
        format!(r#"<p class="subtitle">{}</p>"#, html_escape(&client.description))
    };

    let body = format!(
        r#"<h1>Authorize {name}</h1>
<p class="subtitle">Signed in as <strong>{username}</strong></p>
{description}
<p class="subtitle">You will be redirected to <code>{redirect_uri}</code></p>
<form method="POST" action="/oauth2/authorize">
<button type="submit">Approve</button>
</form>"#,
        name = html_escape(&client.name),
        username = html_escape(username),
        redirect_uri = html_escape(redirect_uri),
    );
    page("Authorize", &body)
}

/// Escape HTML special characters.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    fn client() -> Client {
        Client {
            id: Uuid::now_v7(),
            name: "Test <App>".into(),
            description: String::new(),
            callback_url: "https://app.example/cb".into(),
            secrets: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape(r#"<script>alert("xss")</script>"#),
            "&lt;script&gt;alert(&quot;xss&quot;)&lt;/script&gt;"
        );
    }

    #[test]
    fn test_sign_in_without_error() {
        let html = render_sign_in_page("/oauth2/authorize?client_id=1&state=x", None);
        assert!(html.contains(r#"action="/sign-in""#));
        assert!(html.contains("/oauth2/authorize?client_id=1&amp;state=x"));
        assert!(!html.contains(r#"class="error""#));
    }

    #[test]
    fn test_sign_in_with_error() {
        let html = render_sign_in_page("/", Some("Invalid username or password"));
        assert!(html.contains("Invalid username or password"));
        assert!(html.contains(r#"class="error""#));
    }

    #[test]
    fn test_authorize_page_escapes_client_name() {
        let html = render_authorize_page(&client(), "https://app.example/cb", "alice");
        assert!(html.contains("Test &lt;App&gt;"));
        assert!(html.contains("alice"));
        assert!(html.contains(r#"action="/oauth2/authorize""#));
    }
}
