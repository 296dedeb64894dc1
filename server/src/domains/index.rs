use axum::{
    http::{header, HeaderMap},
    response::Html,
};

use crate::auth::middleware::AuthUser;

/// Escape HTML special characters.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Render the landing page for `host` and the signed-in `username`.
pub fn render_index(host: &str, username: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>c't SESAM storage server</title>
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background: #f4f4f4; color: #222; margin: 2rem; }}
        .card {{ background: #fff; border-radius: 8px; padding: 1.5rem 2rem; max-width: 520px; box-shadow: 0 2px 12px rgba(0,0,0,0.1); }}
        code {{ background: #eee; padding: 2px 6px; border-radius: 4px; }}
    </style>
</head>
<body>
    <div class="card">
        <h1>c't SESAM storage server</h1>
        <p>Host: <code>{host}</code></p>
        <p>Signed in as <code>{user}</code></p>
        <p>Endpoints: <code>/read</code>, <code>/write</code>, <code>/list</code>, <code>/delete</code></p>
    </div>
</body>
</html>"#,
        host = html_escape(host),
        user = html_escape(username),
    )
}

/// GET / and GET /index — Landing page showing host and user.
pub async fn index_page(user: AuthUser, headers: HeaderMap) -> Html<String> {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    Html(render_index(host, &user.username))
}
