//! Status server: the connectivity banner and transition history over HTTP

use axum::extract::State;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;

use crate::banner::{self, Banner};
use crate::monitor::ConnectivityMonitor;
use crate::state::{ConnectivityState, HistoryHandle};

/// Status server application state
#[derive(Clone)]
pub struct DashboardState {
    pub monitor: ConnectivityMonitor,
    pub history: HistoryHandle,
}

/// Build the status server axum router
pub fn build_router(monitor: ConnectivityMonitor, history: HistoryHandle) -> Router {
    let dashboard_state = DashboardState { monitor, history };

    Router::new()
        .route("/", get(index_handler))
        .route("/api/status", get(status_handler))
        .route("/api/history", get(history_handler))
        .route("/health", get(health_handler))
        .with_state(dashboard_state)
}

fn status_json(state: &ConnectivityState) -> serde_json::Value {
    let banner = banner::render(state);
    serde_json::json!({
        "is_online": state.is_online,
        "connection_speed": state.connection_speed,
        "banner": banner,
        "message": banner.message(),
    })
}

async fn index_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    let state = dashboard.monitor.current();
    let banner = banner::render(&state);

    let banner_html = match banner {
        Banner::Hidden => String::new(),
        Banner::OfflineWarning | Banner::SlowConnectionNotice => {
            let (color, bg) = banner_colors(banner);
            format!(
                r#"<div id="banner-message" role="alert" style="padding: 0.75rem 1rem; border-radius: 0.25rem; color: {}; background-color: {};">{}</div>"#,
                color,
                bg,
                banner.message().unwrap_or_default()
            )
        }
    };

    let history_rows: String = dashboard
        .history
        .read()
        .await
        .transitions
        .iter()
        .rev()
        .map(|t| {
            format!(
                r#"<tr style="border-bottom: 1px solid #dee2e6;">
                    <td style="padding: 0.5rem;"><script>document.write(new Date({}).toLocaleTimeString())</script></td>
                    <td style="padding: 0.5rem;">{}</td>
                    <td style="padding: 0.5rem;">{}</td>
                    <td style="padding: 0.5rem;">{}</td>
                </tr>"#,
                t.timestamp_epoch_ms, t.previous, t.current, t.banner
            )
        })
        .collect();

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Connection Status</title>
    <script>
        function refreshStatus() {{
            fetch('/api/status')
                .then(r => r.json())
                .then(data => {{
                    const colors = {{
                        'offline_warning': ['#721c24', '#f8d7da'],
                        'slow_connection_notice': ['#856404', '#fff3cd'],
                    }};
                    const el = document.getElementById('banner');
                    if (data.banner === 'hidden') {{
                        el.innerHTML = '';
                        return;
                    }}
                    const [color, bg] = colors[data.banner];
                    el.innerHTML = `<div role="alert" style="padding: 0.75rem 1rem; border-radius: 0.25rem; color: ${{color}}; background-color: ${{bg}};">${{data.message}}</div>`;
                }});
        }}
        setInterval(refreshStatus, 5000);
    </script>
</head>
<body style="font-family: system-ui, sans-serif; max-width: 960px; margin: 0 auto; padding: 1rem;">
    <h1>Connection Status</h1>
    <section id="banner">{banner_html}</section>
    <p>Current reading: <strong>{state}</strong></p>
    <section>
        <h2>Transitions</h2>
        <table style="width: 100%; border-collapse: collapse;">
            <thead>
                <tr style="border-bottom: 2px solid #dee2e6;">
                    <th style="padding: 0.5rem; text-align: left;">Time</th>
                    <th style="padding: 0.5rem; text-align: left;">From</th>
                    <th style="padding: 0.5rem; text-align: left;">To</th>
                    <th style="padding: 0.5rem; text-align: left;">Banner</th>
                </tr>
            </thead>
            <tbody>{history_rows}</tbody>
        </table>
    </section>
</body>
</html>"#,
        banner_html = banner_html,
        state = state,
        history_rows = history_rows,
    );

    Html(html)
}

fn banner_colors(banner: Banner) -> (&'static str, &'static str) {
    match banner {
        Banner::OfflineWarning => ("#721c24", "#f8d7da"),
        Banner::SlowConnectionNotice => ("#856404", "#fff3cd"),
        Banner::Hidden => ("#383d41", "#e2e3e5"),
    }
}

async fn status_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    axum::Json(status_json(&dashboard.monitor.current()))
}

async fn history_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    let history = dashboard.history.read().await;
    let transitions: Vec<_> = history.transitions.iter().cloned().collect();
    axum::Json(transitions)
}

async fn health_handler() -> impl IntoResponse {
    "OK"
}
