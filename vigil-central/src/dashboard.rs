//! HTML dashboard for the central service.
//!
//! Rendered server-side with `format!`; the page refreshes itself with a
//! meta tag. Kept free of template engines, the markup lives here as plain
//! strings.

use crate::models::{AggregateMetrics, ProbeStatus, RegistryEntryView};

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta http-equiv="refresh" content="10">
    <title>Vigil - Machines</title>
    <style>
        :root {
            --bg-dark: #1a1a1a;
            --panel-bg: #252526;
            --accent: #007acc;
            --text: #cccccc;
            --ok-green: #4caf50;
            --err-red: #e05c5c;
        }
        body {
            margin: 0;
            padding: 20px;
            background: var(--bg-dark);
            color: var(--text);
            font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif;
        }
        h1 { font-size: 20px; }
        .cards { display: flex; gap: 12px; margin-bottom: 20px; }
        .card {
            background: var(--panel-bg);
            border: 1px solid #333;
            border-radius: 6px;
            padding: 12px 18px;
            min-width: 140px;
        }
        .card .value { font-size: 24px; font-weight: bold; color: var(--accent); }
        table { border-collapse: collapse; width: 100%; background: var(--panel-bg); }
        th, td { padding: 8px 12px; border-bottom: 1px solid #333; text-align: left; font-size: 13px; }
        th { text-transform: uppercase; font-size: 11px; color: #888; }
        .online { color: var(--ok-green); }
        .offline { color: var(--err-red); }
        .muted { color: #777; }
    </style>
</head>
<body>
"#;

const PAGE_FOOT: &str = "</body>\n</html>\n";

pub fn render(entries: &[RegistryEntryView], agg: &AggregateMetrics, failing: usize) -> String {
    let mut page = String::with_capacity(4096);
    page.push_str(PAGE_HEAD);
    page.push_str("<h1>Vigil &mdash; monitored machines</h1>\n");

    page.push_str(&format!(
        r#"<div class="cards">
<div class="card"><div>Machines</div><div class="value">{}</div></div>
<div class="card"><div>Online</div><div class="value">{}</div></div>
<div class="card"><div>Alerts</div><div class="value">{}</div></div>
<div class="card"><div>Failing probes</div><div class="value">{}</div></div>
<div class="card"><div>Avg response</div><div class="value">{:.0} ms</div></div>
</div>
"#,
        agg.total_machines, agg.online_machines, agg.total_alerts, failing, agg.average_response_time
    ));

    page.push_str(
        "<table>\n<tr><th>Machine</th><th>Status</th><th>Platform</th><th>Probes</th>\
         <th>Alerts</th><th>CPU</th><th>Memory</th><th>Last seen</th></tr>\n",
    );

    if entries.is_empty() {
        page.push_str("<tr><td colspan=\"8\" class=\"muted\">No machines registered yet</td></tr>\n");
    }

    for entry in entries {
        let (class, status) = if entry.online {
            ("online", "online")
        } else {
            ("offline", "offline")
        };
        let healthy = entry
            .health_results
            .iter()
            .filter(|r| r.status == ProbeStatus::Healthy)
            .count();
        page.push_str(&format!(
            "<tr><td>{}</td><td class=\"{}\">{}</td><td>{} / {}</td><td>{}/{}</td>\
             <td>{}</td><td>{:.1}%</td><td>{:.1}%</td><td>{}s ago</td></tr>\n",
            escape(&entry.pc_id),
            class,
            status,
            escape(&entry.system_info.platform),
            escape(&entry.system_info.architecture),
            healthy,
            entry.health_results.len(),
            entry.metrics.alerts,
            entry.metrics.cpu_load,
            entry.metrics.memory_usage_percent,
            entry.last_seen_seconds_ago,
        ));
    }

    page.push_str("</table>\n");
    page.push_str(PAGE_FOOT);
    page
}

fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
