//! HTML dashboard generator.
//!
//! Produces a self-contained HTML file with all CSS/JS inlined.

use anyhow::{Context, Result};
use std::path::Path;

use labgrade_core::activity::{truncate_label, DEFAULT_LABEL_WIDTH};
use labgrade_core::anomaly::{ReportRow, Severity};
use labgrade_core::report::DashboardReport;
use labgrade_core::scores::ScoreTable;

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Generate the dashboard page.
pub fn generate_html(report: &DashboardReport) -> String {
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!(
        "<title>labgrade dashboard: {}</title>\n",
        html_escape(&report.quiz_name)
    ));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");

    html.push_str("<header>\n");
    html.push_str("<h1>labgrade dashboard</h1>\n");
    html.push_str(&format!(
        "<p class=\"meta\">Quiz: <strong>{}</strong> | {} events | {} anomalies | {}</p>\n",
        html_escape(&report.quiz_name),
        report.event_count,
        report.anomalies.anomaly_count(),
        report.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    html.push_str("</header>\n");

    if !report.warnings.is_empty() {
        html.push_str("<section class=\"warnings\">\n<ul>\n");
        for warning in &report.warnings {
            html.push_str(&format!("<li>{}</li>\n", html_escape(warning)));
        }
        html.push_str("</ul>\n</section>\n");
    }

    html.push_str(&anomaly_section(report));
    html.push_str(&activity_section(report));
    if let Some(grades) = &report.grades {
        html.push_str(&grades_section(grades, report));
    }

    // Raw JSON
    html.push_str("<section class=\"raw-data\">\n");
    html.push_str("<details>\n<summary>Raw JSON Data</summary>\n");
    html.push_str("<pre><code>");
    html.push_str(
        &serde_json::to_string_pretty(report)
            .unwrap_or_default()
            .replace('<', "&lt;")
            .replace('>', "&gt;"),
    );
    html.push_str("</code></pre>\n");
    html.push_str("</details>\n</section>\n");

    html.push_str("<script>\n");
    html.push_str(JS);
    html.push_str("</script>\n");

    html.push_str("</body>\n</html>");
    html
}

/// Write the dashboard to a file.
pub fn write_html_report(report: &DashboardReport, path: &Path) -> Result<()> {
    let html = generate_html(report);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)
        .with_context(|| format!("failed to write dashboard to {}", path.display()))?;
    Ok(())
}

fn anomaly_section(report: &DashboardReport) -> String {
    let mut html = String::from("<section class=\"anomalies\">\n<h2>Integrity</h2>\n");

    if report.anomalies.is_empty() {
        html.push_str("<p>No students to report.</p>\n</section>\n");
        return html;
    }

    html.push_str("<table id=\"anomalies\">\n");
    html.push_str("<thead><tr><th onclick=\"sortTable('anomalies', 0)\">Student</th><th onclick=\"sortTable('anomalies', 1)\">Parameter</th><th>Expected</th><th>Observed</th><th onclick=\"sortTable('anomalies', 4)\">Severity</th></tr></thead>\n");
    html.push_str("<tbody>\n");
    for row in &report.anomalies.rows {
        match row {
            ReportRow::Anomaly(record) => {
                let class = match record.severity {
                    Severity::Critical => "critical",
                    Severity::Warning => "warning",
                };
                let observed = record
                    .observed
                    .as_ref()
                    .map(|v| html_escape(&v.to_string()))
                    .unwrap_or_else(|| "<em>not declared</em>".to_string());
                html.push_str(&format!(
                    "<tr class=\"{class}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{:?}</td></tr>\n",
                    html_escape(&record.student),
                    html_escape(&record.parameter_name),
                    html_escape(&record.expected.to_string()),
                    observed,
                    record.severity,
                ));
            }
            ReportRow::Clean { student } => {
                html.push_str(&format!(
                    "<tr class=\"ras\"><td>{}</td><td colspan=\"4\">RAS</td></tr>\n",
                    html_escape(student)
                ));
            }
        }
    }
    html.push_str("</tbody></table>\n");

    if !report.grouped_anomalies.is_empty() {
        html.push_str("<h3>Per student</h3>\n<table>\n");
        html.push_str("<thead><tr><th>Student</th><th>Count</th><th>Details</th></tr></thead>\n<tbody>\n");
        for group in &report.grouped_anomalies {
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                html_escape(&group.student),
                group.count,
                html_escape(&group.details)
            ));
        }
        html.push_str("</tbody></table>\n");
    }

    html.push_str("</section>\n");
    html
}

fn activity_section(report: &DashboardReport) -> String {
    let activity = &report.activity;
    let mut html = String::from("<section class=\"activity\">\n<h2>Activity</h2>\n");

    if activity.is_empty() {
        html.push_str("<p>No pending submissions.</p>\n</section>\n");
        return html;
    }

    html.push_str("<h3>Students per quiz</h3>\n");
    let per_class: Vec<(&str, f64)> = activity
        .per_class_counts
        .iter()
        .map(|(title, count)| (title.as_str(), *count as f64))
        .collect();
    html.push_str(&generate_bar_chart(&per_class, |v| format!("{v:.0}")));

    html.push_str("<h3>Quizzes per student</h3>\n");
    let per_student: Vec<(&str, f64)> = activity
        .per_student_counts
        .iter()
        .map(|(student, count)| (student.as_str(), *count as f64))
        .collect();
    html.push_str(&generate_bar_chart(&per_student, |v| format!("{v:.0}")));

    html.push_str("<table id=\"activity\">\n");
    html.push_str("<thead><tr><th onclick=\"sortTable('activity', 0)\">Student</th><th onclick=\"sortTable('activity', 1)\">Quizzes</th><th>List</th><th onclick=\"sortTable('activity', 3)\">Score</th></tr></thead>\n<tbody>\n");
    for (student, quizzes) in &activity.per_student_quiz_list {
        let score = activity
            .per_student_scores
            .get(student)
            .copied()
            .unwrap_or(0.0);
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{score:.2}</td></tr>\n",
            html_escape(student),
            quizzes.nb,
            html_escape(&quizzes.quizzes_list.join(", ")),
        ));
    }
    html.push_str("</tbody></table>\n</section>\n");
    html
}

fn grades_section(grades: &ScoreTable, report: &DashboardReport) -> String {
    let mut html = String::from("<section class=\"grades\">\n<h2>Grades</h2>\n");

    if let Some(summary) = &report.summary {
        html.push_str(&format!(
            "<p class=\"meta\">{} marks | mean {:.2} | std dev {} | min {:.2} | max {:.2}</p>\n",
            summary.count,
            summary.mean,
            summary
                .std_dev
                .map(|s| format!("{s:.2}"))
                .unwrap_or_else(|| "-".into()),
            summary.min,
            summary.max,
        ));
    }

    html.push_str("<table id=\"grades\">\n<thead><tr>");
    for (i, column) in grades.columns().iter().enumerate() {
        html.push_str(&format!(
            "<th onclick=\"sortTable('grades', {i})\">{}</th>",
            html_escape(column)
        ));
    }
    html.push_str("</tr></thead>\n<tbody>\n");

    let has_note = grades.has_note();
    let has_final = grades.rows.iter().any(|r| r.final_mark.is_some());
    let cell = |value: Option<f64>| value.map(|v| format!("{v:.2}")).unwrap_or_default();

    for row in &grades.rows {
        let class = match row.final_mark {
            Some(mark) if mark < 10.0 => " class=\"below\"",
            Some(_) => " class=\"above\"",
            None => "",
        };
        html.push_str(&format!("<tr{class}><td>{}</td>", html_escape(&row.student)));
        for question in &grades.questions {
            html.push_str(&format!("<td>{}</td>", cell(row.scores.get(question).copied())));
        }
        if has_note {
            html.push_str(&format!("<td>{}</td>", cell(row.note)));
        }
        if has_final {
            html.push_str(&format!("<td><strong>{}</strong></td>", cell(row.final_mark)));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</tbody>\n");

    let averages = grades.question_averages();
    html.push_str("<tfoot><tr><td>AvgScore</td>");
    for question in &grades.questions {
        html.push_str(&format!("<td>{}</td>", cell(averages.get(question).copied())));
    }
    if has_note {
        html.push_str("<td></td>");
    }
    if has_final {
        html.push_str(&format!(
            "<td>{}</td>",
            cell(report.summary.as_ref().map(|s| s.mean))
        ));
    }
    html.push_str("</tr></tfoot>\n</table>\n</section>\n");
    html
}

/// Horizontal bar chart; labels are shortened to keep the axis readable
/// and the full label is kept as a tooltip.
fn generate_bar_chart(values: &[(&str, f64)], format_value: impl Fn(f64) -> String) -> String {
    const ROW: usize = 22;
    const GAP: usize = 6;
    const AXIS: usize = 110;
    const SPAN: f64 = 420.0;

    let peak = values.iter().fold(1.0_f64, |acc, (_, v)| acc.max(*v));
    let height = values.len() * (ROW + GAP) + GAP;

    let mut svg = format!(
        "<svg class=\"chart\" width=\"{}\" height=\"{height}\" xmlns=\"http://www.w3.org/2000/svg\">\n",
        AXIS + SPAN as usize + 70
    );
    for (i, (label, value)) in values.iter().enumerate() {
        let top = GAP + i * (ROW + GAP);
        let middle = top + ROW / 2;
        let length = (value.max(0.0) / peak * SPAN).round() as usize;

        svg.push_str(&format!(
            "  <g><title>{}</title><text x=\"{}\" y=\"{middle}\" text-anchor=\"end\" dominant-baseline=\"middle\">{}</text>",
            html_escape(label),
            AXIS - 8,
            html_escape(&truncate_label(label, DEFAULT_LABEL_WIDTH))
        ));
        svg.push_str(&format!(
            "<rect x=\"{AXIS}\" y=\"{top}\" width=\"{length}\" height=\"{ROW}\"/>"
        ));
        svg.push_str(&format!(
            "<text x=\"{}\" y=\"{middle}\" dominant-baseline=\"middle\">{}</text></g>\n",
            AXIS + length + 6,
            format_value(*value)
        ));
    }
    svg.push_str("</svg>\n");
    svg
}

const CSS: &str = r#"
:root { --paper: #fdfcf8; --ink: #222; --rule: #d6d3c8; --ras: #e3f2e1; --warning: #fff1c2; --critical: #f8d0cc; --bar: #3b6ea5; }
@media (prefers-color-scheme: dark) {
  :root { --paper: #1b1d22; --ink: #ececec; --rule: #3d4049; --ras: #1f3b2a; --warning: #4a3b12; --critical: #5a1f1c; --bar: #7fa7d6; }
}
body { font-family: system-ui, sans-serif; max-width: 72rem; margin: 0 auto; padding: 1.5rem; background: var(--paper); color: var(--ink); }
header { border-bottom: 2px solid var(--rule); }
section { margin-top: 2.5rem; }
.meta { opacity: 0.7; }
.warnings { border-left: 4px solid #d19a00; padding-left: 1rem; }
table { border-collapse: collapse; width: 100%; margin: 0.75rem 0; font-variant-numeric: tabular-nums; }
th, td { border-bottom: 1px solid var(--rule); padding: 0.35rem 0.75rem; text-align: left; }
th[onclick] { cursor: pointer; text-decoration: underline dotted; }
tfoot td { font-weight: 600; }
.ras, .above { background: var(--ras); }
.warning { background: var(--warning); }
.critical, .below { background: var(--critical); }
.chart rect { fill: var(--bar); }
.chart text { fill: var(--ink); font-size: 12px; }
pre { overflow-x: auto; padding: 0.75rem; border: 1px solid var(--rule); }
summary { cursor: pointer; }
"#;

const JS: &str = r#"
function sortTable(id, col) {
  const table = document.getElementById(id);
  const tbody = table.querySelector('tbody');
  const rows = Array.from(tbody.querySelectorAll('tr'));
  const asc = table.dataset.sortCol == col && table.dataset.sortDir == 'asc' ? false : true;
  rows.sort((a, b) => {
    const va = a.cells[col] ? a.cells[col].textContent : '';
    const vb = b.cells[col] ? b.cells[col].textContent : '';
    const na = parseFloat(va), nb = parseFloat(vb);
    if (!isNaN(na) && !isNaN(nb)) return asc ? na - nb : nb - na;
    return asc ? va.localeCompare(vb) : vb.localeCompare(va);
  });
  table.dataset.sortCol = col;
  table.dataset.sortDir = asc ? 'asc' : 'desc';
  rows.forEach(r => tbody.appendChild(r));
}
"#;
