use crate::models::{IntegrityWarning, ProgressResponse};

pub fn render_progress(progress: &ProgressResponse) -> String {
    let snapshot = &progress.snapshot;
    let forecast = &progress.forecast;

    let since = snapshot
        .since_date
        .as_deref()
        .map(|date| format!("depuis {date}"))
        .unwrap_or_else(|| "aucun passage confirmé".to_string());
    let required = snapshot
        .required_for_next
        .map(|required| required.to_string())
        .unwrap_or_else(|| "—".to_string());
    let next_rank = snapshot
        .next_rank
        .as_ref()
        .map(|rank| rank.to_string())
        .unwrap_or_else(|| "—".to_string());
    let next_date = match (&forecast.estimated_date, forecast.is_estimate) {
        (Some(date), true) => format!("Date estimée : {date}"),
        (Some(date), false) => format!("Date réelle : {date}"),
        (None, _) => "Date à confirmer".to_string(),
    };
    let warnings: String = snapshot
        .warnings
        .iter()
        .map(|warning| format!("<li>{}</li>", warning_text(*warning)))
        .collect();

    let percent = format!("{:.0}", forecast.progress_percent);
    fill_template(PROGRESS_HTML, |name| {
        let value = match name {
            "PROFILE" => escape(&progress.profile),
            "RANK" => escape(snapshot.current_rank.as_str()),
            "SINCE" => escape(&since),
            "GROUP" => snapshot.group_points.to_string(),
            "PRIVATE" => snapshot.private_points.to_string(),
            "TOTAL" => snapshot.total_points.to_string(),
            "REQUIRED" => required.clone(),
            "REMAINING" => snapshot.remaining.to_string(),
            "PERCENT" => percent.clone(),
            "NEXT_RANK" => escape(&next_rank),
            "NEXT_DATE" => escape(&next_date),
            "INVITED" => String::from(if snapshot.pending.is_some() { "checked" } else { "" }),
            "WARNINGS" => warnings.clone(),
            _ => return None,
        };
        Some(value)
    })
}

/// Replaces each `{{NAME}}` in one left-to-right pass, so inserted values are
/// never scanned again. Unknown names are left as they are.
fn fill_template(template: &str, value_of: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            rest = &rest[start..];
            break;
        };
        let name = &after[..end];
        match value_of(name) {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}

fn warning_text(warning: IntegrityWarning) -> &'static str {
    match warning {
        IntegrityWarning::NoConfirmedRank => "Toutes les ceintures enregistrées sont des invitations.",
        IntegrityWarning::MultiplePending => "Plusieurs invitations sont ouvertes en même temps.",
        IntegrityWarning::PendingNotLatest => "L'invitation ouverte précède un passage confirmé.",
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const PROGRESS_HTML: &str = r#"<!DOCTYPE html>
<html lang="fr">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>Progression Karaté</title>
  <style>
    :root {
      --bg: #f9fafb;
      --ink: #1f2937;
      --accent: #dc2626;
      --muted: #6b7280;
      --card: white;
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      min-height: 100vh;
      background: var(--bg);
      color: var(--ink);
      font-family: "Trebuchet MS", sans-serif;
      display: grid;
      place-items: center;
      padding: 32px 18px 48px;
    }

    .app {
      width: min(760px, 100%);
      display: grid;
      gap: 24px;
    }

    h1 {
      margin: 0;
      color: var(--accent);
    }

    .panel {
      display: grid;
      grid-template-columns: repeat(auto-fit, minmax(160px, 1fr));
      gap: 16px;
    }

    .stat {
      background: var(--card);
      border: 1px solid #e5e7eb;
      border-radius: 12px;
      padding: 16px;
      display: grid;
      gap: 6px;
    }

    .label {
      font-size: 0.8rem;
      text-transform: uppercase;
      letter-spacing: 0.1em;
      color: var(--muted);
    }

    .value {
      font-size: 1.5rem;
      font-weight: 600;
    }

    .bar {
      height: 12px;
      background: #fee2e2;
      border-radius: 999px;
      overflow: hidden;
    }

    .bar div {
      height: 100%;
      background: var(--accent);
    }

    .warnings {
      color: #92400e;
      background: #fef3c7;
      border-radius: 12px;
      margin: 0;
      padding: 12px 28px;
    }

    .warnings:empty {
      display: none;
    }
  </style>
</head>
<body>
  <main class="app" data-profile="{{PROFILE}}">
    <header>
      <h1>Ceinture {{RANK}}</h1>
      <p class="label">{{PROFILE}} · {{SINCE}}</p>
    </header>

    <ul class="warnings">{{WARNINGS}}</ul>

    <section class="panel">
      <div class="stat">
        <span class="label">Points groupe</span>
        <span class="value">{{GROUP}}</span>
      </div>
      <div class="stat">
        <span class="label">Privés (×4)</span>
        <span class="value">{{PRIVATE}}</span>
      </div>
      <div class="stat">
        <span class="label">Total / requis</span>
        <span class="value">{{TOTAL}} / {{REQUIRED}}</span>
      </div>
      <div class="stat">
        <span class="label">Reste</span>
        <span class="value">{{REMAINING}}</span>
      </div>
    </section>

    <section class="stat">
      <span class="label">Prochaine ceinture : {{NEXT_RANK}} · {{NEXT_DATE}}</span>
      <div class="bar"><div style="width: {{PERCENT}}%"></div></div>
      <label>
        <input id="invited" type="checkbox" {{INVITED}} />
        Invitation reçue ?
      </label>
    </section>
  </main>

  <script>
    const profile = document.querySelector('.app').dataset.profile;
    document.getElementById('invited').addEventListener('change', async (event) => {
      const res = await fetch(`/api/profiles/${profile}/invitation`, {
        method: 'POST',
        headers: { 'content-type': 'application/json' },
        body: JSON.stringify({ enabled: event.target.checked })
      });
      if (res.ok) {
        window.location.reload();
      }
    });
  </script>
</body>
</html>
"#;
