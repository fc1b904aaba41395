//! Report templating.

use std::path::{Path, PathBuf};

use minijinja::Environment;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::api::BusinessRecord;

pub const DEFAULT_TEMPLATE: &str = "dark";

const DARK_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{{ bk_biz_name | default("Metric report") }}</title>
<style>
  body { background: #14161a; color: #d8dee9; font-family: -apple-system, "Segoe UI", sans-serif; margin: 0; }
  header { background: #1f232a; padding: 24px 40px; border-bottom: 1px solid #2e3440; }
  header .banner { color: #88c0d0; font-size: 13px; letter-spacing: 2px; text-transform: uppercase; }
  header h1 { margin: 6px 0 0; font-weight: 500; }
  main { padding: 24px 40px; }
  .stats { display: flex; flex-wrap: wrap; gap: 12px; margin-bottom: 28px; }
  .stat { background: #1f232a; border-radius: 6px; padding: 12px 16px; min-width: 180px; }
  .stat .name { color: #81a1c1; font-size: 12px; }
  .stat .value { font-size: 20px; margin-top: 4px; }
  .charts { display: grid; grid-template-columns: repeat(auto-fill, minmax(420px, 1fr)); gap: 16px; margin-bottom: 28px; }
  .charts figure { background: #1f232a; border-radius: 6px; margin: 0; padding: 12px; }
  .charts img { width: 100%; }
  .charts figcaption { color: #81a1c1; font-size: 12px; margin-top: 6px; }
  pre.report { white-space: pre-wrap; line-height: 1.6; font-family: inherit; }
</style>
</head>
<body>
<header>
  <div class="banner">{{ banner_text }}</div>
  <h1>{{ bk_biz_name | default("") }}</h1>
</header>
<main>
  <section class="stats">
  {%- for stat in stats %}
    <div class="stat"><div class="name">{{ stat.name }}</div><div class="value">{{ stat.value }}</div></div>
  {%- endfor %}
  </section>
  <section class="charts">
  {%- for chart in charts %}
    <figure><img src="{{ chart.path }}" alt="{{ chart.title | escape }}"><figcaption>{{ chart.title | escape }}</figcaption></figure>
  {%- endfor %}
  </section>
  <pre class="report">{{ report | escape }}</pre>
</main>
</body>
</html>
"#;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("template `{0}` not found")]
    UnknownTemplate(String),
    #[error("failed to read template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),
}

/// One summary figure shown above the narrative.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stat {
    pub name: String,
    pub value: Value,
}

/// A rendered chart image referenced from the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chart {
    pub title: String,
    pub path: String,
}

/// Everything a template sees besides the template name.
#[derive(Debug, Clone, Copy)]
pub struct ReportPage<'a> {
    pub report: &'a str,
    pub stats: &'a [Stat],
    pub charts: &'a [Chart],
    pub business: &'a BusinessRecord,
}

#[derive(Debug, Clone, Default)]
pub struct ReportRenderer {
    templates_dir: Option<PathBuf>,
}

impl ReportRenderer {
    pub fn new(templates_dir: Option<PathBuf>) -> Self {
        Self { templates_dir }
    }

    /// `<templates_dir>/<name>.html` when present, else the built-in template.
    fn template_source(&self, name: &str) -> Result<String, RenderError> {
        if let Some(dir) = &self.templates_dir {
            let path = dir.join(format!("{name}.html"));
            if path.exists() {
                return std::fs::read_to_string(&path).map_err(|source| RenderError::Io {
                    path: path.clone(),
                    source,
                });
            }
        }
        match name {
            DEFAULT_TEMPLATE => Ok(DARK_TEMPLATE.to_string()),
            other => Err(RenderError::UnknownTemplate(other.to_string())),
        }
    }

    /// Business fields are spread at the top level; `report`, `stats`,
    /// `charts` and `banner_text` win over same-named business fields.
    pub fn render(&self, name: &str, page: ReportPage<'_>) -> Result<String, RenderError> {
        let source = self.template_source(name)?;

        let mut vars: Map<String, Value> = page.business.clone();
        let banner = page
            .business
            .get("bk_app_abbr")
            .cloned()
            .unwrap_or_else(|| Value::String(String::new()));
        vars.insert("report".into(), Value::String(page.report.to_string()));
        vars.insert(
            "stats".into(),
            serde_json::to_value(page.stats).unwrap_or(Value::Array(Vec::new())),
        );
        vars.insert(
            "charts".into(),
            serde_json::to_value(page.charts).unwrap_or(Value::Array(Vec::new())),
        );
        vars.insert("banner_text".into(), banner);

        let env = Environment::new();
        let template = env.template_from_str(&source)?;
        Ok(template.render(&vars)?)
    }

    pub fn render_to(
        &self,
        path: &Path,
        name: &str,
        page: ReportPage<'_>,
    ) -> Result<(), RenderError> {
        let rendered = self.render(name, page)?;
        std::fs::write(path, rendered).map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
