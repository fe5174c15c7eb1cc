use std::io::{self, Write};

use super::config::{OutputConfig, OutputFormat};
use super::html;
use super::types::Envelope;

pub trait Presenter: Send + Sync {
    fn emit(&self, env: &Envelope, w: &mut dyn Write) -> io::Result<()>;
}

pub struct JsonPresenter { pub pretty: bool }
impl Presenter for JsonPresenter {
    fn emit(&self, env: &Envelope, w: &mut dyn Write) -> io::Result<()> {
        if self.pretty { serde_json::to_writer_pretty(&mut *w, env).map_err(to_io)? } else { serde_json::to_writer(&mut *w, env).map_err(to_io)? }
        writeln!(w)
    }
}

pub struct TextPresenter { pub pretty: bool }
impl Presenter for TextPresenter {
    fn emit(&self, env: &Envelope, w: &mut dyn Write) -> io::Result<()> {
        let (label, body) = if env.apply { ("Result", &env.result) } else { ("Plan", &env.plan) };
        writeln!(w, "{}: {}", label, env.op)?;
        if self.pretty {
            if let Some(b) = body { serde_json::to_writer_pretty(&mut *w, b).map_err(to_io)?; writeln!(w)?; }
        }
        Ok(())
    }
}

/// Renders the plan/result as the table the admin pages show.
pub struct HtmlPresenter;
impl Presenter for HtmlPresenter {
    fn emit(&self, env: &Envelope, w: &mut dyn Write) -> io::Result<()> {
        let body = if env.apply { &env.result } else { &env.plan };
        let title = format!("{} ({})", env.op, if env.apply { "result" } else { "plan" });
        writeln!(w, "{}", html::render_page(&title, body.as_ref().unwrap_or(&serde_json::Value::Null)))
    }
}

pub struct Emitter {
    presenter: Box<dyn Presenter>,
}

impl Emitter {
    pub fn from_env(cfg: OutputConfig) -> Self {
        let presenter: Box<dyn Presenter> = match cfg.format {
            OutputFormat::Json => Box::new(JsonPresenter { pretty: cfg.pretty }),
            OutputFormat::Html => Box::new(HtmlPresenter),
            OutputFormat::Text => Box::new(TextPresenter { pretty: cfg.pretty }),
        };
        Emitter { presenter }
    }

    pub fn emit(&self, env: &Envelope) -> io::Result<()> {
        let mut out = io::stdout().lock();
        self.presenter.emit(env, &mut out)?;
        out.flush()
    }
}

fn to_io(e: serde_json::Error) -> io::Error { io::Error::new(io::ErrorKind::Other, e) }

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(p: &dyn Presenter, env: &Envelope) -> String {
        let mut buf = Vec::new();
        p.emit(env, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn text_presenter_labels_plan_and_result() {
        let plan = Envelope::plan("import", &json!({"config_id": 1}), None).unwrap();
        assert_eq!(render(&TextPresenter { pretty: false }, &plan), "Plan: import\n");
        let res = Envelope::result("import", &json!({"imported": 2}), None).unwrap();
        let out = render(&TextPresenter { pretty: true }, &res);
        assert!(out.starts_with("Result: import\n"));
        assert!(out.contains("\"imported\": 2"));
    }

    #[test]
    fn json_presenter_writes_one_line() {
        let res = Envelope::result("check", &json!({"element_count": 4}), None).unwrap();
        let out = render(&JsonPresenter { pretty: false }, &res);
        assert_eq!(out.lines().count(), 1);
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["result"]["element_count"], 4);
        assert_eq!(v["schema_version"], "xmlfeed.v1");
    }

    #[test]
    fn html_presenter_renders_result_table() {
        let res = Envelope::result("test_connection", &json!({"success": true, "element_count": 2}), None).unwrap();
        let out = render(&HtmlPresenter, &res);
        assert!(out.contains("<title>test_connection (result)</title>"));
        assert!(out.contains("<th>element_count</th><td>2</td>"));
    }
}
