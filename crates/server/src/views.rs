//! Minimal view rendering.
//!
//! Real template rendering is a collaborator outside this system's scope;
//! this module only assembles small HTML pages so the handlers have
//! something concrete to return and the tests something concrete to
//! assert on.

use axum::response::Html;
use serde_json::{Map, Value};
use session::{Flash, FlashLevel};
use shared::domain::CanonicalEntity;

fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn flash_block(flashes: &[Flash]) -> String {
    flashes
        .iter()
        .map(|flash| {
            let class = match flash.level {
                FlashLevel::Info => "info",
                FlashLevel::Success => "success",
                FlashLevel::Error => "error",
            };
            format!(
                "<p class=\"flash {class}\">{}</p>\n",
                escape(&flash.message)
            )
        })
        .collect()
}

pub fn page(title: &str, flashes: &[Flash], body: &str) -> Html<String> {
    Html(format!(
        "<!doctype html>\n<html><head><title>{}</title></head><body>\n{}{}\n</body></html>\n",
        escape(title),
        flash_block(flashes),
        body
    ))
}

pub fn entity_table(entities: &[CanonicalEntity]) -> String {
    let rows: String = entities
        .iter()
        .map(|entity| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                escape(&entity.id),
                escape(&entity.name),
                escape(entity.category.as_deref().unwrap_or("-")),
            )
        })
        .collect();
    format!(
        "<table><tr><th>id</th><th>name</th><th>category</th></tr>\n{rows}</table>"
    )
}

/// Renders one wizard step: the fields entered so far plus the form for
/// the requested step.
pub fn wizard_step(name: &str, step: u32, total: u32, fields: &Map<String, Value>) -> String {
    let entered: String = fields
        .iter()
        .map(|(key, value)| {
            let shown = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            format!("<li>{}: {}</li>\n", escape(key), escape(&shown))
        })
        .collect();
    let wizard = escape(name);
    let back = if step > 1 {
        "<button type=\"submit\" name=\"action\" value=\"back\">Back</button>\n"
    } else {
        ""
    };
    format!(
        "<h1>{wizard}: step {step} of {total}</h1>\n<ul>{entered}</ul>\n\
         <form method=\"post\" action=\"/wizard/{wizard}\">\n\
         <input type=\"hidden\" name=\"step\" value=\"{step}\">\n\
         <input name=\"valor\" type=\"text\">\n\
         <button type=\"submit\">Continue</button>\n\
         {back}\
         <button type=\"submit\" name=\"action\" value=\"cancel\">Cancel</button>\n\
         </form>\n"
    )
}
