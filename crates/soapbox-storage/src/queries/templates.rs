// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Template CRUD operations.

use chrono::{DateTime, Utc};
use rusqlite::params;
use soapbox_core::{SoapboxError, Template, TemplateId};

use super::ts;
use crate::database::Database;

fn row_to_template(row: &rusqlite::Row<'_>) -> Result<Template, rusqlite::Error> {
    Ok(Template {
        id: TemplateId(row.get(0)?),
        name: row.get(1)?,
        prompt: row.get(2)?,
        model: row.get(3)?,
        temperature: row.get(4)?,
        max_output_len: row.get::<_, i64>(5)? as usize,
        include_hashtags: row.get::<_, i64>(6)? != 0,
        max_hashtags: row.get::<_, i64>(7)? as u32,
        include_emojis: row.get::<_, i64>(8)? != 0,
    })
}

/// Insert a new template. Temperature outside `[0, 1]` is rejected before
/// the row is written.
pub async fn insert_template(
    db: &Database,
    template: &Template,
    now: DateTime<Utc>,
) -> Result<(), SoapboxError> {
    if !(0.0..=1.0).contains(&template.temperature) {
        return Err(SoapboxError::Validation(format!(
            "template temperature must be in [0, 1], got {}",
            template.temperature
        )));
    }
    let template = template.clone();
    let now_text = ts(now);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO templates (id, name, prompt, model, temperature, max_output_len, \
                 include_hashtags, max_hashtags, include_emojis, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
                params![
                    template.id.0,
                    template.name,
                    template.prompt,
                    template.model,
                    template.temperature,
                    template.max_output_len as i64,
                    template.include_hashtags,
                    template.max_hashtags as i64,
                    template.include_emojis,
                    now_text,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a template by id.
pub async fn get_template(
    db: &Database,
    id: &TemplateId,
) -> Result<Option<Template>, SoapboxError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, prompt, model, temperature, max_output_len, \
                 include_hashtags, max_hashtags, include_emojis
                 FROM templates WHERE id = ?1",
            )?;
            let result = stmt.query_row(params![id], row_to_template);
            match result {
                Ok(template) => Ok(Some(template)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List all templates by name.
pub async fn list_templates(db: &Database) -> Result<Vec<Template>, SoapboxError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, prompt, model, temperature, max_output_len, \
                 include_hashtags, max_hashtags, include_emojis
                 FROM templates ORDER BY name ASC",
            )?;
            let rows = stmt.query_map([], row_to_template)?;
            let mut templates = Vec::new();
            for row in rows {
                templates.push(row?);
            }
            Ok(templates)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
