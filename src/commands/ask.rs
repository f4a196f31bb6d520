use crate::assistant::Answer;
use crate::commands::send_chunked;
use crate::query::describe_filters;
use crate::state::Context;
use tracing::info;

/// Ask a question about customers, NAPs, tickets and more
#[poise::command(slash_command, guild_only)]
pub async fn ask(
    ctx: Context<'_>,
    #[description = "Your question"] question: String,
    #[description = "Show the matching rows (default: yes)"] preview: Option<bool>,
) -> Result<(), anyhow::Error> {
    ctx.defer().await?;

    let config = ctx.data().config.read().await.clone();
    let session = ctx.data().sessions.get(ctx.channel_id().get()).await;

    info!(user = ctx.author().name, question, "Question received");

    // Questions within one channel are answered one at a time
    let mut conversation = session.lock().await;
    let answer = ctx
        .data()
        .assistant
        .ask(&question, &mut conversation, &config)
        .await;
    drop(conversation);

    info!(
        outcome = ?answer.outcome,
        rows = answer.selection.as_ref().map(|s| s.len()),
        answer_len = answer.text.len(),
        "Question answered"
    );

    let full = format_answer(
        &question,
        &answer,
        preview.unwrap_or(true),
        config.preview_rows as usize,
    );
    send_chunked(&ctx, &full).await
}

/// Discord markdown for an answer: question, routing summary, text, row preview.
fn format_answer(question: &str, answer: &Answer, preview: bool, preview_rows: usize) -> String {
    let mut full = format!("**P:** {}\n", question);

    if let (Some(decision), Some(selection)) = (&answer.decision, &answer.selection) {
        full.push_str(&format!(
            "**Fuente:** {} | **Registros:** {}\n**Filtros:** {}\n",
            selection.table().name(),
            selection.len(),
            describe_filters(&decision.filters)
        ));
    }

    full.push_str(&format!("\n{}\n", answer.text.trim()));

    if let Some(selection) = answer.selection.as_ref().filter(|s| preview && !s.is_empty()) {
        let shown = selection.len().min(preview_rows);
        let table = selection.render(shown).replace("```", "'''");
        if shown < selection.len() {
            full.push_str(&format!(
                "\n**Datos encontrados** (primeros {} de {}):\n",
                shown,
                selection.len()
            ));
        } else {
            full.push_str("\n**Datos encontrados:**\n");
        }
        full.push_str(&format!("```\n{}```\n", table));
    }

    full
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::assistant::Outcome;
    use crate::query::{FilterClause, Operator, QueryDecision};
    use crate::tables::types::{Column, ColumnKind, Selection, Table, Value};

    fn answer(rows: usize) -> Answer {
        let table = Arc::new(Table::new(
            "tickets",
            vec![Column::new("Estado", ColumnKind::Text)],
            (0..rows).map(|_| vec![Value::Text("Abierto".into())]).collect(),
        ));
        Answer {
            text: "Hay tickets abiertos.".to_string(),
            outcome: Outcome::Answered,
            decision: Some(QueryDecision {
                table_name: "tickets".to_string(),
                filters: vec![FilterClause::new("Estado", Operator::Equals, "Abierto")],
                explanation: String::new(),
            }),
            selection: Some(Selection::all(table)),
        }
    }

    #[test]
    fn test_format_answer_with_preview() {
        let text = format_answer("¿Tickets abiertos?", &answer(12), true, 10);
        assert!(text.starts_with("**P:** ¿Tickets abiertos?\n"));
        assert!(text.contains("**Fuente:** tickets | **Registros:** 12"));
        assert!(text.contains(r#"**Filtros:** Estado = "Abierto""#));
        assert!(text.contains("Hay tickets abiertos."));
        assert!(text.contains("(primeros 10 de 12)"));
        assert_eq!(text.matches("Abierto\n").count(), 10);
    }

    #[test]
    fn test_format_answer_without_preview() {
        let text = format_answer("q", &answer(3), false, 10);
        assert!(!text.contains("```"));
        assert!(text.contains("**Registros:** 3"));
    }

    #[test]
    fn test_format_halted_answer() {
        let halted = Answer {
            text: "La fuente de datos 'facturas' no está disponible.".to_string(),
            outcome: Outcome::UnknownTable,
            decision: None,
            selection: None,
        };
        let text = format_answer("q", &halted, true, 10);
        assert!(!text.contains("**Fuente:**"));
        assert!(text.contains("no está disponible"));
    }
}
