use crate::commands::send_chunked;
use crate::state::Context;
use crate::tables::Catalog;

/// Columns listed per source.
const LISTED_COLUMNS: usize = 10;

/// List loaded data sources
#[poise::command(slash_command, guild_only)]
pub async fn sources(ctx: Context<'_>) -> Result<(), anyhow::Error> {
    let catalog = ctx.data().tables.catalog().await;
    let ttl = ctx.data().tables.ttl().as_secs();
    send_chunked(&ctx, &describe_catalog(&catalog, ttl)).await
}

fn describe_catalog(catalog: &Catalog, ttl_secs: u64) -> String {
    if catalog.is_empty() && catalog.failures().is_empty() {
        return "No hay fuentes de datos configuradas.".to_string();
    }

    let mut output = format!("**Fuentes de datos activas: {}**\n\n", catalog.len());
    for table in catalog.tables() {
        let digest = table.digest().get(..12).unwrap_or(table.digest());
        let columns: Vec<&str> = table
            .column_names()
            .into_iter()
            .take(LISTED_COLUMNS)
            .collect();
        let more = table.columns().len().saturating_sub(LISTED_COLUMNS);

        output.push_str(&format!(
            "**{}** ({} filas, {} columnas)",
            table.name(),
            table.row_count(),
            table.columns().len()
        ));
        if !digest.is_empty() {
            output.push_str(&format!(" — `{}`", digest));
        }
        output.push_str(&format!(", cargada {}", table.loaded_at().format("%H:%M:%S")));
        output.push('\n');
        output.push_str(&format!("  Columnas: {}", columns.join(", ")));
        if more > 0 {
            output.push_str(&format!(" (+{} más)", more));
        }
        output.push('\n');
    }

    if !catalog.failures().is_empty() {
        output.push_str("\n**No disponibles:**\n");
        for failure in catalog.failures() {
            output.push_str(&format!("  - {}: {}\n", failure.name, failure.error));
        }
    }

    if let Some(at) = catalog.refreshed_at() {
        output.push_str(&format!(
            "\nÚltima actualización de datos: {} UTC",
            at.format("%Y-%m-%d %H:%M:%S")
        ));
    }
    if ttl_secs != u64::MAX {
        output.push_str(&format!(
            "\nLos datos se actualizan automáticamente cada {} segundos",
            ttl_secs
        ));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::types::{Column, ColumnKind, Table};

    #[test]
    fn test_describe_catalog() {
        let columns = (0..12)
            .map(|i| Column::new(format!("c{}", i), ColumnKind::Text))
            .collect();
        let table = Table::new("naps", columns, vec![])
            .with_digest("0123456789abcdef0123".to_string());
        let text = describe_catalog(&Catalog::new(vec![table]), 60);

        assert!(text.contains("**Fuentes de datos activas: 1**"));
        assert!(text.contains("**naps** (0 filas, 12 columnas) — `0123456789ab`, cargada "));
        assert!(text.contains("(+2 más)"));
        assert!(text.contains("cada 60 segundos"));
    }

    #[test]
    fn test_describe_empty_catalog() {
        let text = describe_catalog(&Catalog::default(), 60);
        assert_eq!(text, "No hay fuentes de datos configuradas.");
    }
}
