use crate::tables::types::Selection;
use crate::tables::Catalog;

/// Columns listed per table in the router prompt.
const CATALOG_COLUMNS: usize = 10;

/// Connectivity check sent by `/usittel health`.
pub const HEALTH_PROMPT: &str = "Di solo 'Hola, funciono correctamente'";

/// Router instructions. Placeholders: `{question}`, `{sources}`, `{context}`.
pub const ROUTER_PROMPT: &str = r#"Eres un experto en análisis de datos para un ISP llamado USITTEL.

PREGUNTA DEL USUARIO:
{question}
{context}
FUENTES DE DATOS DISPONIBLES:
{sources}

TAREA:
Analiza la pregunta y determina:
1. En qué fuente de datos buscar
2. Qué filtros aplicar, en orden. Cada filtro tiene:
   - "columna": nombre exacto de la columna (vacío para buscar en todas las columnas de texto)
   - "valor": valor a buscar
   - "operador": uno de "=", "!=", ">", "<", "contiene" (por defecto "contiene")
3. Si es un conteo o una pregunta general, la lista de filtros puede quedar vacía.

REGLAS:
- Todos los filtros se combinan con Y (cada uno reduce el resultado anterior).
- Para excluir estados usa "!=" con un filtro por cada estado excluido.
- Para aceptar varias alternativas en una misma columna usa "contiene" con los valores unidos por " o " (ej. "Resuelto o Cerrado").
- Para números usa ">" o "<" con el valor numérico sin unidades.
- Si la pregunta hace referencia a una consulta anterior ("y de esos...", "¿y en la zona norte?"), reutiliza la fuente y los filtros del contexto y agrega los nuevos.

EJEMPLOS:
- "¿Cuántos clientes hay?" → {"dataframe": "clientes_datos", "filtros": []}
- "¿Cuántas NAPs hay?" → {"dataframe": "naps", "filtros": []}
- "¿Cuál es el estado de Juan Perez?" → {"dataframe": "clientes_datos", "filtros": [{"columna": "Nombre", "valor": "Juan Perez", "operador": "contiene"}]}
- "Tickets que no están resueltos ni cerrados" → {"dataframe": "tickets", "filtros": [{"columna": "Estado", "valor": "Resuelto", "operador": "!="}, {"columna": "Estado", "valor": "Cerrado", "operador": "!="}]}
- "Tickets resueltos o cerrados" → {"dataframe": "tickets", "filtros": [{"columna": "Estado", "valor": "Resuelto o Cerrado", "operador": "contiene"}]}

RESPONDE ÚNICAMENTE con un JSON válido en este formato:
{
    "dataframe": "nombre_de_la_fuente",
    "filtros": [{"columna": "...", "valor": "...", "operador": "..."}],
    "explicacion": "breve explicación"
}

Si no puedes determinar dónde buscar, responde:
{
    "error": "No puedo determinar dónde buscar esta información"
}
"#;

/// Build the router prompt for `question` over the loaded tables.
pub fn router_prompt(question: &str, catalog: &Catalog, context: Option<&str>) -> String {
    let sources: Vec<String> = catalog
        .tables()
        .map(|t| {
            let columns: Vec<&str> = t.column_names().into_iter().take(CATALOG_COLUMNS).collect();
            format!(
                "- **{}** ({} registros): {}",
                t.name(),
                t.row_count(),
                columns.join(", ")
            )
        })
        .collect();

    let context = match context {
        Some(block) => format!(
            "\nCONTEXTO DE LA CONVERSACIÓN (consultas anteriores):\n{}\n",
            block
        ),
        None => String::new(),
    };

    // Question last so user text is never re-scanned for placeholders
    ROUTER_PROMPT
        .replace("{context}", &context)
        .replace("{sources}", &sources.join("\n"))
        .replace("{question}", question)
}

/// Build the answer prompt from the rows that matched.
///
/// Only the first `sample_rows` rows are shown to the model; the prompt always
/// carries the true total so counts never come from the sample.
pub fn synthesis_prompt(
    question: &str,
    selection: &Selection,
    table_name: &str,
    sample_rows: usize,
) -> String {
    if selection.is_empty() {
        return format!(
            "La búsqueda en '{}' no arrojó resultados para: \"{}\"\n\n\
             Responde de forma amable indicando que no se encontró información y sugiere reformular la pregunta. \
             No inventes datos.",
            table_name, question
        );
    }

    let total = selection.len();
    let shown = total.min(sample_rows.max(1));
    let note = if total > shown {
        format!(
            "\n(Se muestran solo los primeros {} de {} registros encontrados)",
            shown, total
        )
    } else {
        String::new()
    };

    format!(
        r#"Eres un asistente virtual de USITTEL. Un usuario preguntó:

PREGUNTA: {question}

DATOS ENCONTRADOS en '{table}' (Total: {total} registros):
{rows}{note}

TAREA:
Responde la pregunta del usuario de forma clara, profesional y amable, usando ÚNICAMENTE la información proporcionada.
- Si pregunta "cuántos", responde con el número exacto: {total}
- Si hay detalles específicos, menciónalos
- No inventes ni agregues datos que no estén en la tabla
- No enumeres más registros de los que aparecen arriba
- Si hay muchos resultados, puedes resumir las estadísticas principales
"#,
        question = question,
        table = table_name,
        total = total,
        rows = selection.render(shown).trim_end(),
        note = note,
    )
}
