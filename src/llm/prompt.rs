use crate::config::{ExampleConfig, PromptConfig};
use crate::db::rows::QueryResult;
use crate::db::schema::SchemaMetadata;

/// A question paired with the bare SQL the model is expected to produce
#[derive(Debug, Clone, PartialEq)]
pub struct FewShotExample {
    pub question: String,
    pub sql: String,
}

impl From<&ExampleConfig> for FewShotExample {
    fn from(example: &ExampleConfig) -> Self {
        Self {
            question: example.question.clone(),
            sql: example.sql.clone(),
        }
    }
}

fn builtin_examples() -> Vec<FewShotExample> {
    vec![
        FewShotExample {
            question: "How many orders were placed in 2023?".to_string(),
            sql: "SELECT COUNT(*) AS order_count FROM sales.orders o WHERE o.order_date >= DATE '2023-01-01' AND o.order_date < DATE '2024-01-01'".to_string(),
        },
        FewShotExample {
            question: "Which five customers spent the most?".to_string(),
            sql: "SELECT c.name, SUM(o.total) AS total_spent FROM sales.customers c JOIN sales.orders o ON o.customer_id = c.id GROUP BY c.name ORDER BY total_spent DESC LIMIT 5".to_string(),
        },
    ]
}

/// Renders the generation and summary prompts. Holds only configuration, so
/// the same inputs always give the same text.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    dialect: String,
    examples: Vec<FewShotExample>,
    max_summary_rows: usize,
}

impl PromptBuilder {
    pub fn new(dialect: &str, config: &PromptConfig) -> Self {
        let mut examples = builtin_examples();
        examples.extend(config.examples.iter().map(FewShotExample::from));

        Self {
            dialect: dialect.to_string(),
            examples,
            max_summary_rows: config.max_summary_rows.max(1),
        }
    }

    pub fn build_generation_prompt(&self, question: &str, schema: &SchemaMetadata) -> String {
        let mut examples = String::new();
        for example in &self.examples {
            examples.push_str(&format!("Question: {}\nSQL: {}\n\n", example.question, example.sql));
        }

        format!(
            r#"### Instructions:
Your task is to convert a question into a single {dialect} SQL query, given a database schema.
Adhere to these rules:
- Write exactly one read-only SELECT statement. Never modify data or structure: no INSERT, UPDATE, DELETE, DROP, ALTER, TRUNCATE, MERGE or EXEC.
- Do not include SQL comments.
- Output only the SQL text. Do not use markdown code fences and do not add explanations.
- Always use fully qualified table names exactly as they appear in the schema (schema.table).
- Use the exact spelling of column names as provided in the schema.
- Use table aliases to prevent ambiguity, and join tables along the listed foreign keys.

### Database schema:
{schema}
### Examples:
{examples}### Question:
Question: {question}
SQL:"#,
            dialect = self.dialect,
            schema = render_schema(schema),
            examples = examples,
            question = question.trim(),
        )
    }

    pub fn build_summary_prompt(&self, result: &QueryResult) -> String {
        format!(
            r#"### Instructions:
You are given the result of a database lookup. Answer in plain language for a reader who does not know SQL.
Adhere to these rules:
- Base the answer only on the data shown in the result.
- If the result contains no rows, say plainly that no matching data was found.
- Do not mention tables, columns, queries or any SQL syntax.
- Keep the answer short: one to three sentences unless a list is clearly needed.

### Example:
Result:
| count |
| --- |
| 42 |

Answer: There are 42 matching records.

### Result:
{result}
Answer:"#,
            result = render_result(result, self.max_summary_rows),
        )
    }
}

/// One markdown table per table followed by the foreign-key edges.
pub fn render_schema(schema: &SchemaMetadata) -> String {
    if schema.is_empty() {
        return "No tables were found in the database.\n".to_string();
    }

    let mut out = String::new();
    for (name, table) in &schema.tables {
        let references: Vec<_> = schema.foreign_keys_from(name).collect();
        out.push_str(&format!("#### Table: {}\n\n", name));
        out.push_str("| Column | Type | Nullable | Key |\n");
        out.push_str("|--------|------|----------|-----|\n");

        for column in &table.columns {
            let mut keys = Vec::new();
            if table.primary_key.contains(&column.name) {
                keys.push("PK".to_string());
            }
            for fk in references.iter().filter(|fk| fk.from_column == column.name) {
                keys.push(format!("FK {}.{}", fk.to_table, fk.to_column));
            }
            out.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                column.name,
                column.data_type,
                if column.nullable { "YES" } else { "NO" },
                keys.join(", ")
            ));
        }
        out.push('\n');
    }

    if !schema.foreign_keys.is_empty() {
        out.push_str("#### Foreign keys:\n\n");
        for fk in &schema.foreign_keys {
            out.push_str(&format!(
                "- {}.{} references {}.{}\n",
                fk.from_table, fk.from_column, fk.to_table, fk.to_column
            ));
        }
        out.push('\n');
    }

    out
}

/// Markdown table of at most `max_rows` rows, with a note for the rest.
pub fn render_result(result: &QueryResult, max_rows: usize) -> String {
    if result.is_empty() {
        return if result.columns.is_empty() {
            "The query returned no rows.\n".to_string()
        } else {
            format!(
                "The query returned no rows (columns: {}).\n",
                result.columns.join(", ")
            )
        };
    }

    let mut out = String::new();
    out.push_str("| ");
    out.push_str(&result.columns.iter().map(|c| cell(c)).collect::<Vec<_>>().join(" | "));
    out.push_str(" |\n|");
    out.push_str(&" --- |".repeat(result.columns.len()));
    out.push('\n');

    for row in result.rows.iter().take(max_rows) {
        let cells: Vec<String> = row.iter().map(|value| cell(&value.to_string())).collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }

    let hidden = result.row_count().saturating_sub(max_rows);
    if hidden > 0 {
        out.push_str(&format!(
            "\n({} more rows not shown; {} rows in total.)\n",
            hidden,
            result.row_count()
        ));
    }

    out
}

fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\n', '\r'], " ")
}
