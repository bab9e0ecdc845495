use crate::llm::{CompletionProvider, DecodingConfig, LlmError};
use std::sync::Arc;
use tracing::{debug, info};

/// Turns a generation prompt into candidate SQL text
pub struct SqlGenerator {
    provider: Arc<dyn CompletionProvider>,
    decoding: DecodingConfig,
}

impl SqlGenerator {
    pub fn new(provider: Arc<dyn CompletionProvider>, decoding: DecodingConfig) -> Self {
        Self { provider, decoding }
    }

    pub async fn generate_sql(&self, prompt: &str) -> Result<String, LlmError> {
        debug!("Generation prompt: {}", prompt);
        let content = self.provider.complete(prompt, &self.decoding).await?;
        debug!("Raw generation response: {}", content);

        let sql = extract_sql(&content);

        // Ensure we don't return empty SQL
        if sql.trim().is_empty() {
            return Err(LlmError::ResponseError(
                "Failed to extract SQL from response".to_string(),
            ));
        }

        Ok(sql)
    }
}

/// Pulls bare SQL out of a model response that may still carry code fences
/// or explanatory prose.
pub fn extract_sql(content: &str) -> String {
    // Try to extract SQL from between ```sql and ``` markers
    if let Some(start) = find_ignore_case(content, "```sql") {
        let after = &content[start + 6..];
        let sql = after.find("```").map_or(after, |end| &after[..end]).trim();
        info!("Extracted SQL from code block markers");
        return sql.to_string();
    }

    // Try alternate syntax without a language specifier: ``` and ```
    if let Some(start) = content.find("```") {
        let after = &content[start + 3..];
        let sql = after.find("```").map_or(after, |end| &after[..end]).trim();
        info!("Extracted SQL using simple code block markers");
        return sql.to_string();
    }

    // Look for a line starting with an SQL keyword and collect until the statement ends.
    // Destructive keywords are included on purpose so the validator gets to see them.
    let sql_keywords = ["SELECT", "WITH", "INSERT", "UPDATE", "DELETE", "CREATE", "ALTER", "DROP"];
    let lines: Vec<&str> = content.lines().collect();

    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim().to_uppercase();
        if sql_keywords.iter().any(|kw| trimmed.starts_with(kw)) {
            let mut sql = line.trim().to_string();
            if !sql.ends_with(';') {
                for next_line in &lines[i + 1..] {
                    let next_line = next_line.trim();

                    // Prose after a blank line is not part of the statement
                    if next_line.is_empty() {
                        break;
                    }

                    sql.push(' ');
                    sql.push_str(next_line);

                    if next_line.ends_with(';') {
                        break;
                    }
                }
            }

            info!("Extracted SQL using line scanning");
            return sql;
        }
    }

    content.trim().to_string()
}

fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack.to_ascii_lowercase().find(needle)
}
