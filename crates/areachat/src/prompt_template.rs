use include_dir::{include_dir, Dir};
use serde::Serialize;
use tera::{Context, Error as TeraError, Tera};

static PROMPTS_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/prompts");

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    let rendered = tera.render("inline_template", &context)?;
    Ok(rendered)
}

/// Render one of the prompt templates bundled into the binary
pub fn load_prompt_file<T: Serialize>(
    template_file: &str,
    context_data: &T,
) -> Result<String, TeraError> {
    let template_content = PROMPTS_DIR
        .get_file(template_file)
        .and_then(|file| file.contents_utf8())
        .ok_or_else(|| TeraError::msg(format!("Prompt template not found: {}", template_file)))?;
    load_prompt(template_content, context_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tool::Tool;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_load_prompt() {
        let template = "Hola, {{ name }}! Tienes {{ age }} años.";
        let mut context = HashMap::new();
        context.insert("name".to_string(), "Alicia".to_string());
        context.insert("age".to_string(), 30.to_string());

        let result = load_prompt(template, &context).unwrap();
        assert_eq!(result, "Hola, Alicia! Tienes 30 años.");
    }

    #[test]
    fn test_load_prompt_missing_variable() {
        let template = "Hola, {{ name }}! Tienes {{ age }} años.";
        let mut context = HashMap::new();
        context.insert("name".to_string(), "Alicia".to_string());
        let result = load_prompt(template, &context);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_prompt_file_missing_file() {
        let context: HashMap<String, String> = HashMap::new();
        let result = load_prompt_file("non_existent_template.md", &context);
        assert!(result.is_err());
    }

    #[test]
    fn test_system_prompt_lists_tools() {
        let tools = vec![
            Tool::new("searchAreas", "Busca áreas", json!({"type": "object"})),
            Tool::new("getAreasByCountry", "Lista áreas de un país", json!({"type": "object"})),
        ];
        let context = json!({
            "date": "2026-10-18",
            "max_results": 20,
            "tools": tools,
        });

        let result = load_prompt_file("system.md", &context).unwrap();
        assert!(result.contains("Hoy es 2026-10-18"));
        assert!(result.contains("- `searchAreas`: Busca áreas"));
        assert!(result.contains("- `getAreasByCountry`: Lista áreas de un país"));
        assert!(result.contains("como mucho 20 áreas"));
    }
}
