//! Response schemas sent with schema-constrained requests
//! (Gemini `responseSchema`, OpenAPI-subset dialect).

use serde_json::{json, Value};

/// `{ errors: [ {error, correction, explanation, unit} ] }`
pub fn grammar_schema() -> Value {
  json!({
    "type": "OBJECT",
    "properties": {
      "errors": {
        "type": "ARRAY",
        "items": {
          "type": "OBJECT",
          "properties": {
            "error": { "type": "STRING" },
            "correction": { "type": "STRING" },
            "explanation": { "type": "STRING" },
            "unit": { "type": "INTEGER" }
          },
          "required": ["error", "correction", "explanation", "unit"]
        }
      }
    },
    "required": ["errors"]
  })
}

/// `{ questions: [ {question, options, answer, explanation} ] }`
pub fn quiz_schema() -> Value {
  json!({
    "type": "OBJECT",
    "properties": {
      "questions": {
        "type": "ARRAY",
        "items": {
          "type": "OBJECT",
          "properties": {
            "question": { "type": "STRING" },
            "options": { "type": "ARRAY", "items": { "type": "STRING" } },
            "answer": { "type": "INTEGER" },
            "explanation": { "type": "STRING" }
          },
          "required": ["question", "options", "answer", "explanation"]
        }
      }
    },
    "required": ["questions"]
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn item_fields_are_all_required() {
    let g = grammar_schema();
    let req = &g["properties"]["errors"]["items"]["required"];
    assert_eq!(req.as_array().map(|a| a.len()), Some(4));

    let q = quiz_schema();
    assert_eq!(q["properties"]["questions"]["items"]["properties"]["answer"]["type"], "INTEGER");
    assert_eq!(q["required"][0], "questions");
  }
}
