// file: src/worker/prompt.rs
// description: extraction prompt rendering for generative workers
// reference: https://docs.rs/schemars

use crate::models::{Chunk, WorkerPayload};
use schemars::schema_for;

pub const SYSTEM_PROMPT: &str = "You are an API documentation analyst. \
Read the documentation pages listed by the user and describe every endpoint \
they document. Respond with a single JSON object and nothing else.";

pub fn payload_schema() -> String {
    let schema = schema_for!(WorkerPayload);
    serde_json::to_string_pretty(&schema).unwrap_or_else(|_| "{}".to_string())
}

pub fn render_prompt(chunk: &Chunk) -> String {
    let mut prompt = format!(
        "Category: {}\nDescription: {}\n\nDocumentation pages ({} of chunk {}/{}):\n",
        chunk.category_name,
        if chunk.category_description.is_empty() {
            "(none)"
        } else {
            chunk.category_description.as_str()
        },
        chunk.endpoints.len(),
        chunk.chunk_id + 1,
        chunk.total_chunks
    );

    for (idx, endpoint) in chunk.endpoints.iter().enumerate() {
        prompt.push_str(&format!("{}. {} - {}\n", idx + 1, endpoint.title, endpoint.link));
    }

    prompt.push_str(
        "\nFor each page, produce one record with name, description, HTTP method, path, \
headers, path_params, query_params, body_params and responses keyed by status code. \
Use empty lists when a page documents no parameters of a kind. \
Group records under a category named exactly as above.\n\nJSON schema:\n",
    );
    prompt.push_str(&payload_schema());
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EndpointStub;
    use url::Url;

    #[test]
    fn test_prompt_lists_every_endpoint() {
        let chunk = Chunk {
            chunk_id: 1,
            category_name: "Repos".to_string(),
            category_description: String::new(),
            category_index: 0,
            endpoints: vec![
                EndpointStub {
                    title: "List repos".to_string(),
                    link: Url::parse("https://docs.example.com/repos").unwrap(),
                },
                EndpointStub {
                    title: "Get repo".to_string(),
                    link: Url::parse("https://docs.example.com/repos/get").unwrap(),
                },
            ],
            total_chunks: 3,
        };

        let prompt = render_prompt(&chunk);
        assert!(prompt.contains("Category: Repos"));
        assert!(prompt.contains("Description: (none)"));
        assert!(prompt.contains("chunk 2/3"));
        assert!(prompt.contains("1. List repos - https://docs.example.com/repos"));
        assert!(prompt.contains("2. Get repo - https://docs.example.com/repos/get"));
    }

    #[test]
    fn test_schema_mentions_required_keys() {
        let schema = payload_schema();
        for key in ["categories", "records", "method", "path", "query_params"] {
            assert!(schema.contains(key), "schema missing {}", key);
        }
    }
}
