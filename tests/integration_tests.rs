//! Integration tests against the live API.
//! These tests require an API key in the environment to run.

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use gptcli::chat::DEFAULT_MODEL;
    use gptcli::{ChatRequest, OpenAi, Transport, Turn};

    fn client() -> Option<OpenAi> {
        // This test requires OPENAI_API_KEY to be set
        let api_key = std::env::var("OPENAI_API_KEY").ok();
        if api_key.is_none() {
            eprintln!("Skipping test: OPENAI_API_KEY not set");
            return None;
        }
        Some(OpenAi::new(api_key).expect("Failed to create client"))
    }

    #[tokio::test]
    async fn test_simple_completion() {
        let Some(client) = client() else {
            return;
        };
        let request = ChatRequest::new(DEFAULT_MODEL, vec![Turn::user("Say 'test passed'")]);

        let response = client.complete(&request).await;
        assert!(
            response.is_ok(),
            "Request should succeed with valid API key"
        );
        assert!(!response.unwrap().content().is_empty());
    }

    #[tokio::test]
    async fn test_streaming_completion() {
        let Some(client) = client() else {
            return;
        };
        let request =
            ChatRequest::new(DEFAULT_MODEL, vec![Turn::user("Count to 3")]).with_stream(true);

        let stream = client.stream(&request).await;
        assert!(stream.is_ok(), "Stream request should succeed");
        let deltas = stream.unwrap().collect::<Vec<_>>().await;
        assert!(deltas.iter().all(|delta| delta.is_ok()));
        assert!(deltas.iter().flatten().any(|delta| delta.is_finish()));
    }
}
