//! Script console, node and page endpoints

use crate::JenkinsClient;
use crate::error::{ClientError, Result};
use jack_core::domain::node::Node;
use jack_core::dto::node::ComputerSet;
use reqwest::{Method, Url};

impl JenkinsClient {
    // =============================================================================
    // Script Console
    // =============================================================================

    /// Execute a script through the script console
    ///
    /// # Arguments
    /// * `script` - The script source
    /// * `node` - Node to run on, or `None` for the controller's global context
    ///
    /// # Returns
    /// Whatever the script printed
    pub async fn run_script(&self, script: &str, node: Option<&str>) -> Result<String> {
        let url = self.script_endpoint(node)?;
        let response = self
            .request(Method::POST, url)
            .form(&[("script", script)])
            .send()
            .await?;

        self.handle_text(response).await
    }

    fn script_endpoint(&self, node: Option<&str>) -> Result<Url> {
        match node {
            Some(node) => self.endpoint(&["computer", node, "scriptText"]),
            None => self.endpoint(&["scriptText"]),
        }
    }

    // =============================================================================
    // Nodes
    // =============================================================================

    /// List the agent nodes known to the server
    pub async fn list_nodes(&self) -> Result<Vec<Node>> {
        let url = self.endpoint(&["computer", "api", "json"])?;
        let response = self.request(Method::GET, url).send().await?;

        let set: ComputerSet = self.handle_response(response).await?;
        Ok(set.into_nodes())
    }

    // =============================================================================
    // Raw Pages
    // =============================================================================

    /// Fetch a page relative to the server root
    ///
    /// # Arguments
    /// * `path` - e.g. `pipeline-syntax/globals`
    pub async fn get_page(&self, path: &str) -> Result<String> {
        let url = self.page_url(path)?;
        let response = self.request(Method::GET, url).send().await?;

        self.handle_text(response).await
    }

    fn page_url(&self, path: &str) -> Result<Url> {
        let (path, fragment) = match path.split_once('#') {
            Some((path, fragment)) => (path, Some(fragment)),
            None => (path, None),
        };

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return Err(ClientError::InvalidRequest("Page path is empty".to_string()));
        }

        let mut url = self.endpoint(&segments)?;
        url.set_fragment(fragment);
        Ok(url)
    }

    /// Absolute URL of a page, for opening in a browser
    pub fn page_link(&self, path: &str) -> Result<String> {
        Ok(self.page_url(path)?.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_endpoint_for_controller_and_node() {
        let client = JenkinsClient::new("http://localhost:8080").unwrap();

        let controller = client.script_endpoint(None).unwrap();
        assert_eq!(controller.as_str(), "http://localhost:8080/scriptText");

        let node = client.script_endpoint(Some("linux 1")).unwrap();
        assert_eq!(
            node.as_str(),
            "http://localhost:8080/computer/linux%201/scriptText"
        );
    }

    #[test]
    fn test_page_link_keeps_fragment() {
        let client = JenkinsClient::new("http://localhost:8080").unwrap();
        let link = client
            .page_link("job/ci-demo/pipeline-syntax/globals#env")
            .unwrap();
        assert_eq!(
            link,
            "http://localhost:8080/job/ci-demo/pipeline-syntax/globals#env"
        );
    }

    #[test]
    fn test_page_link_rejects_empty_path() {
        let client = JenkinsClient::new("http://localhost:8080").unwrap();
        assert!(client.page_link("/").is_err());
    }
}
