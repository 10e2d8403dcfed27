use crate::client::ApiClient;
use crate::endpoints;
use crate::error::Error;
use crate::normalize::{FarmProfile, normalize_farm_profile};
use crate::storage::SecureStore;
use crate::transport::Transport;

impl<S: SecureStore, T: Transport> ApiClient<S, T> {
    /// The signed-in user's farm, or `None` when the response lists none.
    ///
    /// # Errors
    ///
    /// Transport, status and storage errors from [`ApiClient::call`].
    pub async fn my_farm(&self) -> Result<Option<FarmProfile>, Error> {
        let raw = self.call(endpoints::my_farm()).await?;
        Ok(normalize_farm_profile(&raw))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::ApiClient;
    use crate::client::testing::ScriptedTransport;
    use crate::config::ClientConfig;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn empty_farm_list_is_none() {
        let transport = ScriptedTransport::default();
        transport.reply("/farm/me", Ok(json!({"success": true, "data": []})));
        let config = ClientConfig::new("https://api.example.com".parse().unwrap());
        let client = ApiClient::with_transport(config, MemoryStore::new(), transport);

        assert_eq!(client.my_farm().await.unwrap(), None);
    }
}
